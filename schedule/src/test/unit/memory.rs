use kiln_ir::{ErrorKind, Pattern};

use crate::test::{LOADU, ROWS, STOREU, parse, parse_with};
use crate::*;

const STAGE: &str = "\
def stage(x: f32[8], y: f32[8]):
    v: f32[8] @ DRAM
    loadu(v, x)
    storeu(y, v)
";

fn stage(space: &str) -> kiln_ir::Procedure {
    let loadu = parse(LOADU);
    let storeu = parse(STOREU);
    parse_with(&STAGE.replace("@ DRAM", &format!("@ {space}")), &[&loadu, &storeu])
}

#[test]
fn test_set_memory_to_vector_space() {
    let moved = stage("DRAM").set_memory("v", "AVX2").unwrap();
    assert!(moved.to_string().contains("    v: f32[8] @ AVX2\n    loadu(v, x)"), "{moved}");
    assert_eq!(Pattern::parse("v : _").unwrap().stmt_sites(&moved).unwrap().len(), 1);
}

#[test]
fn test_set_memory_resolved_space() {
    let moved = stage("DRAM").set_memory_space("v", kiln_memory::get_space("AVX2").unwrap()).unwrap();
    assert_eq!(moved, stage("AVX2"));
}

#[test]
fn test_set_memory_violates_allocation_rule() {
    let err = parse(ROWS).set_memory("tmp", "AVX2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MemoryCompatibility, "{err}");
    assert!(matches!(err, Error::Ir { .. }), "{err}");
}

#[test]
fn test_set_memory_unknown_space() {
    let err = parse(ROWS).set_memory("tmp", "NOWHERE").unwrap_err();
    assert!(matches!(err, Error::Memory { .. }), "{err}");
    assert!(err.to_string().contains("unknown memory space 'NOWHERE'"), "{err}");
}

#[test]
fn test_set_memory_call_site_mismatch() {
    let err = stage("AVX2").set_memory("v", "DRAM").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MemoryCompatibility, "{err}");
    assert!(matches!(err, Error::MemoryMismatch { .. }), "{err}");
    assert!(err.to_string().contains("v @ DRAM cannot bind parameter dst @ AVX2 of loadu"), "{err}");
}

#[test]
fn test_set_memory_requires_allocation() {
    let err = parse(ROWS).set_memory("x", "DRAM").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PatternMatch, "{err}");
}

#[test]
fn test_set_memory_forbidden_element_access() {
    let source = "\
def fill(x: f32[8]):
    v: f32[8] @ DRAM
    for i in par(0, 8):
        v[i] = x[i]
";
    let err = parse(source).set_memory("v", "AVX2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MemoryCompatibility, "{err}");
    assert!(matches!(err, Error::Ir { source: kiln_ir::Error::MemoryAccess { .. } }), "{err}");
    assert!(
        err.to_string().contains("memory space AVX2 does not allow element writes in: v[i] = x[i]"),
        "{err}"
    );
}
