use test_case::test_case;

use crate::test::{LOADU, parse, parse_with};
use crate::*;

#[test_case("def f(x: f32[8] @ AVX2):\n    x[0] = 1.0\n"; "element write")]
#[test_case("def f(x: f32[8] @ AVX2, y: f32[8]):\n    y[0] = x[0]\n"; "element read")]
#[test_case("def f(x: f32[8] @ AVX2, y: f32[8]):\n    x[0] += y[0]\n"; "reduction")]
#[test_case("def f(y: f32[8]):\n    x: f32[4, 16] @ GEMM_SCRATCH\n    y[0] = x[0, 0]\n"; "scratchpad read")]
fn test_block_only_spaces_reject_element_access(source: &str) {
    let err = parse(source).unwrap_err();
    assert!(matches!(err, Error::MemoryAccess { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::MemoryCompatibility);
}

#[test_case("def f():\n    x: f32[4] @ AVX2\n"; "wrong lane count")]
#[test_case("def f(n: size):\n    x: f32[n] @ AVX2\n"; "symbolic lane count")]
#[test_case("def f():\n    x: i32[8] @ AVX2\n"; "unsupported element")]
#[test_case("def f():\n    x: f32 @ AVX512\n"; "scalar in vector space")]
#[test_case("def f():\n    x: i32[16, 16] @ GEMM_SCRATCH\n"; "accumulator type in scratchpad")]
#[test_case("def f(x: [f32][8] @ AVX2):\n    pass\n"; "window without unit stride")]
fn test_allocation_rules(source: &str) {
    let err = parse(source).unwrap_err();
    assert!(matches!(err, Error::MemoryRule { .. }), "{err}");
}

#[test_case("def f():\n    x: f32[2, 8] @ AVX2\n"; "vector rows")]
#[test_case("def f():\n    x: i8[4, 16] @ GEMM_SCRATCH\n    y: i32[4, 16] @ GEMM_ACCUM\n"; "gemmini")]
#[test_case("def f(x: [f32][8] @ AVX2):\n    assert stride(x, 0) == 1\n    pass\n"; "asserted unit stride")]
fn test_allocation_accepted(source: &str) {
    parse(source).unwrap();
}

#[test]
fn test_instruction_bodies_may_touch_elements() {
    let loadu = parse(LOADU).unwrap();
    assert!(loadu.is_instr());
    assert_eq!(loadu.params()[0].space().name(), "AVX2");
}

#[test]
fn test_block_arguments_are_not_element_access() {
    let loadu = parse(LOADU).unwrap();
    parse_with(
        "\
def f(x: f32[16]):
    v: f32[8] @ AVX2
    loadu(v, x[8:16])
",
        &[&loadu],
    )
    .unwrap();
}

#[test]
fn test_user_registered_space() {
    let space = kiln_memory::MemSpace::builder()
        .name("TEST_SRAM")
        .flags(kiln_memory::MemFlag::ElementRead.into())
        .build()
        .unwrap();
    kiln_memory::register(space).unwrap();
    parse("def f(x: f32[4] @ TEST_SRAM, y: f32[4]):\n    y[0] = x[0]\n").unwrap();
    let err = parse("def f(x: f32[4] @ TEST_SRAM):\n    x[0] = 1.0\n").unwrap_err();
    assert!(matches!(err, Error::MemoryAccess { access: "element writes", .. }), "{err}");
}
