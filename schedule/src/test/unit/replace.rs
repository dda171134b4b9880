use kiln_ir::{Arg, ErrorKind, Procedure};

use crate::test::{LOADU, SCALE, STOREU, assert_equivalent, buffer, parse, parse_with};
use crate::*;

const COPY8: &str = "\
def copy8(x: f32[8] @ DRAM, y: f32[8] @ DRAM):
    v: f32[8] @ DRAM
    for i in par(0, 8):
        v[i] = x[i]
    for i in par(0, 8):
        y[i] = v[i] * 2.0
";

const COPY16: &str = "\
def copy16(x: f32[16] @ DRAM, y: f32[16] @ DRAM):
    for io in par(0, 2):
        v: f32[8] @ DRAM
        for ii in par(0, 8):
            v[ii] = x[8 * io + ii]
        for ii in par(0, 8):
            y[8 * io + ii] = v[ii]
";

fn instrs() -> (Procedure, Procedure) {
    (parse(LOADU), parse(STOREU))
}

#[test]
fn test_replace_whole_buffers() {
    let (loadu, _) = instrs();
    let proc = parse_with(COPY8, &[&loadu]);
    let replaced = proc.replace(&loadu, "for i in _: _").unwrap();
    let text = replaced.to_string();
    assert!(text.contains("    v: f32[8] @ DRAM\n    loadu(v, x)\n    for i in par(0, 8):"), "{text}");
    assert_equivalent(&proc, &replaced, &[buffer(8, 1.0), buffer(8, 0.0)]);
}

#[test]
fn test_replace_windows() {
    let (loadu, storeu) = instrs();
    let proc = parse_with(COPY16, &[&loadu, &storeu]);
    let replaced = proc.replace(&loadu, "for ii in _: _").unwrap().replace(&storeu, "for ii in _: _").unwrap();
    let text = replaced.to_string();
    assert!(text.contains("loadu(v, x[8 * io:8 * io + 8])"), "{text}");
    assert!(text.contains("storeu(y[8 * io:8 * io + 8], v)"), "{text}");
    assert_equivalent(&proc, &replaced, &[buffer(16, 1.0), buffer(16, 0.0)]);
}

#[test]
fn test_replace_body_mismatch() {
    let (loadu, _) = instrs();
    let err = parse(SCALE).replace(&loadu, "for i in _: _").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplacementEquivalence, "{err}");
    assert!(err.to_string().starts_with("cannot replace with loadu:"), "{err}");
}

#[test]
fn test_replace_loop_kind_mismatch() {
    let (loadu, _) = instrs();
    let proc = parse(&COPY8.replacen("par", "seq", 1));
    let err = proc.replace(&loadu, "for i in _: _").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplacementEquivalence, "{err}");
    assert!(err.to_string().contains("expected a par loop"), "{err}");
}

#[test]
fn test_replace_parameter_in_wrong_space() {
    let (loadu, _) = instrs();
    let source = "\
def spill(x: f32[8] @ DRAM, y: f32[8] @ DRAM):
    for i in par(0, 8):
        y[i] = x[i]
";
    let err = parse(source).replace(&loadu, "for i in _: _").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplacementEquivalence, "{err}");
    assert!(err.to_string().contains("y @ DRAM cannot be passed to dst @ AVX2"), "{err}");
}

#[test]
fn test_replace_all_skips_sites_that_do_not_unify() {
    let (loadu, _) = instrs();
    let proc = parse(COPY16);
    let replaced = proc.replace_all(&loadu, "for ii in _: _").unwrap();
    let text = replaced.to_string();
    assert_eq!(text.matches("loadu(").count(), 1, "{text}");
    assert!(text.contains("y[8 * io + ii] = v[ii]"), "{text}");
    assert_equivalent(&proc, &replaced, &[buffer(16, 1.0), buffer(16, 0.0)]);
}

#[test]
fn test_replace_all_without_unifying_site() {
    let (loadu, _) = instrs();
    let err = parse(SCALE).replace_all(&loadu, "for i in _: _").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplacementEquivalence, "{err}");
    assert!(err.to_string().contains("none of the 1 sites matching 'for i in _: _' unifies"), "{err}");
}

#[test]
fn test_replace_region_too_short() {
    let source = "\
@instr(\"copy2({dst}, {src});\")
def copy2(dst: [f32][8] @ DRAM, src: [f32][8] @ DRAM):
    for i in par(0, 8):
        dst[i] = src[i]
    for i in par(0, 8):
        dst[i] = src[i]
";
    let copy2 = parse(source);
    let err = parse(COPY8).replace(&copy2, "for i in _: _ #1").unwrap_err();
    assert!(err.to_string().contains("instruction has 2 statements, only 1 follow"), "{err}");
}

#[test]
fn test_replaced_call_runs_instruction_body() {
    let (loadu, _) = instrs();
    let proc = parse(COPY8).replace(&loadu, "for i in _: _").unwrap();
    let mut args = [buffer(8, 1.0), buffer(8, 0.0)];
    kiln_ir::Interpreter::default().run(&proc, &mut args).unwrap();
    assert_eq!(args[1], Arg::Buffer((0..8).map(|i| 2.0 * (1.0 + i as f64 * 0.5)).collect()));
}
