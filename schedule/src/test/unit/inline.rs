use kiln_ir::{Arg, ErrorKind, Procedure};

use crate::test::{LOADU, SCALE, assert_equivalent, buffer, parse, parse_with};
use crate::*;

const SCALE_ROW: &str = "\
def scale_row(m: size, k: R, row: [R][m]):
    for j in par(0, m):
        row[j] = k * row[j]
";

fn scale_row() -> Procedure {
    parse(SCALE_ROW)
}

fn rows_args() -> Vec<Arg> {
    vec![Arg::Int(2), Arg::Int(3), Arg::Buffer(vec![3.0]), buffer(6, 1.0)]
}

#[test]
fn test_inline_window_argument() {
    let callee = scale_row();
    let source = "\
def scale_rows(n: size, m: size, k: R, x: R[n, m]):
    for i in par(0, n):
        scale_row(m, k, x[i, 0:m])
";
    let proc = parse_with(source, &[&callee]);
    let inlined = proc.inline_call("scale_row(_)").unwrap();
    let text = inlined.to_string();
    assert!(text.contains("    for i in par(0, n):\n        for j in par(0, m):\n            x[i, j] = k * x[i, j]"), "{text}");
    assert_equivalent(&proc, &inlined, &rows_args());
}

#[test]
fn test_inline_renames_clashing_locals() {
    let callee = scale_row();
    let source = "\
def scale_rows(n: size, m: size, k: R, x: R[n, m]):
    for j in par(0, n):
        scale_row(m, k, x[j, 0:m])
";
    let proc = parse_with(source, &[&callee]);
    let inlined = proc.inline_call("scale_row(_)").unwrap();
    let text = inlined.to_string();
    assert!(text.contains("for j_1 in par(0, m):\n            x[j, j_1] = k * x[j, j_1]"), "{text}");
    assert_equivalent(&proc, &inlined, &rows_args());
}

#[test]
fn test_inline_offset_window() {
    let callee = scale_row();
    let source = "\
def tail(n: size, k: R, x: R[n + 2]):
    scale_row(n, k, x[2:n + 2])
";
    let proc = parse_with(source, &[&callee]);
    let inlined = proc.inline_call("scale_row(_)").unwrap();
    assert!(inlined.to_string().contains("x[2 + j] = k * x[2 + j]"), "{inlined}");
    assert_equivalent(&proc, &inlined, &[Arg::Int(3), Arg::Buffer(vec![0.5]), buffer(5, 1.0)]);
}

#[test]
fn test_inline_rejects_instruction() {
    let loadu = parse(LOADU);
    let source = "\
def stage(x: f32[8]):
    v: f32[8] @ AVX2
    loadu(v, x)
";
    let proc = parse_with(source, &[&loadu]);
    let err = proc.inline_call("loadu(_)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("loadu is an instruction and has no body to inline"), "{err}");
}

#[test]
fn test_inline_requires_call() {
    let err = parse(SCALE).inline_call("for i in _: _").unwrap_err();
    assert!(err.to_string().contains("expected a call, found:"), "{err}");
}
