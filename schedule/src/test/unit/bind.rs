use kiln_ir::{Arg, ErrorKind, Pattern};

use crate::test::{SIMPLE_MATH, assert_equivalent, buffer, parse};
use crate::*;

#[test]
fn test_bind_read() {
    let proc = parse(SIMPLE_MATH);
    let bound = proc.bind_expr("xv", "x[_]").unwrap();
    let text = bound.to_string();
    assert!(text.contains("xv: R @ DRAM\n        xv = x[i]\n        x[i] = xv * y[i]"), "{text}");
    assert_equivalent(&proc, &bound, &[Arg::Int(8), buffer(8, 1.0), buffer(8, 2.0)]);
}

#[test]
fn test_bind_replaces_every_occurrence() {
    let source = "\
def square(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        y[i] = x[i] * x[i] + x[i]
";
    let proc = parse(source);
    let bound = proc.bind_expr("v", "x[_]").unwrap();
    assert!(bound.to_string().contains("y[i] = v * v + v"), "{bound}");
    assert_equivalent(&proc, &bound, &[Arg::Int(4), buffer(4, 3.0), buffer(4, 0.0)]);
}

#[test]
fn test_bind_stops_at_overwrite() {
    let source = "\
def clobber(n: size, x: R[n], y: R[n]):
    for i in seq(0, n):
        y[i] = x[i] * 2.0
        x[i] = 0.0
        y[i] = x[i] * 2.0 + y[i]
";
    let proc = parse(source);
    let bound = proc.bind_expr("t", "x[_]").unwrap();
    let text = bound.to_string();
    assert!(text.contains("y[i] = t * 2.0"), "{text}");
    assert!(text.contains("y[i] = x[i] * 2.0 + y[i]"), "{text}");
    assert_equivalent(&proc, &bound, &[Arg::Int(3), buffer(3, 1.0), buffer(3, 1.0)]);
}

#[test]
fn test_bind_compound_expression() {
    let source = "\
def fma(n: size, a: f32[n], b: f32[n], c: f32[n]):
    for i in par(0, n):
        c[i] = a[i] * b[i] + c[i]
";
    let proc = parse(source);
    let bound = proc.bind_expr("ab", "a[_] * b[_]").unwrap();
    assert_eq!(Pattern::parse("ab : _").unwrap().stmt_sites(&bound).unwrap().len(), 1);
    assert!(bound.to_string().contains("ab: f32 @ DRAM"), "{bound}");
    assert!(bound.to_string().contains("c[i] = ab + c[i]"), "{bound}");
    assert_equivalent(&proc, &bound, &[Arg::Int(3), buffer(3, 1.0), buffer(3, 2.0), buffer(3, 3.0)]);
}

#[test]
fn test_bind_name_in_use() {
    let err = parse(SIMPLE_MATH).bind_expr("y", "x[_]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("name y is already in use"), "{err}");
}

#[test]
fn test_bind_control_expression() {
    let err = parse(SIMPLE_MATH).bind_expr("k", "i").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("not a data expression"), "{err}");
}

#[test]
fn test_bind_no_match() {
    let err = parse(SIMPLE_MATH).bind_expr("k", "z[_]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PatternMatch, "{err}");
}
