use test_case::test_case;

use kiln_ir::{Arg, ErrorKind, Stmt};

use crate::test::{assert_equivalent, buffer, parse};
use crate::*;

const TWO_STEP: &str = "\
def two_step(n: size, x: R[n], y: R[n], z: R[n]):
    for i in par(0, n):
        y[i] = 2.0 * x[i]
        z[i] = y[i] + 1.0
";

const NEST: &str = "\
def nest(n: size, m: size, x: R[n, m], y: R[n, m]):
    for i in par(0, n):
        for j in par(0, m):
            x[i, j] = 1.0
            y[i, j] = x[i, j] + y[i, j]
";

#[test]
fn test_fission_splits_loop() {
    let proc = parse(TWO_STEP);
    let split = proc.fission_after("y[_] = _", 1).unwrap();
    assert_eq!(split.body().len(), 2);
    assert!(split.body().iter().all(|stmt| matches!(stmt, Stmt::For { body, .. } if body.len() == 1)));
    assert_equivalent(&proc, &split, &[Arg::Int(5), buffer(5, 1.0), buffer(5, 0.0), buffer(5, 0.0)]);
}

#[test]
fn test_fission_through_two_loops() {
    let proc = parse(NEST);
    let split = proc.fission_after("x[_] = _", 2).unwrap();
    assert_eq!(split.body().len(), 2, "{split}");
    let text = split.to_string();
    assert_eq!(text.matches("for i in par(0, n):").count(), 2, "{text}");
    assert_eq!(text.matches("for j in par(0, m):").count(), 2, "{text}");
    assert_equivalent(&proc, &split, &[Arg::Int(3), Arg::Int(4), buffer(12, 1.0), buffer(12, 5.0)]);
}

#[test]
fn test_fission_through_condition() {
    let source = "\
def guarded(n: size, x: R[n], y: R[n]):
    for i in seq(0, n):
        if i < 3:
            x[i] = 0.0
            y[i] = x[i] + 1.0
";
    let proc = parse(source);
    let split = proc.fission_after("x[_] = _", 2).unwrap();
    assert_eq!(split.body().len(), 2, "{split}");
    assert_eq!(split.to_string().matches("if i < 3:").count(), 2, "{split}");
    assert_equivalent(&proc, &split, &[Arg::Int(5), buffer(5, 1.0), buffer(5, 0.0)]);
}

#[test_case(
    "def shifted(n: size, x: R[n + 1], y: R[n + 1]):\n    for i in par(0, n):\n        y[i + 1] = x[i]\n        x[i] = y[i]\n",
    "y[_] = _",
    "y is shared across the cut";
    "different indices"
)]
#[test_case(
    "def local(n: size, x: R[n], y: R[n]):\n    for i in par(0, n):\n        t: R @ DRAM\n        t = x[i]\n        y[i] = t\n",
    "t = _",
    "allocation t is used after the cut";
    "allocation used after the cut"
)]
#[test_case(
    "def cfg(n: size, x: f32[n]):\n    for i in seq(0, n):\n        ConfigAB.a = x[i]\n        x[i] = ConfigAB.a\n",
    "ConfigAB.a = _",
    "carries state across the cut";
    "config flow"
)]
#[test_case(
    "def reduce(n: size, x: R[n], s: R[1]):\n    for i in seq(0, n):\n        s[0] += x[i]\n        x[i] = s[0]\n",
    "s[_] += _",
    "s is shared across the cut";
    "index independent of the loop"
)]
#[test_case(
    "def halves(n: size, x: R[n], y: R[n]):\n    for i in seq(0, n):\n        x[i / 2] = y[i]\n        y[i] = x[i / 2] + 1.0\n",
    "x[_] = _",
    "x is shared across the cut without a single index injective in i";
    "floor division of the loop variable"
)]
#[test_case(
    "def wrap(n: size, x: R[4], y: R[n]):\n    for i in seq(0, n):\n        x[i % 4] = y[i]\n        y[i] = x[i % 4]\n",
    "x[_] = _",
    "x is shared across the cut";
    "modulo of the loop variable"
)]
#[test_case(
    "def diag(n: size, x: R[2 * n], y: R[n, n]):\n    for i in seq(0, n):\n        for j in seq(0, n):\n            x[i + j] = y[i, j]\n        for j in seq(0, n):\n            y[i, j] = x[i + j]\n",
    "for j in _: _",
    "x is shared across the cut";
    "index offset by an inner loop"
)]
fn test_fission_rejections(source: &str, pattern: &str, message: &str) {
    let err = parse(source).fission_after(pattern, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains(message), "{err}");
}

#[test]
fn test_fission_needs_a_cut() {
    let err = parse(TWO_STEP).fission_after("z[_] = _", 1).unwrap_err();
    assert!(err.to_string().contains("nothing follows"), "{err}");
}

#[test]
fn test_fission_past_the_body() {
    let err = parse(TWO_STEP).fission_after("y[_] = _", 2).unwrap_err();
    assert!(err.to_string().contains("ran out of enclosing loops"), "{err}");
}

#[test]
fn test_fission_zero_lifts() {
    let err = parse(TWO_STEP).fission_after("y[_] = _", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition);
}

#[test]
fn test_fission_keeps_strided_access() {
    let source = "\
def evens(n: size, x: R[2 * n], y: R[n]):
    for i in seq(0, n):
        x[2 * i] = y[i]
        y[i] = x[2 * i] + 1.0
";
    let proc = parse(source);
    let split = proc.fission_after("x[_] = _", 1).unwrap();
    assert_eq!(split.body().len(), 2, "{split}");
    assert_equivalent(&proc, &split, &[Arg::Int(4), buffer(8, 0.5), buffer(4, 10.0)]);
}
