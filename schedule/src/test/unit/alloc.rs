use kiln_ir::{Arg, ErrorKind};

use crate::test::{ROWS, assert_equivalent, buffer, parse};
use crate::*;

fn rows_args() -> Vec<Arg> {
    vec![Arg::Int(3), Arg::Int(4), buffer(12, 1.0), buffer(12, 0.0)]
}

// ============================================================================
// lift_alloc
// ============================================================================

#[test]
fn test_lift_out_of_loop() {
    let proc = parse(ROWS);
    let lifted = proc.lift_alloc("tmp", 1).unwrap();
    let text = lifted.to_string();
    assert!(text.contains("    tmp: R[m] @ DRAM\n    for i in par(0, n):\n        for j in par(0, m):"), "{text}");
    assert_equivalent(&proc, &lifted, &rows_args());
}

#[test]
fn test_lift_out_of_conditional() {
    let source = "\
def guarded(n: size, x: R[n]):
    for i in seq(0, n):
        if i > 0:
            t: R @ DRAM
            t = x[i]
            x[i] = t * 2.0
";
    let proc = parse(source);
    let lifted = proc.lift_alloc("t", 1).unwrap();
    assert!(lifted.to_string().contains("        t: R @ DRAM\n        if i > 0:"), "{lifted}");
    assert_equivalent(&proc, &lifted, &[Arg::Int(4), buffer(4, 1.0)]);
}

#[test]
fn test_lift_scalar_written_first() {
    let source = "\
def scalar(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        t: R @ DRAM
        t = x[i] + 1.0
        y[i] = t * t
";
    let proc = parse(source);
    let lifted = proc.lift_alloc("t : _", 1).unwrap();
    assert!(lifted.to_string().starts_with("def scalar(n: size, x: R[n], y: R[n]):\n    t: R @ DRAM\n"), "{lifted}");
    assert_equivalent(&proc, &lifted, &[Arg::Int(5), buffer(5, 1.0), buffer(5, 0.0)]);
}

#[test]
fn test_lift_rejects_stale_read() {
    let source = "\
def stale(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        t: R[2] @ DRAM
        t[0] = x[i]
        t[1] = x[i]
        y[i] = t[1]
        t[0] = y[i]
        x[i] = t[1] + t[0]
";
    assert!(parse(source).lift_alloc("t", 1).is_ok());

    let source = "\
def stale(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        t: R[2] @ DRAM
        t[0] = x[i]
        y[i] = t[1]
";
    let err = parse(source).lift_alloc("t", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("t may be read before it is fully overwritten in an iteration of i"), "{err}");
}

#[test]
fn test_lift_rejects_read_ahead_of_overwrite() {
    let source = "\
def ahead(n: size, x: R[n, 4], y: R[n, 4]):
    for i in seq(0, n):
        tmp: R[4] @ DRAM
        for j in seq(0, 4):
            tmp[j] = x[i, j]
            if j < 3:
                y[i, j] = tmp[j + 1]
";
    let err = parse(source).lift_alloc("tmp", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("tmp may be read before it is fully overwritten in an iteration of i"), "{err}");
}

#[test]
fn test_lift_through_overwrite_then_same_index_read() {
    let source = "\
def same(n: size, x: R[n, 4], y: R[n, 4]):
    for i in seq(0, n):
        tmp: R[4] @ DRAM
        for j in seq(0, 4):
            tmp[j] = x[i, j]
            y[i, j] = tmp[j] * 2.0
        for j in seq(0, 4):
            y[i, j] += tmp[3 - j]
";
    let proc = parse(source);
    let lifted = proc.lift_alloc("tmp", 1).unwrap();
    assert_equivalent(&proc, &lifted, &[Arg::Int(3), buffer(12, 1.0), buffer(12, 0.0)]);
}

#[test]
fn test_lift_rejects_iteration_dependent_extent() {
    let source = "\
def tri(n: size, x: R[n, n]):
    for i in par(0, n):
        t: R[i + 1] @ DRAM
        for j in par(0, i + 1):
            t[j] = x[i, j]
        for j in par(0, i + 1):
            x[i, j] = t[j] * 2.0
";
    let err = parse(source).lift_alloc("t", 1).unwrap_err();
    assert!(err.to_string().contains("extent of t depends on loop variable i"), "{err}");
}

#[test]
fn test_lift_past_body() {
    let err = parse(ROWS).lift_alloc("tmp", 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("cannot lift tmp past the procedure body"), "{err}");
}

#[test]
fn test_lift_zero_times() {
    let err = parse(ROWS).lift_alloc("tmp", 0).unwrap_err();
    assert!(err.to_string().contains("n_lifts must be at least 1"), "{err}");
}

#[test]
fn test_lift_unknown_alloc() {
    let err = parse(ROWS).lift_alloc("nope", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PatternMatch, "{err}");
}

// ============================================================================
// expand_dim
// ============================================================================

#[test]
fn test_expand_dim() {
    let proc = parse(ROWS);
    let expanded = proc.expand_dim("tmp", "n", "i").unwrap();
    let text = expanded.to_string();
    assert!(text.contains("tmp: R[n, m] @ DRAM"), "{text}");
    assert!(text.contains("tmp[i, j] = 2.0 * x[i, j]"), "{text}");
    assert!(text.contains("y[i, j] = tmp[i, j] + 1.0"), "{text}");
    assert_equivalent(&proc, &expanded, &rows_args());
}

#[test]
fn test_expand_scalar() {
    let source = "\
def scalar(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        t: R @ DRAM
        t = x[i] + 1.0
        y[i] = t * t
";
    let proc = parse(source);
    let expanded = proc.expand_dim("t", "n", "i").unwrap();
    let text = expanded.to_string();
    assert!(text.contains("t: R[n] @ DRAM\n        t[i] = x[i] + 1.0\n        y[i] = t[i] * t[i]"), "{text}");
    assert_equivalent(&proc, &expanded, &[Arg::Int(3), buffer(3, 2.0), buffer(3, 0.0)]);

    let lifted = expanded.lift_alloc("t", 1).unwrap();
    assert!(lifted.to_string().contains("    t: R[n] @ DRAM\n    for i in par(0, n):"), "{lifted}");
    assert_equivalent(&proc, &lifted, &[Arg::Int(3), buffer(3, 2.0), buffer(3, 0.0)]);
}

#[test]
fn test_expand_rejects_out_of_range_index() {
    let err = parse(ROWS).expand_dim("tmp", "n", "i + 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("cannot prove 0 <= i + 1 < n"), "{err}");
}

#[test]
fn test_expand_rejects_unknown_name() {
    let err = parse(ROWS).expand_dim("tmp", "k", "i").unwrap_err();
    assert!(err.to_string().contains("k is not in scope at the allocation of tmp"), "{err}");
}
