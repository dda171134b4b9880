use kiln_ir::{Arg, ErrorKind};

use crate::test::{ROWS, SCALE, assert_equivalent, buffer, parse};
use crate::*;

const TRANSPOSE: &str = "\
def transpose(n: size, m: size, x: R[n, m], y: R[m, n]):
    for i in par(0, n):
        for j in par(0, m):
            y[j, i] = x[i, j]
";

const FOUR: &str = "\
def four(x: R[4], y: R[4]):
    for k in par(0, 4):
        t: R @ DRAM
        t = x[k] * 2.0
        y[k] = t + 1.0
";

// ============================================================================
// reorder
// ============================================================================

#[test]
fn test_reorder() {
    let proc = parse(TRANSPOSE);
    let swapped = proc.reorder("i").unwrap();
    let text = swapped.to_string();
    assert!(text.contains("    for j in par(0, m):\n        for i in par(0, n):\n            y[j, i] = x[i, j]"), "{text}");
    assert_equivalent(&proc, &swapped, &[Arg::Int(2), Arg::Int(3), buffer(6, 1.0), buffer(6, 0.0)]);
    assert_eq!(swapped.reorder("j").unwrap(), proc);
}

#[test]
fn test_reorder_rejects_sequential_loop() {
    let err = parse(&TRANSPOSE.replacen("par", "seq", 1)).reorder("i").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("i and j must both be parallel loops"), "{err}");
}

#[test]
fn test_reorder_rejects_imperfect_nest() {
    let err = parse(ROWS).reorder("i").unwrap_err();
    assert!(err.to_string().contains("loop i does not directly nest a single loop"), "{err}");
}

#[test]
fn test_reorder_rejects_dependent_extent() {
    let source = "\
def lower(n: size, x: R[n, n]):
    for i in par(0, n):
        for j in par(0, i + 1):
            x[i, j] = 0.0
";
    let err = parse(source).reorder("i").unwrap_err();
    assert!(err.to_string().contains("extent of j depends on i"), "{err}");
}

// ============================================================================
// unroll
// ============================================================================

#[test]
fn test_unroll() {
    let proc = parse(FOUR);
    let unrolled = proc.unroll("k").unwrap();
    let text = unrolled.to_string();
    assert!(!text.contains("for"), "{text}");
    assert!(text.contains("    t_0: R @ DRAM\n    t_0 = x[0] * 2.0\n    y[0] = t_0 + 1.0\n"), "{text}");
    assert!(text.contains("    t_3: R @ DRAM\n    t_3 = x[3] * 2.0\n    y[3] = t_3 + 1.0\n"), "{text}");
    assert_equivalent(&proc, &unrolled, &[buffer(4, 1.0), buffer(4, 0.0)]);
}

#[test]
fn test_unroll_inner_loop() {
    let source = "\
def pairs(n: size, x: R[n, 2]):
    for i in par(0, n):
        for j in seq(0, 2):
            x[i, j] = x[i, j] + 1.0
";
    let proc = parse(source);
    let unrolled = proc.unroll("j").unwrap();
    assert!(unrolled.to_string().contains("        x[i, 0] = x[i, 0] + 1.0\n        x[i, 1] = x[i, 1] + 1.0"));
    assert_equivalent(&proc, &unrolled, &[Arg::Int(3), buffer(6, 0.0)]);
}

#[test]
fn test_unroll_rejects_symbolic_extent() {
    let err = parse(SCALE).unroll("i").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("extent `n` of loop i is not a constant"), "{err}");
}

#[test]
fn test_unroll_rejects_taken_name() {
    let source = "\
def clash(x: R[2], t_1: R):
    for k in par(0, 2):
        t: R @ DRAM
        t = x[k]
        x[k] = t + t_1
";
    let err = parse(source).unroll("k").unwrap_err();
    assert!(err.to_string().contains("cannot rename t in copy 1: t_1 is already in use"), "{err}");
}
