use test_case::test_case;

use kiln_ir::{Arg, ErrorKind, Pattern};

use crate::test::{SCALE, SIMPLE_MATH, assert_equivalent, buffer, parse};
use crate::*;

#[test]
fn test_perfect_split() {
    let proc = parse(SIMPLE_MATH);
    let split = split::split(&proc, "i", 8, ("io", "ii"), SplitTail::Perfect).unwrap();
    let text = split.to_string();
    assert!(text.contains("for io in par(0, n / 8):"), "{text}");
    assert!(text.contains("for ii in par(0, 8):"), "{text}");
    assert!(text.contains("x[8 * io + ii] = x[8 * io + ii] * y[8 * io + ii]"), "{text}");
    assert!(!text.contains("for i in"), "{text}");
    assert_equivalent(&proc, &split, &[Arg::Int(16), buffer(16, 1.0), buffer(16, -3.0)]);
}

#[test]
fn test_perfect_split_needs_divisibility() {
    let err = parse(SCALE).split("i", 8, ("io", "ii"), SplitTail::Perfect).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains("divisible by 8"), "{err}");
}

#[test_case(SplitTail::Cut, 13; "cut")]
#[test_case(SplitTail::CutAndGuard, 13; "cut and guard")]
#[test_case(SplitTail::Guard, 13; "guard")]
#[test_case(SplitTail::Guard, 16; "guard on a full block")]
#[test_case(SplitTail::Cut, 3; "cut shorter than one block")]
#[test_case(SplitTail::Guard, 0; "empty range")]
fn test_tails_preserve_semantics(tail: SplitTail, n: usize) {
    let proc = parse(SCALE);
    let split = proc.split("i", 8, ("io", "ii"), tail).unwrap();
    assert_equivalent(&proc, &split, &[Arg::Int(n as i64), buffer(n, 2.0), buffer(n, 0.0)]);
}

#[test]
fn test_cut_appends_remainder_loop() {
    let split = parse(SCALE).split("i", 4, ("io", "ii"), SplitTail::Cut).unwrap();
    let text = split.to_string();
    assert!(text.contains("for ii in par(0, n % 4):"), "{text}");
    assert!(!text.contains("if "), "{text}");
    assert_eq!(split.body().len(), 2);
}

#[test]
fn test_cut_and_guard_wraps_remainder() {
    let split = parse(SCALE).split("i", 4, ("io", "ii"), SplitTail::CutAndGuard).unwrap();
    assert!(split.to_string().contains("if n % 4 > 0:"), "{split}");
}

#[test]
fn test_cut_and_guard_literal_remainder() {
    let proc = parse("def ten(x: R[10]):\n    for i in par(0, 10):\n        x[i] += 1.0\n");
    let guarded = proc.split("i", 4, ("io", "ii"), SplitTail::CutAndGuard).unwrap();
    let text = guarded.to_string();
    assert!(text.contains("    for ii in par(0, 2):\n        x[8 + ii] += 1.0"), "{text}");
    assert!(!text.contains("if "), "{text}");
    assert_eq!(guarded, proc.split("i", 4, ("io", "ii"), SplitTail::Cut).unwrap());
    assert_equivalent(&proc, &guarded, &[buffer(10, 0.0)]);
}

#[test]
fn test_guard_rounds_up() {
    let split = parse(SCALE).split("i", 8, ("io", "ii"), SplitTail::Guard).unwrap();
    let text = split.to_string();
    assert!(text.contains("for io in par(0, (n + 7) / 8):"), "{text}");
    assert!(text.contains("if 8 * io + ii < n:"), "{text}");
}

#[test]
fn test_divisible_guard_has_no_condition() {
    let split = parse(SIMPLE_MATH).split("i", 8, ("io", "ii"), SplitTail::Guard).unwrap();
    assert!(Pattern::parse("if _: _").unwrap().stmt_sites(&split).unwrap().is_empty());
}

#[test]
fn test_split_default_tail_is_guard() {
    assert_eq!(SplitTail::default(), SplitTail::Guard);
    assert_eq!(SplitTail::CutAndGuard.to_string(), "cut_and_guard");
    assert_eq!("perfect".parse::<SplitTail>().unwrap(), SplitTail::Perfect);
}

#[test_case(0, ("io", "ii"), "factor must be positive"; "zero factor")]
#[test_case(4, ("io", "io"), "both be named io"; "same names")]
#[test_case(4, ("x", "ii"), "name x is already in use"; "parameter name")]
#[test_case(4, ("io", "i"), "name i is already in use"; "loop name")]
fn test_split_rejections(factor: i64, names: (&str, &str), message: &str) {
    let err = parse(SCALE).split("i", factor, names, SplitTail::Guard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformPrecondition, "{err}");
    assert!(err.to_string().contains(message), "{err}");
}

#[test]
fn test_split_unknown_loop() {
    let err = parse(SCALE).split("k", 4, ("ko", "ki"), SplitTail::Guard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PatternMatch, "{err}");
}
