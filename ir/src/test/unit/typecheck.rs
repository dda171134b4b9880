use test_case::test_case;

use crate::test::{SGEMM, parse, parse_with};
use crate::*;

#[test_case("def f(n: size, x: f32[n]):\n    y[0] = 1.0\n"; "unknown buffer")]
#[test_case("def f(n: size, x: f32[n]):\n    x[0] = z\n"; "unknown scalar")]
#[test_case("def f(n: size):\n    for i in par(0, n):\n        pass\n    q = i\n"; "loop variable out of scope")]
fn test_unknown_names(source: &str) {
    let err = parse(source).unwrap_err();
    assert!(matches!(err, Error::UnknownName { .. } | Error::Syntax { .. }), "{err}");
}

#[test_case("def f(n: size, x: f32[n, n]):\n    x[0] = 1.0\n"; "rank mismatch")]
#[test_case("def f(n: size, x: f32[n]):\n    x[0.5] = 1.0\n"; "float index")]
#[test_case("def f(n: size, x: f32[n]):\n    n = 1\n"; "assign to size")]
#[test_case("def f(n: size, x: f32[n]):\n    for i in par(0, n):\n        i = 1\n"; "assign to loop variable")]
#[test_case("def f(n: size, x: f32[n]):\n    if x[0]:\n        pass\n"; "non-boolean condition")]
#[test_case("def f(n: size, x: f32[n]):\n    x[0] = x[1] % 2.0\n"; "modulo on data")]
#[test_case("def f(n: size, m: size, x: f32[n]):\n    x[n / m] = 1.0\n"; "symbolic divisor")]
#[test_case("def f(n: size, x: f32[n]):\n    if x[0] < 1.0:\n        pass\n"; "comparison on data")]
#[test_case("def f(n: size, x: f32[n]):\n    y: size\n"; "allocating a control value")]
#[test_case("def f(n: size @ DRAM):\n    pass\n"; "control parameter in memory")]
#[test_case("def f(n: size):\n    assert n\n    pass\n"; "non-boolean assertion")]
#[test_case("def f(n: size, x: f32[n]):\n    ConfigAB.a = n < 1\n"; "config field type")]
fn test_type_errors(source: &str) {
    let err = parse(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type, "{err}");
}

#[test]
fn test_redefinition() {
    let err = parse("def f(n: size):\n    for n in par(0, 4):\n        pass\n").unwrap_err();
    assert!(matches!(err, Error::Redefined { ref name, .. } if name == "n"), "{err}");
    let err = parse("def f(n: size, n: index):\n    pass\n").unwrap_err();
    assert!(matches!(err, Error::Redefined { .. }), "{err}");
}

#[test]
fn test_call_argument_types() {
    let sgemm = parse(SGEMM).unwrap();
    let ok = "\
def caller(A: f32[4, 4], B: f32[4, 4], C: f32[4, 4]):
    sgemm(4, 4, 4, A, B, C)
";
    parse_with(ok, &[&sgemm]).unwrap();

    let wrong_rank = "\
def caller(A: f32[16], B: f32[4, 4], C: f32[4, 4]):
    sgemm(4, 4, 4, A, B, C)
";
    assert_eq!(parse_with(wrong_rank, &[&sgemm]).unwrap_err().kind(), ErrorKind::Type);

    let window_to_dense = "\
def caller(A: f32[8, 8], B: f32[4, 4], C: f32[4, 4]):
    sgemm(4, 4, 4, A[0:4, 0:4], B, C)
";
    assert_eq!(parse_with(window_to_dense, &[&sgemm]).unwrap_err().kind(), ErrorKind::Type);

    let arity = "\
def caller(A: f32[4, 4], B: f32[4, 4], C: f32[4, 4]):
    sgemm(4, 4, A, B, C)
";
    assert_eq!(parse_with(arity, &[&sgemm]).unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn test_mixed_precision_arithmetic() {
    parse("def f(x: f32[4], y: i8[4], z: R[4]):\n    x[0] = y[0] * 2.0 + z[1]\n").unwrap();
}
