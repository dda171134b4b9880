use test_case::test_case;

use crate::test::{LOADU, SGEMM, parse, parse_with};
use crate::*;

#[test_case("def f(n: index):\n    for i in par(0, n):\n        pass\n"; "index extent")]
#[test_case("def f(n: size):\n    for i in par(0, n - 1):\n        pass\n"; "size minus one")]
#[test_case("def f(n: size):\n    x: f32[n - 8]\n"; "allocation")]
#[test_case("def f(n: index, x: f32[n]):\n    pass\n"; "parameter dimension")]
#[test_case("def f(n: size, m: size):\n    for i in par(0, n / m):\n        pass\n"; "non-affine extent")]
fn test_unprovable_extents(source: &str) {
    let err = parse(source).unwrap_err();
    assert!(matches!(err, Error::Shape { .. } | Error::Type { .. }), "{err}");
}

#[test_case("def f(n: index):\n    assert n > 0\n    for i in par(0, n):\n        pass\n"; "asserted")]
#[test_case("def f(n: size):\n    for i in par(0, n):\n        for j in par(0, n - i - 1):\n            pass\n"; "triangular")]
#[test_case("def f(n: size):\n    if n >= 8:\n        x: f32[n - 8]\n"; "guarded by condition")]
#[test_case("def f(n: size):\n    if n < 8:\n        pass\n    else:\n        x: f32[n - 8]\n"; "negated condition")]
#[test_case("def f(n: size):\n    for i in par(0, (n + 7) / 8):\n        for j in par(0, n - 8 * i):\n            pass\n"; "ceiling blocks")]
fn test_provable_extents(source: &str) {
    parse(source).unwrap();
}

#[test]
fn test_call_extents_must_match() {
    let loadu = parse(LOADU).unwrap();
    let err = parse_with(
        "\
def f(x: f32[16]):
    v: f32[8] @ AVX2
    loadu(v, x[4:16])
",
        &[&loadu],
    )
    .unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
    assert!(err.to_string().contains("loadu(v, x[4:16])"), "{err}");
}

#[test]
fn test_callee_preconditions_are_proven() {
    let sgemm = parse(SGEMM).unwrap();
    let source = "\
def caller(k: size, A: f32[k, k], B: f32[k, k], C: f32[k, k]):
    sgemm(k, k, k, A, B, C)
";
    let err = parse_with(source, &[&sgemm]).unwrap_err();
    assert!(err.to_string().contains("cannot prove precondition"), "{err}");

    let guarded = "\
def caller(k: size, A: f32[k, k], B: f32[k, k], C: f32[k, k]):
    assert k > 0
    sgemm(k, k, k, A, B, C)
";
    parse_with(guarded, &[&sgemm]).unwrap();
}

#[test]
fn test_window_stride_preconditions() {
    let loadu = parse(LOADU).unwrap();
    // Column of a row-major matrix: stride(src, 0) is 8, not 1.
    let err = parse_with(
        "\
def f(x: f32[8, 8]):
    v: f32[8] @ AVX2
    loadu(v, x[0:8, 0])
",
        &[&loadu],
    )
    .unwrap_err();
    assert!(err.to_string().contains("stride(src, 0) == 1"), "{err}");
}

#[test]
fn test_proof_depth_is_configurable() {
    let source = "def f(n: size):\n    for i in par(0, n / 8):\n        pass\n";
    let def = parse(source).unwrap().to_def();
    let shallow = CheckConfig::builder().proof_depth(0).build();
    assert!(Procedure::from_def_with(def.clone(), &shallow).is_err());
    Procedure::from_def_with(def, &CheckConfig::default()).unwrap();
}
