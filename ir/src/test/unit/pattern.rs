use test_case::test_case;

use crate::pattern::{Branch, ExprSite, StmtSite};
use crate::test::{LOADU, parse, parse_with};
use crate::*;

const BODY: &str = "\
def f(n: size, x: f32[n], y: f32[n], z: f32[n]):
    for i in par(0, n):
        z[i] = x[i] * y[i]
    for i in seq(0, n):
        if i < 4:
            z[i] += x[i]
        else:
            pass
    tmp: f32[n]
    ConfigAB.a = 1.0
";

fn body() -> Procedure {
    parse(BODY).unwrap()
}

fn calls() -> Procedure {
    let loadu = parse(LOADU).unwrap();
    let source = "\
def g(x: f32[16]):
    v: f32[8] @ AVX2
    loadu(v, x[0:8])
    loadu(v, x[8:16])
";
    parse_with(source, &[&loadu]).unwrap()
}

#[test_case("for i in _: _", 2; "any loop over i")]
#[test_case("for i in par(0, n): _", 1; "parallel loop")]
#[test_case("for i in seq(0, _): _", 1; "sequential loop")]
#[test_case("for _ in _: _", 2; "any loop")]
#[test_case("z[_] = _", 1; "assignment")]
#[test_case("z[_] += _", 1; "reduction")]
#[test_case("z[i] = x[i] * _", 1; "assignment with right-hand side")]
#[test_case("_ = _", 1; "any assignment")]
#[test_case("if i < 4: _", 1; "condition")]
#[test_case("if _: _", 1; "any condition")]
#[test_case("pass", 1; "pass")]
#[test_case("tmp : _", 1; "allocation")]
#[test_case("ConfigAB.a = _", 1; "config write")]
#[test_case("ConfigAB._ = 1.0", 1; "any config field")]
fn test_statement_patterns(pattern: &str, count: usize) {
    let sites = Pattern::parse(pattern).unwrap().stmt_sites(&body()).unwrap();
    assert_eq!(sites.len(), count, "{pattern}");
}

#[test_case("x[_]", 2; "reads of a buffer")]
#[test_case("x[_] * y[_]", 1; "product")]
#[test_case("_ * _", 1; "any product")]
#[test_case("i", 6; "iteration variable")]
#[test_case("i < 4", 1; "comparison")]
#[test_case("1.0", 1; "constant")]
#[test_case("stride(x, 0)", 0; "stride")]
fn test_expression_patterns(pattern: &str, count: usize) {
    let sites = Pattern::parse(pattern).unwrap().expr_sites(&body()).unwrap();
    assert_eq!(sites.len(), count, "{pattern}");
}

#[test_case("loadu(_)", 2; "any arguments")]
#[test_case("loadu(_, _)", 2; "two holes")]
#[test_case("loadu(v, x[0:8])", 2; "window of buffer")]
#[test_case("loadu(_, x)", 0; "bare buffer does not match a window")]
#[test_case("_(_)", 2; "any callee")]
#[test_case("storeu(_)", 0; "other callee")]
#[test_case("v : _", 1; "register allocation")]
fn test_call_patterns(pattern: &str, count: usize) {
    let sites = Pattern::parse(pattern).unwrap().stmt_sites(&calls()).unwrap();
    assert_eq!(sites.len(), count, "{pattern}");
}

#[test]
fn test_expression_sites_are_preorder() {
    let proc = body();
    let sites = Pattern::parse("x[_]").unwrap().expr_sites(&proc).unwrap();
    assert_eq!(
        sites,
        vec![
            ExprSite { stmt: StmtSite::root(0).child(Branch::Body, 0), slot: 1, path: vec![0] },
            ExprSite { stmt: StmtSite::root(1).child(Branch::Body, 0).child(Branch::Body, 0), slot: 1, path: vec![] },
        ]
    );
    for site in &sites {
        assert_eq!(site.get(proc.body()).unwrap().to_string(), "x[i]");
    }
}

#[test]
fn test_statement_sites_are_preorder() {
    let proc = body();
    let sites = Pattern::parse("_ = _").unwrap().stmt_sites(&proc).unwrap();
    assert_eq!(sites, vec![StmtSite::root(0).child(Branch::Body, 0)]);

    let any_loop_or_if: Vec<_> = ["for _ in _: _", "if _: _", "pass"]
        .iter()
        .flat_map(|p| Pattern::parse(p).unwrap().stmt_sites(&proc).unwrap())
        .collect();
    let pass = StmtSite::root(1).child(Branch::Body, 0).child(Branch::Orelse, 0);
    assert_eq!(any_loop_or_if[3], pass);
    assert_eq!(pass.get(proc.body()).unwrap(), &Stmt::Pass);
    assert_eq!(pass.ancestors(proc.body()).len(), 2);
    assert!(pass.is_inside(&StmtSite::root(1)));
    assert!(!pass.is_inside(&StmtSite::root(0)));
}

#[test]
fn test_ordinals() {
    let proc = body();
    let second = Pattern::parse("for i in _: _ #1").unwrap();
    assert_eq!(second.ordinal(), Some(1));
    assert_eq!(second.select_stmt(&proc).unwrap(), StmtSite::root(1));
    assert_eq!(Pattern::parse("for i in _: _").unwrap().select_stmt(&proc).unwrap(), StmtSite::root(0));

    let err = Pattern::parse("for i in _: _ #2").unwrap().select_stmt(&proc).unwrap_err();
    assert!(matches!(err, Error::BadOrdinal { count: 2, ordinal: 2, .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::PatternMatch);
}

#[test]
fn test_no_match() {
    let err = Pattern::parse("for j in _: _").unwrap().select_stmt(&body()).unwrap_err();
    assert_eq!(err.to_string(), "pattern 'for j in _: _' did not match anything");
    assert_eq!(err.kind(), ErrorKind::PatternMatch);

    let err = Pattern::parse("y[_] * x[_]").unwrap().select_expr(&body()).unwrap_err();
    assert!(matches!(err, Error::NoMatch { .. }), "{err}");
}

#[test]
fn test_loop_selectors() {
    let proc = body();
    assert_eq!(Pattern::for_loop("i #1").unwrap().select_stmt(&proc).unwrap(), StmtSite::root(1));
    assert_eq!(Pattern::for_loop("i").unwrap().select_stmt(&proc).unwrap(), StmtSite::root(0));
    assert_eq!(Pattern::for_loop("for i in seq(0, n): _").unwrap().select_stmt(&proc).unwrap(), StmtSite::root(1));

    let err = Pattern::for_loop("z[_] = _").unwrap_err();
    assert!(matches!(err, Error::InvalidPattern { .. }), "{err}");
}

#[test]
fn test_pattern_kind_must_fit() {
    let proc = body();
    assert!(Pattern::parse("i").unwrap().stmt_sites(&proc).is_err());
    assert!(Pattern::parse("pass").unwrap().expr_sites(&proc).is_err());
}

#[test_case("for i in"; "truncated loop")]
#[test_case("pass pass"; "trailing tokens")]
#[test_case("x +"; "truncated expression")]
#[test_case("for i in range(0, n): _"; "unknown loop kind")]
#[test_case("x[_] * 2 = _"; "bad assignment target")]
fn test_invalid_patterns(pattern: &str) {
    let err = Pattern::parse(pattern).unwrap_err();
    assert!(matches!(err, Error::InvalidPattern { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::PatternMatch);
}

#[test]
fn test_display_and_from_str() {
    let pattern: Pattern = "  x[_] = _ #0 ".parse().unwrap();
    assert_eq!(pattern.to_string(), "x[_] = _ #0");
    assert_eq!(pattern.ordinal(), Some(0));
    assert!(pattern.is_stmt());
}
