use test_case::test_case;

use crate::test::{parse, parse_with};
use crate::*;

#[test_case("\
def foo(x: f32):
    ConfigAB.a = 32.0
    x = ConfigAB.a
"; "write then read")]
#[test_case("\
def foo(n: size):
    for i in par(0, n):
        ConfigAB.a = 0.0
"; "same literal every iteration")]
#[test_case("\
def foo(n: size):
    a: f32
    for i in par(0, n):
        a = ConfigAB.a
"; "read of a field the loop never writes")]
#[test_case("\
def foo(n: size):
    a: f32
    for i in par(0, n):
        ConfigAB.a = 3.0
        a = ConfigAB.a
"; "read dominated by a write")]
#[test_case("\
def foo(n: size):
    for i in par(0, n):
        ConfigAB.a = 3.0
        ConfigAB.b = ConfigAB.a
"; "config copied between fields")]
#[test_case("\
def foo(n: size, A: i8[n]):
    a: i8
    a = 4.0
    for i in par(0, n):
        a = 0.0
        A[i] = a
"; "buffer writes are not config effects")]
#[test_case("\
def foo(n: size, A: f32[n]):
    for i in seq(0, n):
        ConfigAB.a = A[i]
"; "sequential loop")]
#[test_case("\
def foo(n: size, s: f32):
    a: f32
    for i in par(0, n):
        if n > 4:
            ConfigAB.a = 1.0
        else:
            ConfigAB.a = s
        a = ConfigAB.a
"; "both branches write")]
fn test_accepted(source: &str) {
    let proc = parse(source).unwrap();
    check_effects(&proc).unwrap();
}

fn race(source: &str) -> String {
    let err = parse(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigEffect, "{err}");
    let message = err.to_string();
    assert!(message.starts_with("data race conflict with statement"), "{message}");
    message
}

#[test]
fn test_write_from_iteration_data() {
    let message = race(
        "\
def foo(n: size, A: f32[n]):
    a: f32
    for i in par(0, n):
        a = A[i]
        ConfigAB.a = a
",
    );
    assert!(message.ends_with("ConfigAB.a = a"), "{message}");
}

#[test]
fn test_write_of_element_read() {
    race(
        "\
def foo(n: size, A: f32[n]):
    for i in par(0, n):
        ConfigAB.a = A[i]
",
    );
}

#[test]
fn test_read_before_write() {
    let message = race(
        "\
def foo(n: size):
    a: f32
    for i in par(0, n):
        a = ConfigAB.a
        ConfigAB.a = 3.0
",
    );
    assert!(message.ends_with("a = ConfigAB.a"), "{message}");
}

#[test]
fn test_write_under_iteration_dependent_branch() {
    race(
        "\
def foo(n: size):
    for i in par(0, n):
        if i == 0:
            ConfigAB.a = 1.0
",
    );
}

#[test]
fn test_one_branch_does_not_dominate() {
    race(
        "\
def foo(n: size):
    a: f32
    for i in par(0, n):
        if n > 4:
            ConfigAB.a = 1.0
        a = ConfigAB.a
",
    );
}

#[test]
fn test_nested_loop_write_does_not_dominate() {
    race(
        "\
def foo(n: size, m: size):
    a: f32
    for i in par(0, n):
        for j in seq(0, m):
            ConfigAB.a = 1.0
        a = ConfigAB.a
",
    );
}

#[test]
fn test_taint_flows_through_scalars() {
    race(
        "\
def foo(n: size, A: f32[n]):
    a: f32
    b: f32
    for i in par(0, n):
        a = A[i]
        b = a * 2.0
        ConfigAB.b = b
",
    );
}

fn set_a() -> Procedure {
    parse("def set_a(v: f32):\n    ConfigAB.a = v\n").unwrap()
}

#[test]
fn test_call_with_iteration_data() {
    let set_a = set_a();
    let err = parse_with(
        "\
def foo(n: size, A: f32[n]):
    for i in par(0, n):
        set_a(A[i])
",
        &[&set_a],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "data race conflict with statement ConfigAB.a = v");
}

#[test]
fn test_call_with_invariant_argument() {
    let set_a = set_a();
    let proc = parse_with(
        "\
def foo(n: size, s: f32):
    for i in par(0, n):
        set_a(s)
",
        &[&set_a],
    )
    .unwrap();
    check_effects(&proc).unwrap();
}

#[test_case("def foo():\n    assert ConfigAB.a == 0\n    pass\n"; "assertion")]
#[test_case("def foo(A: f32[8]):\n    for i in par(0, ConfigAB.a):\n        pass\n"; "loop extent")]
#[test_case("def foo(A: f32[8]):\n    if ConfigAB.a > 0:\n        pass\n"; "condition")]
#[test_case("def foo(A: f32[8]):\n    A[ConfigAB.a] = 1.0\n"; "index")]
#[test_case("def foo():\n    x: f32[ConfigAB.a]\n"; "allocation dimension")]
fn test_config_in_static_context(source: &str) {
    let err = parse(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigEffect);
    assert!(err.to_string().starts_with("expected 'index' or 'size'"), "{err}");
}
