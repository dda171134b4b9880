use std::collections::HashMap;

use proptest::prelude::*;

use crate::bounds::Facts;
use crate::sint::{Affine, floor_div, floor_mod};
use crate::*;

const VARS: [&str; 3] = ["n", "m", "i"];

fn index_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![proptest::sample::select(&VARS[..]).prop_map(Expr::var), (-6i64..12).prop_map(Expr::int)];
    leaf.prop_recursive(3, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a + b),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a - b),
            (inner.clone(), -3i64..4).prop_map(|(a, k)| a * Expr::int(k)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a * b),
            (inner.clone(), 1i64..6).prop_map(|(a, q)| a.floor_div(Expr::int(q))),
            (inner.clone(), 1i64..6).prop_map(|(a, q)| a.modulo(Expr::int(q))),
            inner.prop_map(Expr::neg),
        ]
    })
}

fn eval(expr: &Expr, env: &HashMap<Sym, i64>) -> i64 {
    match expr {
        Expr::Read { name, .. } => env[name],
        Expr::Const(ConstValue::Int(v)) => *v,
        Expr::Unary { arg, .. } => -eval(arg, env),
        Expr::Binary { op, lhs, rhs } => {
            let (a, b) = (eval(lhs, env), eval(rhs, env));
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => floor_div(a, b),
                BinaryOp::Mod => floor_mod(a, b),
                other => panic!("unexpected operator {other}"),
            }
        }
        other => panic!("unexpected expression {other}"),
    }
}

/// Points with `n, m ≥ 0` and `0 ≤ i < n`.
fn points() -> impl Iterator<Item = HashMap<Sym, i64>> {
    (0..6i64).flat_map(|n| {
        (0..6i64).flat_map(move |m| {
            (0..n).map(move |i| VARS.iter().map(|v| Sym::new(*v)).zip([n, m, i]).collect::<HashMap<_, _>>())
        })
    })
}

fn loop_facts() -> Facts {
    let mut facts = Facts::new(6);
    facts.declare_size(&Sym::new("n"));
    facts.declare_size(&Sym::new("m"));
    facts.bind_loop(&Sym::new("i"), &Affine::var("n"));
    facts
}

proptest! {
    #[test]
    fn normal_form_agrees_with_evaluation(expr in index_expr()) {
        let affine = Affine::from_expr(&expr).unwrap();
        for env in points() {
            let consts = env.iter().map(|(name, v)| (name.clone(), Affine::constant(*v))).collect();
            prop_assert_eq!(affine.subst(&consts).as_const(), Some(eval(&expr, &env)), "{} at {:?}", expr, env);
        }
    }

    #[test]
    fn proven_bounds_hold(expr in index_expr()) {
        let affine = Affine::from_expr(&expr).unwrap();
        if loop_facts().prove_nonneg(&affine) {
            for env in points() {
                prop_assert!(eval(&expr, &env) >= 0, "{} proven non-negative but is {} at {:?}", expr, eval(&expr, &env), env);
            }
        }
    }

    #[test]
    fn printed_expressions_reparse(expr in index_expr()) {
        let reparsed = parse_expr(&expr.to_string(), &ParseContext::new()).unwrap();
        prop_assert_eq!(Affine::from_expr(&reparsed), Affine::from_expr(&expr));
    }

    #[test]
    fn to_expr_is_stable(expr in index_expr()) {
        let affine = Affine::from_expr(&expr).unwrap();
        prop_assert_eq!(Affine::from_expr(&affine.to_expr()), Some(affine));
    }

    #[test]
    fn procedures_reparse_for_every_element_kind(elem in ScalarDType::generator(), scale in ScalarDType::float_generator()) {
        let source = format!(
            "def copy(n: size, k: {scale}, x: {elem}[n], y: {elem}[n] @ DRAM):\n    for i in par(0, n):\n        y[i] = x[i]\n"
        );
        let proc = parse_proc(&source, &ParseContext::new()).unwrap();
        let reparsed = parse_proc(&proc.to_string(), &ParseContext::new()).unwrap();
        prop_assert_eq!(&reparsed, &proc);
        prop_assert_eq!(reparsed.params()[2].ty.elem(), Some(elem));
    }
}
