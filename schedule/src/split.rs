//! Loop splitting.

use std::collections::HashMap;

use kiln_ir::pattern::site::rewrite_stmt;
use kiln_ir::sint::Affine;
use kiln_ir::visit::subst_block;
use kiln_ir::{Block, Expr, Procedure, Stmt, Sym};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

/// How `split` handles iterations past the last full block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::VariantArray)]
#[strum(serialize_all = "snake_case")]
pub enum SplitTail {
    /// The extent must be provably divisible by the factor.
    Perfect,
    /// Leftover iterations run in a remainder loop after the nest.
    Cut,
    /// Like [`SplitTail::Cut`], with the remainder loop under `if N % f > 0`.
    /// A literal remainder is known to be positive, so it gets no `if` and
    /// the result matches `Cut`.
    CutAndGuard,
    /// Outer extent rounded up; the body runs under `f*o + i < N`.
    #[default]
    Guard,
}

/// Split `for i in K(0, N)` into an outer loop over blocks of `factor`
/// iterations and an inner loop over one block, substituting
/// `i = factor*outer + inner`.
#[tracing::instrument(
    skip_all,
    fields(proc = %proc.name(), selector = %selector, factor = factor, tail = %tail)
)]
pub fn split(proc: &Procedure, selector: &str, factor: i64, names: (&str, &str), tail: SplitTail) -> Result<Procedure> {
    const NAME: &str = "split";
    if factor <= 0 {
        return precondition(NAME, format!("factor must be positive, got {factor}"));
    }
    let target = select_loop(proc, selector)?;
    let (outer, inner) = (Sym::from(names.0), Sym::from(names.1));
    if outer == inner {
        return precondition(NAME, format!("outer and inner loops cannot both be named {outer}"));
    }
    ensure_fresh(proc, NAME, &outer)?;
    ensure_fresh(proc, NAME, &inner)?;

    let scope = Scope::at(proc, &target.site);
    let Some(extent) = scope.affine(&target.hi) else {
        return precondition(NAME, format!("extent {} is not an affine size expression", target.hi));
    };
    let divisible = scope.facts.prove_eq(&extent.modulo(factor), &Affine::constant(0));
    let kind = target.kind;
    let iter_at = |index: Expr| -> Block { subst_block(&target.body, &HashMap::from([(target.iter.clone(), index)])) };
    let nest = |outer_hi: Expr, body: Block| Stmt::For {
        iter: outer.clone(),
        hi: outer_hi,
        body: vec![Stmt::For { iter: inner.clone(), hi: Expr::int(factor), body, kind }],
        kind,
    };
    let blocked = Expr::int(factor) * Expr::var(outer.clone()) + Expr::var(inner.clone());

    let replacement = match tail {
        SplitTail::Perfect => {
            if !divisible {
                return precondition(NAME, format!("cannot prove {} is divisible by {factor}", target.hi));
            }
            vec![nest(extent.floor_div(factor).to_expr(), iter_at(blocked))]
        }
        SplitTail::Cut | SplitTail::CutAndGuard => {
            let mut out = vec![nest(extent.floor_div(factor).to_expr(), iter_at(blocked))];
            if !divisible {
                let remainder = extent.modulo(factor).to_expr();
                let base = extent.floor_div(factor).scale(factor).to_expr();
                let leftover = Stmt::For {
                    iter: inner.clone(),
                    hi: remainder.clone(),
                    body: iter_at(base + Expr::var(inner.clone())),
                    kind,
                };
                out.push(match tail {
                    SplitTail::CutAndGuard if remainder.as_int().is_none() => {
                        Stmt::if_then(remainder.gt(Expr::int(0)), vec![leftover])
                    }
                    _ => leftover,
                });
            }
            out
        }
        SplitTail::Guard if divisible => vec![nest(extent.floor_div(factor).to_expr(), iter_at(blocked))],
        SplitTail::Guard => {
            let blocks = extent.add_const(factor - 1).floor_div(factor).to_expr();
            let guarded = Stmt::if_then(blocked.clone().lt(target.hi.clone()), iter_at(blocked));
            vec![nest(blocks, vec![guarded])]
        }
    };

    let body = rewrite_stmt(proc.body(), &target.site, |_| Ok(replacement)).context(IrSnafu)?;
    rebuild(proc, body, NAME)
}
