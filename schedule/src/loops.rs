//! Loop interchange and full unrolling.

use std::collections::HashMap;

use kiln_ir::pattern::site::rewrite_stmt;
use kiln_ir::visit::{rename_block, subst_block};
use kiln_ir::{Expr, LoopKind, Procedure, Stmt, Sym};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

/// Swap the selected loop with the single loop nested directly inside it.
///
/// Both loops must be parallel, so every iteration order is allowed, and
/// the inner extent must not depend on the outer variable.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), selector = %selector))]
pub fn reorder(proc: &Procedure, selector: &str) -> Result<Procedure> {
    const NAME: &str = "reorder";
    let outer = select_loop(proc, selector)?;
    let [Stmt::For { iter, hi, body, kind }] = outer.body.as_slice() else {
        return precondition(NAME, format!("loop {} does not directly nest a single loop", outer.iter));
    };
    if outer.kind != LoopKind::Par || *kind != LoopKind::Par {
        return precondition(NAME, format!("{} and {iter} must both be parallel loops", outer.iter));
    }
    if hi.mentions(&outer.iter) {
        return precondition(NAME, format!("extent of {iter} depends on {}", outer.iter));
    }

    let swapped = Stmt::For {
        iter: iter.clone(),
        hi: hi.clone(),
        kind: *kind,
        body: vec![Stmt::For { iter: outer.iter.clone(), hi: outer.hi.clone(), kind: outer.kind, body: body.clone() }],
    };
    let body = rewrite_stmt(proc.body(), &outer.site, |_| Ok(vec![swapped])).context(IrSnafu)?;
    rebuild(proc, body, NAME)
}

/// Replace a loop of constant extent by one copy of its body per iteration.
///
/// Allocations made directly in the body are renamed `{name}_{k}` in copy
/// `k`.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), selector = %selector))]
pub fn unroll(proc: &Procedure, selector: &str) -> Result<Procedure> {
    const NAME: &str = "unroll";
    let target = select_loop(proc, selector)?;
    let scope = Scope::at(proc, &target.site);
    let Some(extent) = scope.affine(&target.hi).and_then(|hi| hi.as_const()) else {
        return precondition(NAME, format!("extent `{}` of loop {} is not a constant", target.hi, target.iter));
    };

    let decls: Vec<Sym> = target
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Alloc { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    let mut taken = all_names(proc);
    let mut copies = Vec::new();
    for k in 0..extent.max(0) {
        let mut renames = HashMap::new();
        for name in &decls {
            let fresh = Sym::from(format!("{name}_{k}"));
            if !taken.insert(fresh.clone()) {
                return precondition(NAME, format!("cannot rename {name} in copy {k}: {fresh} is already in use"));
            }
            renames.insert(name.clone(), fresh);
        }
        let copy = subst_block(&target.body, &HashMap::from([(target.iter.clone(), Expr::int(k))]));
        copies.extend(rename_block(&copy, &renames));
    }
    tracing::trace!(iter = %target.iter, copies = extent.max(0), "loop unrolled");

    let body = rewrite_stmt(proc.body(), &target.site, |_| Ok(copies)).context(IrSnafu)?;
    rebuild(proc, body, NAME)
}
