//! Loop fission.

use std::collections::BTreeSet;

use itertools::Itertools;
use kiln_ir::pattern::Branch;
use kiln_ir::pattern::site::rewrite_stmt;
use kiln_ir::sint::{Affine, Atom};
use kiln_ir::visit::{
    block_config_reads, block_config_writes, block_decls, block_names, block_reads, block_writes, walk_stmts,
};
use kiln_ir::{Expr, Procedure, Stmt, Sym};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

const NAME: &str = "fission_after";

/// Cut the enclosing statements right after the matched statement.
///
/// Each lift splits one enclosing loop (or `if` without an else branch) into
/// two copies, the first holding everything up to and including the cut, the
/// second the rest. Levels where nothing follows the cut are left as they
/// are and the cut moves up past them.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), pattern = %pattern, n_lifts = n_lifts))]
pub fn fission_after(proc: &Procedure, pattern: &str, n_lifts: usize) -> Result<Procedure> {
    if n_lifts == 0 {
        return precondition(NAME, "n_lifts must be at least 1");
    }
    let (mut site, _) = select_stmt(proc, pattern)?;
    let mut body = proc.body().clone();
    let mut cuts = 0;
    for _ in 0..n_lifts {
        let Some(parent) = site.parent() else {
            return precondition(NAME, "ran out of enclosing loops to split");
        };
        let branch = site.path.last().map(|&(_, branch)| branch);
        let enclosing = parent.get(&body).context(IrSnafu)?.clone();
        let replacement = match &enclosing {
            Stmt::For { iter, hi, body: inner, kind } => {
                let (before, after) = inner.split_at(site.index + 1);
                if after.is_empty() {
                    vec![enclosing.clone()]
                } else {
                    check_allocations(before, after)?;
                    check_buffers(iter, before, after)?;
                    check_config(before, after)?;
                    cuts += 1;
                    vec![
                        Stmt::For { iter: iter.clone(), hi: hi.clone(), body: before.to_vec(), kind: *kind },
                        Stmt::For { iter: iter.clone(), hi: hi.clone(), body: after.to_vec(), kind: *kind },
                    ]
                }
            }
            Stmt::If { cond, body: inner, orelse } => {
                if branch == Some(Branch::Orelse) || !orelse.is_empty() {
                    let message = format!("cannot split a conditional with an else branch: {}", enclosing.summary());
                    return precondition(NAME, message);
                }
                let (before, after) = inner.split_at(site.index + 1);
                if after.is_empty() {
                    vec![enclosing.clone()]
                } else {
                    check_allocations(before, after)?;
                    cuts += 1;
                    vec![Stmt::if_then(cond.clone(), before.to_vec()), Stmt::if_then(cond.clone(), after.to_vec())]
                }
            }
            other => return precondition(NAME, format!("cannot split through: {}", other.summary())),
        };
        body = rewrite_stmt(&body, &parent, |_| Ok(replacement)).context(IrSnafu)?;
        site = parent;
    }
    if cuts == 0 {
        return precondition(NAME, "nothing follows the statement in its enclosing loops");
    }
    tracing::trace!(cuts, "fission cuts made");
    rebuild(proc, body, NAME)
}

/// Allocations made before the cut die with the first copy.
fn check_allocations(before: &[Stmt], after: &[Stmt]) -> Result<()> {
    let used_after = block_names(after);
    for stmt in before {
        if let Stmt::Alloc { name, .. } = stmt
            && used_after.contains(name)
        {
            return precondition(NAME, format!("allocation {name} is used after the cut"));
        }
    }
    Ok(())
}

/// Every buffer written on one side and touched on the other must be
/// accessed at a single index list that is injective in the split loop, so
/// that no iteration reads or overwrites another iteration's element.
fn check_buffers(iter: &Sym, before: &[Stmt], after: &[Stmt]) -> Result<()> {
    let touched = |block: &[Stmt]| -> BTreeSet<Sym> {
        block_reads(block).union(&block_writes(block)).cloned().collect()
    };
    let (writes_before, writes_after) = (block_writes(before), block_writes(after));
    let shared: BTreeSet<Sym> = writes_before
        .intersection(&touched(after))
        .chain(writes_after.intersection(&touched(before)))
        .cloned()
        .collect();
    let locals: BTreeSet<Sym> = block_decls(before).union(&block_decls(after)).cloned().collect();
    for name in shared {
        let mut accesses = Vec::new();
        collect_accesses(before, &name, &mut accesses);
        collect_accesses(after, &name, &mut accesses);
        let distinct = accesses.iter().unique().collect_vec();
        let ok = match distinct.as_slice() {
            [Some(idx)] => idx.iter().any(|e| injective_in(e, iter, &locals)),
            _ => false,
        };
        if !ok {
            return precondition(
                NAME,
                format!("{name} is shared across the cut without a single index injective in {iter}"),
            );
        }
    }
    Ok(())
}

/// `c * iter + rest` with `c != 0`, where `rest` mentions neither `iter` nor
/// anything declared inside the loop.
fn injective_in(index: &Expr, iter: &Sym, locals: &BTreeSet<Sym>) -> bool {
    let Some(affine) = Affine::from_expr(index) else { return false };
    let var = Atom::Var(iter.clone());
    let rest = affine.without(&var).vars();
    affine.coeff(&var) != 0 && !rest.contains(iter) && rest.is_disjoint(locals)
}

/// Index lists used to access `name`; `None` for whole-buffer and window uses.
fn collect_accesses(block: &[Stmt], name: &Sym, out: &mut Vec<Option<Vec<Expr>>>) {
    walk_stmts(block, &mut |stmt| {
        if let Stmt::Assign { name: target, idx, .. } | Stmt::Reduce { name: target, idx, .. } = stmt
            && target == name
        {
            out.push(Some(idx.clone()));
        }
        for expr in stmt.exprs() {
            expr_accesses(expr, name, out);
        }
    });
}

fn expr_accesses(expr: &Expr, name: &Sym, out: &mut Vec<Option<Vec<Expr>>>) {
    match expr {
        Expr::Read { name: read, idx } if read == name => out.push(Some(idx.clone())),
        Expr::Window { buf, .. } if buf == name => out.push(None),
        _ => {}
    }
    for child in expr.children() {
        expr_accesses(child, name, out);
    }
}

fn check_config(before: &[Stmt], after: &[Stmt]) -> Result<()> {
    let (writes_before, reads_before) = (block_config_writes(before), block_config_reads(before));
    let (writes_after, reads_after) = (block_config_writes(after), block_config_reads(after));
    let conflict = writes_before
        .iter()
        .find(|field| reads_after.contains(field) || writes_after.contains(field))
        .or_else(|| reads_before.iter().find(|field| writes_after.contains(field)));
    match conflict {
        Some(field) => precondition(NAME, format!("config field {field} carries state across the cut")),
        None => Ok(()),
    }
}
