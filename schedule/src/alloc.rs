//! Allocation placement: hoisting allocations and growing them by a leading
//! dimension.

use std::collections::BTreeSet;

use kiln_ir::pattern::site::rewrite_block;
use kiln_ir::sint::Affine;
use kiln_ir::visit::{block_decls, block_names, walk_stmts};
use kiln_ir::{Block, Expr, Procedure, Stmt, Sym, TensorType, Type, WindowDim};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

// ============================================================================
// LIFT
// ============================================================================

/// Hoist an allocation out of `n_lifts` enclosing loops or conditionals.
///
/// Lifting out of a loop makes one buffer serve every iteration, so an
/// iteration may only read what it wrote itself.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), alloc = %selector, n_lifts = n_lifts))]
pub fn lift_alloc(proc: &Procedure, selector: &str, n_lifts: usize) -> Result<Procedure> {
    const NAME: &str = "lift_alloc";
    if n_lifts == 0 {
        return precondition(NAME, "n_lifts must be at least 1");
    }
    let (mut site, alloc) = select_alloc(proc, selector, NAME)?;
    let Stmt::Alloc { name, ty, .. } = &alloc else {
        return precondition(NAME, "expected an allocation");
    };
    let dims = ty.as_tensor().map(|t| t.shape.clone()).unwrap_or_default();
    let mut body = proc.body().clone();

    for _ in 0..n_lifts {
        let Some(parent) = site.parent() else {
            return precondition(NAME, format!("cannot lift {name} past the procedure body"));
        };
        match parent.get(&body).context(IrSnafu)? {
            Stmt::For { iter, body: inner, .. } => {
                if dims.iter().any(|d| d.mentions(iter)) {
                    return precondition(NAME, format!("extent of {name} depends on loop variable {iter}"));
                }
                if !overwritten_first(name, &dims, &inner[site.index + 1..]) {
                    return precondition(
                        NAME,
                        format!("{name} may be read before it is fully overwritten in an iteration of {iter}"),
                    );
                }
            }
            Stmt::If { .. } => {}
            other => return precondition(NAME, format!("cannot lift out of: {}", other.summary())),
        }
        let destination = parent.block(&body).cloned().unwrap_or_default();
        let clash = destination
            .iter()
            .enumerate()
            .any(|(i, stmt)| i != parent.index && block_decls(std::slice::from_ref(stmt)).contains(name));
        if clash {
            return precondition(NAME, format!("{name} is already declared where it would be lifted"));
        }

        let index = site.index;
        body = rewrite_block(&body, &site.path, |block| {
            let mut block = block.clone();
            block.remove(index);
            Ok(block)
        })
        .context(IrSnafu)?;
        body = rewrite_block(&body, &parent.path, |block| {
            let mut block = block.clone();
            block.insert(parent.index, alloc.clone());
            Ok(block)
        })
        .context(IrSnafu)?;
        site = parent;
    }
    rebuild(proc, body, NAME)
}

fn mentions(stmt: &Stmt, name: &Sym) -> bool {
    block_names(std::slice::from_ref(stmt)).contains(name)
}

/// Every read of `name` in an iteration must see a value written earlier in
/// that iteration: either by a loop nest overwriting the whole buffer, or by
/// a top-level assignment at exactly the same indices.
fn overwritten_first(name: &Sym, dims: &[Expr], rest: &[Stmt]) -> bool {
    let mut written: Vec<Vec<Expr>> = Vec::new();
    for stmt in rest.iter().filter(|stmt| mentions(stmt, name)) {
        if covers(stmt, name, dims, &mut Vec::new()) {
            return true;
        }
        if !reads_written(stmt, name, &mut written) {
            return false;
        }
    }
    true
}

/// Whether every read of `name` in `stmt` hits an index list in `written`.
/// A top-level assignment to `name` is recorded afterwards.
fn reads_written(stmt: &Stmt, name: &Sym, written: &mut Vec<Vec<Expr>>) -> bool {
    let seen = reads_of(stmt, name).iter().all(|idx| idx.as_ref().is_some_and(|idx| written.contains(idx)));
    if seen
        && let Stmt::Assign { name: target, idx, .. } = stmt
        && target == name
    {
        written.push(idx.clone());
    }
    seen
}

/// Index lists at which `stmt` reads `name`; `None` for whole-buffer uses.
fn reads_of(stmt: &Stmt, name: &Sym) -> Vec<Option<Vec<Expr>>> {
    fn expr_reads(expr: &Expr, name: &Sym, out: &mut Vec<Option<Vec<Expr>>>) {
        match expr {
            Expr::Read { name: read, idx } if read == name => out.push(Some(idx.clone())),
            Expr::Window { buf, .. } if buf == name => out.push(None),
            _ => {}
        }
        for child in expr.children() {
            expr_reads(child, name, out);
        }
    }

    let mut out = Vec::new();
    walk_stmts(std::slice::from_ref(stmt), &mut |s| {
        if let Stmt::Reduce { name: target, idx, .. } = s
            && target == name
        {
            out.push(Some(idx.clone()));
        }
        for expr in s.exprs() {
            expr_reads(expr, name, &mut out);
        }
    });
    out
}

fn covers(stmt: &Stmt, name: &Sym, dims: &[Expr], loops: &mut Vec<(Sym, Expr)>) -> bool {
    match stmt {
        Stmt::Assign { name: target, idx, rhs } if target == name => {
            if rhs.mentions(name) || idx.len() != dims.len() {
                return false;
            }
            let mut seen = BTreeSet::new();
            idx.iter().zip(dims).all(|(index, dim)| {
                let Some(var) = index.as_var() else { return false };
                let Some((_, hi)) = loops.iter().find(|(iter, _)| iter == var) else { return false };
                let same_extent = match (Affine::from_expr(hi), Affine::from_expr(dim)) {
                    (Some(hi), Some(dim)) => hi == dim,
                    _ => false,
                };
                same_extent && seen.insert(var.clone())
            })
        }
        Stmt::For { iter, hi, body, .. } => {
            loops.push((iter.clone(), hi.clone()));
            let mut users = body.iter().filter(|s| mentions(s, name));
            let covered = match users.next() {
                Some(first) if covers(first, name, dims, loops) => {
                    let mut written = match first {
                        Stmt::Assign { idx, .. } => vec![idx.clone()],
                        _ => Vec::new(),
                    };
                    users.all(|s| reads_written(s, name, &mut written))
                }
                _ => false,
            };
            loops.pop();
            covered
        }
        _ => false,
    }
}

// ============================================================================
// EXPAND
// ============================================================================

/// Give an allocation a new leading dimension of extent `size`; every access
/// after it selects the slice at `index`.
///
/// `index` must provably lie in `[0, size)` where the allocation is made.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), alloc = %selector, size = %size, index = %index))]
pub fn expand_dim(proc: &Procedure, selector: &str, size: &str, index: &str) -> Result<Procedure> {
    const NAME: &str = "expand_dim";
    let (site, alloc) = select_alloc(proc, selector, NAME)?;
    let Stmt::Alloc { name, ty, mem } = alloc else {
        return precondition(NAME, "expected an allocation");
    };
    let (size, index) = (parse_index(size)?, parse_index(index)?);
    let scope = Scope::at(proc, &site);
    if let Some(unknown) = size.names().union(&index.names()).find(|n| !scope.env.contains(n)) {
        return precondition(NAME, format!("{unknown} is not in scope at the allocation of {name}"));
    }
    let (Some(size_a), Some(index_a)) = (scope.affine(&size), scope.affine(&index)) else {
        return precondition(NAME, "size and index must be affine index expressions");
    };
    if !(scope.facts.prove_nonneg(&index_a) && scope.facts.prove_lt(&index_a, &size_a)) {
        return precondition(NAME, format!("cannot prove 0 <= {index} < {size}"));
    }

    let old_shape = ty.as_tensor().map(|t| t.shape.clone()).unwrap_or_default();
    let new_ty = match &ty {
        Type::Tensor(tensor) => {
            let mut shape = vec![size.clone()];
            shape.extend(tensor.shape.iter().cloned());
            Type::Tensor(TensorType { shape, ..tensor.clone() })
        }
        Type::Scalar(_) => match ty.elem() {
            Some(elem) => Type::tensor(elem, [size.clone()]),
            None => return precondition(NAME, format!("{name} is not a data allocation")),
        },
    };
    let expansion = Expansion { name: name.clone(), index, old_shape };
    let at = site.index;
    let body = rewrite_block(proc.body(), &site.path, |block| {
        let mut out = block[..at].to_vec();
        out.push(Stmt::Alloc { name: name.clone(), ty: new_ty.clone(), mem: mem.clone() });
        out.extend(expansion.block(&block[at + 1..]));
        Ok(out)
    })
    .context(IrSnafu)?;
    rebuild(proc, body, NAME)
}

struct Expansion {
    name: Sym,
    index: Expr,
    old_shape: Vec<Expr>,
}

impl Expansion {
    fn block(&self, block: &[Stmt]) -> Block {
        block
            .iter()
            .map(|stmt| {
                let stmt = stmt.map_exprs(&mut |e| self.expr(e)).map_blocks(&mut |b| self.block(b));
                match stmt {
                    Stmt::Assign { name, idx, rhs } if name == self.name => {
                        Stmt::Assign { name, idx: self.prefixed(idx), rhs }
                    }
                    Stmt::Reduce { name, idx, rhs } if name == self.name => {
                        Stmt::Reduce { name, idx: self.prefixed(idx), rhs }
                    }
                    other => other,
                }
            })
            .collect()
    }

    fn prefixed(&self, idx: Vec<Expr>) -> Vec<Expr> {
        std::iter::once(self.index.clone()).chain(idx).collect()
    }

    fn expr(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Read { name, idx } if name == &self.name && idx.is_empty() && !self.old_shape.is_empty() => {
                let dims = std::iter::once(WindowDim::Point(self.index.clone()))
                    .chain(self.old_shape.iter().map(|extent| WindowDim::Interval(Expr::int(0), extent.clone())))
                    .collect();
                Expr::Window { buf: name.clone(), dims }
            }
            Expr::Read { name, idx } if name == &self.name => {
                Expr::Read { name: name.clone(), idx: self.prefixed(idx.iter().map(|e| self.expr(e)).collect()) }
            }
            Expr::Window { buf, .. } if buf == &self.name => match expr.map_children(&mut |c| self.expr(c)) {
                Expr::Window { buf, dims } => {
                    let dims = std::iter::once(WindowDim::Point(self.index.clone())).chain(dims).collect();
                    Expr::Window { buf, dims }
                }
                other => other,
            },
            Expr::StrideOf { buf, dim } if buf == &self.name => Expr::stride(buf.clone(), dim + 1),
            _ => expr.map_children(&mut |c| self.expr(c)),
        }
    }
}
