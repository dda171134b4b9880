//! Inlining calls to ordinary procedures.

use std::collections::{BTreeSet, HashMap};

use kiln_ir::pattern::site::rewrite_stmt;
use kiln_ir::visit::{block_decls, rename_block};
use kiln_ir::{Block, Expr, Procedure, Stmt, Sym, Type, WindowDim};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

const NAME: &str = "inline_call";

/// Replace the selected call by the callee's body.
///
/// Control parameters are substituted by their argument expressions, numeric
/// scalars by the argument location and tensors by the argument buffer, with
/// window offsets added to every index. Callee locals clashing with names of
/// the caller are renamed.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), pattern = %pattern))]
pub fn inline_call(proc: &Procedure, pattern: &str) -> Result<Procedure> {
    let (site, stmt) = select_stmt(proc, pattern)?;
    let Stmt::Call { proc: callee, args } = &stmt else {
        return precondition(NAME, format!("expected a call, found: {}", stmt.summary()));
    };
    if callee.is_instr() {
        return precondition(NAME, format!("{} is an instruction and has no body to inline", callee.name()));
    }

    let mut taken = all_names(proc);
    taken.extend(callee.params().iter().map(|p| p.name.clone()));
    let mut renames = HashMap::new();
    for local in block_decls(callee.body()) {
        if taken.contains(&local) {
            let fresh = fresh_name(&local, &taken);
            tracing::trace!(%local, %fresh, "callee local renamed");
            renames.insert(local, fresh.clone());
            taken.insert(fresh);
        } else {
            taken.insert(local);
        }
    }
    let body = rename_block(callee.body(), &renames);

    let mut inliner = Inliner::default();
    for (param, arg) in callee.params().iter().zip(args) {
        match (&param.ty, arg) {
            (Type::Tensor(_), Expr::Read { name, idx }) if idx.is_empty() => {
                inliner.tensors.insert(param.name.clone(), TensorArg { buf: name.clone(), dims: None });
            }
            (Type::Tensor(_), Expr::Window { buf, dims }) => {
                inliner.tensors.insert(param.name.clone(), TensorArg { buf: buf.clone(), dims: Some(dims.clone()) });
            }
            (ty, Expr::Read { name, idx }) if ty.is_data() => {
                inliner.locations.insert(param.name.clone(), (name.clone(), idx.clone()));
            }
            (ty, arg) if !ty.is_data() => {
                inliner.scalars.insert(param.name.clone(), arg.clone());
            }
            (_, arg) => return precondition(NAME, format!("cannot bind {} to `{arg}`", param.name)),
        }
    }
    let inlined = inliner.block(&body);

    let body = rewrite_stmt(proc.body(), &site, |_| Ok(inlined)).context(IrSnafu)?;
    rebuild(proc, body, NAME)
}

fn fresh_name(base: &Sym, taken: &BTreeSet<Sym>) -> Sym {
    (1..)
        .map(|n| Sym::from(format!("{base}_{n}")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.clone())
}

/// Caller buffer standing in for a tensor parameter.
#[derive(Debug, Clone)]
struct TensorArg {
    buf: Sym,
    /// `None` when the whole buffer is passed.
    dims: Option<Vec<WindowDim>>,
}

fn offset(lo: &Expr, at: Expr) -> Expr {
    if lo.as_int() == Some(0) { at } else { lo.clone() + at }
}

impl TensorArg {
    fn index(&self, idx: Vec<Expr>) -> Vec<Expr> {
        let Some(dims) = &self.dims else { return idx };
        let mut idx = idx.into_iter();
        dims.iter()
            .map(|dim| match dim {
                WindowDim::Point(at) => at.clone(),
                WindowDim::Interval(lo, _) => offset(lo, idx.next().unwrap_or_else(|| Expr::int(0))),
            })
            .collect()
    }

    fn window(&self, inner: Vec<WindowDim>) -> Expr {
        let Some(dims) = &self.dims else {
            return Expr::Window { buf: self.buf.clone(), dims: inner };
        };
        let mut inner = inner.into_iter();
        let dims = dims
            .iter()
            .map(|dim| match dim {
                WindowDim::Point(_) => dim.clone(),
                WindowDim::Interval(lo, hi) => match inner.next() {
                    Some(WindowDim::Point(at)) => WindowDim::Point(offset(lo, at)),
                    Some(WindowDim::Interval(a, b)) => WindowDim::Interval(offset(lo, a), offset(lo, b)),
                    None => WindowDim::Interval(lo.clone(), hi.clone()),
                },
            })
            .collect();
        Expr::Window { buf: self.buf.clone(), dims }
    }

    fn whole(&self) -> Expr {
        match &self.dims {
            None => Expr::var(self.buf.clone()),
            Some(dims) => Expr::Window { buf: self.buf.clone(), dims: dims.clone() },
        }
    }

    fn source_dim(&self, dim: usize) -> usize {
        match &self.dims {
            None => dim,
            Some(dims) => dims
                .iter()
                .enumerate()
                .filter(|(_, d)| matches!(d, WindowDim::Interval(..)))
                .nth(dim)
                .map_or(dim, |(i, _)| i),
        }
    }
}

#[derive(Debug, Default)]
struct Inliner {
    scalars: HashMap<Sym, Expr>,
    locations: HashMap<Sym, (Sym, Vec<Expr>)>,
    tensors: HashMap<Sym, TensorArg>,
}

impl Inliner {
    fn block(&self, block: &Block) -> Block {
        block.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&self, stmt: &Stmt) -> Stmt {
        let stmt = stmt.map_exprs(&mut |e| self.expr(e)).map_blocks(&mut |b| self.block(b));
        match stmt {
            Stmt::Assign { name, idx, rhs } => {
                let (name, idx) = self.target(name, idx);
                Stmt::Assign { name, idx, rhs }
            }
            Stmt::Reduce { name, idx, rhs } => {
                let (name, idx) = self.target(name, idx);
                Stmt::Reduce { name, idx, rhs }
            }
            other => other,
        }
    }

    fn target(&self, name: Sym, idx: Vec<Expr>) -> (Sym, Vec<Expr>) {
        if let Some((buf, at)) = self.locations.get(&name) {
            return (buf.clone(), at.clone());
        }
        match self.tensors.get(&name) {
            Some(arg) => (arg.buf.clone(), arg.index(idx)),
            None => (name, idx),
        }
    }

    fn expr(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Read { name, idx } if idx.is_empty() && self.scalars.contains_key(name) => {
                self.scalars.get(name).cloned().unwrap_or_else(|| expr.clone())
            }
            Expr::Read { name, idx } if idx.is_empty() && self.locations.contains_key(name) => {
                match self.locations.get(name) {
                    Some((buf, at)) => Expr::read(buf.clone(), at.iter().cloned()),
                    None => expr.clone(),
                }
            }
            Expr::Read { name, idx } if self.tensors.contains_key(name) => match self.tensors.get(name) {
                Some(arg) if idx.is_empty() => arg.whole(),
                Some(arg) => Expr::read(arg.buf.clone(), arg.index(idx.iter().map(|e| self.expr(e)).collect())),
                None => expr.clone(),
            },
            Expr::Window { buf, dims } if self.tensors.contains_key(buf) => match self.tensors.get(buf) {
                Some(arg) => arg.window(dims.iter().map(|dim| self.dim(dim)).collect()),
                None => expr.clone(),
            },
            Expr::StrideOf { buf, dim } if self.tensors.contains_key(buf) => match self.tensors.get(buf) {
                Some(arg) => Expr::stride(arg.buf.clone(), arg.source_dim(*dim)),
                None => expr.clone(),
            },
            _ => expr.map_children(&mut |child| self.expr(child)),
        }
    }

    fn dim(&self, dim: &WindowDim) -> WindowDim {
        match dim {
            WindowDim::Point(at) => WindowDim::Point(self.expr(at)),
            WindowDim::Interval(lo, hi) => WindowDim::Interval(self.expr(lo), self.expr(hi)),
        }
    }
}
