//! Shape checking: non-negative extents and call compatibility.

use std::collections::HashMap;

use snafu::ensure;

use super::{BindingKind, CheckConfig, Env, entry_facts};
use crate::bounds::{Facts, Pred};
use crate::error::*;
use crate::expr::{Expr, WindowDim};
use crate::procedure::{ProcDef, Procedure};
use crate::sint::{Affine, Atom};
use crate::stmt::{Block, Stmt};
use crate::types::{Sym, Type};

/// One dimension kept by a call argument's view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDim {
    /// Dimension of the underlying buffer.
    pub source: usize,
    pub extent: Affine,
}

/// A buffer argument seen through its window.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgView {
    pub buf: Sym,
    /// Start offset in every dimension of the underlying buffer.
    pub offsets: Vec<Affine>,
    pub dims: Vec<ViewDim>,
}

impl ArgView {
    /// View of a bare buffer or window argument; `None` for scalars.
    pub fn of(env: &Env, arg: &Expr) -> Option<ArgView> {
        match arg {
            Expr::Read { name, idx } if idx.is_empty() => {
                let tensor = env.tensor(name)?;
                let dims = tensor
                    .shape
                    .iter()
                    .enumerate()
                    .map(|(source, extent)| Some(ViewDim { source, extent: env.affine(extent)? }))
                    .collect::<Option<Vec<_>>>()?;
                Some(ArgView { buf: name.clone(), offsets: vec![Affine::constant(0); tensor.rank()], dims })
            }
            Expr::Window { buf, dims: window } => {
                let mut offsets = Vec::with_capacity(window.len());
                let mut dims = Vec::new();
                for (source, dim) in window.iter().enumerate() {
                    match dim {
                        WindowDim::Point(pt) => offsets.push(env.affine(pt)?),
                        WindowDim::Interval(lo, hi) => {
                            let lo = env.affine(lo)?;
                            let extent = env.affine(hi)?.sub(&lo);
                            offsets.push(lo);
                            dims.push(ViewDim { source, extent });
                        }
                    }
                }
                Some(ArgView { buf: buf.clone(), offsets, dims })
            }
            _ => None,
        }
    }

    /// Stride of kept dimension `dim`, in the caller's terms.
    pub fn stride(&self, env: &Env, dim: usize) -> Option<Affine> {
        let source = self.dims.get(dim)?.source;
        Some(env.stride(&self.buf, source).unwrap_or_else(|| Affine::atom(Atom::Stride(self.buf.clone(), source))))
    }
}

/// Substitution from a callee's parameters to a call site's values.
pub struct CallBinding {
    vars: HashMap<Sym, Affine>,
    strides: HashMap<(Sym, usize), Affine>,
}

impl CallBinding {
    pub fn new(env: &Env, callee: &Procedure, args: &[Expr]) -> Self {
        let mut vars = HashMap::new();
        let mut strides = HashMap::new();
        for (param, arg) in callee.params().iter().zip(args) {
            if param.ty.is_indexable() {
                if let Some(value) = env.affine(arg) {
                    vars.insert(param.name.clone(), value);
                }
            } else if param.ty.is_tensor()
                && let Some(view) = ArgView::of(env, arg)
            {
                for dim in 0..view.dims.len() {
                    if let Some(stride) = view.stride(env, dim) {
                        strides.insert((param.name.clone(), dim), stride);
                    }
                }
            }
        }
        Self { vars, strides }
    }

    pub fn apply(&self, value: &Affine) -> Affine {
        value.rewrite(&mut |atom| self.lookup(atom))
    }

    pub fn apply_pred(&self, pred: &Pred) -> Pred {
        pred.rewrite(&mut |atom| self.lookup(atom))
    }

    fn lookup(&self, atom: &Atom) -> Option<Affine> {
        match atom {
            Atom::Var(name) => self.vars.get(name).cloned(),
            Atom::Stride(buf, dim) => self.strides.get(&(buf.clone(), *dim)).cloned(),
            _ => None,
        }
    }
}

struct ShapeChecker {
    facts: Facts,
    env: Env,
}

fn fail<T>(stmt: &Stmt, message: String) -> Result<T> {
    ShapeSnafu { stmt: stmt.summary(), message }.fail()
}

impl ShapeChecker {
    fn extent(&self, stmt: &Stmt, expr: &Expr, what: &str) -> Result<Affine> {
        let Some(value) = self.env.affine(expr) else {
            return fail(stmt, format!("{what} {expr} is not an affine size expression"));
        };
        if !self.facts.prove_nonneg(&value) {
            return fail(stmt, format!("{what} {expr} is not provably non-negative"));
        }
        Ok(value)
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in block {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn nested(&self, facts: Facts, env: Env, block: &Block) -> Result<()> {
        ShapeChecker { facts, env }.block(block)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::For { iter, hi, body, .. } => {
                let hi = self.extent(stmt, hi, &format!("extent of loop {iter}"))?;
                let mut facts = self.facts.clone();
                facts.bind_loop(iter, &hi);
                let mut env = self.env.clone();
                env.bind_loop(iter);
                self.nested(facts, env, body)
            }
            Stmt::If { cond, body, orelse } => {
                let pred = self.env.pred(cond);
                let mut then_facts = self.facts.clone();
                let mut else_facts = self.facts.clone();
                if let Some(pred) = pred {
                    then_facts.assume(&pred);
                    else_facts.assume(&pred.negate());
                }
                self.nested(then_facts, self.env.clone(), body)?;
                self.nested(else_facts, self.env.clone(), orelse)
            }
            Stmt::Alloc { name, ty, mem } => {
                if let Type::Tensor(tensor) = ty {
                    for (dim, extent) in tensor.shape.iter().enumerate() {
                        self.extent(stmt, extent, &format!("dimension {dim} of {name}"))?;
                    }
                }
                self.env.bind(name.clone(), ty.clone(), mem.clone(), BindingKind::Alloc);
                Ok(())
            }
            Stmt::Call { proc, args } => self.call(stmt, proc, args),
            Stmt::Assign { .. } | Stmt::Reduce { .. } | Stmt::WriteConfig { .. } | Stmt::Pass => Ok(()),
        }
    }

    fn call(&self, stmt: &Stmt, callee: &Procedure, args: &[Expr]) -> Result<()> {
        let binding = CallBinding::new(&self.env, callee, args);
        for (param, arg) in callee.params().iter().zip(args) {
            let Type::Tensor(expected) = &param.ty else { continue };
            let Some(view) = ArgView::of(&self.env, arg) else {
                return fail(stmt, format!("cannot determine the shape of argument {arg}"));
            };
            for (dim, (actual, wanted)) in view.dims.iter().zip(&expected.shape).enumerate() {
                let Some(wanted) = Affine::from_expr(wanted) else {
                    return fail(stmt, format!("parameter '{}' has a non-affine dimension {wanted}", param.name));
                };
                let wanted = binding.apply(&wanted);
                if !self.facts.prove_eq(&actual.extent, &wanted) {
                    return fail(
                        stmt,
                        format!("argument {arg} has extent {} in dimension {dim}, expected {wanted}", actual.extent),
                    );
                }
            }
        }
        for pred in callee.preds() {
            let Some(translated) = Pred::from_expr(pred, &mut |_, _| None) else {
                return fail(stmt, format!("precondition {pred} of {} is not an index predicate", callee.name()));
            };
            if !self.facts.prove(&binding.apply_pred(&translated)) {
                return fail(stmt, format!("cannot prove precondition {pred} of {}", callee.name()));
            }
        }
        Ok(())
    }
}

/// Prove every extent non-negative and every call well-shaped.
pub fn check_shapes(def: &ProcDef, config: &CheckConfig) -> Result<()> {
    let env = Env::for_params(def);
    let facts = entry_facts(def, &env, config);
    let header = format!("def {}", def.name);
    for param in &def.params {
        let Type::Tensor(tensor) = &param.ty else { continue };
        for extent in &tensor.shape {
            let proven = env.affine(extent).is_some_and(|value| facts.prove_nonneg(&value));
            ensure!(
                proven,
                ShapeSnafu {
                    stmt: header.as_str(),
                    message: format!("dimension {extent} of '{}' is not provably non-negative", param.name),
                }
            );
        }
    }
    ShapeChecker { facts, env }.block(&def.body)
}
