//! Whole-procedure rewrites: specialisation, renaming and index
//! normalisation.

use std::collections::{BTreeSet, HashMap};

use kiln_ir::bounds::{Facts, Pred};
use kiln_ir::sint::Affine;
use kiln_ir::visit::{subst_block, walk_stmts};
use kiln_ir::{
    BinaryOp, Block, CheckConfig, ConstValue, DType, Expr, Param, Procedure, Stmt, Sym, Type, UnaryOp, WindowDim,
};

use crate::common::*;
use crate::error::*;

/// Fix the leading size and index parameters to the given values.
///
/// The parameters are removed from the signature. Assertions that become
/// provably true are dropped; one that becomes provably false is an error.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), values = ?values))]
pub fn partial_eval(proc: &Procedure, values: &[i64]) -> Result<Procedure> {
    const NAME: &str = "partial_eval";
    if values.len() > proc.params().len() {
        return precondition(NAME, format!("{} values given for {} parameters", values.len(), proc.params().len()));
    }
    let mut map = HashMap::new();
    for (param, &value) in proc.params().iter().zip(values) {
        if !param.ty.is_indexable() {
            return precondition(NAME, format!("{} is not a size or index parameter", param.name));
        }
        if matches!(param.ty, Type::Scalar(DType::Size)) && value < 0 {
            return precondition(NAME, format!("size {} cannot be {value}", param.name));
        }
        map.insert(param.name.clone(), Expr::int(value));
    }

    let mut def = proc.to_def();
    def.params = def.params[values.len()..]
        .iter()
        .map(|param| Param { ty: param.ty.map_exprs(&mut |e| e.subst(&map)), ..param.clone() })
        .collect();
    let facts = Facts::new(CheckConfig::from_env().proof_depth);
    let mut preds = Vec::new();
    for pred in &def.preds {
        let pred = pred.subst(&map);
        match Pred::from_expr(&pred, &mut |_, _| None) {
            Some(fact) if facts.prove(&fact) => tracing::trace!(%pred, "assertion discharged"),
            Some(fact) if facts.prove(&fact.clone().negate()) => {
                return precondition(NAME, format!("assertion {pred} does not hold for these values"));
            }
            _ => preds.push(pred),
        }
    }
    def.preds = preds;
    def.body = subst_block(&def.body, &map);
    rebuild_def(def, NAME)
}

/// Give the procedure a new name.
pub fn rename(proc: &Procedure, name: &str) -> Result<Procedure> {
    let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return precondition("rename", format!("`{name}` is not an identifier"));
    }
    let mut def = proc.to_def();
    def.name = Sym::from(name);
    rebuild_def(def, "rename")
}

/// Rewrite every index, extent and guard expression to its canonical affine
/// form.
#[tracing::instrument(skip_all, fields(proc = %proc.name()))]
pub fn simplify(proc: &Procedure) -> Result<Procedure> {
    let mut control: BTreeSet<Sym> =
        proc.params().iter().filter(|p| p.ty.is_indexable()).map(|p| p.name.clone()).collect();
    walk_stmts(proc.body(), &mut |stmt| {
        if let Stmt::For { iter, .. } = stmt {
            control.insert(iter.clone());
        }
    });
    let simplifier = Simplifier { control };

    let mut def = proc.to_def();
    def.params = def
        .params
        .iter()
        .map(|param| Param { ty: param.ty.map_exprs(&mut |e| simplifier.index(e)), ..param.clone() })
        .collect();
    def.preds = def.preds.iter().map(|pred| simplifier.cond(pred)).collect();
    def.body = simplifier.block(&def.body);
    rebuild_def(def, "simplify")
}

struct Simplifier {
    control: BTreeSet<Sym>,
}

impl Simplifier {
    fn is_control(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Read { name, idx } => idx.is_empty() && self.control.contains(name),
            Expr::Const(ConstValue::Int(_)) | Expr::StrideOf { .. } => true,
            Expr::Unary { op: UnaryOp::Neg, arg } => self.is_control(arg),
            Expr::Binary { op, lhs, rhs } if op.is_arithmetic() => self.is_control(lhs) && self.is_control(rhs),
            _ => false,
        }
    }

    /// Canonical form of an integer expression; other expressions only have
    /// their indices rewritten.
    fn index(&self, expr: &Expr) -> Expr {
        if self.is_control(expr)
            && let Some(affine) = Affine::from_expr(expr)
        {
            return affine.to_expr();
        }
        self.data(expr)
    }

    fn data(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Read { name, idx } => Expr::read(name.clone(), idx.iter().map(|e| self.index(e))),
            Expr::Window { buf, dims } => Expr::Window {
                buf: buf.clone(),
                dims: dims
                    .iter()
                    .map(|dim| match dim {
                        WindowDim::Point(at) => WindowDim::Point(self.index(at)),
                        WindowDim::Interval(lo, hi) => WindowDim::Interval(self.index(lo), self.index(hi)),
                    })
                    .collect(),
            },
            _ => expr.map_children(&mut |child| self.data(child)),
        }
    }

    fn cond(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => Expr::binary(*op, self.index(lhs), self.index(rhs)),
            Expr::Binary { op: op @ (BinaryOp::And | BinaryOp::Or), lhs, rhs } => {
                Expr::binary(*op, self.cond(lhs), self.cond(rhs))
            }
            _ => self.data(expr),
        }
    }

    fn block(&self, block: &Block) -> Block {
        block.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Assign { name, idx, rhs } => Stmt::Assign {
                name: name.clone(),
                idx: idx.iter().map(|e| self.index(e)).collect(),
                rhs: self.data(rhs),
            },
            Stmt::Reduce { name, idx, rhs } => Stmt::Reduce {
                name: name.clone(),
                idx: idx.iter().map(|e| self.index(e)).collect(),
                rhs: self.data(rhs),
            },
            Stmt::WriteConfig { config, field, rhs } => {
                Stmt::WriteConfig { config: config.clone(), field: field.clone(), rhs: self.index(rhs) }
            }
            Stmt::Pass => Stmt::Pass,
            Stmt::If { cond, body, orelse } => {
                Stmt::If { cond: self.cond(cond), body: self.block(body), orelse: self.block(orelse) }
            }
            Stmt::For { iter, hi, body, kind } => {
                Stmt::For { iter: iter.clone(), hi: self.index(hi), body: self.block(body), kind: *kind }
            }
            Stmt::Alloc { name, ty, mem } => {
                Stmt::Alloc { name: name.clone(), ty: ty.map_exprs(&mut |e| self.index(e)), mem: mem.clone() }
            }
            Stmt::Call { proc, args } => Stmt::Call {
                proc: proc.clone(),
                args: proc
                    .params()
                    .iter()
                    .zip(args)
                    .map(|(param, arg)| if param.ty.is_indexable() { self.index(arg) } else { self.data(arg) })
                    .collect(),
            },
        }
    }
}
