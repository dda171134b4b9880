//! Facts about size and index values, and a bounded prover over them.
//!
//! Facts are affine inequalities `e ≥ 0` gathered from asserts, size
//! parameters, enclosing loop ranges and enclosing `if` conditions. To prove
//! `e ≥ 0` the prover first looks for a fact differing from `e` by a
//! non-negative constant, then eliminates one atom of `e` by substituting one
//! of its bounds and recurses, up to a fixed depth.

use std::collections::HashMap;

use crate::expr::Expr;
use crate::sint::{Affine, Atom};
use crate::types::{BinaryOp, ConstValue, Sym};

/// Predicate over affine values.
#[derive(Debug, Clone, PartialEq)]
pub enum Pred {
    True,
    False,
    /// `e ≥ 0`
    NonNeg(Affine),
    /// `e = 0`
    Zero(Affine),
    /// `e ≠ 0`
    NonZero(Affine),
    And(Vec<Pred>),
    Or(Vec<Pred>),
}

impl Pred {
    /// Translate a boolean expression. `None` when some operand is not an
    /// integer expression.
    pub fn from_expr(expr: &Expr, stride: &mut impl FnMut(&Sym, usize) -> Option<Affine>) -> Option<Pred> {
        match expr {
            Expr::Const(ConstValue::Bool(true)) => Some(Pred::True),
            Expr::Const(ConstValue::Bool(false)) => Some(Pred::False),
            Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
                Some(Pred::And(vec![Self::from_expr(lhs, stride)?, Self::from_expr(rhs, stride)?]))
            }
            Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
                Some(Pred::Or(vec![Self::from_expr(lhs, stride)?, Self::from_expr(rhs, stride)?]))
            }
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
                let a = Affine::from_expr_with(lhs, stride)?;
                let b = Affine::from_expr_with(rhs, stride)?;
                Some(match op {
                    BinaryOp::Lt => Pred::NonNeg(b.sub(&a).add_const(-1)),
                    BinaryOp::Le => Pred::NonNeg(b.sub(&a)),
                    BinaryOp::Gt => Pred::NonNeg(a.sub(&b).add_const(-1)),
                    BinaryOp::Ge => Pred::NonNeg(a.sub(&b)),
                    BinaryOp::Eq => Pred::Zero(a.sub(&b)),
                    _ => Pred::NonZero(a.sub(&b)),
                })
            }
            _ => None,
        }
    }

    /// Apply [`Affine::rewrite`] to every operand.
    pub fn rewrite(&self, f: &mut impl FnMut(&Atom) -> Option<Affine>) -> Pred {
        match self {
            Pred::True => Pred::True,
            Pred::False => Pred::False,
            Pred::NonNeg(e) => Pred::NonNeg(e.rewrite(f)),
            Pred::Zero(e) => Pred::Zero(e.rewrite(f)),
            Pred::NonZero(e) => Pred::NonZero(e.rewrite(f)),
            Pred::And(parts) => Pred::And(parts.iter().map(|p| p.rewrite(f)).collect()),
            Pred::Or(parts) => Pred::Or(parts.iter().map(|p| p.rewrite(f)).collect()),
        }
    }

    pub fn negate(self) -> Pred {
        match self {
            Pred::True => Pred::False,
            Pred::False => Pred::True,
            Pred::NonNeg(e) => Pred::NonNeg(e.scale(-1).add_const(-1)),
            Pred::Zero(e) => Pred::NonZero(e),
            Pred::NonZero(e) => Pred::Zero(e),
            Pred::And(parts) => Pred::Or(parts.into_iter().map(Pred::negate).collect()),
            Pred::Or(parts) => Pred::And(parts.into_iter().map(Pred::negate).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Facts {
    nonneg: Vec<Affine>,
    rank: HashMap<Sym, usize>,
    depth: usize,
}

impl Facts {
    pub fn new(depth: usize) -> Self {
        Self { nonneg: Vec::new(), rank: HashMap::new(), depth }
    }

    /// Record a name in introduction order; later names are eliminated first.
    pub fn declare(&mut self, name: &Sym) {
        let next = self.rank.len() + 1;
        self.rank.entry(name.clone()).or_insert(next);
    }

    /// A size value: declared and non-negative.
    pub fn declare_size(&mut self, name: &Sym) {
        self.declare(name);
        self.assume_nonneg(Affine::var(name.clone()));
    }

    /// Loop variable ranging over `0 ≤ iter < hi`.
    pub fn bind_loop(&mut self, iter: &Sym, hi: &Affine) {
        self.declare(iter);
        let var = Affine::var(iter.clone());
        self.assume_nonneg(var.clone());
        self.assume_nonneg(hi.sub(&var).add_const(-1));
    }

    pub fn assume_nonneg(&mut self, fact: Affine) {
        if fact.as_const().is_none() && !self.nonneg.contains(&fact) {
            self.nonneg.push(fact);
        }
    }

    /// Add what a predicate implies. Disjunctions and disequalities add nothing.
    pub fn assume(&mut self, pred: &Pred) {
        match pred {
            Pred::NonNeg(e) => self.assume_nonneg(e.clone()),
            Pred::Zero(e) => {
                self.assume_nonneg(e.clone());
                self.assume_nonneg(e.scale(-1));
            }
            Pred::And(parts) => parts.iter().for_each(|p| self.assume(p)),
            Pred::True | Pred::False | Pred::NonZero(_) | Pred::Or(_) => {}
        }
    }

    pub fn prove(&self, pred: &Pred) -> bool {
        match pred {
            Pred::True => true,
            Pred::False => false,
            Pred::NonNeg(e) => self.prove_nonneg(e),
            Pred::Zero(e) => self.prove_nonneg(e) && self.prove_nonneg(&e.scale(-1)),
            Pred::NonZero(e) => {
                self.prove_nonneg(&e.add_const(-1)) || self.prove_nonneg(&e.scale(-1).add_const(-1))
            }
            Pred::And(parts) => parts.iter().all(|p| self.prove(p)),
            Pred::Or(parts) => parts.iter().any(|p| self.prove(p)),
        }
    }

    pub fn prove_nonneg(&self, e: &Affine) -> bool {
        let proven = self.nonneg_at(e, self.depth);
        tracing::trace!(expr = %e, proven, "non-negativity query");
        proven
    }

    pub fn prove_eq(&self, a: &Affine, b: &Affine) -> bool {
        self.prove(&Pred::Zero(a.sub(b)))
    }

    pub fn prove_lt(&self, a: &Affine, b: &Affine) -> bool {
        self.prove_nonneg(&b.sub(a).add_const(-1))
    }

    fn nonneg_at(&self, e: &Affine, depth: usize) -> bool {
        if let Some(value) = e.as_const() {
            return value >= 0;
        }
        let direct = self.nonneg.iter().any(|fact| e.sub(fact).as_const().is_some_and(|slack| slack >= 0));
        if direct {
            return true;
        }
        if depth == 0 {
            return false;
        }
        for (atom, coef) in self.elimination_order(e) {
            let candidates = self.lower_bounds(e, &atom, coef, depth);
            if candidates.is_empty() {
                continue;
            }
            return candidates.iter().any(|candidate| self.nonneg_at(candidate, depth - 1));
        }
        false
    }

    /// Compound atoms first, then variables from the most recently declared.
    fn elimination_order(&self, e: &Affine) -> Vec<(Atom, i64)> {
        let mut atoms: Vec<(Atom, i64)> = e.terms().map(|(a, c)| (a.clone(), c)).collect();
        atoms.sort_by_key(|(atom, _)| match atom {
            Atom::Div(..) | Atom::Mod(..) | Atom::Mul(..) => (0, 0),
            Atom::Var(name) => (1, usize::MAX - self.rank.get(name).copied().unwrap_or(0)),
            Atom::Stride(..) => (2, 0),
        });
        atoms
    }

    /// Expressions `e'` with `e' ≥ 0 ⟹ e ≥ 0`, obtained by replacing
    /// `coef·atom` with a lower bound (scaling `e` by a positive factor where
    /// needed).
    fn lower_bounds(&self, e: &Affine, atom: &Atom, coef: i64, depth: usize) -> Vec<Affine> {
        let rest = e.without(atom);
        let mut out = Vec::new();
        match atom {
            Atom::Div(num, q) => {
                if coef > 0 && self.nonneg_at(num, depth - 1) {
                    out.push(rest.clone());
                }
                // q·⌊n/q⌋ ∈ [n - q + 1, n]
                let bound = if coef > 0 { num.add_const(1 - q) } else { (**num).clone() };
                out.push(rest.scale(*q).add(&bound.scale(coef)));
            }
            Atom::Mod(_, q) => {
                let bound = if coef > 0 { 0 } else { q - 1 };
                out.push(rest.add_const(coef * bound));
            }
            Atom::Var(_) | Atom::Stride(..) | Atom::Mul(..) => {}
        }
        for fact in &self.nonneg {
            let k = fact.coeff(atom);
            if k == 0 || k.signum() != coef.signum() {
                continue;
            }
            let remainder = fact.without(atom);
            out.push(rest.scale(k.abs()).sub(&remainder.scale(coef.abs())));
        }
        out
    }
}
