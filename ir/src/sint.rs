//! Symbolic integers in affine normal form.
//!
//! Size and index expressions are normalised to `Σ cᵢ·aᵢ + c` over atoms:
//! variables, symbolic strides, and the non-linear leftovers (`⌊e/q⌋`,
//! `e mod q`, products of non-constant terms). Division and modulo are floor
//! operations by positive literals.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::expr::Expr;
use crate::types::{BinaryOp, ConstValue, Sym, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Div(Box<Affine>, i64),
    Mod(Box<Affine>, i64),
    Mul(Box<Affine>, Box<Affine>),
    Var(Sym),
    Stride(Sym, usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Affine {
    terms: BTreeMap<Atom, i64>,
    constant: i64,
}

pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

pub fn floor_mod(a: i64, b: i64) -> i64 {
    a - b * floor_div(a, b)
}

impl Affine {
    pub fn constant(value: i64) -> Self {
        Self { terms: BTreeMap::new(), constant: value }
    }

    pub fn var(name: impl Into<Sym>) -> Self {
        Self::atom(Atom::Var(name.into()))
    }

    pub fn atom(atom: Atom) -> Self {
        Self { terms: BTreeMap::from([(atom, 1)]), constant: 0 }
    }

    pub fn as_const(&self) -> Option<i64> {
        self.terms.is_empty().then_some(self.constant)
    }

    pub fn constant_term(&self) -> i64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Atom, i64)> {
        self.terms.iter().map(|(atom, coef)| (atom, *coef))
    }

    pub fn coeff(&self, atom: &Atom) -> i64 {
        self.terms.get(atom).copied().unwrap_or(0)
    }

    fn add_term(&mut self, atom: Atom, coef: i64) {
        let updated = self.coeff(&atom) + coef;
        if updated == 0 {
            self.terms.remove(&atom);
        } else {
            self.terms.insert(atom, updated);
        }
    }

    pub fn add(&self, other: &Affine) -> Affine {
        let mut out = self.clone();
        for (atom, coef) in &other.terms {
            out.add_term(atom.clone(), *coef);
        }
        out.constant += other.constant;
        out
    }

    pub fn sub(&self, other: &Affine) -> Affine {
        self.add(&other.scale(-1))
    }

    pub fn add_const(&self, value: i64) -> Affine {
        let mut out = self.clone();
        out.constant += value;
        out
    }

    pub fn scale(&self, k: i64) -> Affine {
        if k == 0 {
            return Affine::constant(0);
        }
        Affine {
            terms: self.terms.iter().map(|(atom, coef)| (atom.clone(), coef * k)).collect(),
            constant: self.constant * k,
        }
    }

    /// `self` without the `atom` term.
    pub fn without(&self, atom: &Atom) -> Affine {
        let mut out = self.clone();
        out.terms.remove(atom);
        out
    }

    pub fn mul(&self, other: &Affine) -> Affine {
        match (self.as_const(), other.as_const()) {
            (Some(k), _) => other.scale(k),
            (_, Some(k)) => self.scale(k),
            _ => {
                let (lo, hi) = if self <= other { (self, other) } else { (other, self) };
                Affine::atom(Atom::Mul(Box::new(lo.clone()), Box::new(hi.clone())))
            }
        }
    }

    /// Split into the part whose coefficients are multiples of `q` (divided
    /// by `q`) and the remainder, with the remainder constant in `[0, q)`.
    fn split_multiple(&self, q: i64) -> (Affine, Affine) {
        let mut quotient = Affine::constant(floor_div(self.constant, q));
        let mut remainder = Affine::constant(floor_mod(self.constant, q));
        for (atom, coef) in &self.terms {
            if coef % q == 0 {
                quotient.add_term(atom.clone(), coef / q);
            } else {
                remainder.add_term(atom.clone(), *coef);
            }
        }
        (quotient, remainder)
    }

    /// `⌊self / q⌋` for a positive literal `q`.
    pub fn floor_div(&self, q: i64) -> Affine {
        debug_assert!(q > 0);
        if q == 1 {
            return self.clone();
        }
        let (quotient, remainder) = self.split_multiple(q);
        if remainder.terms.is_empty() {
            return quotient;
        }
        if remainder.constant == 0
            && remainder.terms.len() == 1
            && let Some((Atom::Div(inner, p), 1)) = remainder.terms.iter().next().map(|(a, c)| (a, *c))
        {
            return quotient.add(&inner.floor_div(p * q));
        }
        quotient.add(&Affine::atom(Atom::Div(Box::new(remainder), q)))
    }

    /// `self mod q` for a positive literal `q`, in `[0, q)`.
    pub fn modulo(&self, q: i64) -> Affine {
        debug_assert!(q > 0);
        if q == 1 {
            return Affine::constant(0);
        }
        let (_, remainder) = self.split_multiple(q);
        if remainder.terms.is_empty() {
            return remainder;
        }
        Affine::atom(Atom::Mod(Box::new(remainder), q))
    }

    /// Normalise an integer expression. Returns `None` for anything that is
    /// not an integer expression over scalars and strides.
    pub fn from_expr(expr: &Expr) -> Option<Affine> {
        Self::from_expr_with(expr, &mut |_, _| None)
    }

    /// Like [`Affine::from_expr`], resolving `stride(buf, dim)` through
    /// `stride` and falling back to a symbolic stride atom.
    pub fn from_expr_with(expr: &Expr, stride: &mut impl FnMut(&Sym, usize) -> Option<Affine>) -> Option<Affine> {
        Some(match expr {
            Expr::Read { name, idx } if idx.is_empty() => Affine::var(name.clone()),
            Expr::Const(ConstValue::Int(v)) => Affine::constant(*v),
            Expr::Unary { op: UnaryOp::Neg, arg } => Self::from_expr_with(arg, stride)?.scale(-1),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = Self::from_expr_with(lhs, stride)?;
                let rhs = Self::from_expr_with(rhs, stride)?;
                match op {
                    BinaryOp::Add => lhs.add(&rhs),
                    BinaryOp::Sub => lhs.sub(&rhs),
                    BinaryOp::Mul => lhs.mul(&rhs),
                    BinaryOp::Div => lhs.floor_div(rhs.as_const().filter(|q| *q > 0)?),
                    BinaryOp::Mod => lhs.modulo(rhs.as_const().filter(|q| *q > 0)?),
                    _ => return None,
                }
            }
            Expr::StrideOf { buf, dim } => {
                stride(buf, *dim).unwrap_or_else(|| Affine::atom(Atom::Stride(buf.clone(), *dim)))
            }
            _ => return None,
        })
    }

    /// Canonical expression: larger coefficients first, constant last.
    pub fn to_expr(&self) -> Expr {
        let mut terms: Vec<(&Atom, i64)> = self.terms().collect();
        terms.sort_by(|(a, ca), (b, cb)| cb.abs().cmp(&ca.abs()).then_with(|| a.cmp(b)));
        let mut out: Option<Expr> = None;
        for (atom, coef) in terms {
            let base = atom.to_expr();
            let term = if coef.abs() == 1 { base } else { Expr::int(coef.abs()) * base };
            out = Some(match out {
                None if coef < 0 => Expr::neg(term),
                None => term,
                Some(acc) if coef < 0 => acc - term,
                Some(acc) => acc + term,
            });
        }
        match out {
            None => Expr::int(self.constant),
            Some(acc) if self.constant > 0 => acc + Expr::int(self.constant),
            Some(acc) if self.constant < 0 => acc - Expr::int(-self.constant),
            Some(acc) => acc,
        }
    }

    /// Variables mentioned anywhere, including inside non-linear atoms.
    pub fn vars(&self) -> BTreeSet<Sym> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<Sym>) {
        for atom in self.terms.keys() {
            match atom {
                Atom::Var(name) => {
                    out.insert(name.clone());
                }
                Atom::Stride(..) => {}
                Atom::Div(inner, _) | Atom::Mod(inner, _) => inner.collect_vars(out),
                Atom::Mul(a, b) => {
                    a.collect_vars(out);
                    b.collect_vars(out);
                }
            }
        }
    }

    pub fn depends_on(&self, name: &Sym) -> bool {
        self.vars().contains(name)
    }

    /// Substitute variables and renormalise.
    pub fn subst(&self, map: &HashMap<Sym, Affine>) -> Affine {
        self.rewrite(&mut |atom| match atom {
            Atom::Var(name) => map.get(name).cloned(),
            _ => None,
        })
    }

    /// Simultaneously replace atoms for which `f` returns a value, descending
    /// into compound atoms otherwise, and renormalise.
    pub fn rewrite(&self, f: &mut impl FnMut(&Atom) -> Option<Affine>) -> Affine {
        let mut out = Affine::constant(self.constant);
        for (atom, coef) in &self.terms {
            out = out.add(&atom.rewrite(f).scale(*coef));
        }
        out
    }
}

impl Atom {
    pub fn to_expr(&self) -> Expr {
        match self {
            Atom::Var(name) => Expr::var(name.clone()),
            Atom::Stride(buf, dim) => Expr::stride(buf.clone(), *dim),
            Atom::Div(inner, q) => inner.to_expr().floor_div(Expr::int(*q)),
            Atom::Mod(inner, q) => inner.to_expr().modulo(Expr::int(*q)),
            Atom::Mul(a, b) => a.to_expr() * b.to_expr(),
        }
    }

    fn rewrite(&self, f: &mut impl FnMut(&Atom) -> Option<Affine>) -> Affine {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Atom::Var(_) | Atom::Stride(..) => Affine::atom(self.clone()),
            Atom::Div(inner, q) => inner.rewrite(f).floor_div(*q),
            Atom::Mod(inner, q) => inner.rewrite(f).modulo(*q),
            Atom::Mul(a, b) => a.rewrite(f).mul(&b.rewrite(f)),
        }
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

impl From<i64> for Affine {
    fn from(value: i64) -> Self {
        Affine::constant(value)
    }
}
