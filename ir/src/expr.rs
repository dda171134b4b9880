//! Expressions.

use std::sync::Arc;

use crate::config::ConfigDecl;
use crate::types::{BinaryOp, ConstValue, Sym, UnaryOp};

/// One dimension of a window expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowDim {
    /// Fixed coordinate; the dimension is dropped from the view.
    Point(Expr),
    /// Half-open range `lo:hi`; the dimension is kept with extent `hi - lo`.
    Interval(Expr, Expr),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Variable or buffer element. Scalars are read with no indices.
    Read { name: Sym, idx: Vec<Expr> },
    Const(ConstValue),
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `stride(buf, dim)`.
    StrideOf { buf: Sym, dim: usize },
    /// `Config.field`.
    ReadConfig { config: Arc<ConfigDecl>, field: Sym },
    /// Strided view of a buffer, only valid as a call argument.
    Window { buf: Sym, dims: Vec<WindowDim> },
}

impl Expr {
    pub fn var(name: impl Into<Sym>) -> Self {
        Self::Read { name: name.into(), idx: Vec::new() }
    }

    pub fn read(name: impl Into<Sym>, idx: impl IntoIterator<Item = Expr>) -> Self {
        Self::Read { name: name.into(), idx: idx.into_iter().collect() }
    }

    pub fn int(value: i64) -> Self {
        Self::Const(ConstValue::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::Const(ConstValue::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Const(ConstValue::Bool(value))
    }

    pub fn stride(buf: impl Into<Sym>, dim: usize) -> Self {
        Self::StrideOf { buf: buf.into(), dim }
    }

    pub fn config(config: &Arc<ConfigDecl>, field: impl Into<Sym>) -> Self {
        Self::ReadConfig { config: Arc::clone(config), field: field.into() }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// Negation; literal operands are folded.
    pub fn neg(arg: Expr) -> Self {
        match arg {
            Self::Const(ConstValue::Int(v)) => Self::int(-v),
            Self::Const(ConstValue::Float(v)) => Self::float(-v),
            other => Self::Unary { op: UnaryOp::Neg, arg: Box::new(other) },
        }
    }

    pub fn floor_div(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    pub fn modulo(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mod, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::And, self, rhs)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Const(value) => value.as_int(),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<ConstValue> {
        match self {
            Self::Const(value) => Some(*value),
            _ => None,
        }
    }

    /// Name of a scalar variable read (`Read` without indices).
    pub fn as_var(&self) -> Option<&Sym> {
        match self {
            Self::Read { name, idx } if idx.is_empty() => Some(name),
            _ => None,
        }
    }

    pub fn is_window(&self) -> bool {
        matches!(self, Self::Window { .. })
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}
