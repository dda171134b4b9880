//! Leaf types shared by expressions, statements and procedures.

use std::fmt;
use std::sync::Arc;

use kiln_dtype::{DType, ScalarDType};

use crate::expr::Expr;

/// Interned-by-refcount identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct Sym(Arc<str>);

impl Sym {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sym {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Sym {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Sym> for Sym {
    fn from(value: &Sym) -> Self {
        value.clone()
    }
}

impl AsRef<str> for Sym {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

impl BinaryOp {
    /// Binding strength used by the printer and parser.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
}

/// Parallel loops promise independent iterations; sequential loops do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LoopKind {
    Par,
    Seq,
}

/// Literal values.
#[derive(Debug, Clone, Copy)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl std::hash::Hash for ConstValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
        }
    }
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Dense tensor or window type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub elem: ScalarDType,
    pub shape: Vec<Expr>,
    /// Window types describe strided views of someone else's buffer.
    pub window: bool,
}

impl TensorType {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Literal extent of every dimension, `None` where symbolic.
    pub fn literal_dims(&self) -> Vec<Option<i64>> {
        self.shape.iter().map(Expr::as_int).collect()
    }
}

/// Type of a parameter, allocation or config field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(DType),
    Tensor(TensorType),
}

impl Type {
    pub fn tensor(elem: ScalarDType, shape: impl IntoIterator<Item = Expr>) -> Self {
        Self::Tensor(TensorType { elem, shape: shape.into_iter().collect(), window: false })
    }

    pub fn window(elem: ScalarDType, shape: impl IntoIterator<Item = Expr>) -> Self {
        Self::Tensor(TensorType { elem, shape: shape.into_iter().collect(), window: true })
    }

    /// Element kind of numeric scalars and tensors.
    pub fn elem(&self) -> Option<ScalarDType> {
        match self {
            Self::Scalar(dtype) => dtype.scalar(),
            Self::Tensor(tensor) => Some(tensor.elem),
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Self::Tensor(tensor) => Some(tensor),
            Self::Scalar(_) => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor(_))
    }

    pub fn is_window(&self) -> bool {
        matches!(self, Self::Tensor(TensorType { window: true, .. }))
    }

    /// Size, index and stride values.
    pub fn is_indexable(&self) -> bool {
        matches!(self, Self::Scalar(dtype) if dtype.is_indexable())
    }

    /// Numeric scalar or tensor: something that lives in a memory space.
    pub fn is_data(&self) -> bool {
        self.elem().is_some()
    }

    pub fn rank(&self) -> usize {
        self.as_tensor().map_or(0, TensorType::rank)
    }
}

impl From<DType> for Type {
    fn from(value: DType) -> Self {
        Self::Scalar(value)
    }
}

impl From<ScalarDType> for Type {
    fn from(value: ScalarDType) -> Self {
        Self::Scalar(DType::Scalar(value))
    }
}
