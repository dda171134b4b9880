//! Element kinds and control types for the kiln kernel IR.
//!
//! Kernels distinguish two families of scalar values:
//!
//! - **Data** values ([`ScalarDType`]) live in buffers and registers and are the
//!   subject of computation (`R`, `f32`, `i8`, ...).
//! - **Control** values ([`DType::Index`], [`DType::Size`], [`DType::Stride`],
//!   [`DType::Bool`]) describe shapes, positions and guards. They are known to
//!   the compiler symbolically and never come from buffer contents.

pub mod cast;

#[cfg(feature = "proptest")]
pub mod proptest_gen;


/// Numeric element kinds.
///
/// `Real` is the abstract real number used by reference kernels before a
/// concrete precision is chosen; it lowers to `float`.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::VariantArray, strum::IntoStaticStr)]
#[derive(enumset::EnumSetType)]
pub enum ScalarDType {
    #[strum(serialize = "R")]
    Real,
    #[strum(serialize = "i8")]
    Int8,
    #[strum(serialize = "i32")]
    Int32,
    #[strum(serialize = "f32")]
    Float32,
    #[strum(serialize = "f64")]
    Float64,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int32 => 4,
            Self::Real | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Real | Self::Float32 | Self::Float64)
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int32)
    }

    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Real | Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Int8 => "int8_t",
            Self::Int32 => "int32_t",
        }
    }

    /// Short suffix used to name C helper types (`win_2f32`).
    pub const fn c_suffix(&self) -> &'static str {
        match self {
            Self::Real | Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Int8 => "i8",
            Self::Int32 => "i32",
        }
    }

    /// Surface name as written in kernel source (`R`, `f32`, ...).
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Scalar type of a value: either a numeric element or a control value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Numeric data (buffer contents, scalar temporaries).
    Scalar(ScalarDType),
    /// Unbounded signed integer used in address computation.
    Index,
    /// Non-negative integer used for extents.
    Size,
    /// Per-dimension buffer stride.
    Stride,
    /// Boolean guard.
    Bool,
}

impl DType {
    pub fn scalar(&self) -> Option<ScalarDType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// True for types allowed in index and extent positions.
    pub fn is_indexable(&self) -> bool {
        matches!(self, Self::Index | Self::Size | Self::Stride)
    }

    /// True for types known to the compiler rather than the data.
    pub fn is_control(&self) -> bool {
        !self.is_numeric()
    }

    pub fn c_style(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.c_style(),
            Self::Index | Self::Size | Self::Stride => "int_fast32_t",
            Self::Bool => "bool",
        }
    }

    /// Parse a surface type keyword (`size`, `index`, `f32`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "index" => Some(Self::Index),
            "size" => Some(Self::Size),
            "stride" => Some(Self::Stride),
            "bool" => Some(Self::Bool),
            other => other.parse::<ScalarDType>().ok().map(Self::Scalar),
        }
    }
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::Scalar(scalar)
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Index => f.write_str("index"),
            Self::Size => f.write_str("size"),
            Self::Stride => f.write_str("stride"),
            Self::Bool => f.write_str("bool"),
        }
    }
}

// Convenient constructors for common types
#[allow(non_upper_case_globals)]
impl DType {
    pub const Real: Self = Self::Scalar(ScalarDType::Real);
    pub const Int8: Self = Self::Scalar(ScalarDType::Int8);
    pub const Int32: Self = Self::Scalar(ScalarDType::Int32);
    pub const Float32: Self = Self::Scalar(ScalarDType::Float32);
    pub const Float64: Self = Self::Scalar(ScalarDType::Float64);
}
