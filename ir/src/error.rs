use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    #[strum(serialize = "ShapeError")]
    Shape,
    #[strum(serialize = "ConfigEffectError")]
    ConfigEffect,
    #[strum(serialize = "PatternMatchError")]
    PatternMatch,
    #[strum(serialize = "MemoryCompatibilityError")]
    MemoryCompatibility,
    #[strum(serialize = "TypeError")]
    Type,
    #[strum(serialize = "SyntaxError")]
    Syntax,
    #[strum(serialize = "UnresolvedPlaceholder")]
    UnresolvedPlaceholder,
    #[strum(serialize = "RuntimeError")]
    Runtime,
    #[strum(serialize = "TransformPreconditionError")]
    TransformPrecondition,
    #[strum(serialize = "ReplacementEquivalenceError")]
    ReplacementEquivalence,
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Reference to a name that is not in scope.
    #[snafu(display("unknown name '{name}' in: {stmt}"))]
    UnknownName { name: String, stmt: String },

    /// A name is declared twice in overlapping scopes.
    #[snafu(display("name '{name}' is already defined, in: {stmt}"))]
    Redefined { name: String, stmt: String },

    /// Ill-typed expression or statement.
    #[snafu(display("type error in: {stmt}: {message}"))]
    Type { stmt: String, message: String },

    /// Non-provable bound, dimension mismatch or unprovable call precondition.
    #[snafu(display("shape error in: {stmt}: {message}"))]
    Shape { stmt: String, message: String },

    /// Config written in a parallel loop from per-iteration data, or read
    /// without a dominating write.
    #[snafu(display("data race conflict with statement {stmt}"))]
    DataRace { stmt: String },

    /// Config field used where a compile-time value is required.
    #[snafu(display("expected 'index' or 'size', found config field {config}.{field} in: {stmt}"))]
    ConfigInStaticContext { config: String, field: String, stmt: String },

    /// Pattern selects nothing.
    #[snafu(display("pattern '{pattern}' did not match anything"))]
    NoMatch { pattern: String },

    /// Ordinal selector past the end of the match list.
    #[snafu(display("pattern '{pattern}' has {count} matches, ordinal #{ordinal} is out of range"))]
    BadOrdinal { pattern: String, ordinal: usize, count: usize },

    /// Pattern string is malformed.
    #[snafu(display("invalid pattern '{pattern}': {message}"))]
    InvalidPattern { pattern: String, message: String },

    /// Access violating the capabilities of a memory space.
    #[snafu(display("memory space {space} does not allow {access} in: {stmt}"))]
    MemoryAccess { space: String, access: &'static str, stmt: String },

    /// Allocation or layout rule of a memory space violated.
    #[snafu(display("{source} in: {stmt}"))]
    MemoryRule { stmt: String, source: kiln_memory::Error },

    /// Memory registry failure.
    #[snafu(display("{source}"))]
    Memory { source: kiln_memory::Error },

    /// Parse failure.
    #[snafu(display("syntax error at {line}:{col}: {message}"))]
    Syntax { line: usize, col: usize, message: String },

    /// Emission template refers to something the instruction does not define.
    #[snafu(display("unresolved placeholder '{{{placeholder}}}' in instruction {instr}: {message}"))]
    UnresolvedPlaceholder { instr: String, placeholder: String, message: String },

    /// Reference interpreter failure.
    #[snafu(display("runtime error in {proc}: {message}"))]
    Runtime { proc: String, message: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownName { .. } | Self::Redefined { .. } | Self::Type { .. } => ErrorKind::Type,
            Self::Shape { .. } => ErrorKind::Shape,
            Self::DataRace { .. } | Self::ConfigInStaticContext { .. } => ErrorKind::ConfigEffect,
            Self::NoMatch { .. } | Self::BadOrdinal { .. } | Self::InvalidPattern { .. } => ErrorKind::PatternMatch,
            Self::MemoryAccess { .. } | Self::MemoryRule { .. } | Self::Memory { .. } => {
                ErrorKind::MemoryCompatibility
            }
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::UnresolvedPlaceholder { .. } => ErrorKind::UnresolvedPlaceholder,
            Self::Runtime { .. } => ErrorKind::Runtime,
        }
    }
}
