//! Error types for code generation.

use kiln_ir::ErrorKind;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A buffer reaches a call parameter declared in another memory space.
    #[snafu(display("{name} @ {space} cannot bind parameter {param} @ {expected} of {callee} in: {stmt}"))]
    MemoryMismatch { name: String, space: String, param: String, expected: String, callee: String, stmt: String },

    /// Instructions have no body of their own to emit.
    #[snafu(display("{proc} is an instruction and cannot be emitted as a function"))]
    InstructionEntry { proc: String },

    /// Two different procedures reachable from the entry share a C name.
    #[snafu(display("two different procedures are named {name}"))]
    NameClash { name: String },

    /// Construct with no C rendering in the context it appears in.
    #[snafu(display("cannot emit `{what}` in {proc}: {reason}"))]
    Unsupported { proc: String, what: String, reason: String },

    #[snafu(display("{name} has no binding in {proc}"))]
    UnknownName { proc: String, name: String },

    #[snafu(display("{source}"))]
    Ir { source: kiln_ir::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MemoryMismatch { .. } => ErrorKind::MemoryCompatibility,
            Self::InstructionEntry { .. }
            | Self::NameClash { .. }
            | Self::Unsupported { .. }
            | Self::UnknownName { .. } => ErrorKind::Type,
            Self::Ir { source } => source.kind(),
        }
    }
}
