use kiln_ir::ErrorKind;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The selected site does not satisfy what the transform needs.
    #[snafu(display("{transform}: {message}"))]
    TransformPrecondition { transform: &'static str, message: String },

    /// The instruction body does not unify with the selected region.
    #[snafu(display("cannot replace with {instr}: {message}"))]
    ReplacementEquivalence { instr: String, message: String },

    /// A buffer is passed to an instruction parameter declared in another
    /// memory space.
    #[snafu(display("{name} @ {space} cannot bind parameter {param} @ {expected} of {callee} in: {stmt}"))]
    MemoryMismatch { name: String, space: String, param: String, expected: String, callee: String, stmt: String },

    #[snafu(display("{source}"))]
    Ir { source: kiln_ir::Error },

    #[snafu(display("{source}"))]
    Memory { source: kiln_memory::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransformPrecondition { .. } => ErrorKind::TransformPrecondition,
            Self::ReplacementEquivalence { .. } => ErrorKind::ReplacementEquivalence,
            Self::MemoryMismatch { .. } | Self::Memory { .. } => ErrorKind::MemoryCompatibility,
            Self::Ir { source } => source.kind(),
        }
    }
}

