use kiln_dtype::ScalarDType;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No space registered under this name.
    #[snafu(display("unknown memory space '{name}'"))]
    UnknownSpace { name: String },

    /// A different space is already registered under this name.
    #[snafu(display("memory space '{name}' is already registered with different capabilities"))]
    DuplicateSpace { name: String },

    /// Capability flags contradict each other.
    #[snafu(display("invalid capabilities for memory space '{name}': {reason}"))]
    InvalidCapabilities { name: String, reason: &'static str },

    /// Element kind not storable in the space.
    #[snafu(display("memory space {space} cannot hold elements of type {elem}"))]
    UnsupportedElement { space: String, elem: ScalarDType },

    /// Scalars cannot be placed in block-structured spaces.
    #[snafu(display("memory space {space} requires at least one dimension"))]
    RankRequired { space: String },

    /// Innermost dimension must have a fixed extent.
    #[snafu(display("memory space {space} requires innermost extent {expected}, got {actual}"))]
    InnerExtent { space: String, expected: usize, actual: String },

    /// Innermost stride must be provably 1.
    #[snafu(display("memory space {space} requires a contiguous innermost dimension (stride 1)"))]
    NonContiguousInner { space: String },
}
