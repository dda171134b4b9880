//! Memory-space abstraction.
//!
//! A [`MemSpace`] describes where a buffer lives and which access patterns the
//! hardware allows there. Ordinary memory (`DRAM`) supports random element
//! reads and writes; vector register files and accelerator scratchpads only
//! support whole-block transfers performed by instructions.
//!
//! Spaces are looked up by name through a process-wide [`MemoryRegistry`]
//! preloaded with the built-in spaces; users can register their own.

pub mod builtin;
pub mod error;
pub mod registry;
pub mod space;

#[cfg(test)]
pub mod test;

pub use error::{Error, Result};
pub use registry::{MemoryRegistry, dram, get_space, register, registry};
pub use space::{AllocRule, EmitStyle, MemFlag, MemSpace};
