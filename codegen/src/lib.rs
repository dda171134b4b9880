//! C code generation for scheduled kiln procedures.
//!
//! The emitter turns a validated [`Procedure`](kiln_ir::Procedure) into a
//! self-contained C translation unit: headers of every memory space in use,
//! config structs gathered into a `kiln_Context`, window structs for strided
//! views, one `static` function per callee and the entry function itself.
//! Calls to instructions are expanded from their C templates.
//!
//! # Usage
//!
//! ```ignore
//! use kiln_codegen::c;
//!
//! let kernel = c::render(&scheduled)?;
//! std::fs::write("kernel.c", &kernel.code)?;
//! ```

pub mod c;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test;

pub use error::*;
pub use traits::*;
pub use types::*;
