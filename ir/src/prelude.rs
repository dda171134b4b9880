//! Common imports for building and scheduling procedures.
//!
//! ```rust,ignore
//! use kiln_ir::prelude::*;
//! ```

// IR
pub use crate::config::ConfigDecl;
pub use crate::expr::{Expr, WindowDim};
pub use crate::procedure::{Param, Procedure};
pub use crate::stmt::{Block, Stmt};
pub use crate::types::{BinaryOp, LoopKind, Sym, Type};

// Front end
pub use crate::parse::{ParseContext, parse_proc, parse_procs};
pub use crate::pattern::Pattern;

// Re-exports from dependencies
pub use kiln_dtype::{DType, ScalarDType};
pub use kiln_memory::{MemSpace, dram, get_space};
