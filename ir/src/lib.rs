//! Typed intermediate representation for the kiln kernel compiler.
//!
//! A [`Procedure`] is an immutable, validated kernel: typed parameters,
//! assertions over sizes, and a body of loops, conditionals, allocations,
//! assignments, config writes and calls. Every construction runs the checkers
//! in [`check`], so a `Procedure` value is always well-typed, shape-correct,
//! memory-legal and free of config races.
//!
//! # Module Organization
//!
//! - [`types`], [`expr`], [`stmt`], [`config`], [`procedure`] - the IR itself
//! - [`sint`], [`bounds`] - affine size arithmetic and the bound prover
//! - [`check`] - type, memory, shape and effect checkers
//! - [`pattern`] - structural selection of statements and expressions
//! - [`instr`] - instruction emission templates
//! - [`parse`], [`printer`] - canonical textual form
//! - [`interp`] - reference interpreter

pub mod bounds;
pub mod check;
pub mod config;
pub mod error;
pub mod expr;
pub mod instr;
pub mod interp;
pub mod parse;
pub mod pattern;
pub mod prelude;
pub mod printer;
pub mod procedure;
pub mod sint;
pub mod stmt;
pub mod tree;
pub mod types;
pub mod visit;

#[cfg(test)]
pub mod test;

pub use check::{CheckConfig, check_effects};
pub use config::{ConfigDecl, ConfigField};
pub use error::{Error, ErrorKind, Result};
pub use expr::{Expr, WindowDim};
pub use instr::InstrTemplate;
pub use interp::{Arg, Interpreter, LoopOrder, Value};
pub use parse::{ParseContext, parse_expr, parse_proc, parse_procs};
pub use pattern::{ExprSite, Pattern, StmtSite};
pub use procedure::{Param, ProcDef, Procedure};
pub use stmt::{Block, Stmt};
pub use types::{BinaryOp, ConstValue, LoopKind, Sym, TensorType, Type, UnaryOp};

pub use kiln_dtype::{DType, ScalarDType};
pub use kiln_memory::MemSpace;
