//! Scheduling transforms for kiln procedures.
//!
//! Every transform takes a procedure and returns a new one computing the
//! same result, or an error explaining which precondition failed. The input
//! is never modified. Results are revalidated by [`Procedure::from_def`], so
//! a returned procedure always passes the type, shape, memory and effect
//! checks.
//!
//! # Module Organization
//!
//! - [`split`] - loop splitting with the [`SplitTail`] strategies
//! - [`fission`] - loop fission after a statement
//! - [`bind`] - binding expressions to scalars
//! - [`alloc`] - lifting allocations and adding dimensions to them
//! - [`memory`] - moving allocations between memory spaces
//! - [`replace`] - substituting instruction calls for equivalent code
//! - [`loops`] - interchange and unrolling
//! - [`inline`] - inlining calls
//! - [`simplify`] - specialisation, renaming and index normalisation
//!
//! The free functions are also available as methods through [`ScheduleExt`]:
//!
//! ```ignore
//! use kiln_schedule::{ScheduleExt, SplitTail};
//!
//! let scheduled = proc
//!     .split("i", 8, ("io", "ii"), SplitTail::Perfect)?
//!     .bind_expr("xVec", "x[_]")?
//!     .expand_dim("xVec", "8", "ii")?
//!     .lift_alloc("xVec", 1)?;
//! ```

pub mod alloc;
pub mod bind;
mod common;
pub mod error;
pub mod fission;
pub mod inline;
pub mod loops;
pub mod memory;
pub mod replace;
pub mod simplify;
pub mod split;


use std::sync::Arc;

pub use alloc::{expand_dim, lift_alloc};
pub use bind::bind_expr;
pub use error::{Error, Result};
pub use fission::fission_after;
pub use inline::inline_call;
pub use loops::{reorder, unroll};
pub use memory::{set_memory, set_memory_space};
pub use replace::{replace, replace_all};
pub use simplify::{partial_eval, rename, simplify};
pub use split::{SplitTail, split};

use kiln_ir::{MemSpace, Procedure};

/// Method syntax for the transforms, so schedules read as a chain.
pub trait ScheduleExt {
    fn split(&self, selector: &str, factor: i64, names: (&str, &str), tail: SplitTail) -> Result<Procedure>;
    fn fission_after(&self, pattern: &str, n_lifts: usize) -> Result<Procedure>;
    fn bind_expr(&self, name: &str, pattern: &str) -> Result<Procedure>;
    fn lift_alloc(&self, selector: &str, n_lifts: usize) -> Result<Procedure>;
    fn expand_dim(&self, selector: &str, size: &str, index: &str) -> Result<Procedure>;
    fn set_memory(&self, selector: &str, space: &str) -> Result<Procedure>;
    fn set_memory_space(&self, selector: &str, mem: Arc<MemSpace>) -> Result<Procedure>;
    fn replace(&self, instr: &Procedure, pattern: &str) -> Result<Procedure>;
    fn replace_all(&self, instr: &Procedure, pattern: &str) -> Result<Procedure>;
    fn reorder(&self, selector: &str) -> Result<Procedure>;
    fn unroll(&self, selector: &str) -> Result<Procedure>;
    fn inline_call(&self, pattern: &str) -> Result<Procedure>;
    fn partial_eval(&self, values: &[i64]) -> Result<Procedure>;
    fn rename(&self, name: &str) -> Result<Procedure>;
    fn simplify(&self) -> Result<Procedure>;
}

impl ScheduleExt for Procedure {
    fn split(&self, selector: &str, factor: i64, names: (&str, &str), tail: SplitTail) -> Result<Procedure> {
        split::split(self, selector, factor, names, tail)
    }

    fn fission_after(&self, pattern: &str, n_lifts: usize) -> Result<Procedure> {
        fission::fission_after(self, pattern, n_lifts)
    }

    fn bind_expr(&self, name: &str, pattern: &str) -> Result<Procedure> {
        bind::bind_expr(self, name, pattern)
    }

    fn lift_alloc(&self, selector: &str, n_lifts: usize) -> Result<Procedure> {
        alloc::lift_alloc(self, selector, n_lifts)
    }

    fn expand_dim(&self, selector: &str, size: &str, index: &str) -> Result<Procedure> {
        alloc::expand_dim(self, selector, size, index)
    }

    fn set_memory(&self, selector: &str, space: &str) -> Result<Procedure> {
        memory::set_memory(self, selector, space)
    }

    fn set_memory_space(&self, selector: &str, mem: Arc<MemSpace>) -> Result<Procedure> {
        memory::set_memory_space(self, selector, mem)
    }

    fn replace(&self, instr: &Procedure, pattern: &str) -> Result<Procedure> {
        replace::replace(self, instr, pattern)
    }

    fn replace_all(&self, instr: &Procedure, pattern: &str) -> Result<Procedure> {
        replace::replace_all(self, instr, pattern)
    }

    fn reorder(&self, selector: &str) -> Result<Procedure> {
        loops::reorder(self, selector)
    }

    fn unroll(&self, selector: &str) -> Result<Procedure> {
        loops::unroll(self, selector)
    }

    fn inline_call(&self, pattern: &str) -> Result<Procedure> {
        inline::inline_call(self, pattern)
    }

    fn partial_eval(&self, values: &[i64]) -> Result<Procedure> {
        simplify::partial_eval(self, values)
    }

    fn rename(&self, name: &str) -> Result<Procedure> {
        simplify::rename(self, name)
    }

    fn simplify(&self) -> Result<Procedure> {
        simplify::simplify(self)
    }
}
