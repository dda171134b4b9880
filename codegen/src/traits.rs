//! Core traits for code generation.

use kiln_ir::Procedure;

use crate::{RenderedKernel, Result};

/// Backend-agnostic code generation interface.
///
/// Implementers turn a validated procedure, together with every procedure
/// it calls, into source text for their target.
pub trait Renderer {
    /// Render `proc` as the entry point of a translation unit.
    fn render(&self, proc: &Procedure) -> Result<RenderedKernel>;

    /// Get the backend name (e.g. "c").
    fn backend_name(&self) -> &str;
}
