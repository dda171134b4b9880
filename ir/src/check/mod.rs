//! Construction-time validation of procedures.
//!
//! [`check_def`] runs every checker in order; each returns the first
//! violation it finds.

pub mod effects;
pub mod memory;
pub mod shape;
pub mod typecheck;

use std::collections::HashMap;
use std::sync::Arc;

use bon::bon;
use kiln_dtype::DType;
use kiln_memory::MemSpace;

use crate::bounds::{Facts, Pred};
use crate::error::Result;
use crate::expr::Expr;
use crate::procedure::ProcDef;
use crate::sint::Affine;
use crate::types::{Sym, TensorType, Type};

pub use effects::check_effects;

/// Checker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    /// Maximum number of bound substitutions the prover chains.
    pub proof_depth: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { proof_depth: 6 }
    }
}

#[bon]
impl CheckConfig {
    #[builder]
    pub fn new(#[builder(default = 6)] proof_depth: usize) -> Self {
        Self { proof_depth }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_PROOF_DEPTH` - Prover substitution depth (default: 6)
    pub fn from_env() -> Self {
        let proof_depth = std::env::var("KILN_PROOF_DEPTH").ok().and_then(|s| s.parse().ok()).unwrap_or(6);
        Self { proof_depth }
    }
}

/// Validate a procedure definition.
#[tracing::instrument(skip_all, fields(proc = %def.name))]
pub fn check_def(def: &ProcDef, config: &CheckConfig) -> Result<()> {
    effects::check_static_contexts(def)?;
    typecheck::typecheck(def)?;
    if let Some(instr) = &def.instr {
        instr.validate(def)?;
    }
    memory::check_memory(def, config)?;
    shape::check_shapes(def, config)?;
    effects::check_races(def)?;
    tracing::trace!("procedure validated");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Param,
    Alloc,
    Loop,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub mem: Arc<MemSpace>,
    pub kind: BindingKind,
}

/// Names in scope at some point of a procedure.
#[derive(Debug, Clone, Default)]
pub struct Env {
    names: HashMap<Sym, Binding>,
}

impl Env {
    /// Scope at the top of a procedure body.
    pub fn for_params(def: &ProcDef) -> Self {
        let mut env = Self::default();
        for param in &def.params {
            env.bind(param.name.clone(), param.ty.clone(), param.space(), BindingKind::Param);
        }
        env
    }

    pub fn bind(&mut self, name: Sym, ty: Type, mem: Arc<MemSpace>, kind: BindingKind) {
        self.names.insert(name, Binding { ty, mem, kind });
    }

    pub fn bind_loop(&mut self, iter: &Sym) {
        self.bind(iter.clone(), Type::Scalar(DType::Index), kiln_memory::dram(), BindingKind::Loop);
    }

    pub fn get(&self, name: &Sym) -> Option<&Binding> {
        self.names.get(name)
    }

    pub fn contains(&self, name: &Sym) -> bool {
        self.names.contains_key(name)
    }

    pub fn tensor(&self, name: &Sym) -> Option<&TensorType> {
        self.get(name).and_then(|b| b.ty.as_tensor())
    }

    /// Stride of a dense buffer's dimension, `None` for windows.
    pub fn stride(&self, buf: &Sym, dim: usize) -> Option<Affine> {
        let tensor = self.tensor(buf)?;
        if tensor.window || dim >= tensor.rank() {
            return None;
        }
        tensor.shape[dim + 1..]
            .iter()
            .try_fold(Affine::constant(1), |acc, extent| Some(acc.mul(&Affine::from_expr(extent)?)))
    }

    pub fn affine(&self, expr: &Expr) -> Option<Affine> {
        Affine::from_expr_with(expr, &mut |buf, dim| self.stride(buf, dim))
    }

    pub fn pred(&self, expr: &Expr) -> Option<Pred> {
        Pred::from_expr(expr, &mut |buf, dim| self.stride(buf, dim))
    }
}

/// Facts holding at the top of a procedure body: size parameters are
/// non-negative and every assert holds.
pub fn entry_facts(def: &ProcDef, env: &Env, config: &CheckConfig) -> Facts {
    let mut facts = Facts::new(config.proof_depth);
    for param in &def.params {
        match param.ty {
            Type::Scalar(DType::Size) => facts.declare_size(&param.name),
            _ => facts.declare(&param.name),
        }
    }
    for pred in &def.preds {
        if let Some(pred) = env.pred(pred) {
            facts.assume(&pred);
        }
    }
    facts
}
