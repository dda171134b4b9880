//! Procedures: the unit every transform consumes and produces.

use std::sync::Arc;

use bon::bon;
use kiln_memory::MemSpace;

use crate::check::{self, CheckConfig};
use crate::error::Result;
use crate::expr::Expr;
use crate::instr::InstrTemplate;
use crate::stmt::{Block, Stmt};
use crate::types::{Sym, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Sym,
    pub ty: Type,
    /// Memory space of data parameters; `None` means the default space.
    pub mem: Option<Arc<MemSpace>>,
}

impl Param {
    pub fn new(name: impl Into<Sym>, ty: impl Into<Type>) -> Self {
        Self { name: name.into(), ty: ty.into(), mem: None }
    }

    pub fn in_space(mut self, mem: Arc<MemSpace>) -> Self {
        self.mem = Some(mem);
        self
    }

    /// Effective memory space.
    pub fn space(&self) -> Arc<MemSpace> {
        self.mem.clone().unwrap_or_else(kiln_memory::dram)
    }
}

/// Plain data behind a [`Procedure`]. Edit a clone and rebuild with
/// [`Procedure::from_def`] to get a checked procedure back.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcDef {
    pub name: Sym,
    pub params: Vec<Param>,
    pub preds: Vec<Expr>,
    pub body: Block,
    pub instr: Option<InstrTemplate>,
}

impl ProcDef {
    pub fn param(&self, name: &Sym) -> Option<&Param> {
        self.params.iter().find(|p| &p.name == name)
    }
}

/// Immutable, validated procedure. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Procedure(Arc<ProcDef>);

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

#[bon]
impl Procedure {
    /// Build and validate a procedure.
    #[builder]
    pub fn new(
        #[builder(into)] name: Sym,
        #[builder(default)] params: Vec<Param>,
        #[builder(default)] preds: Vec<Expr>,
        body: Block,
        instr: Option<InstrTemplate>,
        #[builder(default = CheckConfig::from_env())] check: CheckConfig,
    ) -> Result<Self> {
        Self::from_def_with(ProcDef { name, params, preds, body, instr }, &check)
    }
}

impl Procedure {
    /// Validate a definition with the environment's check configuration.
    pub fn from_def(def: ProcDef) -> Result<Self> {
        Self::from_def_with(def, &CheckConfig::from_env())
    }

    /// Normalise and validate a definition.
    ///
    /// Runs, in order: config-in-static-context detection, type checking,
    /// instruction template resolution, memory rules, shape proofs and the
    /// effect checker.
    pub fn from_def_with(mut def: ProcDef, config: &CheckConfig) -> Result<Self> {
        normalize_block(&mut def.body);
        check::check_def(&def, config)?;
        Ok(Self(Arc::new(def)))
    }

    pub fn def(&self) -> &ProcDef {
        &self.0
    }

    /// Owned copy of the definition for editing.
    pub fn to_def(&self) -> ProcDef {
        (*self.0).clone()
    }

    pub fn name(&self) -> &Sym {
        &self.0.name
    }

    pub fn params(&self) -> &[Param] {
        &self.0.params
    }

    pub fn preds(&self) -> &[Expr] {
        &self.0.preds
    }

    pub fn body(&self) -> &Block {
        &self.0.body
    }

    pub fn instr(&self) -> Option<&InstrTemplate> {
        self.0.instr.as_ref()
    }

    pub fn is_instr(&self) -> bool {
        self.0.instr.is_some()
    }

    /// Same procedure with a new body, revalidated.
    pub fn with_body(&self, body: Block) -> Result<Self> {
        Self::from_def(ProcDef { body, ..self.to_def() })
    }

    /// ASCII tree of the statement structure, for logs.
    pub fn tree(&self) -> String {
        crate::tree::render_tree(self)
    }
}

/// Empty bodies become a single `pass`; empty else branches are dropped.
pub(crate) fn normalize_block(block: &mut Block) {
    for stmt in block.iter_mut() {
        match stmt {
            Stmt::If { body, orelse, .. } => {
                normalize_block(body);
                if !orelse.is_empty() {
                    normalize_block(orelse);
                }
            }
            Stmt::For { body, .. } => normalize_block(body),
            _ => {}
        }
    }
    if block.is_empty() {
        block.push(Stmt::Pass);
    }
}
