//! Statements and blocks.

use std::sync::Arc;

use kiln_memory::MemSpace;

use crate::config::ConfigDecl;
use crate::expr::Expr;
use crate::procedure::Procedure;
use crate::types::{LoopKind, Sym, Type};

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name[idx] = rhs`
    Assign { name: Sym, idx: Vec<Expr>, rhs: Expr },
    /// `name[idx] += rhs`
    Reduce { name: Sym, idx: Vec<Expr>, rhs: Expr },
    /// `Config.field = rhs`
    WriteConfig { config: Arc<ConfigDecl>, field: Sym, rhs: Expr },
    Pass,
    /// An empty `orelse` means there is no else branch.
    If { cond: Expr, body: Block, orelse: Block },
    /// `for iter in kind(0, hi): body`
    For { iter: Sym, hi: Expr, body: Block, kind: LoopKind },
    /// Block-scoped allocation; storage ends at the end of the enclosing block.
    Alloc { name: Sym, ty: Type, mem: Arc<MemSpace> },
    Call { proc: Procedure, args: Vec<Expr> },
}

impl Stmt {
    pub fn assign(name: impl Into<Sym>, idx: impl IntoIterator<Item = Expr>, rhs: Expr) -> Self {
        Self::Assign { name: name.into(), idx: idx.into_iter().collect(), rhs }
    }

    pub fn reduce(name: impl Into<Sym>, idx: impl IntoIterator<Item = Expr>, rhs: Expr) -> Self {
        Self::Reduce { name: name.into(), idx: idx.into_iter().collect(), rhs }
    }

    pub fn write_config(config: &Arc<ConfigDecl>, field: impl Into<Sym>, rhs: Expr) -> Self {
        Self::WriteConfig { config: Arc::clone(config), field: field.into(), rhs }
    }

    pub fn par(iter: impl Into<Sym>, hi: Expr, body: Block) -> Self {
        Self::For { iter: iter.into(), hi, body, kind: LoopKind::Par }
    }

    pub fn seq(iter: impl Into<Sym>, hi: Expr, body: Block) -> Self {
        Self::For { iter: iter.into(), hi, body, kind: LoopKind::Seq }
    }

    pub fn if_then(cond: Expr, body: Block) -> Self {
        Self::If { cond, body, orelse: Vec::new() }
    }

    pub fn alloc(name: impl Into<Sym>, ty: impl Into<Type>, mem: Arc<MemSpace>) -> Self {
        Self::Alloc { name: name.into(), ty: ty.into(), mem }
    }

    pub fn call(proc: &Procedure, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::Call { proc: proc.clone(), args: args.into_iter().collect() }
    }

    /// Child blocks in traversal order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        let (first, second) = match self {
            Self::If { body, orelse, .. } => (Some(body), Some(orelse)),
            Self::For { body, .. } => (Some(body), None),
            _ => (None, None),
        };
        first.into_iter().chain(second)
    }

    /// Top-level expressions of this statement in traversal order.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Self::Assign { idx, rhs, .. } | Self::Reduce { idx, rhs, .. } => {
                idx.iter().chain(std::iter::once(rhs)).collect()
            }
            Self::WriteConfig { rhs, .. } => vec![rhs],
            Self::Pass => Vec::new(),
            Self::If { cond, .. } => vec![cond],
            Self::For { hi, .. } => vec![hi],
            Self::Alloc { ty, .. } => ty.as_tensor().map(|t| t.shape.iter().collect()).unwrap_or_default(),
            Self::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Buffer or scalar written by an assignment or reduction.
    pub fn assigned_name(&self) -> Option<&Sym> {
        match self {
            Self::Assign { name, .. } | Self::Reduce { name, .. } => Some(name),
            _ => None,
        }
    }

    /// First line of the canonical form, used to name statements in errors.
    pub fn summary(&self) -> String {
        let text = self.to_string();
        text.lines().next().unwrap_or_default().trim().to_string()
    }
}
