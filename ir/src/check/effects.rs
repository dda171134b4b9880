//! Config effects: static-context use and data races in parallel loops.
//!
//! Config fields model persistent device state. Two rules are enforced:
//!
//! - a config value never flows into a size, index, guard or extent;
//! - inside a parallel loop, iterations never disagree on config state. A
//!   write must store an iteration-invariant value under iteration-invariant
//!   control, and a read of a field the loop writes must be dominated by a
//!   write in the same iteration.
//!
//! Config state lives in an explicit side table keyed by [`ConfigField`],
//! separate from the name-based taint tracking of buffers and scalars.

use std::collections::BTreeSet;

use crate::config::ConfigField;
use crate::error::*;
use crate::expr::Expr;
use crate::procedure::{ProcDef, Procedure};
use crate::stmt::{Block, Stmt};
use crate::types::{Sym, Type};
use crate::visit;

/// Run both effect checks on a procedure.
pub fn check_effects(proc: &Procedure) -> Result<()> {
    check_static_contexts(proc.def())?;
    check_races(proc.def())
}

fn static_use(expr: &Expr, context: &str) -> Result<()> {
    match expr.find_config_read() {
        Some(Expr::ReadConfig { config, field }) => {
            ConfigInStaticContextSnafu { config: config.name().as_str(), field: field.as_str(), stmt: context }.fail()
        }
        _ => Ok(()),
    }
}

fn static_block(block: &Block) -> Result<()> {
    for stmt in block {
        let context = stmt.summary();
        match stmt {
            Stmt::Assign { idx, .. } | Stmt::Reduce { idx, .. } => {
                idx.iter().try_for_each(|e| static_use(e, &context))?;
            }
            Stmt::If { cond, .. } => static_use(cond, &context)?,
            Stmt::For { hi, .. } => static_use(hi, &context)?,
            Stmt::Alloc { ty: Type::Tensor(tensor), .. } => {
                tensor.shape.iter().try_for_each(|e| static_use(e, &context))?;
            }
            Stmt::Call { args, .. } => args.iter().try_for_each(|e| static_use(e, &context))?,
            _ => {}
        }
        for child in stmt.blocks() {
            static_block(child)?;
        }
    }
    Ok(())
}

/// Reject config reads in asserts, extents, conditions, indices and call
/// arguments.
pub fn check_static_contexts(def: &ProcDef) -> Result<()> {
    for pred in &def.preds {
        static_use(pred, &format!("assert {pred}"))?;
    }
    for param in &def.params {
        if let Type::Tensor(tensor) = &param.ty {
            let context = format!("parameter {param}");
            tensor.shape.iter().try_for_each(|e| static_use(e, &context))?;
        }
    }
    static_block(&def.body)
}

fn varies(expr: &Expr, tainted: &BTreeSet<Sym>) -> bool {
    !tainted.is_empty() && expr.names().iter().any(|name| tainted.contains(name))
}

/// Grow `tainted` with every name a parallel iteration writes with a value
/// (or under control) that differs between iterations.
fn taint_writes(block: &Block, tainted: &mut BTreeSet<Sym>, control: bool) {
    for stmt in block {
        match stmt {
            Stmt::Assign { name, idx, rhs } => {
                if control || varies(rhs, tainted) || idx.iter().any(|e| varies(e, tainted)) {
                    tainted.insert(name.clone());
                }
            }
            Stmt::Reduce { name, .. } => {
                tainted.insert(name.clone());
            }
            Stmt::If { cond, body, orelse } => {
                let control = control || varies(cond, tainted);
                taint_writes(body, tainted, control);
                taint_writes(orelse, tainted, control);
            }
            Stmt::For { hi, body, .. } => {
                let control = control || varies(hi, tainted);
                taint_writes(body, tainted, control);
            }
            Stmt::Call { args, .. } => {
                let moving = control || args.iter().any(|e| varies(e, tainted));
                if moving {
                    tainted.extend(visit::block_writes(std::slice::from_ref(stmt)));
                }
            }
            Stmt::WriteConfig { .. } | Stmt::Pass | Stmt::Alloc { .. } => {}
        }
    }
}

fn taint_fixpoint(block: &Block, tainted: &mut BTreeSet<Sym>) {
    loop {
        let before = tainted.len();
        taint_writes(block, tainted, false);
        if tainted.len() == before {
            break;
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RaceState {
    /// Names whose value differs between iterations of an enclosing
    /// parallel loop.
    tainted: BTreeSet<Sym>,
    /// Config fields written by any enclosing parallel loop.
    par_writes: BTreeSet<ConfigField>,
    /// Fields written earlier in the current iteration of every enclosing
    /// parallel loop that writes them.
    dominated: BTreeSet<ConfigField>,
    /// Inside a branch or loop whose control differs between iterations.
    control: bool,
    in_par: bool,
}

impl RaceState {
    fn check_reads(&self, expr: &Expr, stmt: &Stmt) -> Result<()> {
        if !self.in_par {
            return Ok(());
        }
        let mut reads = BTreeSet::new();
        expr.collect_config_reads(&mut reads);
        for field in reads {
            if self.par_writes.contains(&field) && !self.dominated.contains(&field) {
                tracing::debug!(%field, stmt = %stmt.summary(), "config read not dominated by a write");
                return DataRaceSnafu { stmt: stmt.summary() }.fail();
            }
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in block {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        for expr in stmt.exprs() {
            self.check_reads(expr, stmt)?;
        }
        match stmt {
            Stmt::WriteConfig { config, field, rhs } => {
                let key = ConfigField::new(config, field);
                if self.in_par && (self.control || varies(rhs, &self.tainted)) {
                    tracing::debug!(field = %key, stmt = %stmt.summary(), "iteration-dependent config write");
                    return DataRaceSnafu { stmt: stmt.summary() }.fail();
                }
                self.dominated.insert(key);
            }
            Stmt::If { cond, body, orelse } => {
                let mut then_state = self.clone();
                let mut else_state = self.clone();
                if varies(cond, &self.tainted) {
                    then_state.control = true;
                    else_state.control = true;
                }
                then_state.block(body)?;
                else_state.block(orelse)?;
                self.dominated = then_state.dominated.intersection(&else_state.dominated).cloned().collect();
            }
            Stmt::For { iter, hi, body, kind } => {
                let mut inner = self.clone();
                if varies(hi, &self.tainted) {
                    inner.control = true;
                }
                if *kind == crate::types::LoopKind::Par {
                    let writes = visit::block_config_writes(body);
                    inner.in_par = true;
                    inner.dominated.retain(|field| !writes.contains(field));
                    inner.par_writes.extend(writes);
                    inner.tainted.insert(iter.clone());
                    taint_fixpoint(body, &mut inner.tainted);
                }
                inner.block(body)?;
            }
            Stmt::Call { proc, args } => self.call(proc, args)?,
            Stmt::Assign { .. } | Stmt::Reduce { .. } | Stmt::Alloc { .. } | Stmt::Pass => {}
        }
        Ok(())
    }

    /// Analyse the callee body with argument taint mapped onto its
    /// parameters. Config state is shared with the caller.
    fn call(&mut self, callee: &Procedure, args: &[Expr]) -> Result<()> {
        let tainted = callee
            .params()
            .iter()
            .zip(args)
            .filter(|(_, arg)| self.control || varies(arg, &self.tainted))
            .map(|(param, _)| param.name.clone())
            .collect();
        let mut inner = RaceState { tainted, ..self.clone() };
        if inner.in_par {
            taint_fixpoint(callee.body(), &mut inner.tainted);
        }
        inner.block(callee.body())?;
        self.dominated = inner.dominated;
        Ok(())
    }
}

/// Reject config writes and reads that would make parallel iterations
/// disagree on device state.
pub fn check_races(def: &ProcDef) -> Result<()> {
    RaceState::default().block(&def.body)
}
