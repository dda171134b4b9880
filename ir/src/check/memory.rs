//! Memory-space rules: allocation legality, contiguity and element access.

use kiln_dtype::ScalarDType;
use kiln_memory::MemSpace;
use snafu::ResultExt;

use super::{BindingKind, CheckConfig, Env, entry_facts};
use crate::bounds::Facts;
use crate::error::*;
use crate::expr::Expr;
use crate::procedure::ProcDef;
use crate::sint::{Affine, Atom};
use crate::stmt::{Block, Stmt};
use crate::types::{Sym, Type};

/// Element reads or writes of `name` that its space forbids.
fn check_access(env: &Env, name: &Sym, write: bool, stmt: &Stmt) -> Result<()> {
    let Some(binding) = env.get(name) else { return Ok(()) };
    let allowed = if write { binding.mem.can_write_element() } else { binding.mem.can_read_element() };
    if allowed || !binding.ty.is_data() {
        return Ok(());
    }
    MemoryAccessSnafu {
        space: binding.mem.name(),
        access: if write { "element writes" } else { "element reads" },
        stmt: stmt.summary(),
    }
    .fail()
}

fn check_expr_reads(env: &Env, expr: &Expr, stmt: &Stmt) -> Result<()> {
    if let Expr::Read { name, .. } = expr {
        check_access(env, name, false, stmt)?;
    }
    expr.children().into_iter().try_for_each(|child| check_expr_reads(env, child, stmt))
}

/// Is `arg` a whole buffer or window rather than an element?
fn is_block_arg(env: &Env, arg: &Expr) -> bool {
    match arg {
        Expr::Window { .. } => true,
        Expr::Read { name, idx } => idx.is_empty() && env.tensor(name).is_some(),
        _ => false,
    }
}

fn check_layout(facts: &Facts, env: &Env, name: &Sym, ty: &Type, space: &MemSpace, stmt: &str) -> Result<()> {
    let Some(tensor) = ty.as_tensor() else {
        let elem = ty.elem().unwrap_or(ScalarDType::Real);
        return space.check_alloc(elem, &[]).context(MemoryRuleSnafu { stmt });
    };
    space.check_alloc(tensor.elem, &tensor.literal_dims()).context(MemoryRuleSnafu { stmt })?;
    if space.alloc_rule().unit_inner_stride && tensor.rank() > 0 {
        let inner = tensor.rank() - 1;
        let stride = env.stride(name, inner).unwrap_or_else(|| Affine::atom(Atom::Stride(name.clone(), inner)));
        let proven = facts.prove_eq(&stride, &Affine::constant(1)).then_some(1);
        space.check_inner_stride(proven).context(MemoryRuleSnafu { stmt })?;
    }
    Ok(())
}

fn check_block(env: &mut Env, block: &Block, elements: bool) -> Result<()> {
    for stmt in block {
        match stmt {
            Stmt::Assign { name, idx, rhs } | Stmt::Reduce { name, idx, rhs } => {
                if elements {
                    check_access(env, name, true, stmt)?;
                    if matches!(stmt, Stmt::Reduce { .. }) {
                        check_access(env, name, false, stmt)?;
                    }
                    idx.iter().chain([rhs]).try_for_each(|e| check_expr_reads(env, e, stmt))?;
                }
            }
            Stmt::WriteConfig { rhs, .. } if elements => check_expr_reads(env, rhs, stmt)?,
            Stmt::If { cond, body, orelse } => {
                if elements {
                    check_expr_reads(env, cond, stmt)?;
                }
                check_block(&mut env.clone(), body, elements)?;
                check_block(&mut env.clone(), orelse, elements)?;
            }
            Stmt::For { iter, body, .. } => {
                let mut inner = env.clone();
                inner.bind_loop(iter);
                check_block(&mut inner, body, elements)?;
            }
            Stmt::Alloc { name, ty, mem } => {
                env.bind(name.clone(), ty.clone(), mem.clone(), BindingKind::Alloc);
                check_layout(&Facts::new(0), env, name, ty, mem, &stmt.summary())?;
            }
            Stmt::Call { args, .. } if elements => {
                for arg in args.iter().filter(|arg| !is_block_arg(env, arg)) {
                    check_expr_reads(env, arg, stmt)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Check allocation rules for parameters and allocations, and (outside
/// instruction bodies) that no statement touches single elements of a buffer
/// whose space forbids it.
pub fn check_memory(def: &ProcDef, config: &CheckConfig) -> Result<()> {
    let mut env = Env::for_params(def);
    let facts = entry_facts(def, &env, config);
    let header = format!("def {}", def.name);
    for param in def.params.iter().filter(|p| p.ty.is_data()) {
        let space = param.space();
        if space.is_block_only() || space.alloc_rule().unit_inner_stride {
            check_layout(&facts, &env, &param.name, &param.ty, &space, &header)?;
        }
    }
    check_block(&mut env, &def.body, def.instr.is_none())
}
