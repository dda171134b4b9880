//! Memory placement of allocations.

use std::sync::Arc;

use kiln_ir::pattern::site::rewrite_stmt;
use kiln_ir::visit::walk_stmts;
use kiln_ir::{Block, Expr, MemSpace, Procedure, Stmt, Sym};
use kiln_memory::get_space;
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

const NAME: &str = "set_memory";

/// Move an allocation to the memory space registered as `space`.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), alloc = %selector, space = %space))]
pub fn set_memory(proc: &Procedure, selector: &str, space: &str) -> Result<Procedure> {
    let mem = get_space(space).context(MemorySnafu)?;
    set_memory_space(proc, selector, mem)
}

/// [`set_memory`] with an already resolved space.
///
/// The new placement must satisfy the space's allocation rules, every
/// remaining element access must be allowed by its capabilities, and every
/// call receiving the buffer must expect it in that space.
pub fn set_memory_space(proc: &Procedure, selector: &str, mem: Arc<MemSpace>) -> Result<Procedure> {
    let (site, alloc) = select_alloc(proc, selector, NAME)?;
    let Stmt::Alloc { name, ty, .. } = alloc else {
        return precondition(NAME, "expected an allocation");
    };
    let scope_rest = site.block(proc.body()).map(|block| block[site.index + 1..].to_vec()).unwrap_or_default();
    check_call_sites(&scope_rest, &name, &mem)?;

    let body = rewrite_stmt(proc.body(), &site, |_| {
        Ok(vec![Stmt::Alloc { name: name.clone(), ty: ty.clone(), mem: Arc::clone(&mem) }])
    })
    .context(IrSnafu)?;
    rebuild(proc, body, NAME)
}

fn passes(arg: &Expr, name: &Sym) -> bool {
    match arg {
        Expr::Read { name: read, .. } => read == name,
        Expr::Window { buf, .. } => buf == name,
        _ => false,
    }
}

fn check_call_sites(block: &Block, name: &Sym, mem: &Arc<MemSpace>) -> Result<()> {
    let mut mismatch = None;
    walk_stmts(block, &mut |stmt| {
        let Stmt::Call { proc: callee, args } = stmt else { return };
        for (param, arg) in callee.params().iter().zip(args) {
            if mismatch.is_none() && param.ty.is_data() && passes(arg, name) && param.space() != *mem {
                let error = MemoryMismatchSnafu {
                    name: name.to_string(),
                    space: mem.name().to_string(),
                    param: param.name.to_string(),
                    expected: param.space().name().to_string(),
                    callee: callee.name().to_string(),
                    stmt: stmt.summary(),
                };
                mismatch = Some(error.build());
            }
        }
    });
    match mismatch {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
