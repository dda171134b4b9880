//! Binding a data expression to a fresh scalar.

use std::collections::BTreeSet;

use kiln_ir::check::Env;
use kiln_ir::pattern::site::rewrite_block;
use kiln_ir::visit::{block_config_writes, block_writes};
use kiln_ir::{ConstValue, Expr, Pattern, Procedure, ScalarDType, Stmt, Sym};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

const NAME: &str = "bind_expr";

/// Insert `name: T @ DRAM; name = e` before the statement holding the
/// selected expression `e`, then read `name` instead of `e` in that statement
/// and the following ones of the same block. Substitution stops at the first
/// statement that writes a buffer, scalar or config field `e` reads; a simple
/// statement doing so still has its own right-hand side rewritten.
///
/// `T` is the widest element type read by `e`, `R` for constant expressions.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), name = %name, pattern = %pattern))]
pub fn bind_expr(proc: &Procedure, name: &str, pattern: &str) -> Result<Procedure> {
    let name = Sym::from(name);
    ensure_fresh(proc, NAME, &name)?;
    let site = Pattern::parse(pattern).context(IrSnafu)?.select_expr(proc).context(IrSnafu)?;
    let expr = site.get(proc.body()).context(IrSnafu)?.clone();
    let scope = Scope::at(proc, &site.stmt);
    let elem = value_type(&scope.env, &expr)?;

    let reads = expr.names();
    let mut config_reads = BTreeSet::new();
    expr.collect_config_reads(&mut config_reads);
    let var = Expr::var(name.clone());
    let start = site.stmt.index;

    let body = rewrite_block(proc.body(), &site.stmt.path, |block| {
        let mut out = block[..start].to_vec();
        out.push(Stmt::alloc(name.clone(), elem, kiln_memory::dram()));
        out.push(Stmt::assign(name.clone(), [], expr.clone()));
        let mut live = true;
        for stmt in &block[start..] {
            if !live {
                out.push(stmt.clone());
                continue;
            }
            let single = std::slice::from_ref(stmt);
            let clobbers = !block_writes(single).is_disjoint(&reads)
                || !block_config_writes(single).is_disjoint(&config_reads);
            let simple = matches!(stmt, Stmt::Assign { .. } | Stmt::Reduce { .. } | Stmt::WriteConfig { .. });
            if clobbers && !simple {
                live = false;
                out.push(stmt.clone());
                continue;
            }
            out.push(stmt.map_exprs_deep(&mut |e| replace_equal(e, &expr, &var)));
            live = !clobbers;
        }
        Ok(out)
    })
    .context(IrSnafu)?;
    rebuild(proc, body, NAME)
}

/// Element type of a data expression.
fn value_type(env: &Env, expr: &Expr) -> Result<ScalarDType> {
    let mut kinds = Vec::new();
    let mut float_literal = false;
    collect_types(env, expr, &mut kinds, &mut float_literal);
    if kinds.is_empty() && !float_literal {
        return precondition(NAME, format!("{expr} is not a data expression"));
    }
    Ok(ScalarDType::least_upper(&kinds).unwrap_or(ScalarDType::Real))
}

fn collect_types(env: &Env, expr: &Expr, kinds: &mut Vec<ScalarDType>, float_literal: &mut bool) {
    match expr {
        Expr::Read { name, .. } => {
            if let Some(elem) = env.get(name).and_then(|binding| binding.ty.elem()) {
                kinds.push(elem);
            }
        }
        Expr::ReadConfig { config, field } => {
            if let Some(elem) = config.field_type(field).and_then(|ty| ty.scalar()) {
                kinds.push(elem);
            }
        }
        Expr::Const(ConstValue::Float(_)) => *float_literal = true,
        Expr::Window { .. } => return,
        _ => {}
    }
    for child in expr.children() {
        collect_types(env, child, kinds, float_literal);
    }
}
