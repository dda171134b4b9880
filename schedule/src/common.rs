//! Plumbing shared by the transforms: site selection, scope reconstruction,
//! name freshness and revalidation.

use std::collections::BTreeSet;

use kiln_ir::bounds::Facts;
use kiln_ir::check::{BindingKind, CheckConfig, Env, entry_facts};
use kiln_ir::pattern::{Branch, StmtSite};
use kiln_ir::sint::Affine;
use kiln_ir::visit::block_names;
use kiln_ir::{Block, Expr, LoopKind, ParseContext, Pattern, ProcDef, Procedure, Stmt, Sym, parse_expr};
use snafu::ResultExt;

use crate::error::*;

/// Validate an edited body and log the resulting procedure.
pub(crate) fn rebuild(proc: &Procedure, body: Block, transform: &'static str) -> Result<Procedure> {
    rebuild_def(ProcDef { body, ..proc.to_def() }, transform)
}

pub(crate) fn rebuild_def(def: ProcDef, transform: &'static str) -> Result<Procedure> {
    let out = Procedure::from_def(def).context(IrSnafu)?;
    tracing::debug!(transform, proc = %out.name(), tree = %out.tree(), "transform applied");
    Ok(out)
}

pub(crate) fn precondition<T>(transform: &'static str, message: impl Into<String>) -> Result<T> {
    TransformPreconditionSnafu { transform, message: message.into() }.fail()
}

/// Statement picked by a statement pattern.
pub(crate) fn select_stmt(proc: &Procedure, pattern: &str) -> Result<(StmtSite, Stmt)> {
    let site = Pattern::parse(pattern).context(IrSnafu)?.select_stmt(proc).context(IrSnafu)?;
    let stmt = site.get(proc.body()).context(IrSnafu)?.clone();
    Ok((site, stmt))
}

/// A selected loop, unpacked.
#[derive(Debug, Clone)]
pub(crate) struct LoopSite {
    pub site: StmtSite,
    pub iter: Sym,
    pub hi: Expr,
    pub body: Block,
    pub kind: LoopKind,
}

pub(crate) fn select_loop(proc: &Procedure, selector: &str) -> Result<LoopSite> {
    let site = Pattern::for_loop(selector).context(IrSnafu)?.select_stmt(proc).context(IrSnafu)?;
    match site.get(proc.body()).context(IrSnafu)? {
        Stmt::For { iter, hi, body, kind } => {
            Ok(LoopSite { site, iter: iter.clone(), hi: hi.clone(), body: body.clone(), kind: *kind })
        }
        other => precondition("select_loop", format!("expected a loop, found: {}", other.summary())),
    }
}

/// Every name a procedure uses: parameters, locals, loop variables.
pub(crate) fn all_names(proc: &Procedure) -> BTreeSet<Sym> {
    let mut names = block_names(proc.body());
    names.extend(proc.params().iter().map(|p| p.name.clone()));
    names
}

pub(crate) fn ensure_fresh(proc: &Procedure, transform: &'static str, name: &Sym) -> Result<()> {
    if all_names(proc).contains(name) {
        return precondition(transform, format!("name {name} is already in use"));
    }
    Ok(())
}

/// Parse a size or index expression given as text.
pub(crate) fn parse_index(text: &str) -> Result<Expr> {
    parse_expr(text, &ParseContext::new()).context(IrSnafu)
}

/// Names in scope and facts holding just before the statement at `site`.
pub(crate) struct Scope {
    pub env: Env,
    pub facts: Facts,
}

impl Scope {
    pub fn at(proc: &Procedure, site: &StmtSite) -> Self {
        let def = proc.def();
        let mut env = Env::for_params(def);
        let mut facts = entry_facts(def, &env, &CheckConfig::from_env());
        let mut block = proc.body();
        for &(index, branch) in &site.path {
            bind_allocs(&mut env, &block[..index.min(block.len())]);
            match (block.get(index), branch) {
                (Some(Stmt::For { iter, hi, body, .. }), _) => {
                    match env.affine(hi) {
                        Some(hi) => facts.bind_loop(iter, &hi),
                        None => facts.declare(iter),
                    }
                    env.bind_loop(iter);
                    block = body;
                }
                (Some(Stmt::If { cond, body, orelse }), branch) => {
                    if let Some(pred) = env.pred(cond) {
                        facts.assume(&if branch == Branch::Body { pred } else { pred.negate() });
                    }
                    block = if branch == Branch::Body { body } else { orelse };
                }
                _ => break,
            }
        }
        bind_allocs(&mut env, &block[..site.index.min(block.len())]);
        Self { env, facts }
    }

    pub fn affine(&self, expr: &Expr) -> Option<Affine> {
        self.env.affine(expr)
    }
}

fn bind_allocs(env: &mut Env, stmts: &[Stmt]) {
    for stmt in stmts {
        if let Stmt::Alloc { name, ty, mem } = stmt {
            env.bind(name.clone(), ty.clone(), mem.clone(), BindingKind::Alloc);
        }
    }
}

/// Allocation pattern from a bare name (`"x"`, `"x #1"`) or a full
/// `x : _` pattern.
pub(crate) fn alloc_pattern(selector: &str) -> String {
    if selector.contains(':') {
        return selector.to_string();
    }
    match selector.split_once('#') {
        Some((name, ordinal)) => format!("{} : _ #{}", name.trim(), ordinal.trim()),
        None => format!("{} : _", selector.trim()),
    }
}

/// The allocation picked by `selector`.
pub(crate) fn select_alloc(proc: &Procedure, selector: &str, transform: &'static str) -> Result<(StmtSite, Stmt)> {
    let (site, stmt) = select_stmt(proc, &alloc_pattern(selector))?;
    if !matches!(stmt, Stmt::Alloc { .. }) {
        return precondition(transform, format!("expected an allocation, found: {}", stmt.summary()));
    }
    Ok((site, stmt))
}

/// Replace every occurrence of `target` in `expr`.
pub(crate) fn replace_equal(expr: &Expr, target: &Expr, with: &Expr) -> Expr {
    if expr == target { with.clone() } else { expr.map_children(&mut |child| replace_equal(child, target, with)) }
}
