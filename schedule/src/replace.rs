//! Replacing code regions by calls to equivalent instructions.
//!
//! The instruction body is unified statement by statement with the region
//! starting at the selected statement. Unification renames the instruction's
//! loop variables and locals to the region's, binds control parameters to
//! caller expressions, numeric scalar parameters to caller locations and
//! tensor parameters to windows whose offsets are solved from the affine
//! index expressions on both sides.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use kiln_ir::check::BindingKind;
use kiln_ir::pattern::StmtSite;
use kiln_ir::pattern::site::rewrite_block;
use kiln_ir::sint::{Affine, Atom};
use kiln_ir::visit::{block_names, walk_stmts};
use kiln_ir::{Expr, Param, Pattern, Procedure, Stmt, Sym, Type, WindowDim};
use snafu::ResultExt;

use crate::common::*;
use crate::error::*;

/// Replace the region starting at the matched statement with a call to
/// `instr`.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), instr = %instr.name(), pattern = %pattern))]
pub fn replace(proc: &Procedure, instr: &Procedure, pattern: &str) -> Result<Procedure> {
    let (site, _) = select_stmt(proc, pattern)?;
    replace_at(proc, instr, &site)
}

/// Replace every matching region that unifies with `instr`. Sites that do
/// not unify are skipped; it is an error only when none does.
#[tracing::instrument(skip_all, fields(proc = %proc.name(), instr = %instr.name(), pattern = %pattern))]
pub fn replace_all(proc: &Procedure, instr: &Procedure, pattern: &str) -> Result<Procedure> {
    let sites = Pattern::parse(pattern).context(IrSnafu)?.stmt_sites(proc).context(IrSnafu)?;
    let mut current = proc.clone();
    let mut replaced = 0;
    // Later sites first, so earlier sites keep their positions.
    for site in sites.iter().rev() {
        match replace_at(&current, instr, site) {
            Ok(next) => {
                current = next;
                replaced += 1;
            }
            Err(error) => tracing::debug!(?site, %error, "site skipped"),
        }
    }
    if replaced == 0 {
        return ReplacementEquivalenceSnafu {
            instr: instr.name().to_string(),
            message: format!("none of the {} sites matching '{pattern}' unifies", sites.len()),
        }
        .fail();
    }
    tracing::debug!(replaced, sites = sites.len(), "instruction substituted");
    Ok(current)
}

fn replace_at(proc: &Procedure, instr: &Procedure, site: &StmtSite) -> Result<Procedure> {
    let block = site.block(proc.body()).cloned().unwrap_or_default();
    let len = instr.body().len();
    if site.index + len > block.len() {
        return mismatch(instr, format!("instruction has {len} statements, only {} follow", block.len() - site.index));
    }
    let region = &block[site.index..site.index + len];
    let scope = Scope::at(proc, site);
    let mut unifier = Unifier::new(instr, &scope);
    unifier.block(instr.body(), region)?;
    let args = unifier.arguments()?;

    let used_after = block_names(&block[site.index + len..]);
    let escaping = region.iter().find_map(|stmt| match stmt {
        Stmt::Alloc { name, .. } if used_after.contains(name) => Some(name),
        _ => None,
    });
    if let Some(local) = escaping {
        return mismatch(instr, format!("{local} is allocated in the region and used after it"));
    }

    let call = Stmt::call(instr, args);
    tracing::trace!(call = %call.summary(), "region unified");
    let (start, end) = (site.index, site.index + len);
    let body = rewrite_block(proc.body(), &site.path, |block| {
        let mut out = block[..start].to_vec();
        out.push(call);
        out.extend_from_slice(&block[end..]);
        Ok(out)
    })
    .context(IrSnafu)?;
    rebuild(proc, body, "replace")
}

fn mismatch<T>(instr: &Procedure, message: impl Into<String>) -> Result<T> {
    ReplacementEquivalenceSnafu { instr: instr.name().to_string(), message: message.into() }.fail()
}

/// One dimension of the caller buffer bound to a tensor parameter.
#[derive(Debug, Clone, PartialEq)]
enum BoundDim {
    /// Fixed coordinate; not visible to the instruction.
    Point(Affine),
    /// Dimension seen by the instruction, starting at this offset.
    Kept(Affine),
}

#[derive(Debug, Clone, PartialEq)]
struct WindowBinding {
    buf: Sym,
    dims: Vec<BoundDim>,
}

struct Unifier<'a> {
    instr: &'a Procedure,
    scope: &'a Scope,
    loop_vars: BTreeSet<Sym>,
    /// Instruction loop variables and allocations to the region's.
    locals: HashMap<Sym, Sym>,
    /// Control and numeric scalar parameters to caller expressions.
    values: HashMap<Sym, Expr>,
    windows: HashMap<Sym, WindowBinding>,
}

impl<'a> Unifier<'a> {
    fn new(instr: &'a Procedure, scope: &'a Scope) -> Self {
        let mut loop_vars = BTreeSet::new();
        walk_stmts(instr.body(), &mut |stmt| {
            if let Stmt::For { iter, .. } = stmt {
                loop_vars.insert(iter.clone());
            }
        });
        Self { instr, scope, loop_vars, locals: HashMap::new(), values: HashMap::new(), windows: HashMap::new() }
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T> {
        mismatch(self.instr, message)
    }

    fn param(&self, name: &Sym) -> Option<&'a Param> {
        self.instr.def().param(name)
    }

    fn region_locals(&self) -> BTreeSet<Sym> {
        self.locals.values().cloned().collect()
    }

    fn bind_local(&mut self, ours: &Sym, theirs: &Sym) -> Result<()> {
        match self.locals.get(ours) {
            Some(bound) if bound == theirs => Ok(()),
            Some(bound) => self.fail(format!("{ours} is bound to {bound}, found {theirs}")),
            None if self.locals.values().any(|bound| bound == theirs) => {
                self.fail(format!("{theirs} is bound to two different instruction names"))
            }
            None => {
                self.locals.insert(ours.clone(), theirs.clone());
                Ok(())
            }
        }
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn block(&mut self, ours: &[Stmt], theirs: &[Stmt]) -> Result<()> {
        if ours.len() != theirs.len() {
            return self.fail(format!("expected a block of {} statements, found {}", ours.len(), theirs.len()));
        }
        ours.iter().zip(theirs).try_for_each(|(a, b)| self.stmt(a, b))
    }

    fn stmt(&mut self, ours: &Stmt, theirs: &Stmt) -> Result<()> {
        match (ours, theirs) {
            (
                Stmt::Assign { name, idx, rhs },
                Stmt::Assign { name: their_name, idx: their_idx, rhs: their_rhs },
            )
            | (
                Stmt::Reduce { name, idx, rhs },
                Stmt::Reduce { name: their_name, idx: their_idx, rhs: their_rhs },
            ) => {
                self.access(name, idx, their_name, their_idx)?;
                self.expr(rhs, their_rhs)
            }
            (
                Stmt::WriteConfig { config, field, rhs },
                Stmt::WriteConfig { config: their_config, field: their_field, rhs: their_rhs },
            ) if config.name() == their_config.name() && field == their_field => self.expr(rhs, their_rhs),
            (Stmt::Pass, Stmt::Pass) => Ok(()),
            (
                Stmt::If { cond, body, orelse },
                Stmt::If { cond: their_cond, body: their_body, orelse: their_orelse },
            ) => {
                self.expr(cond, their_cond)?;
                self.block(body, their_body)?;
                self.block(orelse, their_orelse)
            }
            (
                Stmt::For { iter, hi, body, kind },
                Stmt::For { iter: their_iter, hi: their_hi, body: their_body, kind: their_kind },
            ) => {
                if kind != their_kind {
                    return self.fail(format!("expected a {kind} loop, found {}", theirs.summary()));
                }
                self.index(hi, their_hi)?;
                self.bind_local(iter, their_iter)?;
                self.block(body, their_body)
            }
            (
                Stmt::Alloc { name, ty, mem },
                Stmt::Alloc { name: their_name, ty: their_ty, mem: their_mem },
            ) => {
                if ty.elem() != their_ty.elem() || ty.rank() != their_ty.rank() || mem != their_mem {
                    return self.fail(format!("expected `{}`, found `{}`", ours.summary(), theirs.summary()));
                }
                if let (Some(a), Some(b)) = (ty.as_tensor(), their_ty.as_tensor()) {
                    a.shape.iter().zip(&b.shape).try_for_each(|(x, y)| self.index(x, y))?;
                }
                self.bind_local(name, their_name)
            }
            (Stmt::Call { proc, args }, Stmt::Call { proc: their_proc, args: their_args })
                if proc.name() == their_proc.name() =>
            {
                args.iter().zip(their_args).try_for_each(|(a, b)| self.call_arg(a, b))
            }
            _ => self.fail(format!("expected `{}`, found `{}`", ours.summary(), theirs.summary())),
        }
    }

    /// Assignment target or element read.
    fn access(&mut self, name: &Sym, idx: &[Expr], their_name: &Sym, their_idx: &[Expr]) -> Result<()> {
        match self.param(name) {
            Some(param) if param.ty.is_tensor() => self.bind_window(param, idx, their_name, their_idx),
            Some(param) => {
                let location = Expr::read(their_name.clone(), their_idx.iter().cloned());
                self.bind_value(&param.name, &location)
            }
            None => {
                self.bind_local(name, their_name)?;
                if idx.len() != their_idx.len() {
                    let (n, m) = (idx.len(), their_idx.len());
                    return self.fail(format!("{name} is indexed with {n} indices, found {m}"));
                }
                idx.iter().zip(their_idx).try_for_each(|(a, b)| self.index(a, b))
            }
        }
    }

    fn call_arg(&mut self, ours: &Expr, theirs: &Expr) -> Result<()> {
        match (ours, theirs) {
            (Expr::Window { buf, dims }, Expr::Window { buf: their_buf, dims: their_dims })
                if self.param(buf).is_none() && dims.len() == their_dims.len() =>
            {
                self.bind_local(buf, their_buf)?;
                dims.iter().zip(their_dims).try_for_each(|pair| match pair {
                    (WindowDim::Point(a), WindowDim::Point(b)) => self.index(a, b),
                    (WindowDim::Interval(a_lo, a_hi), WindowDim::Interval(b_lo, b_hi)) => {
                        self.index(a_lo, b_lo)?;
                        self.index(a_hi, b_hi)
                    }
                    _ => self.fail(format!("expected `{ours}`, found `{theirs}`")),
                })
            }
            (Expr::Window { .. }, _) => self.fail(format!("cannot unify window argument `{ours}` with `{theirs}`")),
            _ => self.expr(ours, theirs),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// Whether an instruction expression is an integer expression over loop
    /// variables and control parameters.
    fn is_index(&self, expr: &Expr) -> bool {
        Affine::from_expr(expr).is_some()
            && expr.names().iter().all(|name| match self.param(name) {
                Some(param) => param.ty.is_indexable(),
                None => self.loop_vars.contains(name),
            })
    }

    fn expr(&mut self, ours: &Expr, theirs: &Expr) -> Result<()> {
        if self.is_index(ours) {
            return self.index(ours, theirs);
        }
        match (ours, theirs) {
            (Expr::Read { name, idx }, Expr::Read { name: their_name, idx: their_idx }) => {
                match self.param(name) {
                    Some(param) if !param.ty.is_data() => self.bind_value(name, theirs),
                    _ => self.access(name, idx, their_name, their_idx),
                }
            }
            (Expr::Read { name, idx }, _) if idx.is_empty() && self.param(name).is_some_and(|p| !p.ty.is_data()) => {
                self.bind_value(name, theirs)
            }
            (Expr::Const(a), Expr::Const(b)) if a == b => Ok(()),
            (Expr::Unary { op, arg }, Expr::Unary { op: their_op, arg: their_arg }) if op == their_op => {
                self.expr(arg, their_arg)
            }
            (Expr::Binary { op, lhs, rhs }, Expr::Binary { op: their_op, lhs: their_lhs, rhs: their_rhs })
                if op == their_op =>
            {
                self.expr(lhs, their_lhs)?;
                self.expr(rhs, their_rhs)
            }
            (Expr::ReadConfig { config, field }, Expr::ReadConfig { config: their_config, field: their_field })
                if config.name() == their_config.name() && field == their_field =>
            {
                Ok(())
            }
            (Expr::StrideOf { buf, dim }, Expr::StrideOf { buf: their_buf, dim: their_dim }) => {
                match self.windows.get(buf) {
                    Some(binding) if &binding.buf == their_buf && kept_source(binding, *dim) == Some(*their_dim) => {
                        Ok(())
                    }
                    _ => self.fail(format!("expected `{ours}`, found `{theirs}`")),
                }
            }
            _ => self.fail(format!("expected `{ours}`, found `{theirs}`")),
        }
    }

    fn bind_value(&mut self, name: &Sym, theirs: &Expr) -> Result<()> {
        let Some(param) = self.param(name) else {
            return self.fail(format!("{name} is not a parameter"));
        };
        if param.ty.is_data() && !matches!(theirs, Expr::Read { .. }) {
            return self.fail(format!("{name} needs a location, found `{theirs}`"));
        }
        let locals = self.region_locals();
        if theirs.names().iter().any(|n| locals.contains(n)) {
            return self.fail(format!("{name} would depend on a variable of the region: `{theirs}`"));
        }
        match self.values.get(name) {
            Some(bound) if bound == theirs => Ok(()),
            Some(bound) => match (Affine::from_expr(bound), Affine::from_expr(theirs)) {
                (Some(a), Some(b)) if a == b && !param.ty.is_data() => Ok(()),
                _ => self.fail(format!("{name} is bound to `{bound}`, found `{theirs}`")),
            },
            None => {
                self.values.insert(name.clone(), theirs.clone());
                Ok(())
            }
        }
    }

    /// Instruction index expression translated into caller terms.
    fn translate(&self, expr: &Expr) -> Result<Affine> {
        let Some(affine) = Affine::from_expr(expr) else {
            return self.fail(format!("`{expr}` is not an index expression"));
        };
        let mut map = HashMap::new();
        for var in affine.vars() {
            if let Some(local) = self.locals.get(&var) {
                map.insert(var, Affine::var(local.clone()));
            } else if let Some(value) = self.values.get(&var) {
                let Some(value) = Affine::from_expr(value) else {
                    return self.fail(format!("{var} is bound to a non-index expression"));
                };
                map.insert(var, value);
            } else if self.param(&var).is_some() {
                return self.fail(format!("cannot determine {var} from `{expr}`"));
            }
        }
        Ok(affine.subst(&map))
    }

    fn unbound(&self, affine: &Affine) -> Vec<Sym> {
        affine
            .vars()
            .into_iter()
            .filter(|var| !self.locals.contains_key(var) && !self.values.contains_key(var) && self.param(var).is_some())
            .collect()
    }

    /// Unify integer expressions, solving for one unknown control parameter
    /// appearing with coefficient 1.
    fn index(&mut self, ours: &Expr, theirs: &Expr) -> Result<()> {
        let (Some(affine), Some(target)) = (Affine::from_expr(ours), Affine::from_expr(theirs)) else {
            return self.fail(format!("expected `{ours}`, found `{theirs}`"));
        };
        match self.unbound(&affine).as_slice() {
            [] => {
                let translated = self.translate(ours)?;
                if translated == target {
                    Ok(())
                } else {
                    self.fail(format!("expected `{}`, found `{theirs}`", translated.to_expr()))
                }
            }
            [var] if ours.as_var() == Some(var) => self.bind_value(var, theirs),
            [var] if affine.coeff(&Atom::Var(var.clone())) == 1 => {
                let rest = affine.without(&Atom::Var(var.clone()));
                if rest.vars().contains(var) {
                    return self.fail(format!("cannot solve `{ours}` for {var}"));
                }
                let rest = self.translate(&rest.to_expr())?;
                self.bind_value(var, &target.sub(&rest).to_expr())
            }
            unknown => self.fail(format!("cannot solve `{ours}` for {}", unknown.iter().join(", "))),
        }
    }

    // ========================================================================
    // WINDOWS
    // ========================================================================

    fn bind_window(&mut self, param: &Param, idx: &[Expr], buf: &Sym, their_idx: &[Expr]) -> Result<()> {
        let rank = idx.len();
        let locals = self.region_locals();
        let depends = |e: &Expr| e.names().iter().any(|n| locals.contains(n));
        let kept: Vec<usize> = if their_idx.len() == rank {
            (0..rank).collect()
        } else {
            (0..their_idx.len()).filter(|&d| depends(&their_idx[d])).collect()
        };
        if kept.len() != rank {
            return self.fail(format!(
                "cannot align {}[{}] with {buf}[{}]",
                param.name,
                idx.iter().join(", "),
                their_idx.iter().join(", ")
            ));
        }

        let mut dims = Vec::with_capacity(their_idx.len());
        let mut next = 0;
        for (d, their) in their_idx.iter().enumerate() {
            let Some(their_affine) = Affine::from_expr(their) else {
                return self.fail(format!("`{their}` is not an index expression"));
            };
            if kept.get(next) == Some(&d) {
                let offset = their_affine.sub(&self.translate(&idx[next])?);
                if offset.vars().iter().any(|v| locals.contains(v)) {
                    return self.fail(format!("`{their}` is not a fixed offset from `{}`", idx[next]));
                }
                dims.push(BoundDim::Kept(offset));
                next += 1;
            } else {
                dims.push(BoundDim::Point(their_affine));
            }
        }

        let binding = WindowBinding { buf: buf.clone(), dims };
        match self.windows.get(&param.name) {
            Some(bound) if *bound == binding => Ok(()),
            Some(bound) => self.fail(format!(
                "{} is accessed through both {} and {} windows at different offsets",
                param.name, bound.buf, binding.buf
            )),
            None => {
                self.windows.insert(param.name.clone(), binding);
                Ok(())
            }
        }
    }

    // ========================================================================
    // ARGUMENTS
    // ========================================================================

    fn arguments(&self) -> Result<Vec<Expr>> {
        self.instr.params().iter().map(|param| self.argument(param)).collect()
    }

    fn argument(&self, param: &Param) -> Result<Expr> {
        if let Type::Tensor(tensor) = &param.ty {
            let Some(binding) = self.windows.get(&param.name) else {
                return self.fail(format!("parameter {} could not be determined", param.name));
            };
            self.check_space(param, &binding.buf)?;
            let extents =
                tensor.shape.iter().map(|extent| self.translate(extent)).collect::<Result<Vec<Affine>>>()?;
            return Ok(self.window_arg(binding, &extents));
        }
        match self.values.get(&param.name) {
            Some(value) => {
                if let Expr::Read { name, .. } = value
                    && param.ty.is_data()
                {
                    self.check_space(param, name)?;
                }
                Ok(value.clone())
            }
            None => self.fail(format!("parameter {} could not be determined", param.name)),
        }
    }

    /// Procedure parameters cannot move between spaces, so an argument in
    /// the wrong one never becomes legal. Allocations can still be moved with
    /// `set_memory`.
    fn check_space(&self, param: &Param, buf: &Sym) -> Result<()> {
        match self.scope.env.get(buf) {
            Some(binding) if binding.kind == BindingKind::Param && binding.mem != param.space() => self.fail(format!(
                "{buf} @ {} cannot be passed to {} @ {}",
                binding.mem,
                param.name,
                param.space()
            )),
            _ => Ok(()),
        }
    }

    fn window_arg(&self, binding: &WindowBinding, extents: &[Affine]) -> Expr {
        let whole = self.scope.env.tensor(&binding.buf).is_some_and(|tensor| {
            !tensor.window
                && tensor.rank() == binding.dims.len()
                && binding.dims.iter().zip(&tensor.shape).zip(extents).all(|((dim, full), extent)| {
                    matches!(dim, BoundDim::Kept(offset) if offset.as_const() == Some(0))
                        && Affine::from_expr(full).as_ref() == Some(extent)
                })
        });
        if whole {
            return Expr::var(binding.buf.clone());
        }
        let mut extents = extents.iter();
        let dims = binding
            .dims
            .iter()
            .map(|dim| match dim {
                BoundDim::Point(at) => WindowDim::Point(at.to_expr()),
                BoundDim::Kept(offset) => {
                    let extent = extents.next().cloned().unwrap_or_default();
                    WindowDim::Interval(offset.to_expr(), offset.add(&extent).to_expr())
                }
            })
            .collect();
        Expr::Window { buf: binding.buf.clone(), dims }
    }
}

/// Caller dimension behind the instruction's `dim`-th window dimension.
fn kept_source(binding: &WindowBinding, dim: usize) -> Option<usize> {
    binding.dims.iter().enumerate().filter(|(_, d)| matches!(d, BoundDim::Kept(_))).nth(dim).map(|(i, _)| i)
}
