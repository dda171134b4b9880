//! Traversal helpers: children, substitution, renaming, read/write sets.

use std::collections::{BTreeSet, HashMap};

use crate::config::ConfigField;
use crate::expr::{Expr, WindowDim};
use crate::stmt::{Block, Stmt};
use crate::types::{Sym, Type};

impl Expr {
    /// Direct sub-expressions, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Read { idx, .. } => idx.iter().collect(),
            Expr::Unary { arg, .. } => vec![arg],
            Expr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::Window { dims, .. } => dims
                .iter()
                .flat_map(|dim| match dim {
                    WindowDim::Point(pt) => vec![pt],
                    WindowDim::Interval(lo, hi) => vec![lo, hi],
                })
                .collect(),
            Expr::Const(_) | Expr::StrideOf { .. } | Expr::ReadConfig { .. } => Vec::new(),
        }
    }

    /// Rebuild with every direct child passed through `f`.
    pub fn map_children(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
        match self {
            Expr::Read { name, idx } => Expr::Read { name: name.clone(), idx: idx.iter().map(&mut *f).collect() },
            Expr::Unary { op, arg } => Expr::Unary { op: *op, arg: Box::new(f(arg)) },
            Expr::Binary { op, lhs, rhs } => Expr::binary(*op, f(lhs), f(rhs)),
            Expr::Window { buf, dims } => Expr::Window {
                buf: buf.clone(),
                dims: dims
                    .iter()
                    .map(|dim| match dim {
                        WindowDim::Point(pt) => WindowDim::Point(f(pt)),
                        WindowDim::Interval(lo, hi) => WindowDim::Interval(f(lo), f(hi)),
                    })
                    .collect(),
            },
            other => other.clone(),
        }
    }

    /// Child at `path`, following [`Expr::children`] positions.
    pub fn at_path(&self, path: &[usize]) -> Option<&Expr> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => self.children().get(i).and_then(|child| child.at_path(rest)),
        }
    }

    /// Replace the sub-expression at `path`.
    pub fn replace_at(&self, path: &[usize], new: &Expr) -> Expr {
        match path.split_first() {
            None => new.clone(),
            Some((&target, rest)) => {
                let mut position = 0;
                self.map_children(&mut |child| {
                    let out = if position == target { child.replace_at(rest, new) } else { child.clone() };
                    position += 1;
                    out
                })
            }
        }
    }

    /// Substitute scalar variables.
    pub fn subst(&self, map: &HashMap<Sym, Expr>) -> Expr {
        match self {
            Expr::Read { name, idx } if idx.is_empty() => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            _ => self.map_children(&mut |child| child.subst(map)),
        }
    }

    /// Rename every occurrence of a name, buffers included.
    pub fn rename(&self, map: &HashMap<Sym, Sym>) -> Expr {
        let lookup = |name: &Sym| map.get(name).cloned().unwrap_or_else(|| name.clone());
        match self {
            Expr::Read { name, idx } => {
                Expr::Read { name: lookup(name), idx: idx.iter().map(|e| e.rename(map)).collect() }
            }
            Expr::StrideOf { buf, dim } => Expr::StrideOf { buf: lookup(buf), dim: *dim },
            Expr::Window { buf, .. } => match self.map_children(&mut |child| child.rename(map)) {
                Expr::Window { dims, .. } => Expr::Window { buf: lookup(buf), dims },
                other => other,
            },
            _ => self.map_children(&mut |child| child.rename(map)),
        }
    }

    /// Every name this expression mentions.
    pub fn collect_names(&self, out: &mut BTreeSet<Sym>) {
        match self {
            Expr::Read { name, .. } => {
                out.insert(name.clone());
            }
            Expr::StrideOf { buf, .. } | Expr::Window { buf, .. } => {
                out.insert(buf.clone());
            }
            _ => {}
        }
        for child in self.children() {
            child.collect_names(out);
        }
    }

    pub fn names(&self) -> BTreeSet<Sym> {
        let mut out = BTreeSet::new();
        self.collect_names(&mut out);
        out
    }

    pub fn mentions(&self, name: &Sym) -> bool {
        match self {
            Expr::Read { name: read, .. } if read == name => true,
            Expr::StrideOf { buf, .. } | Expr::Window { buf, .. } if buf == name => true,
            _ => self.children().into_iter().any(|child| child.mentions(name)),
        }
    }

    /// Config fields read anywhere inside.
    pub fn collect_config_reads(&self, out: &mut BTreeSet<ConfigField>) {
        if let Expr::ReadConfig { config, field } = self {
            out.insert(ConfigField::new(config, field));
        }
        for child in self.children() {
            child.collect_config_reads(out);
        }
    }

    /// First config read in pre-order, if any.
    pub fn find_config_read(&self) -> Option<&Expr> {
        if matches!(self, Expr::ReadConfig { .. }) {
            return Some(self);
        }
        self.children().into_iter().find_map(Expr::find_config_read)
    }

    /// Number of nodes, used to bound work in searches.
    pub fn node_count(&self) -> usize {
        1 + self.children().into_iter().map(Expr::node_count).sum::<usize>()
    }
}

impl Type {
    pub fn map_exprs(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Type {
        match self {
            Type::Scalar(dtype) => Type::Scalar(*dtype),
            Type::Tensor(tensor) => {
                let mut tensor = tensor.clone();
                tensor.shape = tensor.shape.iter().map(&mut *f).collect();
                Type::Tensor(tensor)
            }
        }
    }
}

impl Stmt {
    /// Rebuild with every top-level expression passed through `f`, in
    /// [`Stmt::exprs`] order. Child blocks are kept as they are.
    pub fn map_exprs(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Stmt {
        match self {
            Stmt::Assign { name, idx, rhs } => {
                let idx = idx.iter().map(&mut *f).collect();
                Stmt::Assign { name: name.clone(), idx, rhs: f(rhs) }
            }
            Stmt::Reduce { name, idx, rhs } => {
                let idx = idx.iter().map(&mut *f).collect();
                Stmt::Reduce { name: name.clone(), idx, rhs: f(rhs) }
            }
            Stmt::WriteConfig { config, field, rhs } => {
                Stmt::WriteConfig { config: config.clone(), field: field.clone(), rhs: f(rhs) }
            }
            Stmt::Pass => Stmt::Pass,
            Stmt::If { cond, body, orelse } => Stmt::If { cond: f(cond), body: body.clone(), orelse: orelse.clone() },
            Stmt::For { iter, hi, body, kind } => {
                Stmt::For { iter: iter.clone(), hi: f(hi), body: body.clone(), kind: *kind }
            }
            Stmt::Alloc { name, ty, mem } => Stmt::Alloc { name: name.clone(), ty: ty.map_exprs(f), mem: mem.clone() },
            Stmt::Call { proc, args } => Stmt::Call { proc: proc.clone(), args: args.iter().map(&mut *f).collect() },
        }
    }

    /// Rebuild with every child block passed through `f`.
    pub fn map_blocks(&self, f: &mut impl FnMut(&Block) -> Block) -> Stmt {
        match self {
            Stmt::If { cond, body, orelse } => {
                let body = f(body);
                let orelse = if orelse.is_empty() { Vec::new() } else { f(orelse) };
                Stmt::If { cond: cond.clone(), body, orelse }
            }
            Stmt::For { iter, hi, body, kind } => {
                Stmt::For { iter: iter.clone(), hi: hi.clone(), body: f(body), kind: *kind }
            }
            other => other.clone(),
        }
    }

    /// Deep expression rewrite over this statement and every nested one.
    pub fn map_exprs_deep(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Stmt {
        self.map_exprs(f).map_blocks(&mut |block| block.iter().map(|s| s.map_exprs_deep(f)).collect())
    }
}

/// Substitute scalar variables in every expression of a block.
pub fn subst_block(block: &Block, map: &HashMap<Sym, Expr>) -> Block {
    block.iter().map(|stmt| stmt.map_exprs_deep(&mut |e| e.subst(map))).collect()
}

/// Rename names everywhere in a block: reads, targets, allocations and loop
/// variables.
pub fn rename_block(block: &Block, map: &HashMap<Sym, Sym>) -> Block {
    let lookup = |name: &Sym| map.get(name).cloned().unwrap_or_else(|| name.clone());
    block
        .iter()
        .map(|stmt| {
            let stmt = stmt.map_exprs(&mut |e| e.rename(map)).map_blocks(&mut |b| rename_block(b, map));
            match stmt {
                Stmt::Assign { name, idx, rhs } => Stmt::Assign { name: lookup(&name), idx, rhs },
                Stmt::Reduce { name, idx, rhs } => Stmt::Reduce { name: lookup(&name), idx, rhs },
                Stmt::For { iter, hi, body, kind } => Stmt::For { iter: lookup(&iter), hi, body, kind },
                Stmt::Alloc { name, ty, mem } => Stmt::Alloc { name: lookup(&name), ty, mem },
                other => other,
            }
        })
        .collect()
}

/// Visit every statement in pre-order.
pub fn walk_stmts<'a>(block: &'a [Stmt], f: &mut impl FnMut(&'a Stmt)) {
    for stmt in block {
        f(stmt);
        for child in stmt.blocks() {
            walk_stmts(child, f);
        }
    }
}

/// Names written by a block: assignment targets and buffers passed to callee
/// parameters the callee writes.
pub fn block_writes(block: &[Stmt]) -> BTreeSet<Sym> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| match stmt {
        Stmt::Assign { name, .. } | Stmt::Reduce { name, .. } => {
            out.insert(name.clone());
        }
        Stmt::Call { proc, args } => {
            let written = block_writes(proc.body());
            for (param, arg) in proc.params().iter().zip(args) {
                if written.contains(&param.name) {
                    match arg {
                        Expr::Read { name, .. } | Expr::Window { buf: name, .. } => {
                            out.insert(name.clone());
                        }
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    });
    out
}

/// Every name mentioned in a block's expressions, including assignment
/// targets.
pub fn block_names(block: &[Stmt]) -> BTreeSet<Sym> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| {
        for expr in stmt.exprs() {
            expr.collect_names(&mut out);
        }
        match stmt {
            Stmt::Assign { name, .. } | Stmt::Reduce { name, .. } | Stmt::Alloc { name, .. } => {
                out.insert(name.clone());
            }
            Stmt::For { iter, .. } => {
                out.insert(iter.clone());
            }
            _ => {}
        }
    });
    out
}

/// Names read by a block (everything mentioned in expressions except
/// assignment targets themselves).
pub fn block_reads(block: &[Stmt]) -> BTreeSet<Sym> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| {
        for expr in stmt.exprs() {
            expr.collect_names(&mut out);
        }
        if let Stmt::Reduce { name, .. } = stmt {
            out.insert(name.clone());
        }
    });
    out
}

/// Config fields written anywhere in a block, callees included.
pub fn block_config_writes(block: &[Stmt]) -> BTreeSet<ConfigField> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| match stmt {
        Stmt::WriteConfig { config, field, .. } => {
            out.insert(ConfigField::new(config, field));
        }
        Stmt::Call { proc, .. } => out.extend(block_config_writes(proc.body())),
        _ => {}
    });
    out
}

/// Config fields read anywhere in a block, callees included.
pub fn block_config_reads(block: &[Stmt]) -> BTreeSet<ConfigField> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| {
        for expr in stmt.exprs() {
            expr.collect_config_reads(&mut out);
        }
        if let Stmt::Call { proc, .. } = stmt {
            out.extend(block_config_reads(proc.body()));
        }
    });
    out
}

/// Names declared inside a block (allocations and loop variables).
pub fn block_decls(block: &[Stmt]) -> BTreeSet<Sym> {
    let mut out = BTreeSet::new();
    walk_stmts(block, &mut |stmt| match stmt {
        Stmt::Alloc { name, .. } => {
            out.insert(name.clone());
        }
        Stmt::For { iter, .. } => {
            out.insert(iter.clone());
        }
        _ => {}
    });
    out
}
