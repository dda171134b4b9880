//! Match handles: positions of statements and expressions inside a body.

use crate::error::*;
use crate::expr::Expr;
use crate::stmt::{Block, Stmt};

/// Which child block of an enclosing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Loop body or `if` then-block.
    Body,
    /// `if` else-block.
    Orelse,
}

/// A statement position: the chain of enclosing statements, then the index
/// inside the innermost block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StmtSite {
    pub path: Vec<(usize, Branch)>,
    pub index: usize,
}

/// An expression position: statement, top-level expression slot in
/// [`Stmt::exprs`] order, then child positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprSite {
    pub stmt: StmtSite,
    pub slot: usize,
    pub path: Vec<usize>,
}

fn child_block(stmt: &Stmt, branch: Branch) -> Option<&Block> {
    match (stmt, branch) {
        (Stmt::For { body, .. } | Stmt::If { body, .. }, Branch::Body) => Some(body),
        (Stmt::If { orelse, .. }, Branch::Orelse) => Some(orelse),
        _ => None,
    }
}

fn stale(path: &[(usize, Branch)]) -> Error {
    Error::InvalidPattern { pattern: format!("{path:?}"), message: "site does not exist in this body".to_string() }
}

impl StmtSite {
    pub fn root(index: usize) -> Self {
        Self { path: Vec::new(), index }
    }

    /// Site of the `index`-th statement in a child block of this statement.
    pub fn child(&self, branch: Branch, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push((self.index, branch));
        Self { path, index }
    }

    /// Site of the enclosing statement, if any.
    pub fn parent(&self) -> Option<Self> {
        let (&(index, _), rest) = self.path.split_last()?;
        Some(Self { path: rest.to_vec(), index })
    }

    pub fn with_index(&self, index: usize) -> Self {
        Self { path: self.path.clone(), index }
    }

    /// Number of enclosing statements.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Block holding this statement.
    pub fn block<'a>(&self, body: &'a Block) -> Option<&'a Block> {
        let mut block = body;
        for &(index, branch) in &self.path {
            block = child_block(block.get(index)?, branch)?;
        }
        Some(block)
    }

    pub fn stmt<'a>(&self, body: &'a Block) -> Option<&'a Stmt> {
        self.block(body)?.get(self.index)
    }

    pub fn get<'a>(&self, body: &'a Block) -> Result<&'a Stmt> {
        self.stmt(body).ok_or_else(|| stale(&self.path))
    }

    /// Enclosing statements, outermost first.
    pub fn ancestors<'a>(&self, body: &'a Block) -> Vec<&'a Stmt> {
        let mut out = Vec::new();
        let mut block = body;
        for &(index, branch) in &self.path {
            let Some(stmt) = block.get(index) else { break };
            out.push(stmt);
            match child_block(stmt, branch) {
                Some(child) => block = child,
                None => break,
            }
        }
        out
    }

    /// Whether `self` lies inside the statement at `other`.
    pub fn is_inside(&self, other: &StmtSite) -> bool {
        self.path.len() > other.path.len()
            && self.path[..other.path.len()] == other.path[..]
            && self.path[other.path.len()].0 == other.index
    }
}

/// Rebuild `body` with the block at `path` replaced by `f(block)`.
pub fn rewrite_block(
    body: &Block,
    path: &[(usize, Branch)],
    f: impl FnOnce(&Block) -> Result<Block>,
) -> Result<Block> {
    let Some((&(index, branch), rest)) = path.split_first() else {
        return f(body);
    };
    let stmt = body.get(index).ok_or_else(|| stale(path))?;
    let child = child_block(stmt, branch).ok_or_else(|| stale(path))?;
    let new_child = rewrite_block(child, rest, f)?;
    let new_stmt = match (stmt.clone(), branch) {
        (Stmt::For { iter, hi, kind, .. }, _) => Stmt::For { iter, hi, body: new_child, kind },
        (Stmt::If { cond, orelse, .. }, Branch::Body) => Stmt::If { cond, body: new_child, orelse },
        (Stmt::If { cond, body, .. }, Branch::Orelse) => Stmt::If { cond, body, orelse: new_child },
        _ => return Err(stale(path)),
    };
    let mut out = body.clone();
    out[index] = new_stmt;
    Ok(out)
}

/// Rebuild `body` with the statement at `site` replaced by `f(stmt)`, which
/// may produce any number of statements.
pub fn rewrite_stmt(body: &Block, site: &StmtSite, f: impl FnOnce(&Stmt) -> Result<Vec<Stmt>>) -> Result<Block> {
    rewrite_block(body, &site.path, |block| {
        let stmt = block.get(site.index).ok_or_else(|| stale(&site.path))?;
        let replacement = f(stmt)?;
        let mut out = block[..site.index].to_vec();
        out.extend(replacement);
        out.extend_from_slice(&block[site.index + 1..]);
        Ok(out)
    })
}

impl ExprSite {
    pub fn expr<'a>(&self, body: &'a Block) -> Option<&'a Expr> {
        let stmt = self.stmt.stmt(body)?;
        stmt.exprs().get(self.slot)?.at_path(&self.path)
    }

    pub fn get<'a>(&self, body: &'a Block) -> Result<&'a Expr> {
        self.expr(body).ok_or_else(|| stale(&self.stmt.path))
    }

    /// `stmt` with the expression at this site replaced by `new`.
    pub fn replace_in(&self, stmt: &Stmt, new: &Expr) -> Stmt {
        let mut slot = 0;
        stmt.map_exprs(&mut |expr| {
            let out = if slot == self.slot { expr.replace_at(&self.path, new) } else { expr.clone() };
            slot += 1;
            out
        })
    }
}
