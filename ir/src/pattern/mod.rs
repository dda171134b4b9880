//! Structural pattern matching over procedure bodies.
//!
//! Patterns are written in the canonical syntax with `_` wildcards:
//!
//! | pattern            | selects                                  |
//! |--------------------|------------------------------------------|
//! | `for i in _: _`    | loops over `i`                           |
//! | `i #1`             | second loop over `i` (loop selectors)    |
//! | `x[_] * y[_]`      | products of reads of `x` and `y`         |
//! | `xy : _ #0`        | first allocation of `xy`                 |
//! | `xVec[_] = _`      | assignments to `xVec`                    |
//! | `ConfigAB.a = _`   | writes of config field `ConfigAB.a`      |
//! | `loadu(_)`         | calls to `loadu`, any arguments          |
//!
//! Matching walks the body in pre-order (statement, its expressions, its
//! child blocks) and returns sites in that order.

mod matcher;
mod parse;
pub mod site;

use std::fmt;

pub use matcher::{find_exprs, find_stmts};
pub use site::{Branch, ExprSite, StmtSite};
use snafu::ensure;

use crate::error::*;
use crate::procedure::Procedure;
use crate::types::{BinaryOp, ConstValue, LoopKind, Sym, UnaryOp};

/// Name position: a concrete name or `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePat {
    Any,
    Exact(Sym),
}

impl NamePat {
    pub fn new(name: &str) -> Self {
        if name == "_" { Self::Any } else { Self::Exact(Sym::new(name)) }
    }

    pub fn matches(&self, name: &Sym) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == name,
        }
    }
}

/// Expression template.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprPat {
    Hole,
    /// Read of a scalar or buffer; `idx: None` accepts any index list.
    Read { name: NamePat, idx: Option<Vec<ExprPat>> },
    Const(ConstValue),
    Unary { op: UnaryOp, arg: Box<ExprPat> },
    Binary { op: BinaryOp, lhs: Box<ExprPat>, rhs: Box<ExprPat> },
    Stride { buf: NamePat, dim: usize },
    Config { config: NamePat, field: NamePat },
    /// Any window of the named buffer.
    Window { buf: NamePat },
}

/// Statement template. Child blocks are always wildcards.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtPat {
    Assign { name: NamePat, idx: Option<Vec<ExprPat>>, rhs: ExprPat, reduce: bool },
    WriteConfig { config: NamePat, field: NamePat, rhs: ExprPat },
    Pass,
    If { cond: ExprPat },
    For { iter: NamePat, hi: ExprPat, kind: Option<LoopKind> },
    Alloc { name: NamePat },
    Call { proc: NamePat, args: Option<Vec<ExprPat>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Stmt(StmtPat),
    Expr(ExprPat),
}

/// A template plus optional ordinal selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    ordinal: Option<usize>,
}

impl Pattern {
    /// Parse a pattern string (`"for i in _: _ #1"`).
    pub fn parse(source: &str) -> Result<Self> {
        let (kind, ordinal) = parse::parse_pattern(source, false)?;
        Ok(Self { source: source.trim().to_string(), kind, ordinal })
    }

    /// Parse a loop selector: a bare loop variable (`"i"`, `"i #1"`) or a full
    /// loop pattern.
    pub fn for_loop(source: &str) -> Result<Self> {
        let (kind, ordinal) = parse::parse_pattern(source, true)?;
        ensure!(
            matches!(kind, PatternKind::Stmt(StmtPat::For { .. })),
            InvalidPatternSnafu { pattern: source.trim(), message: "expected a loop" }
        );
        Ok(Self { source: source.trim().to_string(), kind, ordinal })
    }

    pub fn stmt(pattern: StmtPat) -> Self {
        let source = format!("{pattern:?}");
        Self { source, kind: PatternKind::Stmt(pattern), ordinal: None }
    }

    pub fn expr(pattern: ExprPat) -> Self {
        let source = format!("{pattern:?}");
        Self { source, kind: PatternKind::Expr(pattern), ordinal: None }
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub fn is_stmt(&self) -> bool {
        matches!(self.kind, PatternKind::Stmt(_))
    }

    fn select<T: Clone>(&self, sites: &[T]) -> Result<T> {
        ensure!(!sites.is_empty(), NoMatchSnafu { pattern: self.source.clone() });
        let ordinal = self.ordinal.unwrap_or(0);
        match sites.get(ordinal) {
            Some(site) => Ok(site.clone()),
            None => BadOrdinalSnafu { pattern: self.source.clone(), ordinal, count: sites.len() }.fail(),
        }
    }

    /// Every statement site matching, ignoring the ordinal.
    pub fn stmt_sites(&self, proc: &Procedure) -> Result<Vec<StmtSite>> {
        match &self.kind {
            PatternKind::Stmt(pattern) => Ok(find_stmts(proc.body(), pattern)),
            PatternKind::Expr(_) => InvalidPatternSnafu {
                pattern: self.source.clone(),
                message: "expected a statement pattern",
            }
            .fail(),
        }
    }

    /// Every expression site matching, ignoring the ordinal.
    pub fn expr_sites(&self, proc: &Procedure) -> Result<Vec<ExprSite>> {
        match &self.kind {
            PatternKind::Expr(pattern) => Ok(find_exprs(proc.body(), pattern)),
            PatternKind::Stmt(_) => InvalidPatternSnafu {
                pattern: self.source.clone(),
                message: "expected an expression pattern",
            }
            .fail(),
        }
    }

    /// The statement picked by the ordinal (first match by default).
    pub fn select_stmt(&self, proc: &Procedure) -> Result<StmtSite> {
        let sites = self.stmt_sites(proc)?;
        let site = self.select(&sites)?;
        tracing::trace!(pattern = %self.source, matches = sites.len(), ?site, "pattern selected statement");
        Ok(site)
    }

    /// The expression picked by the ordinal (first match by default).
    pub fn select_expr(&self, proc: &Procedure) -> Result<ExprSite> {
        let sites = self.expr_sites(proc)?;
        let site = self.select(&sites)?;
        tracing::trace!(pattern = %self.source, matches = sites.len(), ?site, "pattern selected expression");
        Ok(site)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Pattern {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        Self::parse(source)
    }
}
