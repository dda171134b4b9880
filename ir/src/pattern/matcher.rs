use super::site::{Branch, ExprSite, StmtSite};
use super::{ExprPat, StmtPat};
use crate::expr::Expr;
use crate::stmt::{Block, Stmt};

impl ExprPat {
    pub fn matches(&self, expr: &Expr) -> bool {
        match (self, expr) {
            (ExprPat::Hole, _) => true,
            (ExprPat::Read { name, idx }, Expr::Read { name: actual, idx: actual_idx }) => {
                name.matches(actual)
                    && idx.as_ref().is_none_or(|idx| {
                        idx.len() == actual_idx.len() && idx.iter().zip(actual_idx).all(|(p, e)| p.matches(e))
                    })
            }
            (ExprPat::Const(value), Expr::Const(actual)) => value == actual,
            (ExprPat::Unary { op, arg }, Expr::Unary { op: actual, arg: actual_arg }) => {
                op == actual && arg.matches(actual_arg)
            }
            (ExprPat::Binary { op, lhs, rhs }, Expr::Binary { op: actual, lhs: l, rhs: r }) => {
                op == actual && lhs.matches(l) && rhs.matches(r)
            }
            (ExprPat::Stride { buf, dim }, Expr::StrideOf { buf: actual, dim: actual_dim }) => {
                buf.matches(actual) && dim == actual_dim
            }
            (ExprPat::Config { config, field }, Expr::ReadConfig { config: actual, field: actual_field }) => {
                config.matches(actual.name()) && field.matches(actual_field)
            }
            (ExprPat::Window { buf }, Expr::Window { buf: actual, .. }) => buf.matches(actual),
            _ => false,
        }
    }
}

impl StmtPat {
    pub fn matches(&self, stmt: &Stmt) -> bool {
        let target = |name: &super::NamePat,
                      idx: &Option<Vec<ExprPat>>,
                      actual: &crate::types::Sym,
                      actual_idx: &[Expr]| {
            name.matches(actual)
                && idx.as_ref().is_none_or(|idx| {
                    idx.len() == actual_idx.len() && idx.iter().zip(actual_idx).all(|(p, e)| p.matches(e))
                })
        };
        match (self, stmt) {
            (StmtPat::Assign { name, idx, rhs, reduce: false }, Stmt::Assign { name: n, idx: i, rhs: r })
            | (StmtPat::Assign { name, idx, rhs, reduce: true }, Stmt::Reduce { name: n, idx: i, rhs: r }) => {
                target(name, idx, n, i) && rhs.matches(r)
            }
            (StmtPat::WriteConfig { config, field, rhs }, Stmt::WriteConfig { config: c, field: f, rhs: r }) => {
                config.matches(c.name()) && field.matches(f) && rhs.matches(r)
            }
            (StmtPat::Pass, Stmt::Pass) => true,
            (StmtPat::If { cond }, Stmt::If { cond: c, .. }) => cond.matches(c),
            (StmtPat::For { iter, hi, kind }, Stmt::For { iter: i, hi: h, kind: k, .. }) => {
                iter.matches(i) && hi.matches(h) && kind.is_none_or(|kind| kind == *k)
            }
            (StmtPat::Alloc { name }, Stmt::Alloc { name: n, .. }) => name.matches(n),
            (StmtPat::Call { proc, args }, Stmt::Call { proc: p, args: a }) => {
                proc.matches(p.name())
                    && args.as_ref().is_none_or(|args| {
                        args.len() == a.len() && args.iter().zip(a).all(|(pat, e)| pat.matches(e))
                    })
            }
            _ => false,
        }
    }
}

/// Pre-order walk handing every statement and its site to `visit`.
fn walk(block: &Block, site: &dyn Fn(usize) -> StmtSite, visit: &mut impl FnMut(&Stmt, StmtSite)) {
    for (index, stmt) in block.iter().enumerate() {
        let here = site(index);
        visit(stmt, here.clone());
        match stmt {
            Stmt::For { body, .. } => walk(body, &|i| here.child(Branch::Body, i), visit),
            Stmt::If { body, orelse, .. } => {
                walk(body, &|i| here.child(Branch::Body, i), visit);
                walk(orelse, &|i| here.child(Branch::Orelse, i), visit);
            }
            _ => {}
        }
    }
}

/// Statement sites matching `pattern`, in pre-order.
pub fn find_stmts(body: &Block, pattern: &StmtPat) -> Vec<StmtSite> {
    let mut out = Vec::new();
    walk(body, &StmtSite::root, &mut |stmt, site| {
        if pattern.matches(stmt) {
            out.push(site);
        }
    });
    out
}

fn collect_exprs(expr: &Expr, pattern: &ExprPat, path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>) {
    if pattern.matches(expr) {
        found.push(path.clone());
    }
    for (i, child) in expr.children().into_iter().enumerate() {
        path.push(i);
        collect_exprs(child, pattern, path, found);
        path.pop();
    }
}

/// Expression sites matching `pattern`, in pre-order.
pub fn find_exprs(body: &Block, pattern: &ExprPat) -> Vec<ExprSite> {
    let mut out = Vec::new();
    walk(body, &StmtSite::root, &mut |stmt, site| {
        for (slot, expr) in stmt.exprs().into_iter().enumerate() {
            let mut found = Vec::new();
            collect_exprs(expr, pattern, &mut Vec::new(), &mut found);
            out.extend(found.into_iter().map(|path| ExprSite { stmt: site.clone(), slot, path }));
        }
    });
    out
}
