//! Tree rendering of procedure bodies.

use std::borrow::Cow;
use std::io;

use ptree::{Style, TreeItem};

use crate::procedure::Procedure;
use crate::stmt::Stmt;

#[derive(Clone)]
enum Node {
    Proc(Procedure),
    Stmt(Stmt),
    Else(Vec<Stmt>),
}

impl TreeItem for Node {
    type Child = Node;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        match self {
            Node::Proc(proc) => {
                let params: Vec<String> = proc.params().iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
                write!(f, "PROC {}({})", proc.name(), params.join(", "))
            }
            Node::Stmt(stmt) => write!(f, "{}", format_stmt(stmt)),
            Node::Else(_) => write!(f, "ELSE"),
        }
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        let children: Vec<Node> = match self {
            Node::Proc(proc) => proc.body().iter().cloned().map(Node::Stmt).collect(),
            Node::Stmt(Stmt::For { body, .. }) => body.iter().cloned().map(Node::Stmt).collect(),
            Node::Stmt(Stmt::If { body, orelse, .. }) => {
                let mut children: Vec<Node> = body.iter().cloned().map(Node::Stmt).collect();
                if !orelse.is_empty() {
                    children.push(Node::Else(orelse.clone()));
                }
                children
            }
            Node::Else(block) => block.iter().cloned().map(Node::Stmt).collect(),
            Node::Stmt(_) => Vec::new(),
        };
        Cow::Owned(children)
    }
}

fn format_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::For { iter, hi, kind, .. } => format!("FOR {iter} in {kind}(0, {hi})"),
        Stmt::If { cond, .. } => format!("IF {cond}"),
        Stmt::Assign { .. } => format!("ASSIGN {}", stmt.summary()),
        Stmt::Reduce { .. } => format!("REDUCE {}", stmt.summary()),
        Stmt::WriteConfig { .. } => format!("CONFIG {}", stmt.summary()),
        Stmt::Alloc { name, ty, mem } => format!("ALLOC {name} : {ty} @ {mem}"),
        Stmt::Call { proc, args } => format!("CALL {} (args={})", proc.name(), args.len()),
        Stmt::Pass => "PASS".to_string(),
    }
}

/// Render a procedure as an ASCII tree.
pub fn render_tree(proc: &Procedure) -> String {
    let mut buf = Vec::new();
    match ptree::write_tree(&Node::Proc(proc.clone()), &mut buf) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(err) => format!("<tree rendering failed: {err}>"),
    }
}
