//! Canonical textual form.
//!
//! The output is accepted by [`crate::parse::parse_proc`] and reparses to an
//! equal procedure.

use std::fmt::{self, Display, Formatter, Write};

use itertools::Itertools;

use crate::expr::{Expr, WindowDim};
use crate::procedure::{Param, Procedure};
use crate::stmt::{Block, Stmt};
use crate::types::Type;

const INDENT: &str = "    ";

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(dtype) => write!(f, "{dtype}"),
            Type::Tensor(tensor) if tensor.window => {
                write!(f, "[{}][{}]", tensor.elem, tensor.shape.iter().join(", "))
            }
            Type::Tensor(tensor) => write!(f, "{}[{}]", tensor.elem, tensor.shape.iter().join(", ")),
        }
    }
}

fn write_operand(f: &mut Formatter<'_>, expr: &Expr, parent: u8, right: bool) -> fmt::Result {
    let needs_parens = match expr {
        Expr::Binary { op, .. } => {
            let prec = op.precedence();
            prec < parent || (prec == parent && (right || op.is_comparison()))
        }
        _ => false,
    };
    if needs_parens { write!(f, "({expr})") } else { write!(f, "{expr}") }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Read { name, idx } if idx.is_empty() => write!(f, "{name}"),
            Expr::Read { name, idx } => write!(f, "{name}[{}]", idx.iter().join(", ")),
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Unary { op, arg } => {
                write!(f, "{op}")?;
                match arg.as_ref() {
                    Expr::Binary { .. } | Expr::Unary { .. } | Expr::Const(_) => write!(f, "({arg})"),
                    _ => write!(f, "{arg}"),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                write_operand(f, lhs, prec, false)?;
                write!(f, " {op} ")?;
                write_operand(f, rhs, prec, true)
            }
            Expr::StrideOf { buf, dim } => write!(f, "stride({buf}, {dim})"),
            Expr::ReadConfig { config, field } => write!(f, "{}.{field}", config.name()),
            Expr::Window { buf, dims } => {
                let dims = dims.iter().format_with(", ", |dim, g| match dim {
                    WindowDim::Point(pt) => g(pt),
                    WindowDim::Interval(lo, hi) => g(&format_args!("{lo}:{hi}")),
                });
                write!(f, "{buf}[{dims}]")
            }
        }
    }
}

fn write_block(out: &mut String, block: &Block, depth: usize) -> fmt::Result {
    for stmt in block {
        write_stmt(out, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match stmt {
        Stmt::Assign { name, idx, rhs } | Stmt::Reduce { name, idx, rhs } => {
            let op = if matches!(stmt, Stmt::Reduce { .. }) { "+=" } else { "=" };
            if idx.is_empty() {
                writeln!(out, "{pad}{name} {op} {rhs}")
            } else {
                writeln!(out, "{pad}{name}[{}] {op} {rhs}", idx.iter().join(", "))
            }
        }
        Stmt::WriteConfig { config, field, rhs } => writeln!(out, "{pad}{}.{field} = {rhs}", config.name()),
        Stmt::Pass => writeln!(out, "{pad}pass"),
        Stmt::If { cond, body, orelse } => {
            writeln!(out, "{pad}if {cond}:")?;
            write_block(out, body, depth + 1)?;
            if !orelse.is_empty() {
                writeln!(out, "{pad}else:")?;
                write_block(out, orelse, depth + 1)?;
            }
            Ok(())
        }
        Stmt::For { iter, hi, body, kind } => {
            writeln!(out, "{pad}for {iter} in {kind}(0, {hi}):")?;
            write_block(out, body, depth + 1)
        }
        Stmt::Alloc { name, ty, mem } => writeln!(out, "{pad}{name}: {ty} @ {mem}"),
        Stmt::Call { proc, args } => writeln!(out, "{pad}{}({})", proc.name(), args.iter().join(", ")),
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_stmt(&mut out, self, 0)?;
        f.write_str(out.trim_end())
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        if let Some(mem) = &self.mem {
            write!(f, " @ {mem}")?;
        }
        Ok(())
    }
}

/// Quote a string literal for the `@instr` line.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

impl Display for Procedure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if let Some(instr) = self.instr() {
            writeln!(out, "@instr({})", quote(instr.source()))?;
        }
        writeln!(out, "def {}({}):", self.name(), self.params().iter().join(", "))?;
        for pred in self.preds() {
            writeln!(out, "{INDENT}assert {pred}")?;
        }
        write_block(&mut out, self.body(), 1)?;
        f.write_str(&out)
    }
}

