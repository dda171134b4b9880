use super::{ExprPat, NamePat, PatternKind, StmtPat};
use crate::error::*;
use crate::expr::Expr;
use crate::parse::Parser;
use crate::parse::lexer::{self, Tok};
use crate::types::LoopKind;

/// Parse a pattern and its trailing `#k` ordinal.
pub(super) fn parse_pattern(source: &str, loop_selector: bool) -> Result<(PatternKind, Option<usize>)> {
    let invalid = |message: String| Error::InvalidPattern { pattern: source.trim().to_string(), message };
    let mut toks = lexer::tokenize_line(source).map_err(|e| invalid(e.to_string()))?;
    let mut ordinal = None;
    if let [.., hash, number, _eof] = toks.as_slice()
        && hash.tok == Tok::Punct("#")
        && let Tok::Int(k) = number.tok
    {
        if k < 0 {
            return Err(invalid("ordinal must be non-negative".to_string()));
        }
        ordinal = Some(k as usize);
        let end = toks.len() - 1;
        toks.drain(end - 2..end);
    }
    let mut parser = Parser::lenient(toks);
    let kind = parse_kind(&mut parser, loop_selector).map_err(|e| invalid(e.to_string()))?;
    if !parser.toks.at_end() {
        return Err(invalid(format!("unexpected {:?}", parser.toks.peek())));
    }
    Ok((kind, ordinal))
}

fn is_hole_token(parser: &Parser) -> bool {
    parser.toks.is_keyword("_")
}

fn parse_kind(parser: &mut Parser, loop_selector: bool) -> Result<PatternKind> {
    if loop_selector && matches!(parser.toks.peek(), Tok::Ident(_)) && *parser.toks.peek_at(1) == Tok::Eof {
        let iter = NamePat::new(&parser.toks.expect_ident()?);
        return Ok(PatternKind::Stmt(StmtPat::For { iter, hi: ExprPat::Hole, kind: None }));
    }
    if parser.toks.eat_keyword("pass") {
        return Ok(PatternKind::Stmt(StmtPat::Pass));
    }
    if parser.toks.eat_keyword("for") {
        let iter = NamePat::new(&parser.toks.expect_ident()?);
        parser.toks.expect_keyword("in")?;
        let (hi, kind) = if parser.toks.eat_keyword("_") {
            (ExprPat::Hole, None)
        } else {
            let kind = match parser.toks.expect_ident()?.as_str() {
                "par" => LoopKind::Par,
                "seq" => LoopKind::Seq,
                other => return parser.toks.error(format!("expected 'par' or 'seq', found '{other}'")),
            };
            parser.toks.expect_punct("(")?;
            parser.toks.expect_int()?;
            parser.toks.expect_punct(",")?;
            let hi = expr_pattern(&parser.expr()?);
            parser.toks.expect_punct(")")?;
            (hi, Some(kind))
        };
        body_wildcard(parser)?;
        return Ok(PatternKind::Stmt(StmtPat::For { iter, hi, kind }));
    }
    if parser.toks.eat_keyword("if") {
        let cond = expr_pattern(&parser.expr()?);
        body_wildcard(parser)?;
        return Ok(PatternKind::Stmt(StmtPat::If { cond }));
    }
    if let Tok::Ident(name) = parser.toks.peek().clone() {
        if *parser.toks.peek_at(1) == Tok::Punct(":") {
            parser.toks.next();
            parser.toks.next();
            // The declared type is not constrained.
            while !parser.toks.at_end() {
                parser.toks.next();
            }
            return Ok(PatternKind::Stmt(StmtPat::Alloc { name: NamePat::new(&name) }));
        }
        if *parser.toks.peek_at(1) == Tok::Punct("(") && name != "stride" {
            parser.toks.next();
            parser.toks.next();
            let args = if is_hole_token(parser) && *parser.toks.peek_at(1) == Tok::Punct(")") {
                parser.toks.next();
                None
            } else {
                let mut args = Vec::new();
                if !parser.toks.is_punct(")") {
                    loop {
                        args.push(expr_pattern(&parser.expr()?));
                        if !parser.toks.eat_punct(",") {
                            break;
                        }
                    }
                }
                Some(args)
            };
            parser.toks.expect_punct(")")?;
            return Ok(PatternKind::Stmt(StmtPat::Call { proc: NamePat::new(&name), args }));
        }
    }
    let lhs = parser.expr()?;
    let reduce = if parser.toks.eat_punct("+=") {
        true
    } else if parser.toks.eat_punct("=") {
        false
    } else {
        return Ok(PatternKind::Expr(expr_pattern(&lhs)));
    };
    let rhs = expr_pattern(&parser.expr()?);
    match (expr_pattern(&lhs), reduce) {
        (ExprPat::Read { name, idx }, _) => Ok(PatternKind::Stmt(StmtPat::Assign { name, idx, rhs, reduce })),
        (ExprPat::Hole, _) => Ok(PatternKind::Stmt(StmtPat::Assign { name: NamePat::Any, idx: None, rhs, reduce })),
        (ExprPat::Config { config, field }, false) => {
            Ok(PatternKind::Stmt(StmtPat::WriteConfig { config, field, rhs }))
        }
        _ => parser.toks.error("expected an assignment target"),
    }
}

/// `: _` after a loop or `if` header; the body is never constrained.
fn body_wildcard(parser: &mut Parser) -> Result<()> {
    parser.toks.expect_punct(":")?;
    parser.toks.eat_keyword("_");
    Ok(())
}

/// Read `_` as a hole in a parsed expression.
pub(super) fn expr_pattern(expr: &Expr) -> ExprPat {
    let is_hole = |e: &Expr| matches!(e, Expr::Read { name, idx } if name.as_str() == "_" && idx.is_empty());
    match expr {
        e if is_hole(e) => ExprPat::Hole,
        Expr::Read { name, idx } => {
            let idx = match idx.as_slice() {
                [only] if is_hole(only) => None,
                _ => Some(idx.iter().map(expr_pattern).collect()),
            };
            ExprPat::Read { name: NamePat::new(name.as_str()), idx }
        }
        Expr::Const(value) => ExprPat::Const(*value),
        Expr::Unary { op, arg } => ExprPat::Unary { op: *op, arg: Box::new(expr_pattern(arg)) },
        Expr::Binary { op, lhs, rhs } => {
            ExprPat::Binary { op: *op, lhs: Box::new(expr_pattern(lhs)), rhs: Box::new(expr_pattern(rhs)) }
        }
        Expr::StrideOf { buf, dim } => ExprPat::Stride { buf: NamePat::new(buf.as_str()), dim: *dim },
        Expr::ReadConfig { config, field } => {
            ExprPat::Config { config: NamePat::new(config.name().as_str()), field: NamePat::new(field.as_str()) }
        }
        Expr::Window { buf, .. } => ExprPat::Window { buf: NamePat::new(buf.as_str()) },
    }
}
