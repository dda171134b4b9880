//! Parser for the canonical textual form.
//!
//! ```text
//! @instr("{dst} = _mm256_loadu_ps({src});")
//! def loadu(dst: [f32][8] @ AVX2, src: [f32][8] @ DRAM):
//!     assert stride(src, 0) == 1
//!     for i in par(0, 8):
//!         dst[i] = src[i]
//! ```
//!
//! Configs and callee procedures are resolved through a [`ParseContext`];
//! memory spaces through the global registry.

pub mod lexer;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;

use kiln_dtype::{DType, ScalarDType};
use kiln_memory::MemSpace;
use snafu::ResultExt;

use self::lexer::Tok;
use self::stream::TokenStream;
use crate::config::ConfigDecl;
use crate::error::*;
use crate::expr::{Expr, WindowDim};
use crate::instr::InstrTemplate;
use crate::procedure::{Param, ProcDef, Procedure};
use crate::stmt::{Block, Stmt};
use crate::types::{BinaryOp, LoopKind, Sym, Type};

/// Configs and procedures visible to parsed code.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    configs: HashMap<Sym, Arc<ConfigDecl>>,
    procs: HashMap<Sym, Procedure>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: &Arc<ConfigDecl>) -> Self {
        self.add_config(config);
        self
    }

    pub fn with_proc(mut self, proc: &Procedure) -> Self {
        self.add_proc(proc);
        self
    }

    pub fn add_config(&mut self, config: &Arc<ConfigDecl>) {
        self.configs.insert(config.name().clone(), Arc::clone(config));
    }

    pub fn add_proc(&mut self, proc: &Procedure) {
        self.procs.insert(proc.name().clone(), proc.clone());
    }

    pub fn config(&self, name: &str) -> Option<&Arc<ConfigDecl>> {
        self.configs.get(&Sym::new(name))
    }

    pub fn proc(&self, name: &str) -> Option<&Procedure> {
        self.procs.get(&Sym::new(name))
    }
}

/// Parse and validate a single procedure.
pub fn parse_proc(source: &str, ctx: &ParseContext) -> Result<Procedure> {
    let mut parser = Parser::new(lexer::tokenize(source)?, ctx.clone());
    let def = parser.proc_def()?;
    if !parser.toks.at_end() {
        return parser.toks.error("unexpected text after procedure");
    }
    Procedure::from_def(def)
}

/// Parse several procedures; each one is visible to the ones after it.
pub fn parse_procs(source: &str, ctx: &ParseContext) -> Result<Vec<Procedure>> {
    let mut parser = Parser::new(lexer::tokenize(source)?, ctx.clone());
    let mut out = Vec::new();
    while !parser.toks.at_end() {
        let proc = Procedure::from_def(parser.proc_def()?)?;
        parser.ctx.add_proc(&proc);
        out.push(proc);
    }
    Ok(out)
}

/// Parse an expression, resolving configs through `ctx`.
pub fn parse_expr(source: &str, ctx: &ParseContext) -> Result<Expr> {
    let mut parser = Parser::new(lexer::tokenize_line(source)?, ctx.clone());
    let expr = parser.expr()?;
    if !parser.toks.at_end() {
        return parser.toks.error("unexpected text after expression");
    }
    Ok(expr)
}

pub(crate) fn lookup_space(name: &str) -> Result<Arc<MemSpace>> {
    kiln_memory::get_space(name).context(MemorySnafu)
}

pub(crate) struct Parser {
    pub(crate) toks: TokenStream,
    ctx: ParseContext,
    /// Unknown configs become field-less placeholders (pattern syntax).
    lenient_configs: bool,
}

impl Parser {
    pub(crate) fn new(toks: Vec<lexer::Token>, ctx: ParseContext) -> Self {
        Self { toks: TokenStream::new(toks), ctx, lenient_configs: false }
    }

    pub(crate) fn lenient(toks: Vec<lexer::Token>) -> Self {
        Self { toks: TokenStream::new(toks), ctx: ParseContext::default(), lenient_configs: true }
    }

    fn proc_def(&mut self) -> Result<ProcDef> {
        let mut instr = None;
        if self.toks.eat_punct("@") {
            self.toks.expect_keyword("instr")?;
            self.toks.expect_punct("(")?;
            let Tok::Str(text) = self.toks.next() else {
                return self.toks.error("expected a template string");
            };
            self.toks.expect_punct(")")?;
            self.toks.expect(Tok::Newline)?;
            instr = Some(InstrTemplate::parse(text)?);
        }
        self.toks.expect_keyword("def")?;
        let name = Sym::new(self.toks.expect_ident()?);
        self.toks.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.toks.is_punct(")") {
            loop {
                params.push(self.param()?);
                if !self.toks.eat_punct(",") {
                    break;
                }
            }
        }
        self.toks.expect_punct(")")?;
        self.toks.expect_punct(":")?;
        self.toks.expect(Tok::Newline)?;
        self.toks.expect(Tok::Indent)?;
        let mut preds = Vec::new();
        while self.toks.eat_keyword("assert") {
            preds.push(self.expr()?);
            self.toks.expect(Tok::Newline)?;
        }
        let mut body = Vec::new();
        while !matches!(self.toks.peek(), Tok::Dedent | Tok::Eof) {
            body.push(self.stmt()?);
        }
        self.toks.expect(Tok::Dedent)?;
        Ok(ProcDef { name, params, preds, body, instr })
    }

    fn param(&mut self) -> Result<Param> {
        let name = self.toks.expect_ident()?;
        self.toks.expect_punct(":")?;
        let ty = self.ty()?;
        let mem = if self.toks.eat_punct("@") { Some(lookup_space(&self.toks.expect_ident()?)?) } else { None };
        Ok(Param { name: Sym::new(name), ty, mem })
    }

    fn scalar(&mut self) -> Result<ScalarDType> {
        let name = self.toks.expect_ident()?;
        match name.parse::<ScalarDType>() {
            Ok(kind) => Ok(kind),
            Err(_) => self.toks.error(format!("'{name}' is not an element type")),
        }
    }

    fn dims(&mut self) -> Result<Vec<Expr>> {
        self.toks.expect_punct("[")?;
        let mut dims = vec![self.expr()?];
        while self.toks.eat_punct(",") {
            dims.push(self.expr()?);
        }
        self.toks.expect_punct("]")?;
        Ok(dims)
    }

    fn ty(&mut self) -> Result<Type> {
        if self.toks.eat_punct("[") {
            let elem = self.scalar()?;
            self.toks.expect_punct("]")?;
            return Ok(Type::window(elem, self.dims()?));
        }
        let name = self.toks.expect_ident()?;
        let Some(dtype) = DType::parse(&name) else {
            return self.toks.error(format!("unknown type '{name}'"));
        };
        if self.toks.is_punct("[") {
            let Some(elem) = dtype.scalar() else {
                return self.toks.error(format!("'{name}' cannot be a tensor element"));
            };
            return Ok(Type::tensor(elem, self.dims()?));
        }
        Ok(Type::Scalar(dtype))
    }

    fn block(&mut self) -> Result<Block> {
        self.toks.expect(Tok::Newline)?;
        self.toks.expect(Tok::Indent)?;
        let mut body = Vec::new();
        while !matches!(self.toks.peek(), Tok::Dedent | Tok::Eof) {
            body.push(self.stmt()?);
        }
        self.toks.expect(Tok::Dedent)?;
        Ok(body)
    }

    fn stmt(&mut self) -> Result<Stmt> {
        if self.toks.eat_keyword("pass") {
            self.toks.expect(Tok::Newline)?;
            return Ok(Stmt::Pass);
        }
        if self.toks.eat_keyword("for") {
            let iter = self.toks.expect_ident()?;
            self.toks.expect_keyword("in")?;
            let kind = match self.toks.expect_ident()?.as_str() {
                "par" => LoopKind::Par,
                "seq" => LoopKind::Seq,
                other => return self.toks.error(format!("expected 'par' or 'seq', found '{other}'")),
            };
            self.toks.expect_punct("(")?;
            if self.toks.expect_int()? != 0 {
                return self.toks.error("loops start at 0");
            }
            self.toks.expect_punct(",")?;
            let hi = self.expr()?;
            self.toks.expect_punct(")")?;
            self.toks.expect_punct(":")?;
            let body = self.block()?;
            return Ok(Stmt::For { iter: Sym::new(iter), hi, body, kind });
        }
        if self.toks.eat_keyword("if") {
            let cond = self.expr()?;
            self.toks.expect_punct(":")?;
            let body = self.block()?;
            let orelse = if self.toks.eat_keyword("else") {
                self.toks.expect_punct(":")?;
                self.block()?
            } else {
                Vec::new()
            };
            return Ok(Stmt::If { cond, body, orelse });
        }
        let name = self.toks.expect_ident()?;
        let stmt = if self.toks.eat_punct(".") {
            let config = self.config(&name)?;
            let field = self.toks.expect_ident()?;
            self.toks.expect_punct("=")?;
            Stmt::WriteConfig { config, field: Sym::new(field), rhs: self.expr()? }
        } else if self.toks.eat_punct("(") {
            let Some(proc) = self.ctx.proc(&name).cloned() else {
                return self.toks.error(format!("unknown procedure '{name}'"));
            };
            let mut args = Vec::new();
            if !self.toks.is_punct(")") {
                loop {
                    args.push(self.expr()?);
                    if !self.toks.eat_punct(",") {
                        break;
                    }
                }
            }
            self.toks.expect_punct(")")?;
            Stmt::Call { proc, args }
        } else if self.toks.eat_punct(":") {
            let ty = self.ty()?;
            let mem =
                if self.toks.eat_punct("@") { lookup_space(&self.toks.expect_ident()?)? } else { kiln_memory::dram() };
            Stmt::Alloc { name: Sym::new(name), ty, mem }
        } else {
            let idx = if self.toks.is_punct("[") { self.dims()? } else { Vec::new() };
            let reduce = if self.toks.eat_punct("+=") {
                true
            } else {
                self.toks.expect_punct("=")?;
                false
            };
            let rhs = self.expr()?;
            let name = Sym::new(name);
            if reduce { Stmt::Reduce { name, idx, rhs } } else { Stmt::Assign { name, idx, rhs } }
        };
        self.toks.expect(Tok::Newline)?;
        Ok(stmt)
    }

    pub(crate) fn expr(&mut self) -> Result<Expr> {
        self.binary_level(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.toks.peek() {
            Tok::Ident(word) if word == "or" => BinaryOp::Or,
            Tok::Ident(word) if word == "and" => BinaryOp::And,
            Tok::Punct("==") => BinaryOp::Eq,
            Tok::Punct("!=") => BinaryOp::Ne,
            Tok::Punct("<") => BinaryOp::Lt,
            Tok::Punct("<=") => BinaryOp::Le,
            Tok::Punct(">") => BinaryOp::Gt,
            Tok::Punct(">=") => BinaryOp::Ge,
            Tok::Punct("+") => BinaryOp::Add,
            Tok::Punct("-") => BinaryOp::Sub,
            Tok::Punct("*") => BinaryOp::Mul,
            Tok::Punct("/") => BinaryOp::Div,
            Tok::Punct("%") => BinaryOp::Mod,
            _ => return None,
        })
    }

    /// Precedence climbing; comparisons do not chain.
    fn binary_level(&mut self, level: u8) -> Result<Expr> {
        if level > 5 {
            return self.unary();
        }
        let mut lhs = self.binary_level(level + 1)?;
        while let Some(op) = self.binary_op().filter(|op| op.precedence() == level) {
            self.toks.next();
            let rhs = self.binary_level(level + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
            if op.is_comparison() {
                break;
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.toks.eat_punct("-") {
            return Ok(Expr::neg(self.unary()?));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.toks.next() {
            Tok::Int(value) => Ok(Expr::int(value)),
            Tok::Float(value) => Ok(Expr::float(value)),
            Tok::Punct("(") => {
                let inner = self.expr()?;
                self.toks.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Ident(word) if word == "True" => Ok(Expr::bool(true)),
            Tok::Ident(word) if word == "False" => Ok(Expr::bool(false)),
            Tok::Ident(name) => self.name_expr(name),
            other => self.toks.error(format!("expected an expression, found {other:?}")),
        }
    }

    fn config(&self, name: &str) -> Result<Arc<ConfigDecl>> {
        match self.ctx.config(name) {
            Some(config) => Ok(Arc::clone(config)),
            None if self.lenient_configs => Ok(ConfigDecl::new(name, Vec::<(Sym, DType)>::new())),
            None => self.toks.error(format!("unknown config '{name}'")),
        }
    }

    /// Expression starting with a name: variable, read, window, config
    /// field or `stride(x, d)`.
    fn name_expr(&mut self, name: String) -> Result<Expr> {
        if name == "stride" && self.toks.eat_punct("(") {
            let buf = self.toks.expect_ident()?;
            self.toks.expect_punct(",")?;
            let dim = self.toks.expect_int()?;
            self.toks.expect_punct(")")?;
            return Ok(Expr::stride(buf, dim as usize));
        }
        if self.toks.eat_punct(".") {
            let config = self.config(&name)?;
            let field = self.toks.expect_ident()?;
            return Ok(Expr::config(&config, field));
        }
        if !self.toks.eat_punct("[") {
            return Ok(Expr::var(name));
        }
        let mut dims = Vec::new();
        loop {
            let lo = self.expr()?;
            let dim =
                if self.toks.eat_punct(":") { WindowDim::Interval(lo, self.expr()?) } else { WindowDim::Point(lo) };
            dims.push(dim);
            if !self.toks.eat_punct(",") {
                break;
            }
        }
        self.toks.expect_punct("]")?;
        if dims.iter().any(|d| matches!(d, WindowDim::Interval(..))) {
            return Ok(Expr::Window { buf: Sym::new(name), dims });
        }
        let idx = dims.into_iter().filter_map(|d| match d {
            WindowDim::Point(e) => Some(e),
            WindowDim::Interval(..) => None,
        });
        Ok(Expr::read(name, idx))
    }
}
