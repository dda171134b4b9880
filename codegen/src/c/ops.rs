//! C rendering of statements and expressions inside one function.
//!
//! Every name in scope has a [`Binding`] saying how C reaches it: control
//! values and scalar locals by name, scalar parameters through a pointer,
//! dense tensors through a base pointer with row-major strides, window
//! parameters through a `struct win_*` and vector-space buffers through
//! register variables.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use kiln_dtype::DType;
use kiln_ir::sint::Affine;
use kiln_ir::{BinaryOp, Block, Expr, MemSpace, Param, Procedure, Stmt, Sym, Type, UnaryOp, WindowDim};
use kiln_memory::EmitStyle;
use snafu::OptionExt;

use super::EmitConfig;
use super::types::{c_const, c_control, window_struct};
use crate::error::*;

/// How C code reaches a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Control value or loop variable.
    Value,
    /// Numeric scalar held in a local variable.
    Local,
    /// Numeric scalar behind a pointer.
    ByAddress,
    /// Dense tensor starting at a pointer.
    Pointer,
    /// `struct win_*` carrying a data pointer and strides.
    Window,
    /// Vector registers declared in this function.
    Registers,
    /// Vector registers owned by the caller.
    RegisterPointer,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub storage: Storage,
    /// `None` for control values.
    pub space: Option<Arc<MemSpace>>,
    /// Element stride of every dimension.
    pub strides: Vec<Expr>,
}

impl Binding {
    fn value() -> Self {
        Self { storage: Storage::Value, space: None, strides: Vec::new() }
    }
}

/// Row-major element strides of a dense tensor.
pub fn dense_strides(shape: &[Expr]) -> Vec<Expr> {
    let mut strides = vec![Expr::int(1); shape.len()];
    for dim in (0..shape.len().saturating_sub(1)).rev() {
        let product = shape[dim + 1].clone() * strides[dim + 1].clone();
        strides[dim] = Affine::from_expr(&product).map_or(product, |affine| affine.to_expr());
    }
    strides
}

fn c_binary(op: BinaryOp) -> String {
    match op {
        BinaryOp::And => "&&".to_string(),
        BinaryOp::Or => "||".to_string(),
        other => other.to_string(),
    }
}

fn is_vector(space: &MemSpace) -> bool {
    matches!(space.emit_style(), EmitStyle::Vector { .. })
}

/// A buffer or window passed to a call.
struct View {
    name: Sym,
    storage: Storage,
    space: Arc<MemSpace>,
    rank: usize,
    /// Element offset of the first element.
    offset: String,
    /// Strides of the dimensions the view keeps.
    strides: Vec<Expr>,
}

impl View {
    fn at_origin(&self) -> bool {
        self.offset == "0"
    }

    /// Operand for an instruction template.
    fn operand(&self) -> String {
        match self.storage {
            Storage::Window => self.space.window_c(&format!("{}.data", self.name), &self.offset, self.at_origin()),
            Storage::RegisterPointer if self.at_origin() => format!("*{}", self.name),
            _ => self.space.window_c(self.name.as_str(), &self.offset, self.at_origin()),
        }
    }

    /// Address of the first element, for ordinary calls.
    fn pointer(&self) -> String {
        match self.storage {
            Storage::Registers if self.at_origin() && self.rank <= 1 => format!("&{}", self.name),
            Storage::Registers => format!("&{}", self.space.window_c(self.name.as_str(), &self.offset, false)),
            Storage::RegisterPointer if self.at_origin() => self.name.to_string(),
            Storage::RegisterPointer => format!("&{}", self.space.window_c(self.name.as_str(), &self.offset, false)),
            _ => self.operand(),
        }
    }
}

/// Rendering state for one C function.
pub struct CContext<'a> {
    proc: &'a Procedure,
    config: &'a EmitConfig,
    bindings: HashMap<Sym, Binding>,
    lines: Vec<String>,
    depth: usize,
}

impl<'a> CContext<'a> {
    pub fn new(proc: &'a Procedure, config: &'a EmitConfig) -> Self {
        Self { proc, config, bindings: HashMap::new(), lines: Vec::new(), depth: 1 }
    }

    /// Lines rendered so far, indented.
    pub fn finish(self) -> Vec<String> {
        self.lines
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let line = format!("{}{}", " ".repeat(self.depth * self.config.indent), text.as_ref());
        self.lines.push(line);
    }

    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.line(format!("// {}", text.as_ref()));
    }

    fn unsupported<T>(&self, what: impl ToString, reason: &str) -> Result<T> {
        UnsupportedSnafu { proc: self.proc.name().as_str(), what: what.to_string(), reason }.fail()
    }

    fn binding(&self, name: &Sym) -> Result<&Binding> {
        self.bindings.get(name).context(UnknownNameSnafu { proc: self.proc.name().as_str(), name: name.as_str() })
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Bind a parameter and return its C declaration.
    pub fn param(&mut self, param: &Param) -> String {
        let name = &param.name;
        let (decl, binding) = match &param.ty {
            Type::Scalar(DType::Scalar(elem)) => (
                format!("{} *{name}", elem.c_style()),
                Binding { storage: Storage::ByAddress, space: Some(param.space()), strides: Vec::new() },
            ),
            Type::Scalar(dtype) => {
                (format!("{} {name}", c_control(*dtype, &self.config.index_ctype)), Binding::value())
            }
            Type::Tensor(tensor) => {
                let space = param.space();
                match space.emit_style() {
                    EmitStyle::Vector { ctype, .. } => (
                        format!("{ctype} *{name}"),
                        Binding {
                            storage: Storage::RegisterPointer,
                            strides: dense_strides(&tensor.shape),
                            space: Some(Arc::clone(&space)),
                        },
                    ),
                    _ if tensor.window => (
                        format!("struct {} {name}", window_struct(tensor.rank(), tensor.elem)),
                        Binding {
                            storage: Storage::Window,
                            strides: (0..tensor.rank()).map(|dim| Expr::stride(name.clone(), dim)).collect(),
                            space: Some(Arc::clone(&space)),
                        },
                    ),
                    _ => (
                        format!("{} *{name}", tensor.elem.c_style()),
                        Binding {
                            storage: Storage::Pointer,
                            strides: dense_strides(&tensor.shape),
                            space: Some(Arc::clone(&space)),
                        },
                    ),
                }
            }
        };
        self.bindings.insert(name.clone(), binding);
        decl
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Render a block, releasing its allocations in reverse order at the end.
    pub fn block(&mut self, block: &Block) -> Result<()> {
        let saved = self.bindings.clone();
        let mut frees = Vec::new();
        for stmt in block {
            self.stmt(stmt, &mut frees)?;
        }
        for free in frees.into_iter().rev() {
            self.line(free);
        }
        self.bindings = saved;
        Ok(())
    }

    fn nested(&mut self, block: &Block, iter: Option<&Sym>) -> Result<()> {
        self.depth += 1;
        let saved = self.bindings.clone();
        if let Some(iter) = iter {
            self.bindings.insert(iter.clone(), Binding::value());
        }
        let result = self.block(block);
        self.bindings = saved;
        self.depth -= 1;
        result
    }

    fn stmt(&mut self, stmt: &Stmt, frees: &mut Vec<String>) -> Result<()> {
        match stmt {
            Stmt::Assign { name, idx, rhs } => {
                let line = format!("{} = {};", self.access(name, idx)?, self.expr(rhs)?);
                self.line(line);
            }
            Stmt::Reduce { name, idx, rhs } => {
                let line = format!("{} += {};", self.access(name, idx)?, self.expr(rhs)?);
                self.line(line);
            }
            Stmt::WriteConfig { config, field, rhs } => {
                let line = format!("ctxt->{}.{field} = {};", config.name(), self.expr(rhs)?);
                self.line(line);
            }
            Stmt::Pass => self.comment("pass"),
            Stmt::If { cond, body, orelse } => {
                let cond = self.expr(cond)?;
                self.line(format!("if ({cond}) {{"));
                self.nested(body, None)?;
                if !orelse.is_empty() {
                    self.line("} else {");
                    self.nested(orelse, None)?;
                }
                self.line("}");
            }
            Stmt::For { iter, hi, body, .. } => {
                let hi = self.expr(hi)?;
                let config = self.config;
                let ctype = &config.index_ctype;
                self.line(format!("for ({ctype} {iter} = 0; {iter} < {hi}; {iter}++) {{"));
                self.nested(body, Some(iter))?;
                self.line("}");
            }
            Stmt::Alloc { name, ty, mem } => self.alloc(name, ty, mem, frees)?,
            Stmt::Call { proc: callee, args } => self.call(stmt, callee, args)?,
        }
        Ok(())
    }

    fn alloc(&mut self, name: &Sym, ty: &Type, mem: &Arc<MemSpace>, frees: &mut Vec<String>) -> Result<()> {
        let Some(elem) = ty.elem() else {
            return self.unsupported(name, "only numeric data can be allocated");
        };
        let shape = ty.as_tensor().map(|tensor| tensor.shape.clone()).unwrap_or_default();
        let dims = shape.iter().map(|dim| self.expr(dim)).collect::<Result<Vec<_>>>()?;
        self.line(mem.alloc_c(name.as_str(), elem, &dims));
        if let Some(free) = mem.free_c(name.as_str(), &dims) {
            frees.push(free);
        }
        let storage = match (mem.emit_style(), shape.is_empty()) {
            (EmitStyle::Vector { .. }, _) => Storage::Registers,
            (EmitStyle::Heap, true) => Storage::Local,
            (EmitStyle::Scratchpad { .. }, true) => Storage::ByAddress,
            (_, false) => Storage::Pointer,
        };
        tracing::trace!(%name, ?storage, space = mem.name(), "allocation bound");
        self.bindings
            .insert(name.clone(), Binding { storage, space: Some(Arc::clone(mem)), strides: dense_strides(&shape) });
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn check_spaces(&self, stmt: &Stmt, callee: &Procedure, args: &[Expr]) -> Result<()> {
        for (param, arg) in callee.params().iter().zip(args) {
            if !param.ty.is_data() {
                continue;
            }
            let name = match arg {
                Expr::Read { name, .. } => name,
                Expr::Window { buf, .. } => buf,
                other => return self.unsupported(other, "data arguments must be locations"),
            };
            let expected = param.space();
            if let Some(space) = &self.binding(name)?.space
                && **space != *expected
            {
                return MemoryMismatchSnafu {
                    name: name.as_str(),
                    space: space.name(),
                    param: param.name.as_str(),
                    expected: expected.name(),
                    callee: callee.name().as_str(),
                    stmt: stmt.summary(),
                }
                .fail();
            }
        }
        Ok(())
    }

    fn call(&mut self, stmt: &Stmt, callee: &Procedure, args: &[Expr]) -> Result<()> {
        self.check_spaces(stmt, callee, args)?;
        match callee.instr() {
            Some(template) => {
                let mut values = HashMap::new();
                let mut strides = HashMap::new();
                for (param, arg) in callee.params().iter().zip(args) {
                    let text = if !param.ty.is_data() {
                        self.expr(arg)?
                    } else if !param.ty.is_tensor() {
                        self.location(arg)?
                    } else {
                        let view = self.view(arg)?;
                        for (dim, stride) in view.strides.iter().enumerate() {
                            strides.insert((param.name.clone(), dim), self.expr(stride)?);
                        }
                        view.operand()
                    };
                    values.insert(param.name.clone(), text);
                }
                let text = template.render(
                    |name| values.get(name).cloned().unwrap_or_else(|| name.to_string()),
                    |name, dim| strides.get(&(name.clone(), dim)).cloned().unwrap_or_else(|| "1".to_string()),
                );
                tracing::trace!(instr = %callee.name(), %text, "instruction expanded");
                for line in text.lines() {
                    self.line(line);
                }
            }
            None => {
                let mut control = vec!["ctxt".to_string()];
                let mut data = Vec::new();
                for (param, arg) in callee.params().iter().zip(args) {
                    if !param.ty.is_data() {
                        control.push(self.expr(arg)?);
                    } else if !param.ty.is_tensor() {
                        data.push(self.address(arg)?);
                    } else {
                        data.push(self.tensor_arg(param, arg)?);
                    }
                }
                let line = format!("{}({});", callee.name(), control.into_iter().chain(data).join(", "));
                self.line(line);
            }
        }
        Ok(())
    }

    fn location(&self, arg: &Expr) -> Result<String> {
        match arg {
            Expr::Read { name, idx } => self.access(name, idx),
            other => self.unsupported(other, "scalar data arguments must be locations"),
        }
    }

    /// Pointer to a scalar argument.
    fn address(&self, arg: &Expr) -> Result<String> {
        match arg {
            Expr::Read { name, idx } if idx.is_empty() && self.binding(name)?.storage == Storage::ByAddress => {
                Ok(name.to_string())
            }
            _ => Ok(format!("&{}", self.location(arg)?)),
        }
    }

    fn tensor_arg(&self, param: &Param, arg: &Expr) -> Result<String> {
        let view = self.view(arg)?;
        let pointer = view.pointer();
        match param.ty.as_tensor() {
            Some(tensor) if tensor.window && !is_vector(&param.space()) => {
                let strides = view.strides.iter().map(|stride| self.expr(stride)).collect::<Result<Vec<_>>>()?;
                let ty = window_struct(tensor.rank(), tensor.elem);
                Ok(format!("(struct {ty}){{ {pointer}, {{ {} }} }}", strides.join(", ")))
            }
            _ => Ok(pointer),
        }
    }

    fn view(&self, arg: &Expr) -> Result<View> {
        let (name, coords, kept) = match arg {
            Expr::Read { name, idx } if idx.is_empty() => {
                let binding = self.binding(name)?;
                (name, Vec::new(), binding.strides.clone())
            }
            Expr::Window { buf, dims } => {
                let binding = self.binding(buf)?;
                let coords = dims
                    .iter()
                    .map(|dim| match dim {
                        WindowDim::Point(at) | WindowDim::Interval(at, _) => at.clone(),
                    })
                    .collect();
                let kept = dims
                    .iter()
                    .zip(&binding.strides)
                    .filter(|(dim, _)| matches!(dim, WindowDim::Interval(..)))
                    .map(|(_, stride)| stride.clone())
                    .collect();
                (buf, coords, kept)
            }
            other => return self.unsupported(other, "expected a buffer or a window"),
        };
        let binding = self.binding(name)?;
        let Some(space) = binding.space.clone() else {
            return self.unsupported(arg, "control values are not buffers");
        };
        Ok(View {
            name: name.clone(),
            storage: binding.storage,
            space,
            rank: binding.strides.len(),
            offset: self.flat(&binding.strides, &coords)?,
            strides: kept,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// C lvalue for an element or scalar.
    fn access(&self, name: &Sym, idx: &[Expr]) -> Result<String> {
        let binding = self.binding(name)?;
        let whole = || Expr::read(name.clone(), idx.iter().cloned());
        match binding.storage {
            Storage::Value | Storage::Local => Ok(name.to_string()),
            Storage::ByAddress => Ok(format!("*{name}")),
            Storage::Pointer | Storage::Window if idx.len() != binding.strides.len() => {
                self.unsupported(whole(), "whole buffers can only be passed to calls")
            }
            Storage::Pointer => Ok(format!("{name}[{}]", self.flat(&binding.strides, idx)?)),
            Storage::Window => Ok(format!("{name}.data[{}]", self.flat(&binding.strides, idx)?)),
            Storage::Registers | Storage::RegisterPointer => {
                self.unsupported(whole(), "vector registers are only reachable through instructions")
            }
        }
    }

    /// Element offset of `idx` under `strides`.
    fn flat(&self, strides: &[Expr], idx: &[Expr]) -> Result<String> {
        let mut terms = Vec::new();
        for (at, stride) in idx.iter().zip(strides) {
            if at.as_int() == Some(0) {
                continue;
            }
            let term = if stride.as_int() == Some(1) {
                self.operand(at, BinaryOp::Add.precedence(), !terms.is_empty())?
            } else {
                let prec = BinaryOp::Mul.precedence();
                format!("{} * {}", self.operand(at, prec, false)?, self.operand(stride, prec, true)?)
            };
            terms.push(term);
        }
        Ok(if terms.is_empty() { "0".to_string() } else { terms.join(" + ") })
    }

    fn operand(&self, expr: &Expr, parent: u8, right: bool) -> Result<String> {
        let text = self.expr(expr)?;
        let needs_parens = match expr {
            Expr::Binary { op, .. } => {
                let prec = op.precedence();
                prec < parent || (prec == parent && (right || op.is_comparison()))
            }
            _ => false,
        };
        Ok(if needs_parens { format!("({text})") } else { text })
    }

    pub fn expr(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Read { name, idx } => self.access(name, idx),
            Expr::Const(value) => Ok(c_const(value)),
            Expr::Unary { op: UnaryOp::Neg, arg } => match arg.as_ref() {
                Expr::Binary { .. } | Expr::Unary { .. } | Expr::Const(_) => Ok(format!("-({})", self.expr(arg)?)),
                _ => Ok(format!("-{}", self.expr(arg)?)),
            },
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                Ok(format!("{} {} {}", self.operand(lhs, prec, false)?, c_binary(*op), self.operand(rhs, prec, true)?))
            }
            Expr::StrideOf { buf, dim } => {
                let binding = self.binding(buf)?;
                if binding.storage == Storage::Window {
                    return Ok(format!("{buf}.strides[{dim}]"));
                }
                match binding.strides.get(*dim) {
                    Some(stride) => self.expr(stride),
                    None => self.unsupported(expr, "dimension out of range"),
                }
            }
            Expr::ReadConfig { config, field } => Ok(format!("ctxt->{}.{field}", config.name())),
            Expr::Window { .. } => self.unsupported(expr, "windows can only be passed to calls"),
        }
    }
}
