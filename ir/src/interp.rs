//! Reference interpreter.
//!
//! Executes a procedure over concrete inputs so that scheduled and
//! unscheduled versions can be compared. Instruction procedures run their
//! body. Parallel loops can be run backwards to expose order dependence.

use std::collections::HashMap;

use bon::bon;
use kiln_dtype::DType;

use crate::config::ConfigField;
use crate::error::*;
use crate::expr::{Expr, WindowDim};
use crate::procedure::Procedure;
use crate::sint::{floor_div, floor_mod};
use crate::stmt::{Block, Stmt};
use crate::types::{BinaryOp, ConstValue, LoopKind, Sym, Type, UnaryOp};

/// Iteration order used for `par` loops. `seq` loops always run forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopOrder {
    #[default]
    Forward,
    Reverse,
}

/// Runtime value of a scalar expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
            Self::Bool(v) => f64::from(u8::from(v)),
        }
    }
}

impl From<ConstValue> for Value {
    fn from(value: ConstValue) -> Self {
        match value {
            ConstValue::Int(v) => Self::Int(v),
            ConstValue::Float(v) => Self::Float(v),
            ConstValue::Bool(v) => Self::Bool(v),
        }
    }
}

/// Argument of the entry procedure, in parameter order.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// `size`, `index` or `stride` parameter.
    Int(i64),
    Bool(bool),
    /// Tensor or numeric scalar parameter, row-major. Updated in place.
    Buffer(Vec<f64>),
}

#[derive(Debug, Clone)]
struct View {
    store: usize,
    offset: i64,
    dims: Vec<i64>,
    strides: Vec<i64>,
}

#[derive(Debug, Clone)]
enum Binding {
    Value(Value),
    Buffer(View),
}

type Env = HashMap<Sym, Binding>;

fn dense_strides(dims: &[i64]) -> Vec<i64> {
    let mut strides = vec![1; dims.len()];
    for d in (0..dims.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * dims[d + 1];
    }
    strides
}

/// Interpreter state: the config side table plus the buffer stores of the
/// current run.
#[derive(Debug, Default)]
pub struct Interpreter {
    order: LoopOrder,
    configs: HashMap<ConfigField, Value>,
    stores: Vec<Vec<f64>>,
    proc: String,
}

#[bon]
impl Interpreter {
    #[builder]
    pub fn new(#[builder(default)] order: LoopOrder) -> Self {
        Self { order, ..Self::default() }
    }
}

impl Interpreter {
    /// Current value of a config field; unset fields read as zero.
    pub fn config(&self, config: &str, field: &str) -> Option<Value> {
        self.configs.get(&ConfigField { config: Sym::new(config), field: Sym::new(field) }).copied()
    }

    pub fn set_config(&mut self, config: &str, field: &str, value: Value) {
        self.configs.insert(ConfigField { config: Sym::new(config), field: Sym::new(field) }, value);
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T> {
        RuntimeSnafu { proc: self.proc.clone(), message: message.into() }.fail()
    }

    /// Run `proc` on `args`, writing buffer results back into `args`.
    #[tracing::instrument(skip_all, fields(proc = %proc.name()))]
    pub fn run(&mut self, proc: &Procedure, args: &mut [Arg]) -> Result<()> {
        self.proc = proc.name().to_string();
        self.stores.clear();
        if args.len() != proc.params().len() {
            return self.fail(format!("expected {} arguments, got {}", proc.params().len(), args.len()));
        }
        let mut env = Env::new();
        let mut buffers = Vec::new();
        for (param, arg) in proc.params().iter().zip(args.iter()) {
            match (&param.ty, arg) {
                (Type::Scalar(DType::Bool), Arg::Bool(v)) => {
                    env.insert(param.name.clone(), Binding::Value(Value::Bool(*v)));
                }
                (Type::Scalar(ty), Arg::Int(v)) if ty.is_indexable() => {
                    env.insert(param.name.clone(), Binding::Value(Value::Int(*v)));
                }
                (ty, Arg::Buffer(data)) if ty.is_data() => {
                    let dims = match ty.as_tensor() {
                        Some(tensor) => {
                            tensor.shape.iter().map(|dim| self.eval_int(&env, dim)).collect::<Result<Vec<_>>>()?
                        }
                        None => Vec::new(),
                    };
                    let len: i64 = dims.iter().product();
                    if data.len() as i64 != len {
                        return self.fail(format!("buffer {} has {} elements, expected {len}", param.name, data.len()));
                    }
                    self.stores.push(data.clone());
                    buffers.push(self.stores.len() - 1);
                    let strides = dense_strides(&dims);
                    let view = View { store: self.stores.len() - 1, offset: 0, dims, strides };
                    env.insert(param.name.clone(), Binding::Buffer(view));
                }
                _ => return self.fail(format!("argument for {} does not fit its type {}", param.name, param.ty)),
            }
        }
        self.check_preds(proc, &env)?;
        self.block(proc.body(), &env)?;
        let mut stores = buffers.into_iter();
        for arg in args.iter_mut() {
            if let Arg::Buffer(data) = arg
                && let Some(store) = stores.next()
            {
                data.clone_from(&self.stores[store]);
            }
        }
        Ok(())
    }

    fn check_preds(&self, proc: &Procedure, env: &Env) -> Result<()> {
        for pred in proc.preds() {
            if self.eval(env, pred)? != Value::Bool(true) {
                return self.fail(format!("assertion failed: {pred}"));
            }
        }
        Ok(())
    }

    fn eval_int(&self, env: &Env, expr: &Expr) -> Result<i64> {
        match self.eval(env, expr)? {
            Value::Int(v) => Ok(v),
            other => self.fail(format!("expected an integer from {expr}, got {other:?}")),
        }
    }

    fn view<'a>(&self, env: &'a Env, name: &Sym) -> Result<&'a View> {
        match env.get(name) {
            Some(Binding::Buffer(view)) => Ok(view),
            _ => self.fail(format!("{name} is not a buffer")),
        }
    }

    fn location(&self, env: &Env, name: &Sym, idx: &[Expr]) -> Result<(usize, usize)> {
        let view = self.view(env, name)?;
        if idx.len() != view.dims.len() {
            return self.fail(format!("{name} indexed with {} coordinates, has rank {}", idx.len(), view.dims.len()));
        }
        let mut flat = view.offset;
        for (d, e) in idx.iter().enumerate() {
            let i = self.eval_int(env, e)?;
            if i < 0 || i >= view.dims[d] {
                return self.fail(format!(
                    "index {i} out of bounds for dimension {d} of {name} (extent {})",
                    view.dims[d]
                ));
            }
            flat += i * view.strides[d];
        }
        let len = self.stores[view.store].len();
        match usize::try_from(flat) {
            Ok(flat) if flat < len => Ok((view.store, flat)),
            _ => self.fail(format!("access to {name} outside its storage")),
        }
    }

    fn eval(&self, env: &Env, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Read { name, idx } => match env.get(name) {
                Some(Binding::Value(value)) if idx.is_empty() => Ok(*value),
                Some(Binding::Buffer(_)) => {
                    let (store, at) = self.location(env, name, idx)?;
                    Ok(Value::Float(self.stores[store][at]))
                }
                _ => self.fail(format!("cannot read {expr}")),
            },
            Expr::Const(value) => Ok((*value).into()),
            Expr::Unary { op: UnaryOp::Neg, arg } => match self.eval(env, arg)? {
                Value::Int(v) => Ok(Value::Int(-v)),
                Value::Float(v) => Ok(Value::Float(-v)),
                Value::Bool(_) => self.fail(format!("cannot negate {arg}")),
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(env, lhs)?;
                if *op == BinaryOp::And && lhs == Value::Bool(false) {
                    return Ok(lhs);
                }
                if *op == BinaryOp::Or && lhs == Value::Bool(true) {
                    return Ok(lhs);
                }
                let rhs = self.eval(env, rhs)?;
                self.binary(*op, lhs, rhs)
            }
            Expr::StrideOf { buf, dim } => {
                let view = self.view(env, buf)?;
                match view.strides.get(*dim) {
                    Some(stride) => Ok(Value::Int(*stride)),
                    None => self.fail(format!("{buf} has no dimension {dim}")),
                }
            }
            Expr::ReadConfig { config, field } => {
                let key = ConfigField::new(config, field);
                let zero = match config.field_type(field) {
                    Some(DType::Bool) => Value::Bool(false),
                    Some(ty) if ty.is_indexable() => Value::Int(0),
                    _ => Value::Float(0.0),
                };
                Ok(self.configs.get(&key).copied().unwrap_or(zero))
            }
            Expr::Window { .. } => self.fail(format!("window {expr} used as a value")),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        use BinaryOp::*;
        match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => match op {
                And => Ok(Value::Bool(a && b)),
                Or => Ok(Value::Bool(a || b)),
                Eq => Ok(Value::Bool(a == b)),
                Ne => Ok(Value::Bool(a != b)),
                _ => self.fail(format!("'{op}' on booleans")),
            },
            (Value::Int(a), Value::Int(b)) => Ok(match op {
                Add => Value::Int(a + b),
                Sub => Value::Int(a - b),
                Mul => Value::Int(a * b),
                Div | Mod if b == 0 => return self.fail("division by zero"),
                Div => Value::Int(floor_div(a, b)),
                Mod => Value::Int(floor_mod(a, b)),
                Eq => Value::Bool(a == b),
                Ne => Value::Bool(a != b),
                Lt => Value::Bool(a < b),
                Le => Value::Bool(a <= b),
                Gt => Value::Bool(a > b),
                Ge => Value::Bool(a >= b),
                And | Or => return self.fail(format!("'{op}' on integers")),
            }),
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Ok(match op {
                    Add => Value::Float(a + b),
                    Sub => Value::Float(a - b),
                    Mul => Value::Float(a * b),
                    Div => Value::Float(a / b),
                    Eq => Value::Bool(a == b),
                    Ne => Value::Bool(a != b),
                    Lt => Value::Bool(a < b),
                    Le => Value::Bool(a <= b),
                    Gt => Value::Bool(a > b),
                    Ge => Value::Bool(a >= b),
                    Mod | And | Or => return self.fail(format!("'{op}' on floating-point values")),
                })
            }
        }
    }

    fn block(&mut self, block: &Block, outer: &Env) -> Result<()> {
        let mut env = outer.clone();
        for stmt in block {
            self.stmt(stmt, &mut env)?;
        }
        Ok(())
    }

    fn store(&mut self, env: &Env, name: &Sym, idx: &[Expr], rhs: &Expr, reduce: bool) -> Result<()> {
        let value = self.eval(env, rhs)?.as_f64();
        let (store, at) = self.location(env, name, idx)?;
        let slot = &mut self.stores[store][at];
        if reduce {
            *slot += value;
        } else {
            *slot = value;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, env: &mut Env) -> Result<()> {
        match stmt {
            Stmt::Assign { name, idx, rhs } => self.store(env, name, idx, rhs, false),
            Stmt::Reduce { name, idx, rhs } => self.store(env, name, idx, rhs, true),
            Stmt::WriteConfig { config, field, rhs } => {
                let value = self.eval(env, rhs)?;
                self.configs.insert(ConfigField::new(config, field), value);
                Ok(())
            }
            Stmt::Pass => Ok(()),
            Stmt::If { cond, body, orelse } => match self.eval(env, cond)? {
                Value::Bool(true) => self.block(body, env),
                Value::Bool(false) => self.block(orelse, env),
                other => self.fail(format!("condition {cond} evaluated to {other:?}")),
            },
            Stmt::For { iter, hi, body, kind } => {
                let hi = self.eval_int(env, hi)?;
                let reverse = *kind == LoopKind::Par && self.order == LoopOrder::Reverse;
                let iters: Box<dyn Iterator<Item = i64>> =
                    if reverse { Box::new((0..hi).rev()) } else { Box::new(0..hi) };
                for i in iters {
                    let mut inner = env.clone();
                    inner.insert(iter.clone(), Binding::Value(Value::Int(i)));
                    self.block(body, &inner)?;
                }
                Ok(())
            }
            Stmt::Alloc { name, ty, .. } => {
                let dims = match ty.as_tensor() {
                    Some(tensor) => tensor.shape.iter().map(|dim| self.eval_int(env, dim)).collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                let len = dims.iter().product::<i64>().max(0) as usize;
                self.stores.push(vec![0.0; len]);
                let strides = dense_strides(&dims);
                let view = View { store: self.stores.len() - 1, offset: 0, dims, strides };
                env.insert(name.clone(), Binding::Buffer(view));
                Ok(())
            }
            Stmt::Call { proc, args } => self.call(proc, args, env),
        }
    }

    fn call(&mut self, proc: &Procedure, args: &[Expr], env: &Env) -> Result<()> {
        let mut callee = Env::new();
        for (param, arg) in proc.params().iter().zip(args) {
            let binding = match arg {
                Expr::Window { buf, dims } => {
                    let base = self.view(env, buf)?.clone();
                    let mut view =
                        View { store: base.store, offset: base.offset, dims: Vec::new(), strides: Vec::new() };
                    for (d, dim) in dims.iter().enumerate() {
                        let (lo, hi) = match dim {
                            WindowDim::Point(pt) => {
                                let pt = self.eval_int(env, pt)?;
                                (pt, pt + 1)
                            }
                            WindowDim::Interval(lo, hi) => (self.eval_int(env, lo)?, self.eval_int(env, hi)?),
                        };
                        if lo < 0 || hi < lo || hi > base.dims[d] {
                            return self.fail(format!("window {arg} out of bounds in dimension {d}"));
                        }
                        view.offset += lo * base.strides[d];
                        if matches!(dim, WindowDim::Interval(..)) {
                            view.dims.push(hi - lo);
                            view.strides.push(base.strides[d]);
                        }
                    }
                    Binding::Buffer(view)
                }
                Expr::Read { name, idx } if param.ty.is_data() => match env.get(name) {
                    Some(Binding::Buffer(view)) if idx.is_empty() => Binding::Buffer(view.clone()),
                    Some(Binding::Buffer(_)) => {
                        let (store, at) = self.location(env, name, idx)?;
                        Binding::Buffer(View { store, offset: at as i64, dims: Vec::new(), strides: Vec::new() })
                    }
                    _ => return self.fail(format!("{name} is not a buffer")),
                },
                _ => Binding::Value(self.eval(env, arg)?),
            };
            callee.insert(param.name.clone(), binding);
        }
        let caller = std::mem::replace(&mut self.proc, proc.name().to_string());
        self.check_preds(proc, &callee)?;
        self.block(proc.body(), &callee)?;
        self.proc = caller;
        Ok(())
    }
}
