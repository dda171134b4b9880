//! Name resolution and typing.

use kiln_dtype::{DType, ScalarDType};
use snafu::ensure;

use super::{BindingKind, Env};
use crate::error::*;
use crate::expr::{Expr, WindowDim};
use crate::procedure::{Param, ProcDef};
use crate::stmt::{Block, Stmt};
use crate::types::{BinaryOp, ConstValue, TensorType, Type, UnaryOp};

/// Value class of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Class {
    /// Index, size and stride values; `literal` for integer constants.
    Int { literal: bool },
    /// Numeric data; `None` for float literals.
    Num(Option<ScalarDType>),
    Bool,
    /// A whole buffer named without indices.
    Tensor(TensorType),
    /// A window expression keeping `rank` dimensions.
    Window { elem: ScalarDType, rank: usize },
}

impl Class {
    fn of_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Scalar(kind) => Class::Num(Some(kind)),
            DType::Bool => Class::Bool,
            DType::Index | DType::Size | DType::Stride => Class::Int { literal: false },
        }
    }

    fn is_int(&self) -> bool {
        matches!(self, Class::Int { .. })
    }

    /// Usable where numeric data is expected.
    fn is_numeric(&self) -> bool {
        matches!(self, Class::Num(_) | Class::Int { literal: true })
    }
}

fn compatible(a: ScalarDType, b: ScalarDType) -> bool {
    a == b || (a.can_safe_cast(b) && b.can_safe_cast(a))
}

struct Checker<'a> {
    stmt: &'a str,
}

impl Checker<'_> {
    fn fail<T>(&self, message: impl Into<String>) -> Result<T> {
        TypeSnafu { stmt: self.stmt, message: message.into() }.fail()
    }

    fn expr(&self, env: &Env, expr: &Expr, allow_buffers: bool) -> Result<Class> {
        match expr {
            Expr::Read { name, idx } => {
                let Some(binding) = env.get(name) else {
                    return UnknownNameSnafu { name: name.as_str(), stmt: self.stmt }.fail();
                };
                match &binding.ty {
                    Type::Scalar(dtype) => {
                        ensure!(
                            idx.is_empty(),
                            TypeSnafu { stmt: self.stmt, message: format!("scalar '{name}' cannot be indexed") }
                        );
                        Ok(Class::of_dtype(*dtype))
                    }
                    Type::Tensor(tensor) if idx.is_empty() => {
                        ensure!(
                            allow_buffers,
                            TypeSnafu { stmt: self.stmt, message: format!("buffer '{name}' used as a value") }
                        );
                        Ok(Class::Tensor(tensor.clone()))
                    }
                    Type::Tensor(tensor) => {
                        if idx.len() != tensor.rank() {
                            return self.fail(format!(
                                "'{name}' has rank {} but {} indices were given",
                                tensor.rank(),
                                idx.len()
                            ));
                        }
                        self.indices(env, idx)?;
                        Ok(Class::Num(Some(tensor.elem)))
                    }
                }
            }
            Expr::Const(ConstValue::Int(_)) => Ok(Class::Int { literal: true }),
            Expr::Const(ConstValue::Float(_)) => Ok(Class::Num(None)),
            Expr::Const(ConstValue::Bool(_)) => Ok(Class::Bool),
            Expr::Unary { op: UnaryOp::Neg, arg } => match self.expr(env, arg, false)? {
                class @ (Class::Int { .. } | Class::Num(_)) => Ok(class),
                other => self.fail(format!("cannot negate a {other:?} value")),
            },
            Expr::Binary { op, lhs, rhs } => self.binary(env, *op, lhs, rhs),
            Expr::StrideOf { buf, dim } => match env.get(buf).map(|b| &b.ty) {
                Some(Type::Tensor(tensor)) if *dim < tensor.rank() => Ok(Class::Int { literal: false }),
                Some(Type::Tensor(_)) => self.fail(format!("stride dimension {dim} out of range for '{buf}'")),
                Some(Type::Scalar(_)) => self.fail(format!("'{buf}' is not a buffer")),
                None => UnknownNameSnafu { name: buf.as_str(), stmt: self.stmt }.fail(),
            },
            Expr::ReadConfig { config, field } => match config.field_type(field) {
                Some(dtype) => Ok(Class::of_dtype(dtype)),
                None => self.fail(format!("config {} has no field '{field}'", config.name())),
            },
            Expr::Window { buf, dims } => {
                ensure!(
                    allow_buffers,
                    TypeSnafu { stmt: self.stmt, message: "windows are only allowed as call arguments" }
                );
                let Some(tensor) = env.tensor(buf) else {
                    return match env.get(buf) {
                        Some(_) => self.fail(format!("'{buf}' is not a buffer")),
                        None => UnknownNameSnafu { name: buf.as_str(), stmt: self.stmt }.fail(),
                    };
                };
                if dims.len() != tensor.rank() {
                    return self.fail(format!(
                        "window on '{buf}' needs {} dimensions, got {}",
                        tensor.rank(),
                        dims.len()
                    ));
                }
                let mut rank = 0;
                for dim in dims {
                    match dim {
                        WindowDim::Point(pt) => self.index(env, pt)?,
                        WindowDim::Interval(lo, hi) => {
                            self.index(env, lo)?;
                            self.index(env, hi)?;
                            rank += 1;
                        }
                    }
                }
                Ok(Class::Window { elem: tensor.elem, rank })
            }
        }
    }

    fn binary(&self, env: &Env, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Class> {
        let a = self.expr(env, lhs, false)?;
        let b = self.expr(env, rhs, false)?;
        if op.is_logical() {
            ensure!(
                a == Class::Bool && b == Class::Bool,
                TypeSnafu { stmt: self.stmt, message: format!("'{op}' needs boolean operands") }
            );
            return Ok(Class::Bool);
        }
        if op.is_comparison() {
            ensure!(
                a.is_int() && b.is_int(),
                TypeSnafu { stmt: self.stmt, message: format!("'{op}' compares index expressions only") }
            );
            return Ok(Class::Bool);
        }
        match (&a, &b) {
            (Class::Int { literal: la }, Class::Int { literal: lb }) => {
                if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
                    ensure!(
                        rhs.as_int().is_some_and(|q| q > 0),
                        TypeSnafu {
                            stmt: self.stmt,
                            message: format!("'{op}' on index expressions needs a positive literal divisor"),
                        }
                    );
                }
                Ok(Class::Int { literal: *la && *lb })
            }
            _ if a.is_numeric() && b.is_numeric() => {
                ensure!(
                    op != BinaryOp::Mod,
                    TypeSnafu { stmt: self.stmt, message: "'%' is not defined on data values" }
                );
                let kind = match (&a, &b) {
                    (Class::Num(Some(x)), Class::Num(Some(y))) => ScalarDType::least_upper(&[*x, *y]),
                    (Class::Num(Some(x)), _) | (_, Class::Num(Some(x))) => Some(*x),
                    _ => None,
                };
                Ok(Class::Num(kind))
            }
            _ => self.fail(format!("cannot apply '{op}' to {a:?} and {b:?}")),
        }
    }

    fn index(&self, env: &Env, expr: &Expr) -> Result<()> {
        match self.expr(env, expr, false)? {
            Class::Int { .. } => Ok(()),
            other => self.fail(format!("expected 'index' or 'size', found {other:?} in {expr}")),
        }
    }

    fn indices(&self, env: &Env, idx: &[Expr]) -> Result<()> {
        idx.iter().try_for_each(|e| self.index(env, e))
    }

    fn numeric(&self, env: &Env, expr: &Expr) -> Result<()> {
        let class = self.expr(env, expr, false)?;
        ensure!(
            class.is_numeric(),
            TypeSnafu { stmt: self.stmt, message: format!("expected a numeric value, found {class:?}") }
        );
        Ok(())
    }

    fn call_arg(&self, env: &Env, param: &Param, arg: &Expr) -> Result<()> {
        let class = self.expr(env, arg, true)?;
        let name = &param.name;
        match (&param.ty, class) {
            (Type::Scalar(dtype), Class::Int { .. }) if dtype.is_indexable() => Ok(()),
            (Type::Scalar(DType::Bool), Class::Bool) => Ok(()),
            (Type::Scalar(DType::Scalar(kind)), Class::Num(Some(actual))) if matches!(arg, Expr::Read { .. }) => {
                ensure!(
                    compatible(*kind, actual),
                    TypeSnafu {
                        stmt: self.stmt,
                        message: format!("argument for '{name}' has element type {actual}, expected {kind}"),
                    }
                );
                Ok(())
            }
            (Type::Tensor(expected), Class::Tensor(actual)) => {
                ensure!(
                    expected.window || !actual.window,
                    TypeSnafu { stmt: self.stmt, message: format!("window passed to dense parameter '{name}'") }
                );
                ensure!(
                    expected.rank() == actual.rank(),
                    TypeSnafu {
                        stmt: self.stmt,
                        message: format!(
                            "argument for '{name}' has rank {}, expected {}",
                            actual.rank(),
                            expected.rank()
                        ),
                    }
                );
                ensure!(
                    compatible(expected.elem, actual.elem),
                    TypeSnafu {
                        stmt: self.stmt,
                        message: format!(
                            "argument for '{name}' has element type {}, expected {}",
                            actual.elem,
                            expected.elem
                        ),
                    }
                );
                Ok(())
            }
            (Type::Tensor(expected), Class::Window { elem, rank }) if expected.window => {
                ensure!(
                    expected.rank() == rank,
                    TypeSnafu {
                        stmt: self.stmt,
                        message: format!("window for '{name}' has rank {rank}, expected {}", expected.rank()),
                    }
                );
                ensure!(
                    compatible(expected.elem, elem),
                    TypeSnafu {
                        stmt: self.stmt,
                        message: format!("window for '{name}' has element type {elem}, expected {}", expected.elem),
                    }
                );
                Ok(())
            }
            (ty, class) => self.fail(format!("argument {arg} ({class:?}) does not fit parameter '{name}: {ty}'")),
        }
    }
}

fn check_type(env: &Env, ty: &Type, stmt: &str) -> Result<()> {
    let checker = Checker { stmt };
    if let Type::Tensor(tensor) = ty {
        checker.indices(env, &tensor.shape)?;
    }
    Ok(())
}

fn check_block(env: &mut Env, block: &Block) -> Result<()> {
    for stmt in block {
        check_stmt(env, stmt)?;
    }
    Ok(())
}

fn check_stmt(env: &mut Env, stmt: &Stmt) -> Result<()> {
    let summary = stmt.summary();
    let checker = Checker { stmt: &summary };
    match stmt {
        Stmt::Assign { name, idx, rhs } | Stmt::Reduce { name, idx, rhs } => {
            let Some(binding) = env.get(name) else {
                return UnknownNameSnafu { name: name.as_str(), stmt: summary }.fail();
            };
            if binding.kind == BindingKind::Loop || !binding.ty.is_data() {
                return checker.fail(format!("'{name}' is not assignable"));
            }
            if idx.len() != binding.ty.rank() {
                return checker.fail(format!(
                    "'{name}' has rank {} but {} indices were given",
                    binding.ty.rank(),
                    idx.len()
                ));
            }
            checker.indices(env, idx)?;
            checker.numeric(env, rhs)
        }
        Stmt::WriteConfig { config, field, rhs } => {
            let Some(dtype) = config.field_type(field) else {
                return checker.fail(format!("config {} has no field '{field}'", config.name()));
            };
            let class = checker.expr(env, rhs, false)?;
            let fits = match dtype {
                DType::Scalar(_) => class.is_numeric(),
                DType::Bool => class == Class::Bool,
                _ => class.is_int(),
            };
            ensure!(
                fits,
                TypeSnafu {
                    stmt: summary.as_str(),
                    message: format!("cannot store {class:?} into {}.{field}: {dtype}", config.name()),
                }
            );
            Ok(())
        }
        Stmt::Pass => Ok(()),
        Stmt::If { cond, body, orelse } => {
            let class = checker.expr(env, cond, false)?;
            ensure!(class == Class::Bool, TypeSnafu { stmt: summary.as_str(), message: "condition must be boolean" });
            check_block(&mut env.clone(), body)?;
            check_block(&mut env.clone(), orelse)
        }
        Stmt::For { iter, hi, body, .. } => {
            ensure!(!env.contains(iter), RedefinedSnafu { name: iter.as_str(), stmt: summary.as_str() });
            checker.index(env, hi)?;
            let mut inner = env.clone();
            inner.bind_loop(iter);
            check_block(&mut inner, body)
        }
        Stmt::Alloc { name, ty, mem } => {
            ensure!(!env.contains(name), RedefinedSnafu { name: name.as_str(), stmt: summary.as_str() });
            ensure!(ty.is_data(), TypeSnafu { stmt: summary.as_str(), message: "only numeric data can be allocated" });
            ensure!(!ty.is_window(), TypeSnafu { stmt: summary.as_str(), message: "window types cannot be allocated" });
            check_type(env, ty, &summary)?;
            env.bind(name.clone(), ty.clone(), mem.clone(), BindingKind::Alloc);
            Ok(())
        }
        Stmt::Call { proc, args } => {
            let params = proc.params();
            if params.len() != args.len() {
                return checker.fail(format!("{} expects {} arguments, got {}", proc.name(), params.len(), args.len()));
            }
            params.iter().zip(args).try_for_each(|(param, arg)| checker.call_arg(env, param, arg))
        }
    }
}

/// Resolve names and check the typing rules of a definition.
pub fn typecheck(def: &ProcDef) -> Result<()> {
    let header = format!("def {}", def.name);
    let mut env = Env::default();
    for param in &def.params {
        ensure!(!env.contains(&param.name), RedefinedSnafu { name: param.name.as_str(), stmt: header.as_str() });
        env.bind(param.name.clone(), param.ty.clone(), param.space(), BindingKind::Param);
    }
    for param in &def.params {
        check_type(&env, &param.ty, &header)?;
        if param.mem.is_some() {
            ensure!(
                param.ty.is_data(),
                TypeSnafu {
                    stmt: header.as_str(),
                    message: format!("control parameter '{}' cannot have a memory space", param.name),
                }
            );
        }
    }
    for pred in &def.preds {
        let stmt = format!("assert {pred}");
        let class = Checker { stmt: &stmt }.expr(&env, pred, false)?;
        ensure!(class == Class::Bool, TypeSnafu { stmt, message: "assertion must be boolean" });
    }
    check_block(&mut env, &def.body)
}
