//! C source code generation backend.
//!
//! Renders a procedure and every procedure it calls into one translation
//! unit suitable for `cc -c -O2`.
//!
//! # Layout
//!
//! ```c
//! #include <stdbool.h>
//! #include <stdint.h>
//! #include <stdlib.h>
//!
//! struct ConfigAB {
//!     float a;
//! };
//! typedef struct kiln_Context {
//!     struct ConfigAB ConfigAB;
//! } kiln_Context;
//!
//! struct win_1f32 {
//!     float *data;
//!     int_fast32_t strides[1];
//! };
//!
//! static void callee(kiln_Context *ctxt, int_fast32_t m, struct win_1f32 row) { ... }
//!
//! void entry(kiln_Context *ctxt, int_fast32_t n, float *x) { ... }
//! ```
//!
//! Control parameters come first in every signature, data parameters after
//! them, each group in declaration order. Numeric scalars are passed by
//! address. Instructions are never emitted as functions; their calls expand
//! to the instruction's C template.

pub mod ops;
pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bon::bon;
use kiln_ir::visit::walk_stmts;
use kiln_ir::{ConfigDecl, Expr, Procedure, Stmt, Sym, Type};
use kiln_memory::EmitStyle;
use snafu::ensure;

use crate::error::*;
use crate::{ArgKind, RenderedKernel};

use self::ops::CContext;
use self::types::{context_decls, window_struct, window_struct_decl};

const DEFAULT_INDEX_CTYPE: &str = "int_fast32_t";
const DEFAULT_INDENT: usize = 2;

/// Knobs of the C emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitConfig {
    /// C type of sizes, indices and strides.
    pub index_ctype: String,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self { index_ctype: DEFAULT_INDEX_CTYPE.to_string(), indent: DEFAULT_INDENT }
    }
}

#[bon]
impl EmitConfig {
    #[builder]
    pub fn new(
        #[builder(into, default = String::from(DEFAULT_INDEX_CTYPE))] index_ctype: String,
        #[builder(default = DEFAULT_INDENT)] indent: usize,
    ) -> Self {
        Self { index_ctype, indent }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_INDEX_CTYPE` - C type of control values (default: `int_fast32_t`)
    /// * `KILN_INDENT` - Spaces per nesting level (default: 2)
    pub fn from_env() -> Self {
        let index_ctype = std::env::var("KILN_INDEX_CTYPE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_CTYPE.to_string());
        let indent = std::env::var("KILN_INDENT").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_INDENT);
        Self { index_ctype, indent }
    }
}

/// C source code renderer.
#[derive(Debug, Clone)]
pub struct CRenderer {
    config: EmitConfig,
}

impl CRenderer {
    pub fn new(config: EmitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmitConfig {
        &self.config
    }
}

impl Default for CRenderer {
    fn default() -> Self {
        Self::new(EmitConfig::from_env())
    }
}

impl crate::Renderer for CRenderer {
    fn render(&self, proc: &Procedure) -> Result<RenderedKernel> {
        render_with(proc, &self.config)
    }

    fn backend_name(&self) -> &str {
        "c"
    }
}

/// Render `proc` with the environment's emitter configuration.
pub fn render(proc: &Procedure) -> Result<RenderedKernel> {
    render_with(proc, &EmitConfig::from_env())
}

#[tracing::instrument(skip_all, fields(proc = %proc.name()))]
pub fn render_with(proc: &Procedure, config: &EmitConfig) -> Result<RenderedKernel> {
    ensure!(!proc.is_instr(), InstructionEntrySnafu { proc: proc.name().as_str() });

    let mut order = Vec::new();
    collect_functions(proc, &mut order, &mut HashMap::new())?;
    tracing::debug!(functions = order.len(), "translation unit collected");

    let mut headers: BTreeSet<String> =
        ["<stdbool.h>", "<stdint.h>", "<stdlib.h>"].into_iter().map(String::from).collect();
    let mut configs = BTreeMap::new();
    let mut windows = BTreeMap::new();
    for function in &order {
        collect_headers(function, &mut headers);
        collect_configs(function.body(), &mut configs);
        for param in function.params() {
            if let Type::Tensor(tensor) = &param.ty
                && tensor.window
                && !matches!(param.space().emit_style(), EmitStyle::Vector { .. })
            {
                windows.insert(
                    window_struct(tensor.rank(), tensor.elem),
                    window_struct_decl(tensor.rank(), tensor.elem, &config.index_ctype),
                );
            }
        }
    }

    let mut sections = vec![headers.iter().map(|header| format!("#include {header}")).collect::<Vec<_>>().join("\n")];
    sections.push(context_decls(&configs, &config.index_ctype).join("\n"));
    if !windows.is_empty() {
        sections.push(windows.into_values().collect::<Vec<_>>().join("\n\n"));
    }

    let mut kernel = RenderedKernel::new(String::new(), proc.name().to_string(), proc.name().to_string());
    for function in &order {
        let is_entry = function.name() == proc.name();
        sections.push(render_function(function, config, is_entry)?);
    }

    kernel.add_arg("ctxt", ArgKind::Context);
    let written = kiln_ir::visit::block_writes(proc.body());
    let (control, data): (Vec<_>, Vec<_>) = proc.params().iter().partition(|param| !param.ty.is_data());
    for param in control {
        if let Type::Scalar(dtype) = &param.ty {
            kernel.add_arg(param.name.as_str(), ArgKind::Control(*dtype));
        }
    }
    for param in data {
        let Some(elem) = param.ty.elem() else { continue };
        kernel.add_arg(
            param.name.as_str(),
            ArgKind::Buffer {
                elem,
                rank: param.ty.rank(),
                space: param.space().name().to_string(),
                is_output: written.contains(&param.name),
            },
        );
    }

    kernel.code = sections.join("\n\n") + "\n";
    tracing::debug!(lines = kernel.code.lines().count(), "c source rendered");
    Ok(kernel)
}

/// Post-order walk of the call graph: callees before their callers.
fn collect_functions(proc: &Procedure, order: &mut Vec<Procedure>, seen: &mut HashMap<Sym, Procedure>) -> Result<()> {
    if let Some(known) = seen.get(proc.name()) {
        ensure!(known == proc, NameClashSnafu { name: proc.name().as_str() });
        return Ok(());
    }
    seen.insert(proc.name().clone(), proc.clone());

    let mut callees = Vec::new();
    walk_stmts(proc.body(), &mut |stmt| {
        if let Stmt::Call { proc: callee, .. } = stmt
            && !callee.is_instr()
        {
            callees.push(callee.clone());
        }
    });
    for callee in &callees {
        collect_functions(callee, order, seen)?;
    }
    order.push(proc.clone());
    Ok(())
}

fn collect_headers(proc: &Procedure, headers: &mut BTreeSet<String>) {
    let mut add = |space: &kiln_ir::MemSpace| {
        if let Some(header) = space.header() {
            headers.insert(header.to_string());
        }
    };
    for param in proc.params().iter().filter(|param| param.ty.is_data()) {
        add(&param.space());
    }
    walk_stmts(proc.body(), &mut |stmt| match stmt {
        Stmt::Alloc { mem, .. } => add(mem),
        Stmt::Call { proc: callee, .. } if callee.is_instr() => {
            for param in callee.params().iter().filter(|param| param.ty.is_data()) {
                add(&param.space());
            }
        }
        _ => {}
    });
}

fn collect_expr_configs(expr: &Expr, configs: &mut BTreeMap<Sym, Arc<ConfigDecl>>) {
    if let Expr::ReadConfig { config, .. } = expr {
        configs.entry(config.name().clone()).or_insert_with(|| Arc::clone(config));
    }
    for child in expr.children() {
        collect_expr_configs(child, configs);
    }
}

fn collect_configs(block: &kiln_ir::Block, configs: &mut BTreeMap<Sym, Arc<ConfigDecl>>) {
    walk_stmts(block, &mut |stmt| {
        if let Stmt::WriteConfig { config, .. } = stmt {
            configs.entry(config.name().clone()).or_insert_with(|| Arc::clone(config));
        }
        for expr in stmt.exprs() {
            collect_expr_configs(expr, configs);
        }
    });
}

fn render_function(proc: &Procedure, config: &EmitConfig, is_entry: bool) -> Result<String> {
    let mut ctx = CContext::new(proc, config);
    let (control, data): (Vec<_>, Vec<_>) = proc.params().iter().partition(|param| !param.ty.is_data());
    let mut decls = vec!["kiln_Context *ctxt".to_string()];
    decls.extend(control.into_iter().chain(data).map(|param| ctx.param(param)));

    for pred in proc.preds() {
        ctx.comment(format!("assert {pred}"));
    }
    ctx.block(proc.body())?;

    let linkage = if is_entry { "" } else { "static " };
    let mut lines = vec![format!("{linkage}void {}({}) {{", proc.name(), decls.join(", "))];
    lines.extend(ctx.finish());
    lines.push("}".to_string());
    Ok(lines.join("\n"))
}
