//! Shared fixtures for the emitter tests.

use std::sync::Arc;

use kiln_ir::{ConfigDecl, DType, ParseContext, Procedure, parse_proc};

use crate::c::{EmitConfig, render_with};
use crate::{RenderedKernel, Result};


pub(crate) fn config_ab() -> Arc<ConfigDecl> {
    ConfigDecl::new("ConfigAB", [("a", DType::Float32), ("b", DType::Float32)])
}

pub(crate) fn parse(source: &str) -> Procedure {
    parse_with(source, &[])
}

pub(crate) fn parse_with(source: &str, procs: &[&Procedure]) -> Procedure {
    let mut ctx = ParseContext::new().with_config(&config_ab());
    for proc in procs {
        ctx.add_proc(proc);
    }
    parse_proc(source, &ctx).unwrap_or_else(|err| panic!("{err}\n{source}"))
}

/// Render with the default configuration, ignoring the environment.
pub(crate) fn emit(proc: &Procedure) -> Result<RenderedKernel> {
    render_with(proc, &EmitConfig::default())
}

pub(crate) const SCALE: &str = "\
def scale(n: size, x: R[n], y: R[n]):
    for i in par(0, n):
        y[i] = 2.0 * x[i]
";

pub(crate) const ROWS: &str = "\
def rows(n: size, m: size, x: R[n, m], y: R[n, m]):
    for i in par(0, n):
        tmp: R[m] @ DRAM
        for j in par(0, m):
            tmp[j] = 2.0 * x[i, j]
        for j in par(0, m):
            y[i, j] = tmp[j] + 1.0
";

pub(crate) const SIMPLE_MATH: &str = "\
def simple_math(n: size, x: R[n] @ DRAM, y: R[n] @ DRAM):
    assert n % 8 == 0
    for i in par(0, n):
        x[i] = x[i] * y[i]
";

pub(crate) const LOADU: &str = "\
@instr(\"{dst} = _mm256_loadu_ps({src});\")
def loadu(dst: [f32][8] @ AVX2, src: [f32][8] @ DRAM):
    assert stride(src, 0) == 1
    assert stride(dst, 0) == 1
    for i in par(0, 8):
        dst[i] = src[i]
";

pub(crate) const STOREU: &str = "\
@instr(\"_mm256_storeu_ps({dst}, {src});\")
def storeu(dst: [f32][8] @ DRAM, src: [f32][8] @ AVX2):
    assert stride(dst, 0) == 1
    assert stride(src, 0) == 1
    for i in par(0, 8):
        dst[i] = src[i]
";

pub(crate) const MUL: &str = "\
@instr(\"{out} = _mm256_mul_ps({x}, {y});\")
def mm256_mul(out: [f32][8] @ AVX2, x: [f32][8] @ AVX2, y: [f32][8] @ AVX2):
    for i in par(0, 8):
        out[i] = x[i] * y[i]
";

pub(crate) const SCALE_ROW: &str = "\
def scale_row(m: size, k: R, row: [R][m]):
    for j in par(0, m):
        row[j] = k * row[j]
";
