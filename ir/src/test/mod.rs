//! Shared fixtures for the IR tests.

use std::sync::Arc;

use kiln_dtype::DType;

use crate::{ConfigDecl, ParseContext, Procedure, Result, parse_proc};

mod property;
mod unit;

pub(crate) fn config_ab() -> Arc<ConfigDecl> {
    ConfigDecl::new("ConfigAB", [("a", DType::Float32), ("b", DType::Float32)])
}

pub(crate) fn context() -> ParseContext {
    ParseContext::new().with_config(&config_ab())
}

pub(crate) fn parse(source: &str) -> Result<Procedure> {
    parse_proc(source, &context())
}

pub(crate) fn parse_with(source: &str, procs: &[&Procedure]) -> Result<Procedure> {
    let mut ctx = context();
    for proc in procs {
        ctx.add_proc(proc);
    }
    parse_proc(source, &ctx)
}

pub(crate) const SGEMM: &str = "\
def sgemm(m: index, n: index, p: index, A: f32[m, p] @ DRAM, B: f32[p, n] @ DRAM, C: f32[m, n] @ DRAM):
    assert n > 0 and m > 0 and p > 0
    for i in par(0, m):
        for j in par(0, n):
            for k in par(0, p):
                C[i, j] += A[i, k] * B[k, j]
";

pub(crate) const CONV1D: &str = "\
def conv1d(n: size, m: size, r: size, x: R[n], w: R[m], res: R[r]):
    for i in par(0, r):
        res[i] = 0.0
    for i in par(0, r):
        for j in par(0, n):
            if i <= j and j < i + m:
                res[i] += x[j] * w[i - j + m - 1]
";

pub(crate) const ALLOC_NEST: &str = "\
def alloc_nest(n: size, m: size, x: R[n, m], y: R[n, m] @ DRAM, res: R[n, m] @ DRAM):
    for i in par(0, n):
        rloc: R[m] @ DRAM
        xloc: R[m] @ DRAM
        yloc: R[m] @ DRAM
        for j in par(0, m):
            xloc[j] = x[i, j]
        for j in par(0, m):
            yloc[j] = y[i, j]
        for j in par(0, m):
            rloc[j] = xloc[j] + yloc[j]
        for j in par(0, m):
            res[i, j] = rloc[j]
";

pub(crate) const LOADU: &str = "\
@instr(\"{dst} = _mm256_loadu_ps({src});\")
def loadu(dst: [f32][8] @ AVX2, src: [f32][8] @ DRAM):
    assert stride(src, 0) == 1
    assert stride(dst, 0) == 1
    for i in par(0, 8):
        dst[i] = src[i]
";
