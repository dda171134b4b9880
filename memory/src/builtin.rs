//! Spaces available without user registration.

use enumset::{EnumSet, enum_set};
use kiln_dtype::ScalarDType;

use crate::error::Result;
use crate::space::{AllocRule, EmitStyle, MemFlag, MemSpace};

/// Ordinary addressable memory.
pub fn dram() -> Result<MemSpace> {
    MemSpace::builder()
        .name("DRAM")
        .flags(enum_set!(MemFlag::ElementRead | MemFlag::ElementWrite))
        .build()
}

fn vector(name: &str, ctype: &str, lanes: usize, header: &str) -> Result<MemSpace> {
    MemSpace::builder()
        .name(name)
        .flags(enum_set!(MemFlag::BlockTransferOnly))
        .alloc(AllocRule {
            unit_inner_stride: true,
            inner_extent: Some(lanes),
            elements: enum_set!(ScalarDType::Real | ScalarDType::Float32),
        })
        .emit(EmitStyle::Vector { ctype: ctype.to_string(), lanes })
        .header(header)
        .build()
}

/// 256-bit vector registers: 8 lanes of `f32`.
pub fn avx2() -> Result<MemSpace> {
    vector("AVX2", "__m256", 8, "<immintrin.h>")
}

/// 512-bit vector registers: 16 lanes of `f32`.
pub fn avx512() -> Result<MemSpace> {
    vector("AVX512", "__m512", 16, "<immintrin.h>")
}

fn scratchpad(name: &str, elements: EnumSet<ScalarDType>, alloc_fn: &str, free_fn: &str) -> Result<MemSpace> {
    MemSpace::builder()
        .name(name)
        .flags(enum_set!(MemFlag::BlockTransferOnly))
        .alloc(AllocRule { unit_inner_stride: true, inner_extent: Some(16), elements })
        .emit(EmitStyle::Scratchpad { alloc_fn: alloc_fn.to_string(), free_fn: free_fn.to_string() })
        .header("\"gemmini.h\"")
        .build()
}

/// Accelerator input scratchpad, rows of 16 elements.
pub fn gemm_scratch() -> Result<MemSpace> {
    scratchpad(
        "GEMM_SCRATCH",
        enum_set!(ScalarDType::Int8 | ScalarDType::Real | ScalarDType::Float32),
        "gemm_malloc",
        "gemm_free",
    )
}

/// Accelerator accumulator memory, rows of 16 elements.
pub fn gemm_accum() -> Result<MemSpace> {
    scratchpad(
        "GEMM_ACCUM",
        enum_set!(ScalarDType::Int32 | ScalarDType::Real | ScalarDType::Float32),
        "gemm_acc_malloc",
        "gemm_acc_free",
    )
}

/// Every built-in space, in registration order.
pub fn all() -> Result<Vec<MemSpace>> {
    Ok(vec![dram()?, avx2()?, avx512()?, gemm_scratch()?, gemm_accum()?])
}
