use enumset::enum_set;
use kiln_dtype::ScalarDType;
use test_case::test_case;

use crate::builtin;
use crate::error::Error;
use crate::space::*;

#[test]
fn test_dram_capabilities() {
    let dram = builtin::dram().unwrap();
    assert!(dram.can_read_element());
    assert!(dram.can_write_element());
    assert!(!dram.is_block_only());
    assert_eq!(dram.header(), None);
}

#[test]
fn test_avx2_is_block_only() {
    let avx2 = builtin::avx2().unwrap();
    assert!(avx2.is_block_only());
    assert!(!avx2.can_read_element());
    assert_eq!(avx2.header(), Some("<immintrin.h>"));
}

#[test]
fn test_contradictory_flags_rejected() {
    let result = MemSpace::builder()
        .name("BROKEN")
        .flags(enum_set!(MemFlag::BlockTransferOnly | MemFlag::ElementRead))
        .build();
    assert!(matches!(result, Err(Error::InvalidCapabilities { .. })));
}

#[test]
fn test_vector_requires_lane_extent() {
    let result = MemSpace::builder()
        .name("VEC4")
        .flags(enum_set!(MemFlag::BlockTransferOnly))
        .emit(EmitStyle::Vector { ctype: "__m128".into(), lanes: 4 })
        .build();
    assert!(matches!(result, Err(Error::InvalidCapabilities { .. })));
}

#[test_case(&[Some(8)], true; "one register")]
#[test_case(&[Some(4), Some(8)], true; "register array")]
#[test_case(&[Some(4)], false; "short row")]
#[test_case(&[None], false; "symbolic row")]
#[test_case(&[], false; "scalar")]
fn test_avx2_alloc_shapes(dims: &[Option<i64>], ok: bool) {
    let avx2 = builtin::avx2().unwrap();
    assert_eq!(avx2.check_alloc(ScalarDType::Float32, dims).is_ok(), ok);
}

#[test]
fn test_avx2_rejects_integers() {
    let avx2 = builtin::avx2().unwrap();
    let err = avx2.check_alloc(ScalarDType::Int8, &[Some(8)]).unwrap_err();
    assert_eq!(err, Error::UnsupportedElement { space: "AVX2".into(), elem: ScalarDType::Int8 });
}

#[test]
fn test_scratch_holds_int8() {
    let scratch = builtin::gemm_scratch().unwrap();
    assert!(scratch.check_alloc(ScalarDType::Int8, &[Some(4), Some(16)]).is_ok());
    assert!(scratch.check_alloc(ScalarDType::Int32, &[Some(16)]).is_err());
}

#[test]
fn test_inner_stride() {
    let avx2 = builtin::avx2().unwrap();
    assert!(avx2.check_inner_stride(Some(1)).is_ok());
    assert!(matches!(avx2.check_inner_stride(None), Err(Error::NonContiguousInner { .. })));
    assert!(builtin::dram().unwrap().check_inner_stride(None).is_ok());
}

#[test]
fn test_heap_emission() {
    let dram = builtin::dram().unwrap();
    assert_eq!(dram.alloc_c("x", ScalarDType::Float32, &[]), "float x;");
    assert_eq!(
        dram.alloc_c("buf", ScalarDType::Float32, &["n".into(), "8".into()]),
        "float *buf = (float*) malloc(n * 8 * sizeof(*buf));"
    );
    assert_eq!(dram.free_c("buf", &["n".into()]), Some("free(buf);".into()));
    assert_eq!(dram.free_c("x", &[]), None);
    assert_eq!(dram.window_c("buf", "8 * io", false), "&buf[8 * io]");
    assert_eq!(dram.window_c("buf", "0", true), "buf");
}

#[test]
fn test_vector_emission() {
    let avx2 = builtin::avx2().unwrap();
    assert_eq!(avx2.alloc_c("xVec", ScalarDType::Float32, &["8".into()]), "__m256 xVec;");
    assert_eq!(avx2.alloc_c("acc", ScalarDType::Float32, &["4".into(), "8".into()]), "__m256 acc[4];");
    assert_eq!(avx2.free_c("acc", &["4".into(), "8".into()]), None);
    assert_eq!(avx2.window_c("acc", "8 * i", false), "acc[(8 * i) / 8]");
}

#[test]
fn test_scratch_emission() {
    let scratch = builtin::gemm_scratch().unwrap();
    assert_eq!(
        scratch.alloc_c("a", ScalarDType::Int8, &["16".into(), "16".into()]),
        "int8_t *a = (int8_t*) gemm_malloc(16 * 16 * sizeof(int8_t));"
    );
    assert_eq!(scratch.free_c("a", &["16".into()]), Some("gemm_free(a);".into()));
}

#[test]
fn test_equality_is_by_name() {
    assert_eq!(builtin::avx2().unwrap(), builtin::avx2().unwrap());
    assert_ne!(builtin::avx2().unwrap(), builtin::avx512().unwrap());
}
