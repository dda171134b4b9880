//! A full vectorisation schedule: split, stage through scalars, grow the
//! stages into vectors, separate the loads, arithmetic and stores, then map
//! each piece onto an AVX2 instruction.

use kiln_ir::{Arg, Procedure};

use crate::test::{LOADU, MUL, SIMPLE_MATH, STOREU, assert_equivalent, buffer, parse};
use crate::*;

fn vectorize(proc: &Procedure) -> Result<Procedure> {
    let (loadu, mul, storeu) = (parse(LOADU), parse(MUL), parse(STOREU));
    let mut proc = proc
        .split("i", 8, ("io", "ii"), SplitTail::Perfect)?
        .bind_expr("xVec", "x[_]")?
        .bind_expr("yVec", "y[_]")?
        .bind_expr("xy", "xVec * yVec")?;
    for name in ["xVec", "yVec", "xy"] {
        proc = proc.expand_dim(name, "8", "ii")?.lift_alloc(name, 1)?;
    }
    for stage in ["xVec[_] = _", "yVec[_] = _", "xy[_] = _"] {
        proc = proc.fission_after(stage, 1)?;
    }
    proc = proc
        .replace_all(&loadu, "for ii in _: _")?
        .replace(&mul, "for ii in _: _")?
        .replace(&storeu, "for ii in _: _")?;
    for name in ["xVec", "yVec", "xy"] {
        proc = proc.set_memory(name, "AVX2")?;
    }
    Ok(proc)
}

#[test]
fn test_vectorize_simple_math() {
    let proc = parse(SIMPLE_MATH);
    let scheduled = vectorize(&proc).unwrap();
    let text = scheduled.to_string();
    let expected = "\
def simple_math(n: size, x: R[n] @ DRAM, y: R[n] @ DRAM):
    assert n % 8 == 0
    for io in par(0, n / 8):
        xVec: R[8] @ AVX2
        yVec: R[8] @ AVX2
        xy: R[8] @ AVX2
        loadu(xVec, x[8 * io:8 * io + 8])
        loadu(yVec, y[8 * io:8 * io + 8])
        mm256_mul(xy, xVec, yVec)
        storeu(x[8 * io:8 * io + 8], xy)
";
    assert_eq!(text, expected);
    assert_equivalent(&proc, &scheduled, &[Arg::Int(16), buffer(16, 1.0), buffer(16, -2.0)]);
}

#[test]
fn test_intermediate_schedules_preserve_semantics() {
    let proc = parse(SIMPLE_MATH);
    let args = [Arg::Int(24), buffer(24, 0.5), buffer(24, 3.0)];
    let split = proc.split("i", 8, ("io", "ii"), SplitTail::Perfect).unwrap();
    assert_equivalent(&proc, &split, &args);
    let staged = split.bind_expr("xVec", "x[_]").unwrap().expand_dim("xVec", "8", "ii").unwrap();
    assert_equivalent(&proc, &staged, &args);
    let lifted = staged.lift_alloc("xVec", 1).unwrap();
    assert_equivalent(&proc, &lifted, &args);
    let fissioned = lifted.fission_after("xVec[_] = _", 1).unwrap();
    assert!(fissioned.to_string().contains("            xVec[ii] = x[8 * io + ii]\n        for ii in par(0, 8):"));
    assert_equivalent(&proc, &fissioned, &args);
}

#[test]
fn test_schedule_stops_at_first_failure() {
    let proc = parse(&SIMPLE_MATH.replace("    assert n % 8 == 0\n", ""));
    let err = vectorize(&proc).unwrap_err();
    assert_eq!(err.kind(), kiln_ir::ErrorKind::TransformPrecondition, "{err}");
}
