use crate::*;
use proptest::prelude::*;

#[rustfmt::skip]
impl ScalarDType {
    pub fn float_generator() -> impl Strategy<Value = Self> {
        prop_oneof![Just(Self::Real), Just(Self::Float32), Just(Self::Float64)]
    }

    pub fn generator() -> impl Strategy<Value = Self> {
        prop_oneof![
            Just(Self::Real), Just(Self::Int8), Just(Self::Int32),
            Just(Self::Float32), Just(Self::Float64)
        ]
    }
}
