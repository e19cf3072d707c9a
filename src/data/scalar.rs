//! Scalar field abstraction for front entries.

use bytemuck::Pod;
use num_complex::Complex;
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, AddAssign};

/// Entry type of matrices and fronts: real or complex, plain-old-data so it can
/// travel on the wire unchanged.
pub trait Scalar:
    Pod + Zero + Add<Output = Self> + AddAssign + PartialEq + Debug + Send + Sync + 'static
{
    /// Complex arithmetic costs four real flops per operation.
    const IS_COMPLEX: bool;

    /// Complex conjugate; identity for real scalars.
    fn conj(self) -> Self;
}

macro_rules! impl_real {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const IS_COMPLEX: bool = false;
            #[inline]
            fn conj(self) -> Self {
                self
            }
        }
    )*};
}

impl_real!(f32, f64);

macro_rules! impl_complex {
    ($($t:ty),*) => {$(
        impl Scalar for Complex<$t> {
            const IS_COMPLEX: bool = true;
            #[inline]
            fn conj(self) -> Self {
                Complex::conj(&self)
            }
        }
    )*};
}

impl_complex!(f32, f64);
