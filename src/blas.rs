use crate::global_variables::*;

/// Primitive vector/matrix operations the iterative solvers are written
/// against. Implementations pick the concrete storage; sizes are a caller
/// contract and are only checked in debug builds.
pub trait Blas {
    type Vector: Send + Sync;
    type Matrix: Send + Sync;

    /// `result = s` for every element.
    fn set(s: Float, result: &mut Self::Vector);

    /// `result = v`.
    fn copy(v: &Self::Vector, result: &mut Self::Vector);

    fn set_matrix(s: Float, result: &mut Self::Matrix);

    fn copy_matrix(m: &Self::Matrix, result: &mut Self::Matrix);

    fn dot(a: &Self::Vector, b: &Self::Vector) -> Float;

    /// `result = a * x + y`.
    fn axpy(a: Float, x: &Self::Vector, y: &Self::Vector, result: &mut Self::Vector);

    /// `y = a * x + y`.
    fn axpy_assign(a: Float, x: &Self::Vector, y: &mut Self::Vector);

    /// `y = x + a * y`.
    fn xpay_assign(a: Float, x: &Self::Vector, y: &mut Self::Vector);

    /// `result = m * v`.
    fn mvm(m: &Self::Matrix, v: &Self::Vector, result: &mut Self::Vector);

    /// `result = b - a * x`.
    fn residual(a: &Self::Matrix, x: &Self::Vector, b: &Self::Vector, result: &mut Self::Vector);

    fn l2_norm(v: &Self::Vector) -> Float;

    fn linf_norm(v: &Self::Vector) -> Float;
}
