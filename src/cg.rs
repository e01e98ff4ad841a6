use crate::blas::Blas;
use crate::global_variables::*;

/// Exact residual recomputation interval that bounds drift of the updated
/// residual.
const RESIDUAL_REFRESH_INTERVAL: u32 = 50;

/// Approximate inverse of the system matrix applied once per iteration.
pub trait Preconditioner<B: Blas> {
    /// `x = M^-1 b`.
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector);
}

pub struct NullCgPreconditioner;

impl<B: Blas> Preconditioner<B> for NullCgPreconditioner {
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector) {
        B::copy(b, x);
    }
}

/// Scratch vectors of the (preconditioned) conjugate gradient iteration.
#[derive(Clone, Debug, Default)]
pub struct CgVectors<V> {
    pub r: V,
    pub d: V,
    pub q: V,
    pub s: V,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CgResult {
    pub number_of_iterations: u32,
    /// Square root of the last preconditioned residual product `r . M^-1 r`.
    pub residual_norm: Float,
}

pub fn cg<B: Blas>(
    a: &B::Matrix,
    b: &B::Vector,
    max_number_of_iterations: u32,
    tolerance: Float,
    x: &mut B::Vector,
    vectors: &mut CgVectors<B::Vector>,
) -> CgResult {
    pcg::<B, _>(
        a,
        b,
        max_number_of_iterations,
        tolerance,
        &mut NullCgPreconditioner,
        x,
        vectors,
    )
}

/// Preconditioned conjugate gradient for symmetric positive (semi-)definite
/// systems. `x` holds the initial guess on entry and the solution on exit;
/// the scratch vectors must already have the size of `b`.
pub fn pcg<B, P>(
    a: &B::Matrix,
    b: &B::Vector,
    max_number_of_iterations: u32,
    tolerance: Float,
    preconditioner: &mut P,
    x: &mut B::Vector,
    vectors: &mut CgVectors<B::Vector>,
) -> CgResult
where
    B: Blas,
    P: Preconditioner<B>,
{
    let CgVectors { r, d, q, s } = vectors;
    B::set(0.0, r);
    B::set(0.0, d);
    B::set(0.0, q);
    B::set(0.0, s);

    B::residual(a, x, b, r);
    preconditioner.solve(r, d);
    let mut sigma_new = B::dot(r, d);

    let mut iteration = 0;
    let mut trigger = false;
    while sigma_new > tolerance * tolerance && iteration < max_number_of_iterations {
        B::mvm(a, d, q);
        let curvature = B::dot(d, q);
        if curvature == 0.0 || !curvature.is_finite() {
            break;
        }
        let alpha = sigma_new / curvature;
        B::axpy_assign(alpha, d, x);

        if trigger || (iteration % RESIDUAL_REFRESH_INTERVAL == 0 && iteration > 0) {
            B::residual(a, x, b, r);
            trigger = false;
        } else {
            B::axpy_assign(-alpha, q, r);
        }

        preconditioner.solve(r, s);
        let sigma_old = sigma_new;
        sigma_new = B::dot(r, s);
        if sigma_new > sigma_old {
            trigger = true;
        }

        let beta = sigma_new / sigma_old;
        B::xpay_assign(beta, s, d);
        iteration += 1;
    }

    CgResult {
        number_of_iterations: iteration,
        residual_norm: sigma_new.abs().sqrt(),
    }
}
