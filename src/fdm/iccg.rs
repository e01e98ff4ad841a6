use super::cg::{is_converged, resize_compressed_vectors, resize_vectors};
use super::{
    FdmBlas2, FdmCompressedBlas2, FdmCompressedLinearSystem2, FdmLinearSystem2,
    FdmLinearSystemSolver2, FdmMatrix2, FdmVector2, MatrixCsr,
};
use crate::cg::{pcg, CgVectors, Preconditioner};
use crate::global_variables::*;

fn inverse_pivot(denominator: Float) -> Float {
    if denominator > 0.0 {
        1.0 / denominator
    } else {
        0.0
    }
}

/// Zero fill-in incomplete Cholesky factor `(E^-1 + L) E (E^-1 + L^T)` of the
/// stencil matrix, where `L` is its strictly lower part and `E` holds the
/// inverse pivots.
struct IncompleteCholeskyPreconditioner<'a> {
    a: &'a FdmMatrix2,
    d: FdmVector2,
    y: FdmVector2,
}

impl<'a> IncompleteCholeskyPreconditioner<'a> {
    fn build(a: &'a FdmMatrix2) -> Self {
        let size = a.size();
        let mut d = FdmVector2::new(size);
        a.for_each_index(|i, j| {
            let mut denominator = a[(i, j)].center;
            if i > 0 {
                let right = a[(i - 1, j)].right;
                denominator -= right * right * d[(i - 1, j)];
            }
            if j > 0 {
                let up = a[(i, j - 1)].up;
                denominator -= up * up * d[(i, j - 1)];
            }
            d[(i, j)] = inverse_pivot(denominator);
        });
        Self {
            a,
            d,
            y: FdmVector2::new(size),
        }
    }
}

impl Preconditioner<FdmBlas2> for IncompleteCholeskyPreconditioner<'_> {
    fn solve(&mut self, b: &FdmVector2, x: &mut FdmVector2) {
        let a = self.a;
        let [nx, ny] = a.size();

        for j in 0..ny {
            for i in 0..nx {
                let mut value = b[(i, j)];
                if i > 0 {
                    value -= a[(i - 1, j)].right * self.y[(i - 1, j)];
                }
                if j > 0 {
                    value -= a[(i, j - 1)].up * self.y[(i, j - 1)];
                }
                self.y[(i, j)] = value * self.d[(i, j)];
            }
        }

        for j in (0..ny).rev() {
            for i in (0..nx).rev() {
                let mut sum = 0.0;
                if i + 1 < nx {
                    sum += a[(i, j)].right * x[(i + 1, j)];
                }
                if j + 1 < ny {
                    sum += a[(i, j)].up * x[(i, j + 1)];
                }
                x[(i, j)] = self.y[(i, j)] - self.d[(i, j)] * sum;
            }
        }
    }
}

/// The same factorization over the lower triangle of a compressed matrix.
struct CompressedIncompleteCholeskyPreconditioner<'a> {
    a: &'a MatrixCsr,
    d: Vec<Float>,
    y: Vec<Float>,
}

impl<'a> CompressedIncompleteCholeskyPreconditioner<'a> {
    fn build(a: &'a MatrixCsr) -> Self {
        let rows = a.rows();
        let mut d = vec![0.0; rows];
        for r in 0..rows {
            let mut denominator = 0.0;
            for (c, value) in a.row(r) {
                if c == r {
                    denominator += value;
                } else if c < r {
                    denominator -= value * value * d[c];
                }
            }
            d[r] = inverse_pivot(denominator);
        }
        Self {
            a,
            d,
            y: vec![0.0; rows],
        }
    }
}

impl Preconditioner<FdmCompressedBlas2> for CompressedIncompleteCholeskyPreconditioner<'_> {
    fn solve(&mut self, b: &Vec<Float>, x: &mut Vec<Float>) {
        let rows = self.a.rows();
        for r in 0..rows {
            let lower: Float = self
                .a
                .row(r)
                .filter(|&(c, _)| c < r)
                .map(|(c, value)| value * self.y[c])
                .sum();
            self.y[r] = (b[r] - lower) * self.d[r];
        }
        for r in (0..rows).rev() {
            let upper: Float = self
                .a
                .row(r)
                .filter(|&(c, _)| c > r)
                .map(|(c, value)| value * x[c])
                .sum();
            x[r] = self.y[r] - self.d[r] * upper;
        }
    }
}

/// Conjugate gradient preconditioned with incomplete Cholesky. This is the
/// default back-end of the pressure solvers.
pub struct FdmIccgSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: Float,
    last_residual: Float,
    vectors: CgVectors<FdmVector2>,
    compressed_vectors: CgVectors<Vec<Float>>,
}

impl FdmIccgSolver2 {
    pub fn new(max_number_of_iterations: u32, tolerance: Float) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            tolerance,
            last_residual: MAX_DISTANCE,
            vectors: CgVectors::default(),
            compressed_vectors: CgVectors::default(),
        }
    }

    fn finish(&mut self, number_of_iterations: u32, residual: Float) -> bool {
        self.last_number_of_iterations = number_of_iterations;
        self.last_residual = residual;
        is_converged(
            self.last_residual,
            self.tolerance,
            self.last_number_of_iterations,
            self.max_number_of_iterations,
        )
    }
}

impl FdmLinearSystemSolver2 for FdmIccgSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        resize_vectors(&mut self.vectors, system.size());
        let mut preconditioner = IncompleteCholeskyPreconditioner::build(&system.a);
        let result = pcg::<FdmBlas2, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut preconditioner,
            &mut system.x,
            &mut self.vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn solve_compressed(&mut self, system: &mut FdmCompressedLinearSystem2) -> bool {
        resize_compressed_vectors(&mut self.compressed_vectors, system.b.len());
        let mut preconditioner = CompressedIncompleteCholeskyPreconditioner::build(&system.a);
        let result = pcg::<FdmCompressedBlas2, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut preconditioner,
            &mut system.x,
            &mut self.compressed_vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn name(&self) -> &'static str {
        "iccg"
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}
