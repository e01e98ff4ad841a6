use super::{
    off_diagonal_product, FdmBlas2, FdmCompressedBlas2, FdmCompressedLinearSystem2,
    FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmVector2, MatrixCsr,
};
use crate::blas::Blas;
use crate::global_variables::*;

/// Gauss-Seidel with successive over-relaxation, optionally in red-black
/// order so each half sweep runs in parallel.
pub struct FdmGaussSeidelSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    residual_check_interval: u32,
    tolerance: Float,
    last_residual: Float,
    sor_factor: Float,
    use_red_black_ordering: bool,
    residual: FdmVector2,
    buffer: FdmVector2,
    residual_compressed: Vec<Float>,
}

impl FdmGaussSeidelSolver2 {
    pub fn new(
        max_number_of_iterations: u32,
        residual_check_interval: u32,
        tolerance: Float,
        sor_factor: Float,
        use_red_black_ordering: bool,
    ) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            residual_check_interval: residual_check_interval.max(1),
            tolerance,
            last_residual: MAX_DISTANCE,
            sor_factor,
            use_red_black_ordering,
            residual: FdmVector2::default(),
            buffer: FdmVector2::default(),
            residual_compressed: Vec::new(),
        }
    }

    pub fn sor_factor(&self) -> Float {
        self.sor_factor
    }

    pub fn use_red_black_ordering(&self) -> bool {
        self.use_red_black_ordering
    }

    /// One lexicographic sweep, in place.
    pub fn relax(a: &FdmMatrix2, b: &FdmVector2, sor_factor: Float, x: &mut FdmVector2) {
        let [nx, ny] = a.size();
        for j in 0..ny {
            for i in 0..nx {
                let center = a[(i, j)].center;
                if center == 0.0 {
                    continue;
                }
                let r = off_diagonal_product(a, x, i, j);
                x[(i, j)] = (1.0 - sor_factor) * x[(i, j)] + sor_factor * (b[(i, j)] - r) / center;
            }
        }
    }

    /// One sweep over the cells with `(i + j)` even, then the odd ones. Cells
    /// of one color only read the other color, so each half sweep writes into
    /// `buffer` in parallel.
    pub fn relax_red_black(
        a: &FdmMatrix2,
        b: &FdmVector2,
        sor_factor: Float,
        x: &mut FdmVector2,
        buffer: &mut FdmVector2,
    ) {
        for color in 0..2 {
            FdmBlas2::copy(x, buffer);
            let source: &FdmVector2 = x;
            buffer.par_for_each_mut(|i, j, value| {
                if (i + j) % 2 != color {
                    return;
                }
                let center = a[(i, j)].center;
                if center == 0.0 {
                    return;
                }
                let r = off_diagonal_product(a, source, i, j);
                *value = (1.0 - sor_factor) * source[(i, j)] + sor_factor * (b[(i, j)] - r) / center;
            });
            std::mem::swap(x, buffer);
        }
    }

    pub fn relax_compressed(a: &MatrixCsr, b: &[Float], sor_factor: Float, x: &mut [Float]) {
        for r in 0..a.rows() {
            let mut center = 0.0;
            let mut sum = 0.0;
            for (c, entry) in a.row(r) {
                if c == r {
                    center = entry;
                } else {
                    sum += entry * x[c];
                }
            }
            if center != 0.0 {
                x[r] = (1.0 - sor_factor) * x[r] + sor_factor * (b[r] - sum) / center;
            }
        }
    }

    fn is_check_iteration(&self, iteration: u32) -> bool {
        iteration != 0 && iteration % self.residual_check_interval == 0
    }
}

impl FdmLinearSystemSolver2 for FdmGaussSeidelSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        let size = system.size();
        self.residual.resize(size, 0.0);
        self.buffer.resize(size, 0.0);

        self.last_number_of_iterations = self.max_number_of_iterations;
        for iteration in 0..self.max_number_of_iterations {
            if self.use_red_black_ordering {
                Self::relax_red_black(&system.a, &system.b, self.sor_factor, &mut system.x, &mut self.buffer);
            } else {
                Self::relax(&system.a, &system.b, self.sor_factor, &mut system.x);
            }

            if self.is_check_iteration(iteration) {
                FdmBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual);
                if FdmBlas2::l2_norm(&self.residual) < self.tolerance {
                    self.last_number_of_iterations = iteration + 1;
                    break;
                }
            }
        }

        FdmBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual);
        self.last_residual = FdmBlas2::l2_norm(&self.residual);
        self.last_residual < self.tolerance
    }

    fn solve_compressed(&mut self, system: &mut FdmCompressedLinearSystem2) -> bool {
        self.residual_compressed.resize(system.b.len(), 0.0);

        self.last_number_of_iterations = self.max_number_of_iterations;
        for iteration in 0..self.max_number_of_iterations {
            Self::relax_compressed(&system.a, &system.b, self.sor_factor, &mut system.x);

            if self.is_check_iteration(iteration) {
                FdmCompressedBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
                if FdmCompressedBlas2::l2_norm(&self.residual_compressed) < self.tolerance {
                    self.last_number_of_iterations = iteration + 1;
                    break;
                }
            }
        }

        FdmCompressedBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
        self.last_residual = FdmCompressedBlas2::l2_norm(&self.residual_compressed);
        self.last_residual < self.tolerance
    }

    fn name(&self) -> &'static str {
        if self.use_red_black_ordering {
            "red_black_gauss_seidel"
        } else {
            "gauss_seidel"
        }
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}
