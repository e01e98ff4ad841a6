use super::{
    off_diagonal_product, FdmBlas2, FdmCompressedBlas2, FdmCompressedLinearSystem2,
    FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmVector2, MatrixCsr,
};
use crate::blas::Blas;
use crate::global_variables::*;
use rayon::prelude::*;

pub struct FdmJacobiSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    residual_check_interval: u32,
    tolerance: Float,
    last_residual: Float,
    x_temp: FdmVector2,
    residual: FdmVector2,
    x_temp_compressed: Vec<Float>,
    residual_compressed: Vec<Float>,
}

impl FdmJacobiSolver2 {
    pub fn new(max_number_of_iterations: u32, residual_check_interval: u32, tolerance: Float) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            residual_check_interval: residual_check_interval.max(1),
            tolerance,
            last_residual: MAX_DISTANCE,
            x_temp: FdmVector2::default(),
            residual: FdmVector2::default(),
            x_temp_compressed: Vec::new(),
            residual_compressed: Vec::new(),
        }
    }

    /// One Jacobi sweep from `x` into `x_temp`. Rows with a zero diagonal keep
    /// their value.
    pub fn relax(a: &FdmMatrix2, b: &FdmVector2, x: &FdmVector2, x_temp: &mut FdmVector2) {
        x_temp.par_for_each_mut(|i, j, value| {
            let center = a[(i, j)].center;
            *value = if center == 0.0 {
                x[(i, j)]
            } else {
                (b[(i, j)] - off_diagonal_product(a, x, i, j)) / center
            };
        });
    }

    pub fn relax_compressed(a: &MatrixCsr, b: &[Float], x: &[Float], x_temp: &mut [Float]) {
        x_temp.par_iter_mut().enumerate().for_each(|(r, value)| {
            let mut center = 0.0;
            let mut sum = 0.0;
            for (c, entry) in a.row(r) {
                if c == r {
                    center = entry;
                } else {
                    sum += entry * x[c];
                }
            }
            *value = if center == 0.0 { x[r] } else { (b[r] - sum) / center };
        });
    }

    fn is_check_iteration(&self, iteration: u32) -> bool {
        iteration != 0 && iteration % self.residual_check_interval == 0
    }
}

impl FdmLinearSystemSolver2 for FdmJacobiSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        let size = system.size();
        self.x_temp.resize(size, 0.0);
        self.residual.resize(size, 0.0);

        self.last_number_of_iterations = self.max_number_of_iterations;
        for iteration in 0..self.max_number_of_iterations {
            Self::relax(&system.a, &system.b, &system.x, &mut self.x_temp);
            std::mem::swap(&mut system.x, &mut self.x_temp);

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
        let size = system.b.len();
        self.x_temp_compressed.resize(size, 0.0);
        self.residual_compressed.resize(size, 0.0);

        self.last_number_of_iterations = self.max_number_of_iterations;
        for iteration in 0..self.max_number_of_iterations {
            Self::relax_compressed(&system.a, &system.b, &system.x, &mut self.x_temp_compressed);
            std::mem::swap(&mut system.x, &mut self.x_temp_compressed);

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
        "jacobi"
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::build_definite_system;

    #[test]
    fn test_jacobi_converges_on_diagonally_dominant_system() {
        let mut system = build_definite_system([4, 4]);
        let mut solver = FdmJacobiSolver2::new(500, 5, 1e-8);
        assert!(solver.solve(&mut system));
        assert!(solver.last_residual() < 1e-8);
        assert!(solver.last_number_of_iterations() < 500);
    }

    #[test]
    fn test_jacobi_reports_failure_when_out_of_iterations() {
        let mut system = build_definite_system([8, 8]);
        let mut solver = FdmJacobiSolver2::new(2, 5, 1e-12);
        assert!(!solver.solve(&mut system));
        assert_eq!(solver.last_number_of_iterations(), 2);
    }
}
