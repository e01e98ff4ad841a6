use super::{
    FdmBlas2, FdmCompressedBlas2, FdmCompressedLinearSystem2, FdmLinearSystem2,
    FdmLinearSystemSolver2, FdmMatrix2, FdmVector2, MatrixCsr,
};
use crate::blas::Blas;
use crate::cg::{cg, pcg, CgVectors, Preconditioner};
use crate::global_variables::*;
use rayon::prelude::*;

pub(crate) fn resize_vectors(vectors: &mut CgVectors<FdmVector2>, size: [usize; D]) {
    vectors.r.resize(size, 0.0);
    vectors.d.resize(size, 0.0);
    vectors.q.resize(size, 0.0);
    vectors.s.resize(size, 0.0);
}

/// CG-family success: the residual met the tolerance, or the iteration
/// stopped before the cap (breakdown at the current iterate).
pub(crate) fn is_converged(
    residual: Float,
    tolerance: Float,
    number_of_iterations: u32,
    max_number_of_iterations: u32,
) -> bool {
    residual <= tolerance || number_of_iterations < max_number_of_iterations
}

pub(crate) fn resize_compressed_vectors(vectors: &mut CgVectors<Vec<Float>>, size: usize) {
    vectors.r.resize(size, 0.0);
    vectors.d.resize(size, 0.0);
    vectors.q.resize(size, 0.0);
    vectors.s.resize(size, 0.0);
}

/// Unpreconditioned conjugate gradient.
pub struct FdmCgSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: Float,
    last_residual: Float,
    vectors: CgVectors<FdmVector2>,
    compressed_vectors: CgVectors<Vec<Float>>,
}

impl FdmCgSolver2 {
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

    pub fn tolerance(&self) -> Float {
        self.tolerance
    }

    pub fn max_number_of_iterations(&self) -> u32 {
        self.max_number_of_iterations
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

impl FdmLinearSystemSolver2 for FdmCgSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        resize_vectors(&mut self.vectors, system.size());
        let result = cg::<FdmBlas2>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut system.x,
            &mut self.vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn solve_compressed(&mut self, system: &mut FdmCompressedLinearSystem2) -> bool {
        resize_compressed_vectors(&mut self.compressed_vectors, system.b.len());
        let result = cg::<FdmCompressedBlas2>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut system.x,
            &mut self.compressed_vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn name(&self) -> &'static str {
        "cg"
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}

/// Jacobi preconditioner: `x = b / diag(A)`. Rows with a zero diagonal pass
/// through as zero. Both the stencil and the compressed vectors are flat,
/// so one inverse diagonal serves either storage.
#[derive(Clone, Debug, Default)]
pub struct DiagonalPreconditioner {
    inverse_diagonal: Vec<Float>,
}

impl DiagonalPreconditioner {
    pub fn build(&mut self, a: &FdmMatrix2) {
        self.inverse_diagonal.clear();
        self.inverse_diagonal
            .extend(a.data().iter().map(|row| inverse(row.center)));
    }

    pub fn build_compressed(&mut self, a: &MatrixCsr) {
        self.inverse_diagonal.clear();
        self.inverse_diagonal
            .extend((0..a.rows()).map(|r| inverse(a.diagonal(r))));
    }

    fn apply(&self, b: &[Float], x: &mut [Float]) {
        x.par_iter_mut()
            .zip(b.par_iter().zip(self.inverse_diagonal.par_iter()))
            .for_each(|(x, (b, inverse_diagonal))| *x = b * inverse_diagonal);
    }
}

fn inverse(diagonal: Float) -> Float {
    if diagonal == 0.0 {
        0.0
    } else {
        1.0 / diagonal
    }
}

impl Preconditioner<FdmBlas2> for DiagonalPreconditioner {
    fn solve(&mut self, b: &FdmVector2, x: &mut FdmVector2) {
        self.apply(b.data(), x.data_mut());
    }
}

impl Preconditioner<FdmCompressedBlas2> for DiagonalPreconditioner {
    fn solve(&mut self, b: &Vec<Float>, x: &mut Vec<Float>) {
        self.apply(b, x);
    }
}

/// Conjugate gradient with the Jacobi preconditioner.
pub struct FdmPcgSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: Float,
    last_residual: Float,
    preconditioner: DiagonalPreconditioner,
    vectors: CgVectors<FdmVector2>,
    compressed_vectors: CgVectors<Vec<Float>>,
}

impl FdmPcgSolver2 {
    pub fn new(max_number_of_iterations: u32, tolerance: Float) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            tolerance,
            last_residual: MAX_DISTANCE,
            preconditioner: DiagonalPreconditioner::default(),
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

impl FdmLinearSystemSolver2 for FdmPcgSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        resize_vectors(&mut self.vectors, system.size());
        self.preconditioner.build(&system.a);
        let result = pcg::<FdmBlas2, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut self.preconditioner,
            &mut system.x,
            &mut self.vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn solve_compressed(&mut self, system: &mut FdmCompressedLinearSystem2) -> bool {
        resize_compressed_vectors(&mut self.compressed_vectors, system.b.len());
        self.preconditioner.build_compressed(&system.a);
        let result = pcg::<FdmCompressedBlas2, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut self.preconditioner,
            &mut system.x,
            &mut self.compressed_vectors,
        );
        self.finish(result.number_of_iterations, result.residual_norm)
    }

    fn name(&self) -> &'static str {
        "pcg"
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

    fn residual_norm(system: &FdmLinearSystem2) -> Float {
        let mut r = FdmVector2::new(system.size());
        FdmBlas2::residual(&system.a, &system.x, &system.b, &mut r);
        FdmBlas2::l2_norm(&r)
    }

    #[test]
    fn test_convergence_accepts_tolerance_or_early_stop() {
        assert!(is_converged(1e-9, 1e-8, 100, 100));
        assert!(is_converged(1e-3, 1e-8, 12, 100));
        assert!(!is_converged(1e-3, 1e-8, 100, 100));
    }

    #[test]
    fn test_cg_solves_definite_system() {
        let mut system = build_definite_system([6, 5]);
        let mut solver = FdmCgSolver2::new(100, 1e-10);
        assert!(solver.solve(&mut system));
        assert!(solver.last_number_of_iterations() <= 30);
        assert!(residual_norm(&system) < 1e-8, "residual {}", residual_norm(&system));
    }

    #[test]
    fn test_pcg_compressed_matches_stencil() {
        let mut system = build_definite_system([5, 4]);
        let mut compressed = FdmCompressedLinearSystem2::default();
        compressed.compress_from(&system);

        let mut solver = FdmPcgSolver2::new(100, 1e-12);
        assert!(solver.solve(&mut system));
        assert!(solver.solve_compressed(&mut compressed));
        for (value, expected) in compressed.x.iter().zip(system.x.data()) {
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_right_hand_side_needs_no_iteration() {
        let mut system = build_definite_system([3, 3]);
        system.b.fill(0.0);
        let mut solver = FdmCgSolver2::new(10, 1e-6);
        assert!(solver.solve(&mut system));
        assert_eq!(solver.last_number_of_iterations(), 0);
        assert!(system.x.data().iter().all(|&x| x == 0.0));
    }
}
