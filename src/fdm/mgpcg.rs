use super::cg::{is_converged, resize_vectors};
use super::mg::{FdmMgMatrix2, FdmMgVector2};
use super::{
    hold_excluded_cells, FdmBlas2, FdmCompressedLinearSystem2, FdmLinearSystem2,
    FdmLinearSystemSolver2, FdmMgLinearSystem2, FdmMgLinearSystemSolver2, FdmMgSolver2,
    FdmVector2,
};
use crate::blas::Blas;
use crate::cg::{pcg, CgVectors, Preconditioner};
use crate::global_variables::*;
use crate::mg::{mg_v_cycle, MgParameters};
use log::warn;

/// One V-cycle from a zero guess as the preconditioner solve.
struct MgPreconditioner<'a> {
    a: &'a FdmMgMatrix2,
    params: &'a MgParameters<FdmBlas2>,
    x: FdmMgVector2,
    b: FdmMgVector2,
    buffer: FdmMgVector2,
}

impl<'a> MgPreconditioner<'a> {
    fn build(a: &'a FdmMgMatrix2, params: &'a MgParameters<FdmBlas2>) -> Self {
        let levels: Vec<FdmVector2> = a
            .levels
            .iter()
            .map(|level| FdmVector2::new(level.size()))
            .collect();
        Self {
            a,
            params,
            x: FdmMgVector2 {
                levels: levels.clone(),
            },
            b: FdmMgVector2 {
                levels: levels.clone(),
            },
            buffer: FdmMgVector2 { levels },
        }
    }
}

impl Preconditioner<FdmBlas2> for MgPreconditioner<'_> {
    fn solve(&mut self, b: &FdmVector2, x: &mut FdmVector2) {
        for level in self.x.levels.iter_mut() {
            FdmBlas2::set(0.0, level);
        }
        FdmBlas2::copy(b, &mut self.b.levels[0]);
        mg_v_cycle(self.a, self.params, &mut self.x, &mut self.b, &mut self.buffer);
        FdmBlas2::copy(&self.x.levels[0], x);
    }
}

/// Conjugate gradient on the finest level, preconditioned by a multigrid
/// V-cycle over the whole hierarchy.
pub struct FdmMgpcgSolver2 {
    mg: FdmMgSolver2,
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: Float,
    last_residual: Float,
    vectors: CgVectors<FdmVector2>,
}

impl FdmMgpcgSolver2 {
    pub fn new(max_number_of_iterations: u32, tolerance: Float, max_number_of_levels: usize) -> Self {
        Self {
            mg: FdmMgSolver2::new(max_number_of_levels),
            max_number_of_iterations,
            last_number_of_iterations: 0,
            tolerance,
            last_residual: MAX_DISTANCE,
            vectors: CgVectors::default(),
        }
    }

    /// Replaces the multigrid parameters used by the preconditioner.
    pub fn with_multigrid(mut self, mg: FdmMgSolver2) -> Self {
        self.mg = mg;
        self
    }
}

impl FdmLinearSystemSolver2 for FdmMgpcgSolver2 {
    fn solve(&mut self, _system: &mut FdmLinearSystem2) -> bool {
        warn!("{} needs a multigrid system; single-level solve ignored", self.name());
        false
    }

    fn solve_compressed(&mut self, _system: &mut FdmCompressedLinearSystem2) -> bool {
        warn!("{} needs a multigrid system; compressed solve ignored", self.name());
        false
    }

    fn name(&self) -> &'static str {
        "mgpcg"
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}

impl FdmMgLinearSystemSolver2 for FdmMgpcgSolver2 {
    fn params(&self) -> &MgParameters<FdmBlas2> {
        self.mg.params()
    }

    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem2) -> bool {
        if system.number_of_levels() == 0 {
            self.last_number_of_iterations = 0;
            self.last_residual = 0.0;
            return true;
        }
        let FdmMgLinearSystem2 { a, x, b } = system;
        resize_vectors(&mut self.vectors, a.levels[0].size());

        let mut preconditioner = MgPreconditioner::build(a, self.mg.params());
        let result = pcg::<FdmBlas2, _>(
            &a.levels[0],
            &b.levels[0],
            self.max_number_of_iterations,
            self.tolerance,
            &mut preconditioner,
            &mut x.levels[0],
            &mut self.vectors,
        );
        hold_excluded_cells(&a.levels[0], &mut x.levels[0]);

        self.last_number_of_iterations = result.number_of_iterations;
        self.last_residual = result.residual_norm;
        is_converged(
            self.last_residual,
            self.tolerance,
            self.last_number_of_iterations,
            self.max_number_of_iterations,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::FdmMatrixRow2;
    use crate::grid::Array2;

    #[test]
    fn test_mgpcg_solves_poisson_hierarchy() {
        let mut system = FdmMgLinearSystem2::default();
        system.resize_with_finest([8, 8], 3);
        for (level, a) in system.a.levels.iter_mut().enumerate() {
            let [nx, ny] = a.size();
            let inverse_h_squared = 1.0 / ((1 << (2 * level)) as Float);
            a.par_for_each_mut(|i, j, row| {
                *row = FdmMatrixRow2 {
                    center: 4.0 * inverse_h_squared,
                    right: if i + 1 < nx { -inverse_h_squared } else { 0.0 },
                    up: if j + 1 < ny { -inverse_h_squared } else { 0.0 },
                };
            });
        }
        system.b.levels[0] = Array2::from_fn([8, 8], |i, j| (i as Float - j as Float) * 0.1);

        let mut solver = FdmMgpcgSolver2::new(100, 1e-10, 3);
        assert!(solver.solve_mg(&mut system));
        assert!(solver.last_number_of_iterations() < 50);

        let mut residual = FdmVector2::new([8, 8]);
        FdmBlas2::residual(&system.a.levels[0], &system.x.levels[0], &system.b.levels[0], &mut residual);
        assert!(FdmBlas2::l2_norm(&residual) < 1e-8);
    }
}
