pub mod blocked;
pub mod fractional;

pub use blocked::GridSinglePhasePressureSolver2;
pub use fractional::GridFractionalSinglePhasePressureSolver2;

use crate::boundary::GridBoundaryConditionSolver2;
use crate::error::PressureError;
use crate::fdm::{
    FdmCompressedLinearSystem2, FdmIccgSolver2, FdmLinearSystem2, FdmLinearSystemSolver2,
    FdmMatrix2, FdmMgLinearSystem2, FdmMgLinearSystemSolver2, FdmVector2,
};
use crate::field::{ScalarField2, VectorField2};
use crate::global_variables::*;
use crate::grid::FaceCenteredGrid2;
use log::{debug, warn};
use rayon::prelude::*;

/// Back-end used to solve the assembled pressure system. Multigrid solvers
/// need the whole level hierarchy, so they are kept apart from the
/// single-level ones.
pub enum PressureSystemSolver2 {
    Single(Box<dyn FdmLinearSystemSolver2>),
    Multigrid(Box<dyn FdmMgLinearSystemSolver2>),
}

impl Default for PressureSystemSolver2 {
    fn default() -> Self {
        PressureSystemSolver2::Single(Box::new(FdmIccgSolver2::new(MAX_ITER, TOLERANCE_PRESSURE)))
    }
}

impl PressureSystemSolver2 {
    pub fn name(&self) -> &'static str {
        match self {
            PressureSystemSolver2::Single(solver) => solver.name(),
            PressureSystemSolver2::Multigrid(solver) => solver.name(),
        }
    }

    pub fn is_multigrid(&self) -> bool {
        matches!(self, PressureSystemSolver2::Multigrid(_))
    }

    pub fn max_number_of_levels(&self) -> usize {
        match self {
            PressureSystemSolver2::Single(_) => 1,
            PressureSystemSolver2::Multigrid(solver) => solver.params().max_number_of_levels,
        }
    }

    pub fn last_number_of_iterations(&self) -> u32 {
        match self {
            PressureSystemSolver2::Single(solver) => solver.last_number_of_iterations(),
            PressureSystemSolver2::Multigrid(solver) => solver.last_number_of_iterations(),
        }
    }

    pub fn last_residual(&self) -> Float {
        match self {
            PressureSystemSolver2::Single(solver) => solver.last_residual(),
            PressureSystemSolver2::Multigrid(solver) => solver.last_residual(),
        }
    }

    /// Rejects representations the back-end cannot run on.
    pub fn check_representation(&self, use_compressed: bool) -> Result<(), PressureError> {
        if self.is_multigrid() && use_compressed {
            return Err(PressureError::UnsupportedRepresentation {
                solver: self.name(),
                compressed: use_compressed,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PressureSolveReport {
    pub converged: bool,
    /// Nothing to project: empty grid or no fluid cell.
    pub skipped: bool,
    pub number_of_fluid_cells: usize,
    pub number_of_levels: usize,
    pub number_of_iterations: u32,
    pub residual: Float,
}

impl PressureSolveReport {
    pub fn skipped() -> Self {
        Self {
            converged: true,
            skipped: true,
            ..Default::default()
        }
    }
}

pub trait GridPressureSolver2: Send {
    /// Projects `input` onto a (discretely) divergence-free field written to
    /// `output`. Boundary SDFs are negative inside solids; the fluid SDF is
    /// negative in the atmosphere.
    #[allow(clippy::too_many_arguments)]
    fn solve(
        &mut self,
        input: &FaceCenteredGrid2,
        dt: Float,
        output: &mut FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
        use_compressed: bool,
    ) -> Result<PressureSolveReport, PressureError>;

    fn suggested_boundary_condition_solver(&self) -> Box<dyn GridBoundaryConditionSolver2>;

    /// Cell-centered pressure of the last solve.
    fn pressure(&self) -> &FdmVector2;

    fn linear_system_solver(&self) -> &PressureSystemSolver2;

    fn set_linear_system_solver(&mut self, solver: PressureSystemSolver2);

    fn name(&self) -> &'static str;
}

pub(crate) fn check_time_step(dt: Float) -> Result<(), PressureError> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(PressureError::InvalidTimeStep(dt))
    }
}

/// Storage shared by the pressure solvers: the single-level, compressed and
/// multigrid forms of the system, the raw solution (pressure impulse
/// `dt * p`) and the reported pressure.
#[derive(Default)]
pub struct PressureSystem2 {
    system: FdmLinearSystem2,
    compressed: FdmCompressedLinearSystem2,
    mg_system: FdmMgLinearSystem2,
    solution: FdmVector2,
    pressure: FdmVector2,
}

impl PressureSystem2 {
    pub fn linear_system(&self) -> &FdmLinearSystem2 {
        &self.system
    }

    pub fn compressed_linear_system(&self) -> &FdmCompressedLinearSystem2 {
        &self.compressed
    }

    pub fn mg_linear_system(&self) -> &FdmMgLinearSystem2 {
        &self.mg_system
    }

    pub fn solution(&self) -> &FdmVector2 {
        &self.solution
    }

    pub fn pressure(&self) -> &FdmVector2 {
        &self.pressure
    }

    /// Clears and resizes the form used by the back-end. Levels are given
    /// finest first; single-level back-ends only use the first size.
    pub(crate) fn resize(&mut self, level_sizes: &[[usize; D]], multigrid: bool) {
        if multigrid {
            self.system.clear();
            self.mg_system.resize_with_finest(level_sizes[0], level_sizes.len());
        } else {
            self.mg_system.clear();
            self.system.resize(level_sizes[0]);
        }
        self.compressed.clear();
    }

    pub(crate) fn level_mut(&mut self, level: usize, multigrid: bool) -> (&mut FdmMatrix2, &mut FdmVector2) {
        if multigrid {
            (&mut self.mg_system.a.levels[level], &mut self.mg_system.b.levels[level])
        } else {
            debug_assert_eq!(level, 0);
            (&mut self.system.a, &mut self.system.b)
        }
    }

    pub(crate) fn finest_matrix(&self, multigrid: bool) -> &FdmMatrix2 {
        if multigrid {
            &self.mg_system.a.levels[0]
        } else {
            &self.system.a
        }
    }

    /// Runs the back-end and stores its solution on the grid layout.
    pub(crate) fn solve(&mut self, solver: &mut PressureSystemSolver2, use_compressed: bool) -> bool {
        let converged = match solver {
            PressureSystemSolver2::Multigrid(solver) => {
                let converged = solver.solve_mg(&mut self.mg_system);
                self.solution.clone_from(&self.mg_system.x.levels[0]);
                converged
            }
            PressureSystemSolver2::Single(solver) if use_compressed => {
                self.compressed.compress_from(&self.system);
                debug!(
                    "compressed pressure system: {} rows, {} non-zeros",
                    self.compressed.a.rows(),
                    self.compressed.a.number_of_non_zeros()
                );
                let converged = solver.solve_compressed(&mut self.compressed);
                self.compressed.decompress_into(&mut self.solution);
                converged
            }
            PressureSystemSolver2::Single(solver) => {
                let converged = solver.solve(&mut self.system);
                self.solution.clone_from(&self.system.x);
                converged
            }
        };
        debug!(
            "{} solver: {} iterations, residual {:e}",
            solver.name(),
            solver.last_number_of_iterations(),
            solver.last_residual()
        );
        converged
    }

    /// Zero pressure on the given resolution, used when nothing is solved.
    pub(crate) fn reset(&mut self, resolution: [usize; D]) {
        self.solution.resize(resolution, 0.0);
        self.pressure.resize(resolution, 0.0);
    }

    pub(crate) fn update_pressure(&mut self, dt: Float) {
        let inverse_dt = 1.0 / dt;
        self.pressure.resize(self.solution.size(), 0.0);
        self.pressure
            .data_mut()
            .par_iter_mut()
            .zip(self.solution.data().par_iter())
            .for_each(|(p, q)| *p = q * inverse_dt);
    }
}

/// Shared front half of `solve`: argument checks, then the early exits for
/// an empty grid. Returns `Some(report)` when there is nothing to project.
pub(crate) fn begin_solve(
    solver_name: &str,
    system_solver: &PressureSystemSolver2,
    input: &FaceCenteredGrid2,
    dt: Float,
    output: &mut FaceCenteredGrid2,
    use_compressed: bool,
) -> Result<Option<PressureSolveReport>, PressureError> {
    check_time_step(dt)?;
    system_solver.check_representation(use_compressed)?;
    output.set(input);
    if input.is_empty() {
        warn!("{solver_name}: empty velocity grid, projection skipped");
        return Ok(Some(PressureSolveReport::skipped()));
    }
    Ok(None)
}

pub(crate) fn finish_solve(
    solver_name: &str,
    system_solver: &PressureSystemSolver2,
    converged: bool,
    number_of_fluid_cells: usize,
    number_of_levels: usize,
) -> PressureSolveReport {
    let report = PressureSolveReport {
        converged,
        skipped: false,
        number_of_fluid_cells,
        number_of_levels,
        number_of_iterations: system_solver.last_number_of_iterations(),
        residual: system_solver.last_residual(),
    };
    if !converged {
        warn!(
            "{solver_name}: {} did not converge after {} iterations (residual {:e})",
            system_solver.name(),
            report.number_of_iterations,
            report.residual
        );
    }
    report
}
