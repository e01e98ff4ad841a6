use super::{begin_solve, finish_solve, GridPressureSolver2, PressureSolveReport, PressureSystem2, PressureSystemSolver2};
use crate::boundary::{GridBlockedBoundaryConditionSolver2, GridBoundaryConditionSolver2};
use crate::error::PressureError;
use crate::fdm::mg::level_sizes_with_finest;
use crate::fdm::{FdmLinearSystem2, FdmMatrix2, FdmMatrixRow2, FdmMgLinearSystem2, FdmVector2};
use crate::field::{ScalarField2, VectorField2};
use crate::global_variables::*;
use crate::grid::{cell_center_position, Array2, FaceCenteredGrid2};
use crate::level_set::{is_inside_fluid, is_inside_sdf};
use crate::Marker;
use log::{info, warn};
use rayon::prelude::*;

/// Pressure solver on binary cell markers: each cell is entirely fluid,
/// air or solid.
pub struct GridSinglePhasePressureSolver2 {
    system_solver: PressureSystemSolver2,
    systems: PressureSystem2,
    markers: Vec<Array2<Marker>>,
}

impl Default for GridSinglePhasePressureSolver2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSinglePhasePressureSolver2 {
    pub fn new() -> Self {
        Self::with_solver(PressureSystemSolver2::default())
    }

    pub fn with_solver(system_solver: PressureSystemSolver2) -> Self {
        Self {
            system_solver,
            systems: PressureSystem2::default(),
            markers: Vec::new(),
        }
    }

    /// Markers of a multigrid level; level 0 is the velocity resolution.
    pub fn markers(&self, level: usize) -> Option<&Array2<Marker>> {
        self.markers.get(level)
    }

    pub fn linear_system(&self) -> &FdmLinearSystem2 {
        self.systems.linear_system()
    }

    pub fn mg_linear_system(&self) -> &FdmMgLinearSystem2 {
        self.systems.mg_linear_system()
    }

    pub fn number_of_fluid_cells(&self) -> usize {
        self.markers.first().map_or(0, |markers| {
            markers
                .data()
                .par_iter()
                .filter(|&&marker| marker == Marker::Fluid)
                .count()
        })
    }

    /// Classifies the cells of every level and assembles `A q = -div(u)` for
    /// the pressure impulse `q = dt * p`. Domain edges behave as walls.
    pub fn build_system(
        &mut self,
        input: &FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        _boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        let multigrid = self.system_solver.is_multigrid();
        let level_sizes = level_sizes_with_finest(
            input.resolution(),
            self.system_solver.max_number_of_levels(),
        );
        self.build_markers(input, &level_sizes, boundary_sdf, fluid_sdf);
        self.systems.resize(&level_sizes, multigrid);

        let spacing = input.grid_spacing();
        for (level, markers) in self.markers.iter().enumerate() {
            let scale = (1 << level) as Float;
            let (a, b) = self.systems.level_mut(level, multigrid);
            build_rows(markers, [spacing[0] * scale, spacing[1] * scale], a);
            if level == 0 {
                build_right_hand_side(a, input, b);
            }
        }
        if multigrid {
            info!("pressure hierarchy: {level_sizes:?}");
        }
    }

    /// Writes `input - grad(q)` on every face between a fluid cell and a
    /// non-solid neighbor; other faces keep their input value.
    pub fn apply_pressure_gradient(
        &self,
        pressure: &FdmVector2,
        input: &FaceCenteredGrid2,
        output: &mut FaceCenteredGrid2,
    ) {
        let Some(markers) = self.markers.first() else {
            return;
        };
        let [nx, ny] = input.resolution();
        let [hx, hy] = input.grid_spacing();
        let is_corrected = |a: Marker, b: Marker| {
            (a == Marker::Fluid || b == Marker::Fluid) && a != Marker::Boundary && b != Marker::Boundary
        };
        let fluid_pressure = |i: usize, j: usize| {
            if markers[(i, j)] == Marker::Fluid {
                pressure[(i, j)]
            } else {
                0.0
            }
        };

        output.u_mut().par_for_each_mut(|i, j, u| {
            if i == 0 || i == nx {
                return;
            }
            if is_corrected(markers[(i - 1, j)], markers[(i, j)]) {
                *u = input.u()[(i, j)] - (fluid_pressure(i, j) - fluid_pressure(i - 1, j)) / hx;
            }
        });
        output.v_mut().par_for_each_mut(|i, j, v| {
            if j == 0 || j == ny {
                return;
            }
            if is_corrected(markers[(i, j - 1)], markers[(i, j)]) {
                *v = input.v()[(i, j)] - (fluid_pressure(i, j) - fluid_pressure(i, j - 1)) / hy;
            }
        });
    }

    fn build_markers(
        &mut self,
        input: &FaceCenteredGrid2,
        level_sizes: &[[usize; D]],
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        let origin = input.origin();
        let spacing = input.grid_spacing();
        self.markers.truncate(level_sizes.len());
        self.markers
            .resize_with(level_sizes.len(), Array2::default);

        let finest = &mut self.markers[0];
        finest.resize(level_sizes[0], Marker::Fluid);
        finest.par_for_each_mut(|i, j, marker| {
            let x = cell_center_position(origin, spacing, i, j);
            *marker = if is_inside_sdf(boundary_sdf.sample(x)) {
                Marker::Boundary
            } else if !is_inside_fluid(fluid_sdf.sample(x)) {
                Marker::Air
            } else {
                Marker::Fluid
            };
        });

        for level in 1..level_sizes.len() {
            let (finer, coarser) = self.markers.split_at_mut(level);
            coarsen_markers(&finer[level - 1], level_sizes[level], &mut coarser[0]);
        }
    }
}

/// A coarse cell is fluid if any child is, else air if any child is, else
/// solid.
fn coarsen_markers(finer: &Array2<Marker>, size: [usize; D], coarser: &mut Array2<Marker>) {
    let [fx, fy] = finer.size();
    coarser.resize(size, Marker::Boundary);
    coarser.par_for_each_mut(|i, j, marker| {
        let mut has_air = false;
        for jj in (2 * j)..(2 * j + 2).min(fy) {
            for ii in (2 * i)..(2 * i + 2).min(fx) {
                match finer[(ii, jj)] {
                    Marker::Fluid => {
                        *marker = Marker::Fluid;
                        return;
                    }
                    Marker::Air => has_air = true,
                    Marker::Boundary => {}
                }
            }
        }
        *marker = if has_air { Marker::Air } else { Marker::Boundary };
    });
}

fn build_rows(markers: &Array2<Marker>, spacing: [Float; D], a: &mut FdmMatrix2) {
    let [nx, ny] = markers.size();
    let inverse_hx_squared = 1.0 / (spacing[0] * spacing[0]);
    let inverse_hy_squared = 1.0 / (spacing[1] * spacing[1]);
    a.par_for_each_mut(|i, j, row| {
        *row = FdmMatrixRow2::default();
        if markers[(i, j)] != Marker::Fluid {
            return;
        }

        if i + 1 < nx {
            match markers[(i + 1, j)] {
                Marker::Fluid => {
                    row.center += inverse_hx_squared;
                    row.right -= inverse_hx_squared;
                }
                Marker::Air => row.center += inverse_hx_squared,
                Marker::Boundary => {}
            }
        }
        if i > 0 && markers[(i - 1, j)] != Marker::Boundary {
            row.center += inverse_hx_squared;
        }

        if j + 1 < ny {
            match markers[(i, j + 1)] {
                Marker::Fluid => {
                    row.center += inverse_hy_squared;
                    row.up -= inverse_hy_squared;
                }
                Marker::Air => row.center += inverse_hy_squared,
                Marker::Boundary => {}
            }
        }
        if j > 0 && markers[(i, j - 1)] != Marker::Boundary {
            row.center += inverse_hy_squared;
        }
    });
}

fn build_right_hand_side(a: &FdmMatrix2, input: &FaceCenteredGrid2, b: &mut FdmVector2) {
    b.par_for_each_mut(|i, j, value| {
        *value = if a[(i, j)].center != 0.0 {
            -input.divergence_at_cell_center(i, j)
        } else {
            0.0
        };
    });
}

impl GridPressureSolver2 for GridSinglePhasePressureSolver2 {
    fn solve(
        &mut self,
        input: &FaceCenteredGrid2,
        dt: Float,
        output: &mut FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
        use_compressed: bool,
    ) -> Result<PressureSolveReport, PressureError> {
        if let Some(report) = begin_solve(self.name(), &self.system_solver, input, dt, output, use_compressed)? {
            self.systems.reset(input.resolution());
            return Ok(report);
        }

        self.build_system(input, boundary_sdf, boundary_velocity, fluid_sdf);
        let number_of_fluid_cells = self.number_of_fluid_cells();
        if number_of_fluid_cells == 0 {
            warn!("{}: no fluid cell, projection skipped", self.name());
            self.systems.reset(input.resolution());
            return Ok(PressureSolveReport::skipped());
        }

        let converged = self.systems.solve(&mut self.system_solver, use_compressed);
        self.apply_pressure_gradient(self.systems.solution(), input, output);
        self.systems.update_pressure(dt);

        Ok(finish_solve(
            self.name(),
            &self.system_solver,
            converged,
            number_of_fluid_cells,
            self.markers.len(),
        ))
    }

    fn suggested_boundary_condition_solver(&self) -> Box<dyn GridBoundaryConditionSolver2> {
        Box::new(GridBlockedBoundaryConditionSolver2::new())
    }

    fn pressure(&self) -> &FdmVector2 {
        self.systems.pressure()
    }

    fn linear_system_solver(&self) -> &PressureSystemSolver2 {
        &self.system_solver
    }

    fn set_linear_system_solver(&mut self, solver: PressureSystemSolver2) {
        self.system_solver = solver;
    }

    fn name(&self) -> &'static str {
        "blocked pressure solver"
    }
}
