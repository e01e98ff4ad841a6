use super::{begin_solve, finish_solve, GridPressureSolver2, PressureSolveReport, PressureSystem2, PressureSystemSolver2};
use crate::boundary::{GridBoundaryConditionSolver2, GridFractionalBoundaryConditionSolver2};
use crate::error::PressureError;
use crate::fdm::mg::{level_sizes_with_finest, resize_array_levels, restrict};
use crate::fdm::{FdmLinearSystem2, FdmMatrix2, FdmMatrixRow2, FdmMgLinearSystem2, FdmVector2};
use crate::field::{ScalarField2, VectorField2};
use crate::global_variables::*;
use crate::grid::{cell_center_position, grid_position, Array2, FaceCenteredGrid2};
use crate::level_set::{fraction_inside, fraction_inside_fluid, fraction_inside_sdf, is_inside_fluid};
use log::{info, warn};
use rayon::prelude::*;

/// Open fraction of a face whose end points sample `phi0` and `phi1` on the
/// boundary SDF. Small positive openings are raised to `MIN_WEIGHT`.
pub fn face_weight(phi0: Float, phi1: Float) -> Float {
    let weight = (1.0 - fraction_inside_sdf(phi0, phi1)).clamp(0.0, 1.0);
    if weight > 0.0 && weight < MIN_WEIGHT {
        MIN_WEIGHT
    } else {
        weight
    }
}

/// Open fractions of every `u` and `v` face of the grid against the
/// boundary SDF.
pub fn compute_face_weights(
    resolution: [usize; D],
    spacing: [Float; D],
    origin: [Float; D],
    boundary_sdf: &dyn ScalarField2,
    u_weights: &mut Array2<Float>,
    v_weights: &mut Array2<Float>,
) {
    let [nx, ny] = resolution;
    let [hx, hy] = spacing;
    u_weights.resize([nx + 1, ny], 0.0);
    v_weights.resize([nx, ny + 1], 0.0);

    let u_origin = [origin[0], origin[1] + 0.5 * hy];
    u_weights.par_for_each_mut(|i, j, weight| {
        let [x, y] = grid_position(u_origin, spacing, i, j);
        *weight = face_weight(
            boundary_sdf.sample([x, y - 0.5 * hy]),
            boundary_sdf.sample([x, y + 0.5 * hy]),
        );
    });
    let v_origin = [origin[0] + 0.5 * hx, origin[1]];
    v_weights.par_for_each_mut(|i, j, weight| {
        let [x, y] = grid_position(v_origin, spacing, i, j);
        *weight = face_weight(
            boundary_sdf.sample([x - 0.5 * hx, y]),
            boundary_sdf.sample([x + 0.5 * hx, y]),
        );
    });
}

/// Per-cell liquid area fraction from the fluid SDF sampled at cell corners.
pub fn fluid_volume_fractions(
    resolution: [usize; D],
    spacing: [Float; D],
    origin: [Float; D],
    fluid_sdf: &dyn ScalarField2,
) -> Array2<Float> {
    let [nx, ny] = resolution;
    let mut corners = Array2::new([nx + 1, ny + 1]);
    corners.par_for_each_mut(|i, j, phi| *phi = fluid_sdf.sample(grid_position(origin, spacing, i, j)));
    let mut fractions = Array2::new(resolution);
    fractions.par_for_each_mut(|i, j, fraction| {
        // The fluid SDF is negative in the air, so the negative side is the
        // complement of the liquid.
        *fraction = 1.0
            - fraction_inside(
                corners[(i, j)],
                corners[(i + 1, j)],
                corners[(i, j + 1)],
                corners[(i + 1, j + 1)],
            );
    });
    fractions
}

/// Pressure solver with sub-cell accuracy: face openings scale the stencil
/// next to solids and a ghost-fluid term places the free surface between
/// cell centers.
pub struct GridFractionalSinglePhasePressureSolver2 {
    system_solver: PressureSystemSolver2,
    systems: PressureSystem2,
    u_weights: Vec<Array2<Float>>,
    v_weights: Vec<Array2<Float>>,
    fluid_sdf: Vec<Array2<Float>>,
    u_boundary_velocity: Array2<Float>,
    v_boundary_velocity: Array2<Float>,
}

impl Default for GridFractionalSinglePhasePressureSolver2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridFractionalSinglePhasePressureSolver2 {
    pub fn new() -> Self {
        Self::with_solver(PressureSystemSolver2::default())
    }

    pub fn with_solver(system_solver: PressureSystemSolver2) -> Self {
        Self {
            system_solver,
            systems: PressureSystem2::default(),
            u_weights: Vec::new(),
            v_weights: Vec::new(),
            fluid_sdf: Vec::new(),
            u_boundary_velocity: Array2::default(),
            v_boundary_velocity: Array2::default(),
        }
    }

    pub fn u_weights(&self, level: usize) -> Option<&Array2<Float>> {
        self.u_weights.get(level)
    }

    pub fn v_weights(&self, level: usize) -> Option<&Array2<Float>> {
        self.v_weights.get(level)
    }

    /// Fluid SDF at cell centers of a level.
    pub fn fluid_sdf(&self, level: usize) -> Option<&Array2<Float>> {
        self.fluid_sdf.get(level)
    }

    pub fn linear_system(&self) -> &FdmLinearSystem2 {
        self.systems.linear_system()
    }

    pub fn mg_linear_system(&self) -> &FdmMgLinearSystem2 {
        self.systems.mg_linear_system()
    }

    /// Fluid cells that take part in the solve.
    pub fn number_of_fluid_cells(&self) -> usize {
        let multigrid = self.system_solver.is_multigrid();
        let a = self.systems.finest_matrix(multigrid);
        a.data().par_iter().filter(|row| row.center != 0.0).count()
    }

    /// Samples weights and fluid SDF on every level and assembles
    /// `A q = -(div_w(u) + boundary flux)` for `q = dt * p`.
    pub fn build_system(
        &mut self,
        input: &FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        let multigrid = self.system_solver.is_multigrid();
        let level_sizes = level_sizes_with_finest(
            input.resolution(),
            self.system_solver.max_number_of_levels(),
        );
        self.build_weights(input, &level_sizes, boundary_sdf, boundary_velocity, fluid_sdf);
        self.systems.resize(&level_sizes, multigrid);

        let spacing = input.grid_spacing();
        for level in 0..level_sizes.len() {
            let scale = (1 << level) as Float;
            let (a, b) = self.systems.level_mut(level, multigrid);
            build_rows(
                &self.u_weights[level],
                &self.v_weights[level],
                &self.fluid_sdf[level],
                [spacing[0] * scale, spacing[1] * scale],
                a,
            );
            if level == 0 {
                build_right_hand_side(
                    a,
                    input,
                    &self.u_weights[0],
                    &self.v_weights[0],
                    &self.u_boundary_velocity,
                    &self.v_boundary_velocity,
                    b,
                );
            }
        }
        if multigrid {
            info!("fractional pressure hierarchy: {level_sizes:?}");
        }
    }

    /// Writes `input - grad(q) / theta` on open faces next to fluid; faces
    /// closed by a solid or between two air cells keep their input value.
    pub fn apply_pressure_gradient(
        &self,
        pressure: &FdmVector2,
        input: &FaceCenteredGrid2,
        output: &mut FaceCenteredGrid2,
    ) {
        let (Some(u_weights), Some(v_weights), Some(fluid_sdf)) =
            (self.u_weights.first(), self.v_weights.first(), self.fluid_sdf.first())
        else {
            return;
        };
        let [nx, ny] = input.resolution();
        let [hx, hy] = input.grid_spacing();
        let correction = |phi0: Float, phi1: Float, p0: Float, p1: Float, h: Float| -> Option<Float> {
            if !is_inside_fluid(phi0) && !is_inside_fluid(phi1) {
                return None;
            }
            let theta = fraction_inside_fluid(phi0, phi1).max(MIN_THETA);
            Some((p1 - p0) / (h * theta))
        };

        output.u_mut().par_for_each_mut(|i, j, u| {
            if i == 0 || i == nx || u_weights[(i, j)] <= 0.0 {
                return;
            }
            if let Some(gradient) = correction(
                fluid_sdf[(i - 1, j)],
                fluid_sdf[(i, j)],
                pressure[(i - 1, j)],
                pressure[(i, j)],
                hx,
            ) {
                *u = input.u()[(i, j)] - gradient;
            }
        });
        output.v_mut().par_for_each_mut(|i, j, v| {
            if j == 0 || j == ny || v_weights[(i, j)] <= 0.0 {
                return;
            }
            if let Some(gradient) = correction(
                fluid_sdf[(i, j - 1)],
                fluid_sdf[(i, j)],
                pressure[(i, j - 1)],
                pressure[(i, j)],
                hy,
            ) {
                *v = input.v()[(i, j)] - gradient;
            }
        });
    }

    fn build_weights(
        &mut self,
        input: &FaceCenteredGrid2,
        level_sizes: &[[usize; D]],
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        let resolution = input.resolution();
        let spacing = input.grid_spacing();
        let origin = input.origin();
        let number_of_levels = level_sizes.len();

        let u_sizes: Vec<[usize; D]> = level_sizes.iter().map(|&[x, y]| [x + 1, y]).collect();
        let v_sizes: Vec<[usize; D]> = level_sizes.iter().map(|&[x, y]| [x, y + 1]).collect();
        resize_array_levels(&u_sizes, 0.0, &mut self.u_weights);
        resize_array_levels(&v_sizes, 0.0, &mut self.v_weights);
        resize_array_levels(level_sizes, 0.0, &mut self.fluid_sdf);

        compute_face_weights(
            resolution,
            spacing,
            origin,
            boundary_sdf,
            &mut self.u_weights[0],
            &mut self.v_weights[0],
        );
        self.fluid_sdf[0].par_for_each_mut(|i, j, phi| {
            *phi = fluid_sdf.sample(cell_center_position(origin, spacing, i, j));
        });

        self.u_boundary_velocity.resize(u_sizes[0], 0.0);
        self.v_boundary_velocity.resize(v_sizes[0], 0.0);
        let u_origin = input.u_origin();
        let v_origin = input.v_origin();
        self.u_boundary_velocity.par_for_each_mut(|i, j, u| {
            *u = boundary_velocity.sample(grid_position(u_origin, spacing, i, j))[0];
        });
        self.v_boundary_velocity.par_for_each_mut(|i, j, v| {
            *v = boundary_velocity.sample(grid_position(v_origin, spacing, i, j))[1];
        });

        for level in 1..number_of_levels {
            let (finer, coarser) = self.fluid_sdf.split_at_mut(level);
            restrict(&finer[level - 1], &mut coarser[0]);

            let (finer, coarser) = self.u_weights.split_at_mut(level);
            let finer = &finer[level - 1];
            coarser[0].par_for_each_mut(|i, j, weight| {
                *weight = 0.5 * (finer[(2 * i, 2 * j)] + finer[(2 * i, 2 * j + 1)]);
            });

            let (finer, coarser) = self.v_weights.split_at_mut(level);
            let finer = &finer[level - 1];
            coarser[0].par_for_each_mut(|i, j, weight| {
                *weight = 0.5 * (finer[(2 * i, 2 * j)] + finer[(2 * i + 1, 2 * j)]);
            });
        }
    }
}

/// Right-hand side of the finest level. Domain-edge faces count as fully
/// open; partially closed faces carry the boundary velocity through their
/// closed part.
#[allow(clippy::too_many_arguments)]
fn build_right_hand_side(
    a: &FdmMatrix2,
    input: &FaceCenteredGrid2,
    u_weights: &Array2<Float>,
    v_weights: &Array2<Float>,
    u_boundary: &Array2<Float>,
    v_boundary: &Array2<Float>,
    b: &mut FdmVector2,
) {
    let [nx, ny] = input.resolution();
    let [hx, hy] = input.grid_spacing();
    let u = input.u();
    let v = input.v();

    let u_flux = |i: usize, j: usize| {
        let weight = if i == 0 || i == nx { 1.0 } else { u_weights[(i, j)] };
        (weight * u[(i, j)] + (1.0 - weight) * u_boundary[(i, j)]) / hx
    };
    let v_flux = |i: usize, j: usize| {
        let weight = if j == 0 || j == ny { 1.0 } else { v_weights[(i, j)] };
        (weight * v[(i, j)] + (1.0 - weight) * v_boundary[(i, j)]) / hy
    };

    b.par_for_each_mut(|i, j, value| {
        *value = if a[(i, j)].center != 0.0 {
            -(u_flux(i + 1, j) - u_flux(i, j) + v_flux(i, j + 1) - v_flux(i, j))
        } else {
            0.0
        };
    });
}

fn build_rows(
    u_weights: &Array2<Float>,
    v_weights: &Array2<Float>,
    fluid_sdf: &Array2<Float>,
    spacing: [Float; D],
    a: &mut FdmMatrix2,
) {
    let [nx, ny] = fluid_sdf.size();
    let inverse_hx_squared = 1.0 / (spacing[0] * spacing[0]);
    let inverse_hy_squared = 1.0 / (spacing[1] * spacing[1]);

    a.par_for_each_mut(|i, j, row| {
        *row = FdmMatrixRow2::default();
        let phi = fluid_sdf[(i, j)];
        if !is_inside_fluid(phi) {
            return;
        }

        // Returns the term when the neighbor is fluid, else adds the ghost
        // fluid contribution to the center.
        let mut couple = |term: Float, neighbor_phi: Float| -> Option<Float> {
            if is_inside_fluid(neighbor_phi) {
                row.center += term;
                Some(term)
            } else {
                let theta = fraction_inside_fluid(phi, neighbor_phi).max(MIN_THETA);
                row.center += term / theta;
                None
            }
        };

        let mut right = 0.0;
        let mut up = 0.0;
        if i + 1 < nx {
            if let Some(term) = couple(u_weights[(i + 1, j)] * inverse_hx_squared, fluid_sdf[(i + 1, j)]) {
                right = -term;
            }
        }
        if i > 0 {
            couple(u_weights[(i, j)] * inverse_hx_squared, fluid_sdf[(i - 1, j)]);
        }
        if j + 1 < ny {
            if let Some(term) = couple(v_weights[(i, j + 1)] * inverse_hy_squared, fluid_sdf[(i, j + 1)]) {
                up = -term;
            }
        }
        if j > 0 {
            couple(v_weights[(i, j)] * inverse_hy_squared, fluid_sdf[(i, j - 1)]);
        }
        row.right = right;
        row.up = up;

        if row.center < EPSILON {
            *row = FdmMatrixRow2::default();
        }
    });
}

impl GridPressureSolver2 for GridFractionalSinglePhasePressureSolver2 {
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
            self.fluid_sdf.len(),
        ))
    }

    fn suggested_boundary_condition_solver(&self) -> Box<dyn GridBoundaryConditionSolver2> {
        Box::new(GridFractionalBoundaryConditionSolver2::new())
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
        "fractional pressure solver"
    }
}
