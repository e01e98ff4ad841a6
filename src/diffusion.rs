use crate::fdm::{FdmIccgSolver2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmMatrixRow2};
use crate::field::ScalarField2;
use crate::global_variables::*;
use crate::grid::{cell_center_position, Array2};
use crate::level_set::{is_inside_fluid, is_inside_sdf};
use crate::Marker;
use log::warn;

/// Treatment of neighbours that are not fluid (solid or air).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffusionBoundaryType {
    /// Non-fluid neighbours hold their current value.
    Dirichlet,
    /// Zero flux across the interface.
    #[default]
    Neumann,
}

/// Implicit (backward Euler) diffusion of a cell-centered field:
/// `(I - c L) f_new = f`, `c = coefficient * dt / h^2` per axis.
pub struct GridBackwardEulerDiffusionSolver2 {
    boundary_type: DiffusionBoundaryType,
    system_solver: Box<dyn FdmLinearSystemSolver2>,
    system: FdmLinearSystem2,
    markers: Array2<Marker>,
}

impl Default for GridBackwardEulerDiffusionSolver2 {
    fn default() -> Self {
        Self::new(DiffusionBoundaryType::default())
    }
}

impl GridBackwardEulerDiffusionSolver2 {
    pub fn new(boundary_type: DiffusionBoundaryType) -> Self {
        Self::with_solver(boundary_type, Box::new(FdmIccgSolver2::new(MAX_ITER, EPSILON)))
    }

    pub fn with_solver(
        boundary_type: DiffusionBoundaryType,
        system_solver: Box<dyn FdmLinearSystemSolver2>,
    ) -> Self {
        Self {
            boundary_type,
            system_solver,
            system: FdmLinearSystem2::default(),
            markers: Array2::default(),
        }
    }

    pub fn boundary_type(&self) -> DiffusionBoundaryType {
        self.boundary_type
    }

    pub fn markers(&self) -> &Array2<Marker> {
        &self.markers
    }

    pub fn linear_system_solver(&self) -> &dyn FdmLinearSystemSolver2 {
        self.system_solver.as_ref()
    }

    /// Diffuses `source` (cell-centered, lower corner at `origin`) over one
    /// step `dt` and returns the new field. Non-fluid cells keep their value.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        source: &Array2<Float>,
        grid_spacing: [Float; D],
        origin: [Float; D],
        diffusion_coefficient: Float,
        dt: Float,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) -> Array2<Float> {
        let size = source.size();
        if source.is_empty() {
            return source.clone();
        }
        let c = [
            diffusion_coefficient * dt / (grid_spacing[0] * grid_spacing[0]),
            diffusion_coefficient * dt / (grid_spacing[1] * grid_spacing[1]),
        ];

        self.markers.resize(size, Marker::Fluid);
        self.markers.par_for_each_mut(|i, j, marker| {
            let x = cell_center_position(origin, grid_spacing, i, j);
            *marker = if is_inside_sdf(boundary_sdf.sample(x)) {
                Marker::Boundary
            } else if is_inside_fluid(fluid_sdf.sample(x)) {
                Marker::Fluid
            } else {
                Marker::Air
            };
        });

        self.system.resize(size);
        build_rows(&self.markers, c, self.boundary_type, &mut self.system.a);
        build_right_hand_side(&self.markers, source, c, self.boundary_type, &mut self.system.b);
        self.system.x.clone_from(source);

        if !self.system_solver.solve(&mut self.system) {
            warn!(
                "backward Euler diffusion: {} did not converge after {} iterations (residual {:e})",
                self.system_solver.name(),
                self.system_solver.last_number_of_iterations(),
                self.system_solver.last_residual()
            );
        }
        self.system.x.clone()
    }
}

fn build_rows(
    markers: &Array2<Marker>,
    c: [Float; D],
    boundary_type: DiffusionBoundaryType,
    a: &mut FdmMatrix2,
) {
    let [nx, ny] = markers.size();
    let dirichlet = boundary_type == DiffusionBoundaryType::Dirichlet;
    a.par_for_each_mut(|i, j, row| {
        *row = FdmMatrixRow2 {
            center: 1.0,
            right: 0.0,
            up: 0.0,
        };
        if markers[(i, j)] != Marker::Fluid {
            return;
        }
        let mut couple = |neighbor: Option<(usize, usize)>, c: Float, off_diagonal: Option<&mut Float>| {
            let Some((ii, jj)) = neighbor else {
                return;
            };
            if markers[(ii, jj)] == Marker::Fluid {
                row.center += c;
                if let Some(value) = off_diagonal {
                    *value = -c;
                }
            } else if dirichlet {
                row.center += c;
            }
        };
        couple(i.checked_sub(1).map(|i| (i, j)), c[0], None);
        couple(j.checked_sub(1).map(|j| (i, j)), c[1], None);
        let right_neighbor = (i + 1 < nx).then_some((i + 1, j));
        let up_neighbor = (j + 1 < ny).then_some((i, j + 1));
        let mut right = 0.0;
        let mut up = 0.0;
        couple(right_neighbor, c[0], Some(&mut right));
        couple(up_neighbor, c[1], Some(&mut up));
        row.right = right;
        row.up = up;
    });
}

fn build_right_hand_side(
    markers: &Array2<Marker>,
    source: &Array2<Float>,
    c: [Float; D],
    boundary_type: DiffusionBoundaryType,
    b: &mut Array2<Float>,
) {
    let [nx, ny] = markers.size();
    let dirichlet = boundary_type == DiffusionBoundaryType::Dirichlet;
    b.par_for_each_mut(|i, j, value| {
        *value = source[(i, j)];
        if !dirichlet || markers[(i, j)] != Marker::Fluid {
            return;
        }
        let neighbors = [
            (i.checked_sub(1).map(|i| (i, j)), c[0]),
            ((i + 1 < nx).then_some((i + 1, j)), c[0]),
            (j.checked_sub(1).map(|j| (i, j)), c[1]),
            ((j + 1 < ny).then_some((i, j + 1)), c[1]),
        ];
        for (neighbor, c) in neighbors {
            if let Some((ii, jj)) = neighbor {
                if markers[(ii, jj)] != Marker::Fluid {
                    *value += c * source[(ii, jj)];
                }
            }
        }
    });
}
