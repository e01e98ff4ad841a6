pub mod blocked;
pub mod fractional;

pub use blocked::GridBlockedBoundaryConditionSolver2;
pub use fractional::GridFractionalBoundaryConditionSolver2;

use crate::field::{ScalarField2, VectorField2};
use crate::global_variables::*;
use crate::grid::{cell_center_position, grid_position, Array2, FaceCenteredGrid2};
use log::warn;

#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub enum BoundaryFace {
    East,
    West,
    North,
    South,
}

impl BoundaryFace {
    pub const ALL: [BoundaryFace; 4] = [
        BoundaryFace::East,
        BoundaryFace::West,
        BoundaryFace::North,
        BoundaryFace::South,
    ];
}

/// Enforces collider and domain boundary conditions on a staggered velocity
/// field. Pressure solvers hand out the variant matching their
/// discretization.
pub trait GridBoundaryConditionSolver2: Send {
    fn update_collider(
        &mut self,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        resolution: [usize; D],
        grid_spacing: [Float; D],
        origin: [Float; D],
    );

    fn set_closed_domain_boundary(&mut self, faces: &[BoundaryFace]);

    fn closed_domain_boundary(&self) -> &[BoundaryFace];

    fn constrain_velocity(&mut self, velocity: &mut FaceCenteredGrid2, extrapolation_depth: usize);

    fn name(&self) -> &'static str;
}

/// Collider state sampled once per `update_collider` call.
#[derive(Clone, Debug, Default)]
pub struct ColliderSamples2 {
    pub resolution: [usize; D],
    pub grid_spacing: [Float; D],
    pub origin: [Float; D],
    pub cell_sdf: Array2<Float>,
    pub u_sdf: Array2<Float>,
    pub v_sdf: Array2<Float>,
    pub u_velocity: Array2<[Float; D]>,
    pub v_velocity: Array2<[Float; D]>,
}

impl ColliderSamples2 {
    pub fn sample(
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        resolution: [usize; D],
        grid_spacing: [Float; D],
        origin: [Float; D],
    ) -> Self {
        let [nx, ny] = resolution;
        let [hx, hy] = grid_spacing;
        let u_origin = [origin[0], origin[1] + 0.5 * hy];
        let v_origin = [origin[0] + 0.5 * hx, origin[1]];

        let mut samples = Self {
            resolution,
            grid_spacing,
            origin,
            cell_sdf: Array2::new(resolution),
            u_sdf: Array2::new([nx + 1, ny]),
            v_sdf: Array2::new([nx, ny + 1]),
            u_velocity: Array2::new([nx + 1, ny]),
            v_velocity: Array2::new([nx, ny + 1]),
        };
        samples.cell_sdf.par_for_each_mut(|i, j, phi| {
            *phi = boundary_sdf.sample(cell_center_position(origin, grid_spacing, i, j));
        });
        samples.u_sdf.par_for_each_mut(|i, j, phi| {
            *phi = boundary_sdf.sample(grid_position(u_origin, grid_spacing, i, j));
        });
        samples.v_sdf.par_for_each_mut(|i, j, phi| {
            *phi = boundary_sdf.sample(grid_position(v_origin, grid_spacing, i, j));
        });
        samples.u_velocity.par_for_each_mut(|i, j, velocity| {
            *velocity = boundary_velocity.sample(grid_position(u_origin, grid_spacing, i, j));
        });
        samples.v_velocity.par_for_each_mut(|i, j, velocity| {
            *velocity = boundary_velocity.sample(grid_position(v_origin, grid_spacing, i, j));
        });
        samples
    }

    /// True when the samples were taken on the layout of `velocity`.
    pub fn matches(&self, velocity: &FaceCenteredGrid2) -> bool {
        self.resolution == velocity.resolution()
            && self.grid_spacing == velocity.grid_spacing()
            && self.origin == velocity.origin()
    }
}

/// Checks that a collider was sampled on the velocity layout; logs and
/// returns `None` otherwise.
pub(crate) fn collider_for<'a>(
    solver_name: &str,
    collider: &'a Option<ColliderSamples2>,
    velocity: &FaceCenteredGrid2,
) -> Option<&'a ColliderSamples2> {
    match collider {
        Some(samples) if samples.matches(velocity) => Some(samples),
        Some(_) => {
            warn!("{solver_name}: collider sampled on another grid layout, call update_collider first");
            None
        }
        None => None,
    }
}

/// Fills cells outside `valid` with the average of their valid neighbours,
/// growing the valid region by one cell per iteration.
pub fn extrapolate_to_region(data: &mut Array2<Float>, valid: &Array2<bool>, number_of_iterations: usize) {
    let [nx, ny] = data.size();
    let mut valid0 = valid.clone();
    let mut valid1 = valid.clone();
    for _ in 0..number_of_iterations {
        let mut changed = false;
        for j in 0..ny {
            for i in 0..nx {
                if valid0[(i, j)] {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0;
                let mut visit = |ii: usize, jj: usize| {
                    if valid0[(ii, jj)] {
                        sum += data[(ii, jj)];
                        count += 1;
                    }
                };
                if i + 1 < nx {
                    visit(i + 1, j);
                }
                if i > 0 {
                    visit(i - 1, j);
                }
                if j + 1 < ny {
                    visit(i, j + 1);
                }
                if j > 0 {
                    visit(i, j - 1);
                }
                if count > 0 {
                    data[(i, j)] = sum / count as Float;
                    valid1[(i, j)] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
        valid0.clone_from(&valid1);
    }
}

/// No-penetration on the closed sides of the domain box.
pub fn zero_closed_faces(velocity: &mut FaceCenteredGrid2, faces: &[BoundaryFace]) {
    let [nx, ny] = velocity.resolution();
    for face in faces {
        match face {
            BoundaryFace::West => (0..ny).for_each(|j| velocity.u_mut()[(0, j)] = 0.0),
            BoundaryFace::East => (0..ny).for_each(|j| velocity.u_mut()[(nx, j)] = 0.0),
            BoundaryFace::South => (0..nx).for_each(|i| velocity.v_mut()[(i, 0)] = 0.0),
            BoundaryFace::North => (0..nx).for_each(|i| velocity.v_mut()[(i, ny)] = 0.0),
        }
    }
}
