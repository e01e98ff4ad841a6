use super::*;
use crate::level_set::is_inside_sdf;

/// Boundary conditions matching the blocked (voxelized) pressure solver.
/// A cell is solid when the collider SDF at its center is negative; faces
/// between a solid and an open cell carry the collider velocity, faces
/// buried in the solid are filled by extrapolation.
pub struct GridBlockedBoundaryConditionSolver2 {
    closed_faces: Vec<BoundaryFace>,
    collider: Option<ColliderSamples2>,
}

impl Default for GridBlockedBoundaryConditionSolver2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridBlockedBoundaryConditionSolver2 {
    pub fn new() -> Self {
        Self {
            closed_faces: BoundaryFace::ALL.to_vec(),
            collider: None,
        }
    }

    /// Solid cells of the last collider update.
    pub fn collider_cells(&self) -> Option<Array2<bool>> {
        self.collider.as_ref().map(|collider| {
            Array2::from_fn(collider.resolution, |i, j| is_inside_sdf(collider.cell_sdf[(i, j)]))
        })
    }
}

/// Solid state of the cells on both sides of a face; a missing cell (outside
/// the domain) counts as open.
fn face_neighbors(solid: &Array2<bool>, low: Option<(usize, usize)>, high: (usize, usize)) -> (bool, bool) {
    let low = low.and_then(|(i, j)| solid.get(i, j).copied()).unwrap_or(false);
    let high = solid.get(high.0, high.1).copied().unwrap_or(false);
    (low, high)
}

impl GridBoundaryConditionSolver2 for GridBlockedBoundaryConditionSolver2 {
    fn update_collider(
        &mut self,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        resolution: [usize; D],
        grid_spacing: [Float; D],
        origin: [Float; D],
    ) {
        self.collider = Some(ColliderSamples2::sample(
            boundary_sdf,
            boundary_velocity,
            resolution,
            grid_spacing,
            origin,
        ));
    }

    fn set_closed_domain_boundary(&mut self, faces: &[BoundaryFace]) {
        self.closed_faces = faces.to_vec();
    }

    fn closed_domain_boundary(&self) -> &[BoundaryFace] {
        &self.closed_faces
    }

    fn constrain_velocity(&mut self, velocity: &mut FaceCenteredGrid2, extrapolation_depth: usize) {
        if let Some(collider) = collider_for(self.name(), &self.collider, velocity) {
            let solid = Array2::from_fn(collider.resolution, |i, j| is_inside_sdf(collider.cell_sdf[(i, j)]));

            let u_sides = Array2::from_fn(velocity.u().size(), |i, j| {
                face_neighbors(&solid, i.checked_sub(1).map(|i| (i, j)), (i, j))
            });
            let v_sides = Array2::from_fn(velocity.v().size(), |i, j| {
                face_neighbors(&solid, j.checked_sub(1).map(|j| (i, j)), (i, j))
            });

            let u_valid = Array2::from_fn(u_sides.size(), |i, j| {
                let (low, high) = u_sides[(i, j)];
                !low && !high
            });
            let v_valid = Array2::from_fn(v_sides.size(), |i, j| {
                let (low, high) = v_sides[(i, j)];
                !low && !high
            });
            extrapolate_to_region(velocity.u_mut(), &u_valid, extrapolation_depth);
            extrapolate_to_region(velocity.v_mut(), &v_valid, extrapolation_depth);

            let [nx, ny] = collider.resolution;
            velocity.u_mut().par_for_each_mut(|i, j, u| {
                let (low, high) = u_sides[(i, j)];
                let interior = i > 0 && i < nx;
                if interior && low != high {
                    *u = collider.u_velocity[(i, j)][0];
                }
            });
            velocity.v_mut().par_for_each_mut(|i, j, v| {
                let (low, high) = v_sides[(i, j)];
                let interior = j > 0 && j < ny;
                if interior && low != high {
                    *v = collider.v_velocity[(i, j)][1];
                }
            });
        }
        zero_closed_faces(velocity, &self.closed_faces);
    }

    fn name(&self) -> &'static str {
        "blocked boundary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ConstantVectorField2, ImplicitPlane2};

    #[test]
    fn test_interface_faces_take_collider_velocity() {
        let floor = ImplicitPlane2::new([0.0, 1.0], [0.0, 0.5]);
        let mut velocity = FaceCenteredGrid2::new([4, 4], [0.25, 0.25], [0.0, 0.0]);
        velocity.fill([1.0, -1.0]);
        let mut solver = GridBlockedBoundaryConditionSolver2::new();
        solver.set_closed_domain_boundary(&[]);
        solver.update_collider(
            &floor,
            &ConstantVectorField2::new([0.5, 0.25]),
            [4, 4],
            [0.25, 0.25],
            [0.0, 0.0],
        );
        solver.constrain_velocity(&mut velocity, EXTRAPOLATION_DEPTH);

        let solid = solver.collider_cells().unwrap();
        assert!(solid[(0, 1)] && !solid[(0, 2)]);
        for i in 0..4 {
            assert_eq!(velocity.v()[(i, 2)], 0.25, "interface face follows the collider");
            assert_eq!(velocity.v()[(i, 1)], -1.0, "buried face is extrapolated");
            assert_eq!(velocity.v()[(i, 3)], -1.0);
        }
        assert_eq!(velocity.u()[(2, 0)], 1.0);
        assert_eq!(velocity.u()[(2, 3)], 1.0);
    }

    #[test]
    fn test_without_collider_only_closes_domain() {
        let mut velocity = FaceCenteredGrid2::new([2, 2], [1.0, 1.0], [0.0, 0.0]);
        velocity.fill([3.0, 4.0]);
        let mut solver = GridBlockedBoundaryConditionSolver2::new();
        solver.set_closed_domain_boundary(&[BoundaryFace::North]);
        solver.constrain_velocity(&mut velocity, EXTRAPOLATION_DEPTH);
        assert_eq!(velocity.u()[(0, 0)], 3.0);
        assert_eq!(velocity.v()[(0, 2)], 0.0);
        assert_eq!(velocity.v()[(1, 1)], 4.0);
    }
}
