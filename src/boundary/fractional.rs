use super::*;
use crate::level_set::is_inside_sdf;
use crate::pressure::fractional::compute_face_weights;

/// Boundary conditions matching the fractional (cut-cell) pressure solver:
/// faces are classified by their open area, and velocities inside the
/// collider keep only their tangential part relative to the collider.
pub struct GridFractionalBoundaryConditionSolver2 {
    closed_faces: Vec<BoundaryFace>,
    collider: Option<ColliderSamples2>,
    u_normal: Array2<[Float; D]>,
    v_normal: Array2<[Float; D]>,
    u_weights: Array2<Float>,
    v_weights: Array2<Float>,
}

impl Default for GridFractionalBoundaryConditionSolver2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridFractionalBoundaryConditionSolver2 {
    pub fn new() -> Self {
        Self {
            closed_faces: BoundaryFace::ALL.to_vec(),
            collider: None,
            u_normal: Array2::default(),
            v_normal: Array2::default(),
            u_weights: Array2::default(),
            v_weights: Array2::default(),
        }
    }

    pub fn u_weights(&self) -> &Array2<Float> {
        &self.u_weights
    }

    pub fn v_weights(&self) -> &Array2<Float> {
        &self.v_weights
    }
}

fn unit_normal(boundary_sdf: &dyn ScalarField2, x: [Float; D]) -> [Float; D] {
    let [gx, gy] = boundary_sdf.gradient(x);
    let norm = (gx * gx + gy * gy).sqrt();
    if norm > 0.0 {
        [gx / norm, gy / norm]
    } else {
        [0.0; D]
    }
}

/// Collider velocity plus the tangential part of the fluid velocity relative
/// to it.
fn tangential_velocity(fluid: [Float; D], collider: [Float; D], normal: [Float; D]) -> [Float; D] {
    let relative = [fluid[0] - collider[0], fluid[1] - collider[1]];
    let normal_part = relative[0] * normal[0] + relative[1] * normal[1];
    [
        collider[0] + relative[0] - normal_part * normal[0],
        collider[1] + relative[1] - normal_part * normal[1],
    ]
}

impl GridBoundaryConditionSolver2 for GridFractionalBoundaryConditionSolver2 {
    fn update_collider(
        &mut self,
        boundary_sdf: &dyn ScalarField2,
        boundary_velocity: &dyn VectorField2,
        resolution: [usize; D],
        grid_spacing: [Float; D],
        origin: [Float; D],
    ) {
        let [nx, ny] = resolution;
        let [hx, hy] = grid_spacing;
        let u_origin = [origin[0], origin[1] + 0.5 * hy];
        let v_origin = [origin[0] + 0.5 * hx, origin[1]];

        compute_face_weights(
            resolution,
            grid_spacing,
            origin,
            boundary_sdf,
            &mut self.u_weights,
            &mut self.v_weights,
        );
        self.u_normal.resize([nx + 1, ny], [0.0; D]);
        self.u_normal.par_for_each_mut(|i, j, normal| {
            *normal = unit_normal(boundary_sdf, grid_position(u_origin, grid_spacing, i, j));
        });
        self.v_normal.resize([nx, ny + 1], [0.0; D]);
        self.v_normal.par_for_each_mut(|i, j, normal| {
            *normal = unit_normal(boundary_sdf, grid_position(v_origin, grid_spacing, i, j));
        });
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
            let u_valid = Array2::from_fn(self.u_weights.size(), |i, j| self.u_weights[(i, j)] > 0.0);
            let v_valid = Array2::from_fn(self.v_weights.size(), |i, j| self.v_weights[(i, j)] > 0.0);
            extrapolate_to_region(velocity.u_mut(), &u_valid, extrapolation_depth);
            extrapolate_to_region(velocity.v_mut(), &v_valid, extrapolation_depth);

            let extrapolated = velocity.clone();
            let u_normal = &self.u_normal;
            let v_normal = &self.v_normal;
            velocity.u_mut().par_for_each_mut(|i, j, u| {
                if is_inside_sdf(collider.u_sdf[(i, j)]) {
                    let fluid = extrapolated.sample(extrapolated.u_position(i, j));
                    *u = tangential_velocity(fluid, collider.u_velocity[(i, j)], u_normal[(i, j)])[0];
                }
            });
            velocity.v_mut().par_for_each_mut(|i, j, v| {
                if is_inside_sdf(collider.v_sdf[(i, j)]) {
                    let fluid = extrapolated.sample(extrapolated.v_position(i, j));
                    *v = tangential_velocity(fluid, collider.v_velocity[(i, j)], v_normal[(i, j)])[1];
                }
            });
        }
        zero_closed_faces(velocity, &self.closed_faces);
    }

    fn name(&self) -> &'static str {
        "fractional boundary"
    }
}
