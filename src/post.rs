use crate::case::Simulation;
use crate::field::ScalarField2;
use crate::global_variables::*;
use crate::grid::FaceCenteredGrid2;
use crate::level_set::is_inside_fluid;
use crate::pressure::fractional::fluid_volume_fractions;
use rayon::prelude::*;

pub struct PostResult {
    pub name: String,
    pub label: String,
    pub value: Float,
    pub unit: Option<String>,
}

impl PostResult {
    pub fn new(name: String, label: String, value: Float, unit: Option<String>) -> Self {
        Self {
            name,
            label,
            value,
            unit,
        }
    }
}

/// Indices of the liquid cells at least one cell diagonal away from the
/// collider surface, where every face of the cell is fully open.
fn interior_fluid_cells(
    velocity: &FaceCenteredGrid2,
    boundary_sdf: &dyn ScalarField2,
    fluid_sdf: &dyn ScalarField2,
) -> Vec<(usize, usize)> {
    let [nx, ny] = velocity.resolution();
    let [hx, hy] = velocity.grid_spacing();
    let clearance = (hx * hx + hy * hy).sqrt();
    (0..nx * ny)
        .into_par_iter()
        .map(|index| (index % nx, index / nx))
        .filter(|&(i, j)| {
            let x = velocity.cell_center_position(i, j);
            is_inside_fluid(fluid_sdf.sample(x)) && boundary_sdf.sample(x) > clearance
        })
        .collect()
}

pub fn max_fluid_divergence(
    velocity: &FaceCenteredGrid2,
    boundary_sdf: &dyn ScalarField2,
    fluid_sdf: &dyn ScalarField2,
) -> Float {
    interior_fluid_cells(velocity, boundary_sdf, fluid_sdf)
        .par_iter()
        .map(|&(i, j)| velocity.divergence_at_cell_center(i, j).abs())
        .reduce(|| 0.0, Float::max)
}

pub fn compute_max_divergence(simulation: &Simulation) -> Vec<PostResult> {
    let max_divergence =
        max_fluid_divergence(&simulation.velocity, &simulation.obstacle, &simulation.fluid);
    let result = PostResult::new(
        "max_divergence".to_string(),
        "maximum divergence (interior fluid cells)".to_string(),
        max_divergence,
        Some("1/s".to_string()),
    );
    vec![result]
}

pub fn compute_pressure_statistics(simulation: &Simulation) -> Vec<PostResult> {
    let pressure = simulation.pressure_solver.pressure();
    let velocity = &simulation.velocity;
    let cells = interior_fluid_cells(velocity, &simulation.obstacle, &simulation.fluid);
    let values = cells
        .par_iter()
        .filter_map(|&(i, j)| pressure.get(i, j).copied())
        .collect::<Vec<Float>>();
    let (min, max, mean) = if values.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let min = values.par_iter().copied().reduce(|| MAX_DISTANCE, Float::min);
        let max = values.par_iter().copied().reduce(|| -MAX_DISTANCE, Float::max);
        let mean = values.par_iter().sum::<Float>() / values.len() as Float;
        (min, max, mean)
    };
    let min_result = PostResult::new(
        "min_pressure".to_string(),
        "minimum pressure".to_string(),
        min,
        Some("Pa".to_string()),
    );
    let max_result = PostResult::new(
        "max_pressure".to_string(),
        "maximum pressure".to_string(),
        max,
        Some("Pa".to_string()),
    );
    let mean_result = PostResult::new(
        "mean_pressure".to_string(),
        "mean pressure".to_string(),
        mean,
        Some("Pa".to_string()),
    );
    vec![min_result, max_result, mean_result]
}

pub fn compute_fluid_fraction(simulation: &Simulation) -> Vec<PostResult> {
    let velocity = &simulation.velocity;
    let fractions = fluid_volume_fractions(
        velocity.resolution(),
        velocity.grid_spacing(),
        velocity.origin(),
        &simulation.fluid,
    );
    let mean_fraction = if fractions.is_empty() {
        0.0
    } else {
        fractions.data().par_iter().sum::<Float>() / fractions.len() as Float
    };
    let fraction_result = PostResult::new(
        "fluid_fraction".to_string(),
        "liquid volume fraction".to_string(),
        mean_fraction,
        None,
    );
    let cells_result = PostResult::new(
        "fluid_cells".to_string(),
        "number of fluid cells in the last solve".to_string(),
        simulation.last_report.number_of_fluid_cells as Float,
        None,
    );
    vec![fraction_result, cells_result]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseSetup;
    use crate::field::{ConstantScalarField2, ImplicitPlane2};

    #[test]
    fn test_max_divergence_ignores_air_cells() {
        let mut velocity = FaceCenteredGrid2::new([4, 4], [0.25, 0.25], [0.0, 0.0]);
        // Expanding only in the top row of cells.
        velocity.v_mut()[(1, 4)] = 1.0;
        let open = ConstantScalarField2::new(MAX_DISTANCE);
        let everywhere = ConstantScalarField2::new(1.0);
        assert_eq!(max_fluid_divergence(&velocity, &open, &everywhere), 4.0);

        let lower_half = ImplicitPlane2::new([0.0, -1.0], [0.0, 0.5]);
        assert_eq!(max_fluid_divergence(&velocity, &open, &lower_half), 0.0);
    }

    #[test]
    fn test_fluid_fraction_is_sampled_from_the_case_surface() {
        let setup = CaseSetup {
            resolution: [8, 8],
            domain_size: [1.0, 1.0],
            fluid_height: 0.5,
            ..CaseSetup::new()
        };
        let simulation = Simulation::new(setup);
        let results = compute_fluid_fraction(&simulation);
        assert_eq!(results[0].name, "fluid_fraction");
        assert!((results[0].value - 0.5).abs() < 1e-12);
    }
}
