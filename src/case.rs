pub mod io;

use crate::boundary::GridBoundaryConditionSolver2;
use crate::error::PressureError;
use crate::fdm::{
    FdmCgSolver2, FdmGaussSeidelSolver2, FdmIccgSolver2, FdmJacobiSolver2, FdmMgSolver2,
    FdmMgpcgSolver2, FdmPcgSolver2,
};
use crate::field::{ConstantVectorField2, ImplicitPlane2, ImplicitSphere2, ImplicitUnion2};
use crate::global_variables::*;
use crate::grid::FaceCenteredGrid2;
use crate::io::WriteDataMode;
use crate::post;
use crate::pressure::{
    GridFractionalSinglePhasePressureSolver2, GridPressureSolver2, GridSinglePhasePressureSolver2,
    PressureSolveReport, PressureSystemSolver2,
};
use crate::Residuals;
use colored::*;
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::process;
use std::str::FromStr;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PressureSolverKind {
    Blocked,
    #[default]
    Fractional,
}

impl FromStr for PressureSolverKind {
    type Err = PressureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked" => Ok(PressureSolverKind::Blocked),
            "fractional" => Ok(PressureSolverKind::Fractional),
            _ => Err(PressureError::InvalidSetting {
                key: "pressure_solver".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl PressureSolverKind {
    pub fn build(self, system_solver: PressureSystemSolver2) -> Box<dyn GridPressureSolver2> {
        match self {
            PressureSolverKind::Blocked => {
                Box::new(GridSinglePhasePressureSolver2::with_solver(system_solver))
            }
            PressureSolverKind::Fractional => {
                Box::new(GridFractionalSinglePhasePressureSolver2::with_solver(system_solver))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinearSolverKind {
    Cg,
    Pcg,
    #[default]
    Iccg,
    Jacobi,
    GaussSeidel,
    RedBlackGaussSeidel,
    Multigrid,
    Mgpcg,
}

impl LinearSolverKind {
    pub const ALL: [LinearSolverKind; 8] = [
        LinearSolverKind::Cg,
        LinearSolverKind::Pcg,
        LinearSolverKind::Iccg,
        LinearSolverKind::Jacobi,
        LinearSolverKind::GaussSeidel,
        LinearSolverKind::RedBlackGaussSeidel,
        LinearSolverKind::Multigrid,
        LinearSolverKind::Mgpcg,
    ];

    pub fn is_multigrid(self) -> bool {
        matches!(self, LinearSolverKind::Multigrid | LinearSolverKind::Mgpcg)
    }

    /// For plain multigrid `max_number_of_iterations` bounds the V-cycles.
    pub fn build(
        self,
        tolerance: Float,
        max_number_of_iterations: u32,
        max_number_of_levels: usize,
    ) -> PressureSystemSolver2 {
        match self {
            LinearSolverKind::Cg => PressureSystemSolver2::Single(Box::new(FdmCgSolver2::new(
                max_number_of_iterations,
                tolerance,
            ))),
            LinearSolverKind::Pcg => PressureSystemSolver2::Single(Box::new(FdmPcgSolver2::new(
                max_number_of_iterations,
                tolerance,
            ))),
            LinearSolverKind::Iccg => PressureSystemSolver2::Single(Box::new(FdmIccgSolver2::new(
                max_number_of_iterations,
                tolerance,
            ))),
            LinearSolverKind::Jacobi => PressureSystemSolver2::Single(Box::new(
                FdmJacobiSolver2::new(max_number_of_iterations, RESIDUAL_CHECK_INTERVAL, tolerance),
            )),
            LinearSolverKind::GaussSeidel | LinearSolverKind::RedBlackGaussSeidel => {
                PressureSystemSolver2::Single(Box::new(FdmGaussSeidelSolver2::new(
                    max_number_of_iterations,
                    RESIDUAL_CHECK_INTERVAL,
                    tolerance,
                    SOR_FACTOR,
                    self == LinearSolverKind::RedBlackGaussSeidel,
                )))
            }
            LinearSolverKind::Multigrid => PressureSystemSolver2::Multigrid(Box::new(
                FdmMgSolver2::with_parameters(
                    max_number_of_levels,
                    5,
                    5,
                    20,
                    20,
                    tolerance,
                    SOR_FACTOR,
                    false,
                )
                .with_max_number_of_cycles(max_number_of_iterations),
            )),
            LinearSolverKind::Mgpcg => PressureSystemSolver2::Multigrid(Box::new(
                FdmMgpcgSolver2::new(max_number_of_iterations, tolerance, max_number_of_levels),
            )),
        }
    }
}

impl FromStr for LinearSolverKind {
    type Err = PressureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinearSolverKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| PressureError::InvalidSetting {
                key: "linear_solver".to_string(),
                value: s.to_string(),
            })
    }
}

impl fmt::Display for LinearSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinearSolverKind::Cg => "cg",
            LinearSolverKind::Pcg => "pcg",
            LinearSolverKind::Iccg => "iccg",
            LinearSolverKind::Jacobi => "jacobi",
            LinearSolverKind::GaussSeidel => "gauss_seidel",
            LinearSolverKind::RedBlackGaussSeidel => "red_black_gauss_seidel",
            LinearSolverKind::Multigrid => "multigrid",
            LinearSolverKind::Mgpcg => "mgpcg",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub center: [Float; D],
    pub radius: Float,
}

/// Settings of a dam-break run: a liquid column resting in a closed box,
/// optionally around a circular obstacle.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseSetup {
    pub case_name: String,
    pub resolution: [usize; D],
    pub domain_size: [Float; D],
    pub delta_t: Float,
    pub number_of_steps: usize,
    pub gravity: [Float; D],
    pub fluid_height: Float,
    pub pressure_solver: PressureSolverKind,
    pub linear_solver: LinearSolverKind,
    pub compressed: bool,
    pub tolerance: Float,
    pub max_iterations: u32,
    pub max_levels: usize,
    pub obstacle: Option<Obstacle>,
    pub write_data_mode: WriteDataMode,
}

impl Default for CaseSetup {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_setting(key: &str, value: &str) -> PressureError {
    PressureError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(parameters: &HashMap<String, String>, key: &str) -> Result<Option<T>, PressureError> {
    match parameters.get(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid_setting(key, value)),
        None => Ok(None),
    }
}

fn parse_pair<T: FromStr + Copy>(
    parameters: &HashMap<String, String>,
    key: &str,
) -> Result<Option<[T; D]>, PressureError> {
    let Some(value) = parameters.get(key) else {
        return Ok(None);
    };
    let items = value
        .split_whitespace()
        .map(|item| item.parse::<T>())
        .collect::<Result<Vec<T>, _>>()
        .map_err(|_| invalid_setting(key, value))?;
    match items.as_slice() {
        [x, y] => Ok(Some([*x, *y])),
        _ => Err(invalid_setting(key, value)),
    }
}

fn parse_write_data_mode(value: &str) -> Result<WriteDataMode, PressureError> {
    let mut items = value.split_whitespace();
    match items.next() {
        Some("frequency") => items
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .map(WriteDataMode::Frequency)
            .ok_or_else(|| invalid_setting("write_data_mode", value)),
        Some("list") => items
            .map(|step| step.parse::<usize>())
            .collect::<Result<Vec<usize>, _>>()
            .map(WriteDataMode::ListOfSteps)
            .map_err(|_| invalid_setting("write_data_mode", value)),
        _ => Err(invalid_setting("write_data_mode", value)),
    }
}

impl CaseSetup {
    pub fn new() -> Self {
        Self {
            case_name: String::from(CASE_NAME),
            resolution: RESOLUTION,
            domain_size: DOMAIN_SIZE,
            delta_t: DELTA_T,
            number_of_steps: NUMBER_OF_STEPS,
            gravity: GRAVITY,
            fluid_height: FLUID_HEIGHT,
            pressure_solver: PressureSolverKind::default(),
            linear_solver: LinearSolverKind::default(),
            compressed: false,
            tolerance: TOLERANCE_PRESSURE,
            max_iterations: MAX_ITER,
            max_levels: MAX_LEVELS,
            obstacle: None,
            write_data_mode: WriteDataMode::Frequency(NUMBER_OF_STEPS),
        }
    }

    /// Overrides the defaults with the entries of a setup file.
    pub fn from_setup(parameters: HashMap<String, String>) -> Result<Self, PressureError> {
        let mut setup = Self::new();
        if let Some(case_name) = parameters.get("case_name") {
            setup.case_name = case_name.clone();
        }
        if let Some(resolution) = parse_pair(&parameters, "resolution")? {
            setup.resolution = resolution;
        }
        if let Some(domain_size) = parse_pair(&parameters, "domain_size")? {
            setup.domain_size = domain_size;
        }
        if let Some(delta_t) = parse_value(&parameters, "time_step")? {
            setup.delta_t = delta_t;
        }
        if let Some(number_of_steps) = parse_value(&parameters, "number_of_steps")? {
            setup.number_of_steps = number_of_steps;
        }
        if let Some(gravity) = parse_pair(&parameters, "gravity")? {
            setup.gravity = gravity;
        }
        if let Some(fluid_height) = parse_value(&parameters, "fluid_height")? {
            setup.fluid_height = fluid_height;
        }
        if let Some(pressure_solver) = parse_value(&parameters, "pressure_solver")? {
            setup.pressure_solver = pressure_solver;
        }
        if let Some(linear_solver) = parse_value(&parameters, "linear_solver")? {
            setup.linear_solver = linear_solver;
        }
        if let Some(compressed) = parse_value(&parameters, "compressed")? {
            setup.compressed = compressed;
        }
        if let Some(tolerance) = parse_value(&parameters, "tolerance")? {
            setup.tolerance = tolerance;
        }
        if let Some(max_iterations) = parse_value(&parameters, "max_iterations")? {
            setup.max_iterations = max_iterations;
        }
        if let Some(max_levels) = parse_value(&parameters, "max_levels")? {
            setup.max_levels = max_levels;
        }
        if let Some(value) = parameters.get("obstacle") {
            let items = value
                .split_whitespace()
                .map(|item| item.parse::<Float>())
                .collect::<Result<Vec<Float>, _>>()
                .map_err(|_| invalid_setting("obstacle", value))?;
            setup.obstacle = match items.as_slice() {
                [] => None,
                [x, y, radius] => Some(Obstacle {
                    center: [*x, *y],
                    radius: *radius,
                }),
                _ => return Err(invalid_setting("obstacle", value)),
            };
        }
        if let Some(value) = parameters.get("write_data_mode") {
            setup.write_data_mode = parse_write_data_mode(value)?;
        }
        setup.validate()?;
        Ok(setup)
    }

    /// Rejects settings no run can start from, including a multigrid
    /// back-end on the compressed representation.
    pub fn validate(&self) -> Result<(), PressureError> {
        if self.resolution.iter().any(|&n| n == 0) {
            return Err(invalid_setting(
                "resolution",
                &format!("{} {}", self.resolution[0], self.resolution[1]),
            ));
        }
        if self.domain_size.iter().any(|&l| !(l > 0.0 && l.is_finite())) {
            return Err(invalid_setting(
                "domain_size",
                &format!("{} {}", self.domain_size[0], self.domain_size[1]),
            ));
        }
        if !(self.delta_t > 0.0 && self.delta_t.is_finite()) {
            return Err(PressureError::InvalidTimeStep(self.delta_t));
        }
        if !(self.tolerance > 0.0) {
            return Err(invalid_setting("tolerance", &self.tolerance.to_string()));
        }
        if self.max_iterations == 0 {
            return Err(invalid_setting("max_iterations", "0"));
        }
        if self.max_levels == 0 {
            return Err(invalid_setting("max_levels", "0"));
        }
        if let Some(obstacle) = &self.obstacle {
            if !(obstacle.radius > 0.0) {
                return Err(invalid_setting("obstacle", &obstacle.radius.to_string()));
            }
        }
        if self.linear_solver.is_multigrid() && self.compressed {
            return Err(PressureError::UnsupportedRepresentation {
                solver: match self.linear_solver {
                    LinearSolverKind::Multigrid => "multigrid",
                    _ => "mgpcg",
                },
                compressed: true,
            });
        }
        Ok(())
    }

    pub fn grid_spacing(&self) -> [Float; D] {
        [
            self.domain_size[0] / self.resolution[0] as Float,
            self.domain_size[1] / self.resolution[1] as Float,
        ]
    }

    pub fn system_solver(&self) -> PressureSystemSolver2 {
        self.linear_solver
            .build(self.tolerance, self.max_iterations, self.max_levels)
    }
}

pub struct Simulation {
    pub setup: CaseSetup,
    pub time_step: usize,
    pub simulation_time: Instant,
    pub velocity: FaceCenteredGrid2,
    pub pressure_solver: Box<dyn GridPressureSolver2>,
    pub boundary_solver: Box<dyn GridBoundaryConditionSolver2>,
    pub obstacle: ImplicitUnion2,
    pub obstacle_velocity: ConstantVectorField2,
    pub fluid: ImplicitPlane2,
    pub last_report: PressureSolveReport,
}

impl Simulation {
    pub fn new(setup: CaseSetup) -> Self {
        let pressure_solver = setup.pressure_solver.build(setup.system_solver());
        let mut boundary_solver = pressure_solver.suggested_boundary_condition_solver();
        let mut obstacle = ImplicitUnion2::new();
        if let Some(Obstacle { center, radius }) = setup.obstacle {
            obstacle.add(ImplicitSphere2::new(center, radius));
        }
        let obstacle_velocity = ConstantVectorField2::new([0.0; D]);
        let velocity = FaceCenteredGrid2::new(setup.resolution, setup.grid_spacing(), [0.0; D]);
        boundary_solver.update_collider(
            &obstacle,
            &obstacle_velocity,
            velocity.resolution(),
            velocity.grid_spacing(),
            velocity.origin(),
        );
        // Liquid below the initial height, air above.
        let fluid = ImplicitPlane2::new([0.0, -1.0], [0.0, setup.fluid_height]);
        info!(
            "{} case: {}x{} cells, {} pressure solver with {}",
            setup.case_name,
            setup.resolution[0],
            setup.resolution[1],
            pressure_solver.name(),
            pressure_solver.linear_system_solver().name()
        );
        Self {
            setup,
            time_step: 0,
            simulation_time: Instant::now(),
            velocity,
            pressure_solver,
            boundary_solver,
            obstacle,
            obstacle_velocity,
            fluid,
            last_report: PressureSolveReport::default(),
        }
    }

    pub fn next_step(&mut self) {
        self.time_step += 1;
    }

    pub fn stop_condition(&self) -> bool {
        self.time_step >= self.setup.number_of_steps
    }

    pub fn apply_external_forces(&mut self) {
        let [gx, gy] = self.setup.gravity;
        let dt = self.setup.delta_t;
        self.velocity
            .u_mut()
            .par_for_each_mut(|_, _, u| *u += dt * gx);
        self.velocity
            .v_mut()
            .par_for_each_mut(|_, _, v| *v += dt * gy);
        self.boundary_solver
            .constrain_velocity(&mut self.velocity, EXTRAPOLATION_DEPTH);
    }

    /// Projects the current velocity and re-applies the boundary conditions.
    pub fn project(&mut self) -> Result<PressureSolveReport, PressureError> {
        let input = self.velocity.clone();
        let report = self.pressure_solver.solve(
            &input,
            self.setup.delta_t,
            &mut self.velocity,
            &self.obstacle,
            &self.obstacle_velocity,
            &self.fluid,
            self.setup.compressed,
        )?;
        self.boundary_solver
            .constrain_velocity(&mut self.velocity, EXTRAPOLATION_DEPTH);
        self.last_report = report;
        Ok(report)
    }

    /// One time step: body forces, then the pressure projection.
    pub fn advance(&mut self) -> Result<Residuals, PressureError> {
        self.apply_external_forces();
        let divergence_before = post::max_fluid_divergence(&self.velocity, &self.obstacle, &self.fluid);
        let report = self.project()?;
        let divergence_after = post::max_fluid_divergence(&self.velocity, &self.obstacle, &self.fluid);
        Ok(Residuals {
            number_of_iterations: report.number_of_iterations,
            linear_solver: report.residual,
            divergence_before,
            divergence_after,
        })
    }
}

fn exit_on_error<T>(result: Result<T, PressureError>, context: &str) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error while {context}: {e}.");
        process::exit(1);
    })
}

pub fn run() {
    let mut simulation = exit_on_error(Simulation::build_case_setup(), "building the case setup");

    loop {
        let residuals = exit_on_error(simulation.advance(), "solving the pressure");

        simulation.print_residuals(&residuals);
        if let Err(e) = simulation.write_residuals(&residuals) {
            eprintln!("Error while writing the residuals file: {e}.");
            process::exit(1);
        };

        if let Err(e) = simulation.write_post_processing_from_each_n_steps(
            1,
            post::compute_max_divergence,
            "max_divergence.dat",
        ) {
            eprintln!("Error while writing the max divergence file: {e}.");
            process::exit(1);
        };

        if let Err(e) = simulation.write_post_processing_from_each_n_steps(
            1,
            post::compute_pressure_statistics,
            "pressure_statistics.dat",
        ) {
            eprintln!("Error while writing the pressure statistics file: {e}.");
            process::exit(1);
        };

        if let Err(e) = simulation.write_post_processing_from_each_n_steps(
            1,
            post::compute_fluid_fraction,
            "fluid_fraction.dat",
        ) {
            eprintln!("Error while writing the fluid fraction file: {e}.");
            process::exit(1);
        };

        if let Err(e) = simulation.write_data() {
            eprintln!("Error while writing the step {} data: {e}.", simulation.time_step);
            process::exit(1);
        };

        simulation.next_step();
        if simulation.stop_condition() {
            if let Err(e) = simulation.write_data_from_steps() {
                eprintln!("Error while writing the final data: {e}.");
                process::exit(1);
            };
            break;
        }
    }
}

pub fn run_benchmark() {
    let bcs_time = Instant::now();
    let mut simulation = exit_on_error(Simulation::build_case_setup(), "building the case setup");
    let bcs_duration = bcs_time.elapsed();

    loop {
        let loop_time = Instant::now();

        let ef_time = Instant::now();
        simulation.apply_external_forces();
        let ef_duration = ef_time.elapsed();

        let db_time = Instant::now();
        let divergence_before =
            post::max_fluid_divergence(&simulation.velocity, &simulation.obstacle, &simulation.fluid);
        let db_duration = db_time.elapsed();

        let ps_time = Instant::now();
        let report = exit_on_error(simulation.project(), "solving the pressure");
        let ps_duration = ps_time.elapsed();

        let da_time = Instant::now();
        let divergence_after =
            post::max_fluid_divergence(&simulation.velocity, &simulation.obstacle, &simulation.fluid);
        let da_duration = da_time.elapsed();

        let residuals = Residuals {
            number_of_iterations: report.number_of_iterations,
            linear_solver: report.residual,
            divergence_before,
            divergence_after,
        };

        let pr_time = Instant::now();
        simulation.print_residuals(&residuals);
        if let Err(e) = simulation.write_residuals(&residuals) {
            eprintln!("Error while writing the residuals file: {e}.");
            process::exit(1);
        };
        let pr_duration = pr_time.elapsed();

        let loop_duration = loop_time.elapsed();

        let elapsed_times = [
            ("build_case_setup", bcs_duration),
            ("external_forces", ef_duration),
            ("divergence_before", db_duration),
            ("pressure_solve", ps_duration),
            ("divergence_after", da_duration),
            ("print_residuals", pr_duration),
            ("loop", loop_duration),
        ];
        if let Err(e) = crate::io::write_inside_loop_elapsed_time(&elapsed_times, &simulation.time_step) {
            eprintln!("Error while writing the benchmark file: {e}.");
            process::exit(1);
        };

        simulation.next_step();
        if simulation.stop_condition() {
            break;
        }
    }
}

/// One row of the linear solver comparison.
#[derive(Clone, Debug)]
pub struct ComparisonResult {
    pub linear_solver: LinearSolverKind,
    pub report: PressureSolveReport,
    pub divergence_after: Float,
    pub elapsed_time: Float,
}

/// Projects the same first step of the case with every linear solver that
/// supports the configured representation.
pub fn compare_linear_solvers(setup: &CaseSetup) -> Result<Vec<ComparisonResult>, PressureError> {
    let mut results = Vec::new();
    for linear_solver in LinearSolverKind::ALL {
        if setup.compressed && linear_solver.is_multigrid() {
            continue;
        }
        let mut simulation = Simulation::new(CaseSetup {
            linear_solver,
            ..setup.clone()
        });
        simulation.apply_external_forces();
        let time = Instant::now();
        let report = simulation.project()?;
        let elapsed_time = time.elapsed().as_secs_f64();
        results.push(ComparisonResult {
            linear_solver,
            report,
            divergence_after: post::max_fluid_divergence(
                &simulation.velocity,
                &simulation.obstacle,
                &simulation.fluid,
            ),
            elapsed_time,
        });
    }
    Ok(results)
}

pub fn run_comparison() {
    let simulation = exit_on_error(Simulation::build_case_setup(), "building the case setup");
    let results = exit_on_error(
        compare_linear_solvers(&simulation.setup),
        "comparing the linear solvers",
    );
    println!(
        "\n{:>24} {:>10} {:>12} {:>16} {:>16} {:>16}\n",
        "linear_solver".cyan().bold(),
        "converged".cyan().bold(),
        "iterations".cyan().bold(),
        "residual".cyan().bold(),
        "max_divergence".cyan().bold(),
        "time [s]".cyan().bold()
    );
    for result in &results {
        let converged = if result.report.converged {
            "yes".green()
        } else {
            "no".red()
        };
        println!(
            "{:>24} {:>10} {:>12} {:>16.8e} {:>16.8e} {:>16.8e}",
            result.linear_solver.to_string(),
            converged,
            result.report.number_of_iterations,
            result.report.residual,
            result.divergence_after,
            result.elapsed_time
        );
    }
    if let Err(e) = io::write_comparison(&results) {
        eprintln!("Error while writing the comparison file: {e}.");
        process::exit(1);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_from_setup_overrides_defaults() {
        let setup = CaseSetup::from_setup(parameters(&[
            ("case_name", "Column"),
            ("resolution", "16 32"),
            ("linear_solver", "red_black_gauss_seidel"),
            ("pressure_solver", "blocked"),
            ("obstacle", "0.5 0.25 0.1"),
            ("write_data_mode", "list 1 4"),
        ]))
        .unwrap();
        assert_eq!(setup.case_name, "Column");
        assert_eq!(setup.resolution, [16, 32]);
        assert_eq!(setup.linear_solver, LinearSolverKind::RedBlackGaussSeidel);
        assert_eq!(setup.pressure_solver, PressureSolverKind::Blocked);
        assert_eq!(setup.obstacle.map(|o| o.radius), Some(0.1));
        assert_eq!(setup.write_data_mode, WriteDataMode::ListOfSteps(vec![1, 4]));
        assert_eq!(setup.delta_t, DELTA_T);
        assert_eq!(setup.grid_spacing(), [DOMAIN_SIZE[0] / 16.0, DOMAIN_SIZE[1] / 32.0]);
    }

    #[test]
    fn test_from_setup_rejects_invalid_values() {
        let result = CaseSetup::from_setup(parameters(&[("linear_solver", "bicgstab")]));
        assert!(matches!(result, Err(PressureError::InvalidSetting { .. })));
        let result = CaseSetup::from_setup(parameters(&[("resolution", "16")]));
        assert!(matches!(result, Err(PressureError::InvalidSetting { .. })));
        let result = CaseSetup::from_setup(parameters(&[("time_step", "-0.1")]));
        assert!(matches!(result, Err(PressureError::InvalidTimeStep(_))));
    }

    #[test]
    fn test_multigrid_with_compressed_system_is_rejected() {
        let result = CaseSetup::from_setup(parameters(&[
            ("linear_solver", "multigrid"),
            ("compressed", "true"),
        ]));
        assert!(matches!(
            result,
            Err(PressureError::UnsupportedRepresentation { compressed: true, .. })
        ));
    }

    #[test]
    fn test_linear_solver_names_round_trip() {
        for kind in LinearSolverKind::ALL {
            assert_eq!(kind.to_string().parse::<LinearSolverKind>().unwrap(), kind);
            let solver = kind.build(1e-6, 10, 3);
            assert_eq!(solver.is_multigrid(), kind.is_multigrid());
            assert_eq!(solver.name(), kind.to_string());
        }
    }

    #[test]
    fn test_dam_break_steps_stay_divergence_free() {
        let setup = CaseSetup {
            resolution: [16, 16],
            number_of_steps: 2,
            obstacle: Some(Obstacle {
                center: [0.5, 0.2],
                radius: 0.15,
            }),
            ..CaseSetup::new()
        };
        let mut simulation = Simulation::new(setup);
        let residuals = simulation.advance().unwrap();
        assert!(simulation.last_report.converged);
        assert!(residuals.divergence_before > 0.0);
        assert!(residuals.divergence_after < residuals.divergence_before);
    }

    #[test]
    fn test_compare_linear_solvers_skips_multigrid_on_compressed() {
        let setup = CaseSetup {
            resolution: [8, 8],
            compressed: true,
            ..CaseSetup::new()
        };
        let results = compare_linear_solvers(&setup).unwrap();
        assert_eq!(results.len(), LinearSolverKind::ALL.len() - 2);
        assert!(results.iter().all(|result| !result.linear_solver.is_multigrid()));
    }
}
