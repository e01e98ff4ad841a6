use fluid_projection::case::LinearSolverKind;
use fluid_projection::fdm::{
    FdmCgSolver2, FdmCompressedLinearSystem2, FdmIccgSolver2, FdmMgSolver2, FdmMgpcgSolver2,
};
use fluid_projection::field::{
    ConstantScalarField2, ConstantVectorField2, ImplicitBox2, ImplicitPlane2, ImplicitSphere2,
};
use fluid_projection::grid::FaceCenteredGrid2;
use fluid_projection::post::max_fluid_divergence;
use fluid_projection::pressure::{
    GridFractionalSinglePhasePressureSolver2, GridPressureSolver2, GridSinglePhasePressureSolver2,
    PressureSystemSolver2,
};
use fluid_projection::{Float, Marker, PressureError, D, MAX_DISTANCE};

const N: usize = 16;

fn swirling_velocity() -> FaceCenteredGrid2 {
    let h = 1.0 / N as Float;
    let mut velocity = FaceCenteredGrid2::new([N, N], [h, h], [0.0, 0.0]);
    velocity.fill_with(|x: [Float; D]| {
        [
            (3.0 * x[0] + 1.0).sin() * (2.0 * x[1]).cos(),
            x[0].cos() * (2.0 * x[1] + 0.5).sin() - 0.5,
        ]
    });
    velocity
}

/// Liquid below `y = 0.7`, air above.
fn free_surface() -> ImplicitPlane2 {
    ImplicitPlane2::new([0.0, -1.0], [0.0, 0.7])
}

fn no_collider() -> ConstantScalarField2 {
    ConstantScalarField2::new(MAX_DISTANCE)
}

fn still() -> ConstantVectorField2 {
    ConstantVectorField2::new([0.0, 0.0])
}

fn cg(tolerance: Float) -> PressureSystemSolver2 {
    PressureSystemSolver2::Single(Box::new(FdmCgSolver2::new(1000, tolerance)))
}

fn max_abs_difference(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, Float::max)
}

fn blocked_fluid_divergence(solver: &GridSinglePhasePressureSolver2, velocity: &FaceCenteredGrid2) -> Float {
    let markers = solver.markers(0).expect("finest markers");
    let mut max: Float = 0.0;
    markers.for_each_index(|i, j| {
        if markers[(i, j)] == Marker::Fluid {
            max = max.max(velocity.divergence_at_cell_center(i, j).abs());
        }
    });
    max
}

#[test]
fn test_blocked_projection_without_collider_is_divergence_free() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let mut solver = GridSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let report = solver
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &free_surface(), false)
        .unwrap();

    assert!(report.converged && !report.skipped);
    assert!(report.number_of_fluid_cells > 0);
    let divergence = blocked_fluid_divergence(&solver, &output);
    assert!(divergence < 1e-6, "max divergence {divergence}");
}

#[test]
fn test_blocked_projection_with_box_collider_is_divergence_free() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let obstacle = ImplicitBox2::new([0.3, 0.0], [0.55, 0.35]);
    let mut solver = GridSinglePhasePressureSolver2::with_solver(cg(1e-9));
    solver
        .solve(&input, 1.0, &mut output, &obstacle, &still(), &free_surface(), false)
        .unwrap();

    let markers = solver.markers(0).unwrap();
    assert_eq!(markers[(6, 2)], Marker::Boundary);
    let divergence = blocked_fluid_divergence(&solver, &output);
    assert!(divergence < 1e-6, "max divergence {divergence}");
    // Faces inside the obstacle are left alone.
    assert_eq!(output.u()[(7, 2)], input.u()[(7, 2)]);
}

#[test]
fn test_fractional_projection_with_sphere_collider_is_divergence_free() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let obstacle = ImplicitSphere2::new([0.5, 0.3], 0.15);
    let mut solver = GridFractionalSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let report = solver
        .solve(&input, 1.0, &mut output, &obstacle, &still(), &free_surface(), false)
        .unwrap();

    assert!(report.converged);
    let before = max_fluid_divergence(&input, &obstacle, &free_surface());
    let after = max_fluid_divergence(&output, &obstacle, &free_surface());
    assert!(before > 1e-2);
    assert!(after < 1e-6, "max divergence {after}");
}

#[test]
fn test_projection_is_idempotent() {
    let input = swirling_velocity();
    let mut once = input.clone();
    let mut solver = GridSinglePhasePressureSolver2::with_solver(cg(1e-11));
    solver
        .solve(&input, 1.0, &mut once, &no_collider(), &still(), &free_surface(), false)
        .unwrap();

    let mut twice = once.clone();
    solver
        .solve(&once, 1.0, &mut twice, &no_collider(), &still(), &free_surface(), false)
        .unwrap();

    assert!(max_abs_difference(once.u().data(), twice.u().data()) < 1e-8);
    assert!(max_abs_difference(once.v().data(), twice.v().data()) < 1e-8);
}

#[test]
fn test_fractional_and_blocked_agree_without_collider() {
    let h = 1.0 / N as Float;
    let mut input = FaceCenteredGrid2::new([N, N], [h, h], [0.0, 0.0]);
    input.fill([0.0, -1.0]);
    for i in 0..N {
        input.v_mut()[(i, 0)] = 0.0;
    }
    let fluid = ImplicitPlane2::new([0.0, -1.0], [0.0, 0.5]);

    let mut blocked = GridSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let mut fractional = GridFractionalSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let mut output = input.clone();
    blocked
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &fluid, false)
        .unwrap();
    fractional
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &fluid, false)
        .unwrap();

    for i in 0..N {
        let p_blocked = blocked.pressure()[(i, 0)];
        let p_fractional = fractional.pressure()[(i, 0)];
        assert!(p_blocked > 0.0 && p_fractional > 0.0);
        let ratio = p_fractional / p_blocked;
        assert!((0.5..2.0).contains(&ratio), "ratio {ratio} in column {i}");
    }
}

#[test]
fn test_pressure_scales_with_time_step() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let mut solver = GridSinglePhasePressureSolver2::with_solver(cg(1e-9));
    solver
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &free_surface(), false)
        .unwrap();
    let unit = solver.pressure().clone();
    let velocity_unit = output.clone();

    solver
        .solve(&input, 0.5, &mut output, &no_collider(), &still(), &free_surface(), false)
        .unwrap();
    let doubled: Vec<Float> = unit.data().iter().map(|p| 2.0 * p).collect();
    assert!(max_abs_difference(solver.pressure().data(), &doubled) < 1e-8);
    assert!(max_abs_difference(output.v().data(), velocity_unit.v().data()) < 1e-7);
}

#[test]
fn test_compressed_and_stencil_systems_give_the_same_pressure() {
    let input = swirling_velocity();
    let obstacle = ImplicitSphere2::new([0.5, 0.3], 0.15);
    let iccg = || PressureSystemSolver2::Single(Box::new(FdmIccgSolver2::new(500, 1e-10)));

    let mut stencil = GridFractionalSinglePhasePressureSolver2::with_solver(iccg());
    let mut stencil_output = input.clone();
    stencil
        .solve(&input, 1.0, &mut stencil_output, &obstacle, &still(), &free_surface(), false)
        .unwrap();

    let mut compressed = GridFractionalSinglePhasePressureSolver2::with_solver(iccg());
    let mut compressed_output = input.clone();
    let report = compressed
        .solve(&input, 1.0, &mut compressed_output, &obstacle, &still(), &free_surface(), true)
        .unwrap();

    assert!(report.converged);
    assert!(max_abs_difference(stencil.pressure().data(), compressed.pressure().data()) < 1e-7);
    assert!(max_abs_difference(stencil_output.u().data(), compressed_output.u().data()) < 1e-7);
}

#[test]
fn test_multigrid_back_ends_match_conjugate_gradient() {
    let input = swirling_velocity();
    let mut reference = GridSinglePhasePressureSolver2::with_solver(cg(1e-11));
    let mut output = input.clone();
    reference
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &free_surface(), false)
        .unwrap();
    let scale = reference
        .pressure()
        .data()
        .iter()
        .fold(0.0, |max: Float, p| max.max(p.abs()));

    let back_ends = [
        PressureSystemSolver2::Multigrid(Box::new(
            FdmMgSolver2::with_parameters(4, 5, 5, 20, 20, 1e-9, 1.5, false).with_max_number_of_cycles(200),
        )),
        PressureSystemSolver2::Multigrid(Box::new(FdmMgpcgSolver2::new(200, 1e-10, 4))),
    ];
    for back_end in back_ends {
        let mut solver = GridSinglePhasePressureSolver2::with_solver(back_end);
        let report = solver
            .solve(&input, 1.0, &mut output, &no_collider(), &still(), &free_surface(), false)
            .unwrap();
        assert!(report.number_of_levels > 1);
        let difference = max_abs_difference(solver.pressure().data(), reference.pressure().data());
        assert!(
            difference < 1e-4 * scale,
            "{}: difference {difference}",
            solver.linear_system_solver().name()
        );
    }
}

#[test]
fn test_multigrid_on_compressed_system_is_rejected() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let mut solver = GridFractionalSinglePhasePressureSolver2::with_solver(
        LinearSolverKind::Multigrid.build(1e-6, 10, 4),
    );
    let result = solver.solve(&input, 1.0, &mut output, &no_collider(), &still(), &free_surface(), true);
    assert!(matches!(
        result,
        Err(PressureError::UnsupportedRepresentation { compressed: true, .. })
    ));
}

#[test]
fn test_invalid_time_step_is_rejected() {
    let input = swirling_velocity();
    let mut output = input.clone();
    let mut solver = GridSinglePhasePressureSolver2::new();
    for dt in [0.0, -1.0, Float::NAN, Float::INFINITY] {
        let result = solver.solve(&input, dt, &mut output, &no_collider(), &still(), &free_surface(), false);
        assert!(matches!(result, Err(PressureError::InvalidTimeStep(_))), "dt = {dt}");
    }
}

#[test]
fn test_nothing_to_project_is_skipped() {
    let mut solver = GridSinglePhasePressureSolver2::new();

    let empty = FaceCenteredGrid2::new([0, 0], [1.0, 1.0], [0.0, 0.0]);
    let mut output = empty.clone();
    let report = solver
        .solve(&empty, 1.0, &mut output, &no_collider(), &still(), &free_surface(), false)
        .unwrap();
    assert!(report.skipped && report.converged);

    let input = swirling_velocity();
    let mut output = FaceCenteredGrid2::new([2, 2], [1.0, 1.0], [0.0, 0.0]);
    let all_air = ConstantScalarField2::new(-1.0);
    let report = solver
        .solve(&input, 1.0, &mut output, &no_collider(), &still(), &all_air, false)
        .unwrap();
    assert!(report.skipped);
    assert_eq!(output.u().data(), input.u().data());
    assert_eq!(output.v().data(), input.v().data());
    assert!(solver.pressure().data().iter().all(|&p| p == 0.0));
}

#[test]
fn test_suggested_boundary_solvers_match_discretization() {
    let blocked = GridSinglePhasePressureSolver2::new();
    let fractional = GridFractionalSinglePhasePressureSolver2::new();
    assert_eq!(blocked.suggested_boundary_condition_solver().name(), "blocked boundary");
    assert_eq!(fractional.suggested_boundary_condition_solver().name(), "fractional boundary");
    assert_eq!(blocked.linear_system_solver().name(), "iccg");
}

/// Upward flow on every interior `v` face of a closed box; the wall faces
/// stay at rest.
fn closed_box_velocity(n: usize) -> FaceCenteredGrid2 {
    let h = 1.0 / n as Float;
    let mut velocity = FaceCenteredGrid2::new([n, n], [h, h], [0.0, 0.0]);
    for j in 1..n {
        for i in 0..n {
            velocity.v_mut()[(i, j)] = 1.0;
        }
    }
    velocity
}

#[test]
fn test_closed_box_without_free_surface_removes_the_gradient_flow() {
    // Liquid everywhere and walls on every side: each row is pure Neumann and
    // the system is only semi-definite.
    let everywhere = ConstantScalarField2::new(MAX_DISTANCE);
    for n in [3, 16] {
        let input = closed_box_velocity(n);
        for linear_solver in [LinearSolverKind::Iccg, LinearSolverKind::Cg, LinearSolverKind::Multigrid] {
            let solvers: [Box<dyn GridPressureSolver2>; 2] = [
                Box::new(GridSinglePhasePressureSolver2::with_solver(
                    linear_solver.build(1e-10, 1000, 4),
                )),
                Box::new(GridFractionalSinglePhasePressureSolver2::with_solver(
                    linear_solver.build(1e-10, 1000, 4),
                )),
            ];
            for mut solver in solvers {
                let mut output = input.clone();
                let report = solver
                    .solve(&input, 1.0, &mut output, &no_collider(), &still(), &everywhere, false)
                    .unwrap();
                assert_eq!(report.number_of_fluid_cells, n * n);
                let speed = output
                    .u()
                    .data()
                    .iter()
                    .chain(output.v().data())
                    .fold(0.0, |max: Float, value| max.max(value.abs()));
                assert!(
                    speed < 1e-5,
                    "{} with {linear_solver} on {n}x{n}: max speed {speed}",
                    solver.name()
                );
            }
        }
    }
}

#[test]
fn test_assembled_systems_are_symmetric() {
    let input = swirling_velocity();
    let sphere = ImplicitSphere2::new([0.5, 0.3], 0.15);
    let mut fractional = GridFractionalSinglePhasePressureSolver2::new();
    fractional.build_system(&input, &sphere, &still(), &free_surface());
    let mut compressed = FdmCompressedLinearSystem2::default();
    compressed.compress_from(fractional.linear_system());
    assert_eq!(compressed.a.rows(), fractional.number_of_fluid_cells());
    assert!(compressed.a.is_symmetric(1e-12));
    assert!((0..compressed.a.rows()).all(|r| compressed.a.diagonal(r) > 0.0));

    let obstacle = ImplicitBox2::new([0.3, 0.0], [0.55, 0.35]);
    let mut blocked = GridSinglePhasePressureSolver2::new();
    blocked.build_system(&input, &obstacle, &still(), &free_surface());
    compressed.compress_from(blocked.linear_system());
    assert_eq!(compressed.a.rows(), blocked.number_of_fluid_cells());
    assert!(compressed.a.is_symmetric(1e-12));
}

#[test]
fn test_collider_moving_with_the_flow_leaves_it_unchanged() {
    let h = 1.0 / N as Float;
    let mut input = FaceCenteredGrid2::new([N, N], [h, h], [0.0, 0.0]);
    input.fill([1.0, 0.5]);
    let sphere = ImplicitSphere2::new([0.5, 0.5], 0.2);
    let carried = ConstantVectorField2::new([1.0, 0.5]);
    let everywhere = ConstantScalarField2::new(MAX_DISTANCE);

    let mut solver = GridFractionalSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let mut output = input.clone();
    solver
        .solve(&input, 1.0, &mut output, &sphere, &carried, &everywhere, false)
        .unwrap();

    let pressure = solver
        .pressure()
        .data()
        .iter()
        .fold(0.0, |max: Float, p| max.max(p.abs()));
    assert!(pressure < 1e-9, "max pressure {pressure}");
    assert!(max_abs_difference(output.u().data(), input.u().data()) < 1e-9);
    assert!(max_abs_difference(output.v().data(), input.v().data()) < 1e-9);
}

#[test]
fn test_rising_collider_pushes_still_liquid() {
    let h = 1.0 / N as Float;
    let input = FaceCenteredGrid2::new([N, N], [h, h], [0.0, 0.0]);
    let sphere = ImplicitSphere2::new([0.5, 0.35], 0.15);
    let rising = ConstantVectorField2::new([0.0, 1.0]);

    let mut solver = GridFractionalSinglePhasePressureSolver2::with_solver(cg(1e-9));
    let mut output = input.clone();
    let report = solver
        .solve(&input, 1.0, &mut output, &sphere, &rising, &free_surface(), false)
        .unwrap();

    assert!(report.converged);
    let pressure = solver
        .pressure()
        .data()
        .iter()
        .fold(0.0, |max: Float, p| max.max(p.abs()));
    assert!(pressure > 1e-3, "max pressure {pressure}");
    let speed = output
        .v()
        .data()
        .iter()
        .fold(0.0, |max: Float, v| max.max(v.abs()));
    assert!(speed > 1e-3);
    let divergence = max_fluid_divergence(&output, &sphere, &free_surface());
    assert!(divergence < 1e-6, "max divergence {divergence}");
}
