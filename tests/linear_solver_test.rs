use fluid_projection::blas::Blas;
use fluid_projection::fdm::{
    FdmBlas2, FdmCgSolver2, FdmCompressedLinearSystem2, FdmGaussSeidelSolver2, FdmIccgSolver2,
    FdmJacobiSolver2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrixRow2,
    FdmMgLinearSystem2, FdmMgLinearSystemSolver2, FdmMgSolver2, FdmPcgSolver2, FdmVector2,
};
use fluid_projection::grid::Array2;
use fluid_projection::Float;

/// Negative Laplacian with a free surface (Dirichlet) above the top row and
/// walls elsewhere, on a unit grid.
fn free_surface_system(size: [usize; 2]) -> FdmLinearSystem2 {
    let [nx, ny] = size;
    let mut system = FdmLinearSystem2::new(size);
    system.a.par_for_each_mut(|i, j, row| {
        let neighbors = usize::from(i > 0) + usize::from(i + 1 < nx) + usize::from(j > 0) + 1;
        *row = FdmMatrixRow2 {
            center: neighbors as Float,
            right: if i + 1 < nx { -1.0 } else { 0.0 },
            up: if j + 1 < ny { -1.0 } else { 0.0 },
        };
    });
    system.b = Array2::from_fn(size, |i, j| ((i * 7 + j * 3) % 5) as Float - 2.0);
    system
}

fn solve_with(solver: &mut dyn FdmLinearSystemSolver2, system: &FdmLinearSystem2) -> FdmVector2 {
    let mut system = system.clone();
    assert!(solver.solve(&mut system), "{} did not converge", solver.name());
    system.x
}

fn max_abs_difference(a: &FdmVector2, b: &FdmVector2) -> Float {
    a.data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, Float::max)
}

#[test]
fn test_all_single_level_solvers_agree_with_cg() {
    let system = free_surface_system([12, 10]);
    let reference = solve_with(&mut FdmCgSolver2::new(1000, 1e-10), &system);

    let mut solvers: Vec<Box<dyn FdmLinearSystemSolver2>> = vec![
        Box::new(FdmPcgSolver2::new(1000, 1e-10)),
        Box::new(FdmIccgSolver2::new(1000, 1e-10)),
        Box::new(FdmJacobiSolver2::new(20000, 10, 1e-10)),
        Box::new(FdmGaussSeidelSolver2::new(10000, 10, 1e-10, 1.0, false)),
        Box::new(FdmGaussSeidelSolver2::new(10000, 10, 1e-10, 1.5, true)),
    ];
    for solver in solvers.iter_mut() {
        let x = solve_with(solver.as_mut(), &system);
        let difference = max_abs_difference(&x, &reference);
        assert!(difference < 1e-6, "{}: difference {difference}", solver.name());
    }
}

#[test]
fn test_compressed_solvers_agree_with_stencil() {
    let system = free_surface_system([8, 8]);
    let reference = solve_with(&mut FdmCgSolver2::new(1000, 1e-10), &system);

    let mut solvers: Vec<Box<dyn FdmLinearSystemSolver2>> = vec![
        Box::new(FdmCgSolver2::new(1000, 1e-10)),
        Box::new(FdmIccgSolver2::new(1000, 1e-10)),
        Box::new(FdmGaussSeidelSolver2::new(10000, 10, 1e-10, 1.2, false)),
    ];
    for solver in solvers.iter_mut() {
        let mut compressed = FdmCompressedLinearSystem2::default();
        compressed.compress_from(&system);
        assert!(compressed.a.is_symmetric(1e-10));
        assert!(solver.solve_compressed(&mut compressed), "{}", solver.name());
        let mut x = FdmVector2::new([8, 8]);
        compressed.decompress_into(&mut x);
        let difference = max_abs_difference(&x, &reference);
        assert!(difference < 1e-6, "{}: difference {difference}", solver.name());
    }
}

#[test]
fn test_reported_residual_matches_true_residual() {
    let system = free_surface_system([16, 16]);
    let mut solver = FdmCgSolver2::new(1000, 1e-9);
    let mut solved = system.clone();
    assert!(solver.solve(&mut solved));

    let mut residual = FdmVector2::new([16, 16]);
    FdmBlas2::residual(&solved.a, &solved.x, &solved.b, &mut residual);
    let true_norm = FdmBlas2::l2_norm(&residual);
    assert!(solver.last_residual() <= 1e-9);
    assert!(true_norm < 1e-8, "true residual {true_norm}");
}

#[test]
fn test_multigrid_on_single_level_agrees_with_cg() {
    // 3x3 cannot be coarsened: the V-cycle reduces to coarsest smoothing.
    let system = free_surface_system([3, 3]);
    let reference = solve_with(&mut FdmCgSolver2::new(100, 1e-10), &system);

    let mut mg_system = FdmMgLinearSystem2::default();
    mg_system.resize_with_finest([3, 3], 4);
    assert_eq!(mg_system.number_of_levels(), 1);
    mg_system.a.levels[0] = system.a.clone();
    mg_system.b.levels[0] = system.b.clone();

    let mut solver = FdmMgSolver2::with_parameters(4, 5, 5, 20, 20, 1e-10, 1.0, false)
        .with_max_number_of_cycles(100);
    assert!(solver.solve_mg(&mut mg_system));
    let difference = max_abs_difference(&mg_system.x.levels[0], &reference);
    assert!(difference < 1e-6, "difference {difference}");
}

#[test]
fn test_multigrid_rejects_plain_systems() {
    let mut system = free_surface_system([4, 4]);
    let mut solver = FdmMgSolver2::new(3);
    assert!(!solver.solve(&mut system));
    let mut compressed = FdmCompressedLinearSystem2::default();
    compressed.compress_from(&system);
    assert!(!solver.solve_compressed(&mut compressed));
}
