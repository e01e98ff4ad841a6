use super::gauss_seidel::FdmGaussSeidelSolver2;
use super::{
    hold_excluded_cells, FdmBlas2, FdmCompressedLinearSystem2, FdmLinearSystem2,
    FdmLinearSystemSolver2, FdmMatrix2, FdmMatrixRow2, FdmVector2,
};
use crate::global_variables::*;
use crate::grid::Array2;
use crate::mg::{mg_v_cycle, MgMatrix, MgParameters, MgRelaxFunc, MgResult, MgVector};
use log::warn;
use std::sync::Arc;

pub type FdmMgMatrix2 = MgMatrix<FdmBlas2>;

pub type FdmMgVector2 = MgVector<FdmBlas2>;

/// Per-axis weights of the fine cells `2i - 1 ..= 2i + 2` feeding coarse cell `i`.
const RESTRICTION_KERNEL: [Float; 4] = [0.125, 0.375, 0.375, 0.125];

/// Multigrid linear system, finest level first.
#[derive(Clone, Default)]
pub struct FdmMgLinearSystem2 {
    pub a: FdmMgMatrix2,
    pub x: FdmMgVector2,
    pub b: FdmMgVector2,
}

impl FdmMgLinearSystem2 {
    pub fn clear(&mut self) {
        self.a.levels.clear();
        self.x.levels.clear();
        self.b.levels.clear();
    }

    pub fn number_of_levels(&self) -> usize {
        self.a.levels.len()
    }

    pub fn resize_with_coarsest(&mut self, coarsest_resolution: [usize; D], number_of_levels: usize) {
        let sizes = level_sizes_with_coarsest(coarsest_resolution, number_of_levels);
        self.resize_levels(&sizes);
    }

    pub fn resize_with_finest(&mut self, finest_resolution: [usize; D], max_number_of_levels: usize) {
        let sizes = level_sizes_with_finest(finest_resolution, max_number_of_levels);
        self.resize_levels(&sizes);
    }

    /// Levels as a stencil system, e.g. for solving only the finest one.
    pub fn level(&self, level: usize) -> FdmLinearSystem2 {
        FdmLinearSystem2 {
            a: self.a.levels[level].clone(),
            x: self.x.levels[level].clone(),
            b: self.b.levels[level].clone(),
        }
    }

    fn resize_levels(&mut self, sizes: &[[usize; D]]) {
        resize_array_levels(sizes, FdmMatrixRow2::default(), &mut self.a.levels);
        resize_array_levels(sizes, 0.0, &mut self.x.levels);
        resize_array_levels(sizes, 0.0, &mut self.b.levels);
    }
}

/// Level sizes doubling from `coarsest_resolution`, finest first.
pub fn level_sizes_with_coarsest(coarsest_resolution: [usize; D], number_of_levels: usize) -> Vec<[usize; D]> {
    let number_of_levels = number_of_levels.max(1);
    (0..number_of_levels)
        .map(|level| {
            let factor = 1 << (number_of_levels - 1 - level);
            [coarsest_resolution[0] * factor, coarsest_resolution[1] * factor]
        })
        .collect()
}

/// Level sizes halving from `finest_resolution` while both axes stay even and
/// at least 2, up to `max_number_of_levels`. Finest first.
pub fn level_sizes_with_finest(finest_resolution: [usize; D], max_number_of_levels: usize) -> Vec<[usize; D]> {
    let mut sizes = vec![finest_resolution];
    let mut resolution = finest_resolution;
    while sizes.len() < max_number_of_levels
        && resolution.iter().all(|&n| n >= 2 && n % 2 == 0)
    {
        resolution = [resolution[0] / 2, resolution[1] / 2];
        sizes.push(resolution);
    }
    sizes
}

pub fn resize_array_levels<T: Clone>(sizes: &[[usize; D]], value: T, levels: &mut Vec<Array2<T>>) {
    levels.truncate(sizes.len());
    for (level, &size) in sizes.iter().enumerate() {
        match levels.get_mut(level) {
            Some(array) => array.resize(size, value.clone()),
            None => levels.push(Array2::filled(size, value.clone())),
        }
    }
}

fn fine_stencil(coarse: usize, fine_size: usize) -> [usize; 4] {
    let center = 2 * coarse;
    let last = fine_size - 1;
    [
        center.saturating_sub(1),
        center.min(last),
        (center + 1).min(last),
        (center + 2).min(last),
    ]
}

/// Full-weighting restriction with the separable `1/8, 3/8, 3/8, 1/8` kernel;
/// out-of-range fine cells are clamped to the border.
pub fn restrict(finer: &FdmVector2, coarser: &mut FdmVector2) {
    let [fx, fy] = finer.size();
    if fx == 0 || fy == 0 {
        return;
    }
    coarser.par_for_each_mut(|i, j, value| {
        let columns = fine_stencil(i, fx);
        let rows = fine_stencil(j, fy);
        let mut sum = 0.0;
        for (wy, &jj) in RESTRICTION_KERNEL.iter().zip(rows.iter()) {
            for (wx, &ii) in RESTRICTION_KERNEL.iter().zip(columns.iter()) {
                sum += wx * wy * finer[(ii, jj)];
            }
        }
        *value = sum;
    });
}

/// Coarse cells contributing to fine cell `fine`: its parent with weight 3/4
/// and the nearer neighbor of the parent with 1/4. At the border the parent
/// takes the full weight.
fn coarse_stencil(fine: usize, coarse_size: usize) -> [(usize, Float); 2] {
    let parent = (fine / 2).min(coarse_size - 1);
    let neighbor = if fine % 2 == 0 {
        parent.checked_sub(1)
    } else {
        Some(parent + 1).filter(|&n| n < coarse_size)
    };
    match neighbor {
        Some(n) => [(parent, 0.75), (n, 0.25)],
        None => [(parent, 1.0), (parent, 0.0)],
    }
}

/// Bilinear prolongation of `coarser`, added onto `finer`.
pub fn correct(coarser: &FdmVector2, finer: &mut FdmVector2) {
    let [cx, cy] = coarser.size();
    if cx == 0 || cy == 0 {
        return;
    }
    finer.par_for_each_mut(|i, j, value| {
        let columns = coarse_stencil(i, cx);
        let rows = coarse_stencil(j, cy);
        let mut sum = 0.0;
        for &(jj, wy) in &rows {
            for &(ii, wx) in &columns {
                sum += wx * wy * coarser[(ii, jj)];
            }
        }
        *value += sum;
    });
}

fn gauss_seidel_relax_func(sor_factor: Float, use_red_black_ordering: bool) -> MgRelaxFunc<FdmBlas2> {
    Arc::new(
        move |a: &FdmMatrix2,
              b: &FdmVector2,
              number_of_iterations: u32,
              _max_tolerance: Float,
              x: &mut FdmVector2,
              buffer: &mut FdmVector2| {
            for _ in 0..number_of_iterations {
                if use_red_black_ordering {
                    FdmGaussSeidelSolver2::relax_red_black(a, b, sor_factor, x, buffer);
                } else {
                    FdmGaussSeidelSolver2::relax(a, b, sor_factor, x);
                }
            }
        },
    )
}

/// Solvers that operate on a level hierarchy rather than a single system.
pub trait FdmMgLinearSystemSolver2: FdmLinearSystemSolver2 {
    fn params(&self) -> &MgParameters<FdmBlas2>;

    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem2) -> bool;
}

/// Geometric multigrid with Gauss-Seidel smoothing.
pub struct FdmMgSolver2 {
    params: MgParameters<FdmBlas2>,
    sor_factor: Float,
    use_red_black_ordering: bool,
    last_number_of_cycles: u32,
    last_residual: Float,
    buffer: FdmMgVector2,
}

impl FdmMgSolver2 {
    pub fn new(max_number_of_levels: usize) -> Self {
        Self::with_parameters(max_number_of_levels, 5, 5, 20, 20, 1e-9, 1.5, false)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_parameters(
        max_number_of_levels: usize,
        number_of_restriction_iter: u32,
        number_of_correction_iter: u32,
        number_of_coarsest_iter: u32,
        number_of_final_iter: u32,
        max_tolerance: Float,
        sor_factor: Float,
        use_red_black_ordering: bool,
    ) -> Self {
        Self {
            params: MgParameters {
                max_number_of_levels: max_number_of_levels.max(1),
                number_of_restriction_iter,
                number_of_correction_iter,
                number_of_coarsest_iter,
                number_of_final_iter,
                max_number_of_cycles: 1,
                max_tolerance,
                relax_func: gauss_seidel_relax_func(sor_factor, use_red_black_ordering),
                restrict_func: restrict,
                correct_func: correct,
            },
            sor_factor,
            use_red_black_ordering,
            last_number_of_cycles: 0,
            last_residual: MAX_DISTANCE,
            buffer: FdmMgVector2::default(),
        }
    }

    /// Number of V-cycles run per solve before giving up on the tolerance.
    pub fn with_max_number_of_cycles(mut self, max_number_of_cycles: u32) -> Self {
        self.params.max_number_of_cycles = max_number_of_cycles.max(1);
        self
    }

    pub fn sor_factor(&self) -> Float {
        self.sor_factor
    }

    pub fn use_red_black_ordering(&self) -> bool {
        self.use_red_black_ordering
    }
}

impl FdmLinearSystemSolver2 for FdmMgSolver2 {
    fn solve(&mut self, _system: &mut FdmLinearSystem2) -> bool {
        warn!("{} needs a multigrid system; single-level solve ignored", self.name());
        false
    }

    fn solve_compressed(&mut self, _system: &mut FdmCompressedLinearSystem2) -> bool {
        warn!("{} needs a multigrid system; compressed solve ignored", self.name());
        false
    }

    fn name(&self) -> &'static str {
        "multigrid"
    }

    fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_cycles
    }

    fn last_residual(&self) -> Float {
        self.last_residual
    }
}

impl FdmMgLinearSystemSolver2 for FdmMgSolver2 {
    fn params(&self) -> &MgParameters<FdmBlas2> {
        &self.params
    }

    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem2) -> bool {
        if system.number_of_levels() == 0 {
            self.last_number_of_cycles = 0;
            self.last_residual = 0.0;
            return true;
        }
        self.buffer.clone_from(&system.x);

        let mut result = MgResult::default();
        self.last_number_of_cycles = 0;
        for _ in 0..self.params.max_number_of_cycles.max(1) {
            result = mg_v_cycle(&system.a, &self.params, &mut system.x, &mut system.b, &mut self.buffer);
            self.last_number_of_cycles += 1;
            if result.last_residual_norm < self.params.max_tolerance {
                break;
            }
        }
        hold_excluded_cells(&system.a.levels[0], &mut system.x.levels[0]);

        self.last_residual = result.last_residual_norm;
        self.last_residual < self.params.max_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::Blas;
    use crate::fdm::FdmCgSolver2;

    #[test]
    fn test_hierarchy_stops_on_odd_resolution() {
        assert_eq!(level_sizes_with_finest([12, 8], 8), vec![[12, 8], [6, 4], [3, 2]]);
        assert_eq!(level_sizes_with_finest([16, 16], 3), vec![[16, 16], [8, 8], [4, 4]]);
        assert_eq!(level_sizes_with_finest([2, 2], 8), vec![[2, 2], [1, 1]]);
        assert_eq!(level_sizes_with_finest([0, 4], 8), vec![[0, 4]]);
        assert_eq!(level_sizes_with_coarsest([3, 2], 3), vec![[12, 8], [6, 4], [3, 2]]);
    }

    #[test]
    fn test_restrict_preserves_constants() {
        let finer = FdmVector2::filled([8, 6], 2.5);
        let mut coarser = FdmVector2::new([4, 3]);
        restrict(&finer, &mut coarser);
        assert!(coarser.data().iter().all(|&v| (v - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_correct_adds_interpolated_values() {
        let coarser = Array2::from_fn([2, 1], |i, _| i as Float);
        let mut finer = FdmVector2::filled([4, 2], 1.0);
        correct(&coarser, &mut finer);
        assert_eq!(finer[(0, 0)], 1.0);
        assert_eq!(finer[(1, 1)], 1.25);
        assert_eq!(finer[(2, 0)], 1.75);
        assert_eq!(finer[(3, 1)], 2.0);
    }

    fn build_poisson_hierarchy(finest: [usize; D]) -> FdmMgLinearSystem2 {
        let mut system = FdmMgLinearSystem2::default();
        system.resize_with_finest(finest, 4);
        for (level, a) in system.a.levels.iter_mut().enumerate() {
            let [nx, ny] = a.size();
            let h = (1 << level) as Float;
            let inverse_h_squared = 1.0 / (h * h);
            // Dirichlet on every side keeps the operator definite.
            a.par_for_each_mut(|i, j, row| {
                row.center = 4.0 * inverse_h_squared;
                if i + 1 < nx {
                    row.right = -inverse_h_squared;
                }
                if j + 1 < ny {
                    row.up = -inverse_h_squared;
                }
            });
        }
        system.b.levels[0] = Array2::from_fn(finest, |i, j| if (i + j) % 3 == 0 { 1.0 } else { -0.5 });
        system
    }

    #[test]
    fn test_multigrid_matches_conjugate_gradient() {
        let mut mg_system = build_poisson_hierarchy([16, 16]);
        assert_eq!(mg_system.number_of_levels(), 4);
        let mut single = mg_system.level(0);

        let mut mg = FdmMgSolver2::new(4).with_max_number_of_cycles(50);
        assert!(mg.solve_mg(&mut mg_system));
        let mut cg = FdmCgSolver2::new(500, 1e-12);
        assert!(cg.solve(&mut single));

        let mut difference = mg_system.x.levels[0].clone();
        FdmBlas2::axpy_assign(-1.0, &single.x, &mut difference);
        assert!(FdmBlas2::linf_norm(&difference) < 1e-6);
    }

    #[test]
    fn test_single_level_solve_is_rejected() {
        let mut system = FdmLinearSystem2::new([4, 4]);
        let mut mg = FdmMgSolver2::new(2);
        assert!(!mg.solve(&mut system));
        assert!(!mg.solve_compressed(&mut FdmCompressedLinearSystem2::default()));
    }
}
