pub mod cg;
pub mod compressed;
pub mod gauss_seidel;
pub mod iccg;
pub mod jacobi;
pub mod mg;
pub mod mgpcg;

pub use cg::{DiagonalPreconditioner, FdmCgSolver2, FdmPcgSolver2};
pub use compressed::{FdmCompressedBlas2, FdmCompressedLinearSystem2, MatrixCsr};
pub use gauss_seidel::FdmGaussSeidelSolver2;
pub use iccg::FdmIccgSolver2;
pub use jacobi::FdmJacobiSolver2;
pub use mg::{FdmMgLinearSystem2, FdmMgLinearSystemSolver2, FdmMgSolver2};
pub use mgpcg::FdmMgpcgSolver2;

use crate::blas::Blas;
use crate::global_variables::*;
use crate::grid::Array2;
use rayon::prelude::*;

/// One row of the symmetric 5-point operator. The couplings to the left and
/// lower neighbors are stored on those neighbors' rows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FdmMatrixRow2 {
    pub center: Float,
    pub right: Float,
    pub up: Float,
}

pub type FdmVector2 = Array2<Float>;

pub type FdmMatrix2 = Array2<FdmMatrixRow2>;

#[derive(Clone, Debug, Default)]
pub struct FdmLinearSystem2 {
    pub a: FdmMatrix2,
    pub x: FdmVector2,
    pub b: FdmVector2,
}

impl FdmLinearSystem2 {
    pub fn new(size: [usize; D]) -> Self {
        let mut system = Self::default();
        system.resize(size);
        system
    }

    pub fn clear(&mut self) {
        self.a.resize([0, 0], FdmMatrixRow2::default());
        self.x.resize([0, 0], 0.0);
        self.b.resize([0, 0], 0.0);
    }

    pub fn resize(&mut self, size: [usize; D]) {
        self.a.resize(size, FdmMatrixRow2::default());
        self.x.resize(size, 0.0);
        self.b.resize(size, 0.0);
    }

    pub fn size(&self) -> [usize; D] {
        self.a.size()
    }

    pub fn number_of_active_rows(&self) -> usize {
        self.a.data().par_iter().filter(|row| row.center != 0.0).count()
    }
}

/// Common interface of the grid linear-system solvers.
pub trait FdmLinearSystemSolver2: Send {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool;

    fn solve_compressed(&mut self, system: &mut FdmCompressedLinearSystem2) -> bool;

    fn name(&self) -> &'static str;

    fn last_number_of_iterations(&self) -> u32;

    fn last_residual(&self) -> Float;
}

/// Sum of the off-diagonal terms of row `(i, j)` applied to `v`.
pub(crate) fn off_diagonal_product(m: &FdmMatrix2, v: &FdmVector2, i: usize, j: usize) -> Float {
    let [nx, ny] = m.size();
    let row = &m[(i, j)];
    let mut sum = 0.0;
    if i > 0 {
        sum += m[(i - 1, j)].right * v[(i - 1, j)];
    }
    if i + 1 < nx {
        sum += row.right * v[(i + 1, j)];
    }
    if j > 0 {
        sum += m[(i, j - 1)].up * v[(i, j - 1)];
    }
    if j + 1 < ny {
        sum += row.up * v[(i, j + 1)];
    }
    sum
}

/// Resets the solution of every row excluded from the solve to zero.
pub(crate) fn hold_excluded_cells(a: &FdmMatrix2, x: &mut FdmVector2) {
    x.data_mut()
        .par_iter_mut()
        .zip(a.data().par_iter())
        .filter(|(_, row)| row.center == 0.0)
        .for_each(|(value, _)| *value = 0.0);
}

pub struct FdmBlas2;

impl Blas for FdmBlas2 {
    type Vector = FdmVector2;
    type Matrix = FdmMatrix2;

    fn set(s: Float, result: &mut FdmVector2) {
        result.data_mut().par_iter_mut().for_each(|x| *x = s);
    }

    fn copy(v: &FdmVector2, result: &mut FdmVector2) {
        if result.size() == v.size() {
            result.data_mut().copy_from_slice(v.data());
        } else {
            *result = v.clone();
        }
    }

    fn set_matrix(s: Float, result: &mut FdmMatrix2) {
        let row = FdmMatrixRow2 {
            center: s,
            right: s,
            up: s,
        };
        result.data_mut().par_iter_mut().for_each(|x| *x = row);
    }

    fn copy_matrix(m: &FdmMatrix2, result: &mut FdmMatrix2) {
        if result.size() == m.size() {
            result.data_mut().copy_from_slice(m.data());
        } else {
            *result = m.clone();
        }
    }

    fn dot(a: &FdmVector2, b: &FdmVector2) -> Float {
        debug_assert_eq!(a.size(), b.size());
        a.data()
            .par_iter()
            .zip(b.data().par_iter())
            .map(|(x, y)| x * y)
            .sum()
    }

    fn axpy(a: Float, x: &FdmVector2, y: &FdmVector2, result: &mut FdmVector2) {
        debug_assert_eq!(x.size(), y.size());
        debug_assert_eq!(x.size(), result.size());
        result
            .data_mut()
            .par_iter_mut()
            .zip(x.data().par_iter().zip(y.data().par_iter()))
            .for_each(|(r, (x, y))| *r = a * x + y);
    }

    fn axpy_assign(a: Float, x: &FdmVector2, y: &mut FdmVector2) {
        debug_assert_eq!(x.size(), y.size());
        y.data_mut()
            .par_iter_mut()
            .zip(x.data().par_iter())
            .for_each(|(y, x)| *y += a * x);
    }

    fn xpay_assign(a: Float, x: &FdmVector2, y: &mut FdmVector2) {
        debug_assert_eq!(x.size(), y.size());
        y.data_mut()
            .par_iter_mut()
            .zip(x.data().par_iter())
            .for_each(|(y, x)| *y = x + a * *y);
    }

    fn mvm(m: &FdmMatrix2, v: &FdmVector2, result: &mut FdmVector2) {
        debug_assert_eq!(m.size(), v.size());
        debug_assert_eq!(m.size(), result.size());
        result.par_for_each_mut(|i, j, r| {
            *r = m[(i, j)].center * v[(i, j)] + off_diagonal_product(m, v, i, j);
        });
    }

    fn residual(a: &FdmMatrix2, x: &FdmVector2, b: &FdmVector2, result: &mut FdmVector2) {
        debug_assert_eq!(a.size(), x.size());
        debug_assert_eq!(a.size(), b.size());
        debug_assert_eq!(a.size(), result.size());
        result.par_for_each_mut(|i, j, r| {
            *r = b[(i, j)] - a[(i, j)].center * x[(i, j)] - off_diagonal_product(a, x, i, j);
        });
    }

    fn l2_norm(v: &FdmVector2) -> Float {
        Self::dot(v, v).sqrt()
    }

    fn linf_norm(v: &FdmVector2) -> Float {
        v.data()
            .par_iter()
            .map(|x| x.abs())
            .reduce(|| 0.0, Float::max)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Neumann Laplacian on an `nx` by `ny` grid with unit spacing.
    pub(crate) fn build_laplacian_system(size: [usize; D]) -> FdmLinearSystem2 {
        let [nx, ny] = size;
        let mut system = FdmLinearSystem2::new(size);
        system.a.par_for_each_mut(|i, j, row| {
            if i + 1 < nx {
                row.center += 1.0;
                row.right -= 1.0;
            }
            if i > 0 {
                row.center += 1.0;
            }
            if j + 1 < ny {
                row.center += 1.0;
                row.up -= 1.0;
            }
            if j > 0 {
                row.center += 1.0;
            }
        });
        system
    }

    /// Laplacian with an extra unit diagonal so the system is definite.
    pub(crate) fn build_definite_system(size: [usize; D]) -> FdmLinearSystem2 {
        let mut system = build_laplacian_system(size);
        system.a.par_for_each_mut(|_, _, row| row.center += 1.0);
        system.b = Array2::from_fn(size, |i, j| ((i + 2 * j) % 5) as Float - 2.0);
        system
    }

    #[test]
    fn test_mvm_matches_explicit_product() {
        let system = build_laplacian_system([3, 3]);
        let v = Array2::from_fn([3, 3], |i, j| (i + 3 * j) as Float);
        let mut result = FdmVector2::new([3, 3]);
        FdmBlas2::mvm(&system.a, &v, &mut result);
        // Row (1, 1): 4 * 4 - (3 + 5 + 1 + 7)
        assert_eq!(result[(1, 1)], 0.0);
        // Row (0, 0): 2 * 0 - (1 + 3)
        assert_eq!(result[(0, 0)], -4.0);
        // Row (2, 2): 2 * 8 - (7 + 5)
        assert_eq!(result[(2, 2)], 4.0);
    }

    #[test]
    fn test_residual_and_norms() {
        let system = build_laplacian_system([4, 2]);
        let x = FdmVector2::filled([4, 2], 3.0);
        let b = Array2::from_fn([4, 2], |i, _| i as Float - 1.5);
        let mut r = FdmVector2::new([4, 2]);
        FdmBlas2::residual(&system.a, &x, &b, &mut r);
        // Constant vectors lie in the null space of the Neumann Laplacian.
        assert_eq!(r, b);
        assert_eq!(FdmBlas2::linf_norm(&r), 1.5);
        assert!((FdmBlas2::l2_norm(&r) - (2.0 * (2.25 + 0.25 + 0.25 + 2.25) as Float).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_axpy_variants() {
        let x = FdmVector2::filled([2, 2], 2.0);
        let y = FdmVector2::filled([2, 2], 1.0);
        let mut result = FdmVector2::new([2, 2]);
        FdmBlas2::axpy(3.0, &x, &y, &mut result);
        assert!(result.data().iter().all(|&v| v == 7.0));
        let mut y = y;
        FdmBlas2::axpy_assign(-1.0, &x, &mut y);
        assert!(y.data().iter().all(|&v| v == -1.0));
        FdmBlas2::xpay_assign(2.0, &x, &mut y);
        assert!(y.data().iter().all(|&v| v == 0.0));
    }
}
