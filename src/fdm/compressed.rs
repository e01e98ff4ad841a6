use super::{FdmLinearSystem2, FdmVector2};
use crate::blas::Blas;
use crate::global_variables::*;
use crate::grid::Array2;
use rayon::prelude::*;

/// Compressed sparse row matrix. Column indices within a row are ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixCsr {
    cols: usize,
    non_zeros: Vec<Float>,
    row_pointers: Vec<usize>,
    column_indices: Vec<usize>,
}

impl Default for MatrixCsr {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixCsr {
    pub fn new() -> Self {
        Self {
            cols: 0,
            non_zeros: Vec::new(),
            row_pointers: vec![0],
            column_indices: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cols = 0;
        self.non_zeros.clear();
        self.row_pointers.clear();
        self.row_pointers.push(0);
        self.column_indices.clear();
    }

    pub fn rows(&self) -> usize {
        self.row_pointers.len() - 1
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn number_of_non_zeros(&self) -> usize {
        self.non_zeros.len()
    }

    /// Appends a row given as `(column, value)` pairs sorted by column.
    pub fn add_row(&mut self, entries: &[(usize, Float)]) {
        debug_assert!(entries.windows(2).all(|pair| pair[0].0 < pair[1].0));
        for &(column, value) in entries {
            self.cols = self.cols.max(column + 1);
            self.column_indices.push(column);
            self.non_zeros.push(value);
        }
        self.row_pointers.push(self.non_zeros.len());
    }

    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, Float)> + '_ {
        let range = self.row_pointers[r]..self.row_pointers[r + 1];
        self.column_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.non_zeros[range].iter().copied())
    }

    pub fn get(&self, r: usize, c: usize) -> Float {
        let range = self.row_pointers[r]..self.row_pointers[r + 1];
        match self.column_indices[range.clone()].binary_search(&c) {
            Ok(offset) => self.non_zeros[range.start + offset],
            Err(_) => 0.0,
        }
    }

    pub fn diagonal(&self, r: usize) -> Float {
        self.get(r, r)
    }

    pub fn is_symmetric(&self, tolerance: Float) -> bool {
        (0..self.rows()).all(|r| {
            self.row(r)
                .all(|(c, value)| (self.get(c, r) - value).abs() <= tolerance)
        })
    }

    fn row_product(&self, r: usize, v: &[Float]) -> Float {
        self.row(r).map(|(c, value)| value * v[c]).sum()
    }
}

/// Sparse counterpart of [`FdmLinearSystem2`] holding only the participating
/// cells, together with the map back to grid coordinates.
#[derive(Clone, Debug, Default)]
pub struct FdmCompressedLinearSystem2 {
    pub a: MatrixCsr,
    pub x: Vec<Float>,
    pub b: Vec<Float>,
    size: [usize; D],
    coordinates: Vec<[usize; D]>,
}

impl FdmCompressedLinearSystem2 {
    pub fn clear(&mut self) {
        self.a.clear();
        self.x.clear();
        self.b.clear();
        self.size = [0, 0];
        self.coordinates.clear();
    }

    /// Grid coordinates of each compressed row.
    pub fn coordinates(&self) -> &[[usize; D]] {
        &self.coordinates
    }

    /// Rebuilds the sparse system from the stencil form, skipping rows whose
    /// diagonal is zero.
    pub fn compress_from(&mut self, system: &FdmLinearSystem2) {
        self.clear();
        let size = system.size();
        let [nx, ny] = size;
        self.size = size;

        let mut index_of: Array2<Option<usize>> = Array2::filled(size, None);
        system.a.for_each_index(|i, j| {
            if system.a[(i, j)].center != 0.0 {
                index_of[(i, j)] = Some(self.coordinates.len());
                self.coordinates.push([i, j]);
            }
        });

        let mut entries = Vec::with_capacity(5);
        for &[i, j] in &self.coordinates {
            entries.clear();
            let row = system.a[(i, j)];
            // Row-major numbering keeps these in ascending column order.
            if j > 0 {
                if let Some(c) = index_of[(i, j - 1)] {
                    entries.push((c, system.a[(i, j - 1)].up));
                }
            }
            if i > 0 {
                if let Some(c) = index_of[(i - 1, j)] {
                    entries.push((c, system.a[(i - 1, j)].right));
                }
            }
            if let Some(c) = index_of[(i, j)] {
                entries.push((c, row.center));
            }
            if i + 1 < nx {
                if let Some(c) = index_of[(i + 1, j)] {
                    entries.push((c, row.right));
                }
            }
            if j + 1 < ny {
                if let Some(c) = index_of[(i, j + 1)] {
                    entries.push((c, row.up));
                }
            }
            entries.retain(|&(_, value)| value != 0.0);
            self.a.add_row(&entries);
            self.x.push(system.x[(i, j)]);
            self.b.push(system.b[(i, j)]);
        }
    }

    /// Scatters the compressed solution onto the grid; excluded cells get zero.
    pub fn decompress_into(&self, x: &mut FdmVector2) {
        x.resize(self.size, 0.0);
        for (&[i, j], &value) in self.coordinates.iter().zip(self.x.iter()) {
            x[(i, j)] = value;
        }
    }
}

pub struct FdmCompressedBlas2;

impl Blas for FdmCompressedBlas2 {
    type Vector = Vec<Float>;
    type Matrix = MatrixCsr;

    fn set(s: Float, result: &mut Vec<Float>) {
        result.par_iter_mut().for_each(|x| *x = s);
    }

    fn copy(v: &Vec<Float>, result: &mut Vec<Float>) {
        result.clone_from(v);
    }

    fn set_matrix(s: Float, result: &mut MatrixCsr) {
        result.non_zeros.par_iter_mut().for_each(|x| *x = s);
    }

    fn copy_matrix(m: &MatrixCsr, result: &mut MatrixCsr) {
        result.clone_from(m);
    }

    fn dot(a: &Vec<Float>, b: &Vec<Float>) -> Float {
        debug_assert_eq!(a.len(), b.len());
        a.par_iter().zip(b.par_iter()).map(|(x, y)| x * y).sum()
    }

    fn axpy(a: Float, x: &Vec<Float>, y: &Vec<Float>, result: &mut Vec<Float>) {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), result.len());
        result
            .par_iter_mut()
            .zip(x.par_iter().zip(y.par_iter()))
            .for_each(|(r, (x, y))| *r = a * x + y);
    }

    fn axpy_assign(a: Float, x: &Vec<Float>, y: &mut Vec<Float>) {
        y.par_iter_mut()
            .zip(x.par_iter())
            .for_each(|(y, x)| *y += a * x);
    }

    fn xpay_assign(a: Float, x: &Vec<Float>, y: &mut Vec<Float>) {
        y.par_iter_mut()
            .zip(x.par_iter())
            .for_each(|(y, x)| *y = x + a * *y);
    }

    fn mvm(m: &MatrixCsr, v: &Vec<Float>, result: &mut Vec<Float>) {
        debug_assert_eq!(m.rows(), result.len());
        result
            .par_iter_mut()
            .enumerate()
            .for_each(|(r, value)| *value = m.row_product(r, v));
    }

    fn residual(a: &MatrixCsr, x: &Vec<Float>, b: &Vec<Float>, result: &mut Vec<Float>) {
        debug_assert_eq!(a.rows(), result.len());
        result
            .par_iter_mut()
            .enumerate()
            .for_each(|(r, value)| *value = b[r] - a.row_product(r, x));
    }

    fn l2_norm(v: &Vec<Float>) -> Float {
        Self::dot(v, v).sqrt()
    }

    fn linf_norm(v: &Vec<Float>) -> Float {
        v.par_iter().map(|x| x.abs()).reduce(|| 0.0, Float::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::build_laplacian_system;
    use crate::fdm::{FdmBlas2, FdmMatrixRow2};

    #[test]
    fn test_compression_skips_excluded_rows() {
        let mut system = build_laplacian_system([3, 2]);
        // Cut cell (1, 0) out of the operator.
        system.a[(1, 0)] = FdmMatrixRow2::default();
        system.a[(0, 0)].right = 0.0;
        system.a[(0, 0)].center -= 1.0;
        system.a[(2, 0)].center -= 1.0;
        system.a[(1, 1)].center -= 1.0;
        system.b[(2, 1)] = 4.0;

        let mut compressed = FdmCompressedLinearSystem2::default();
        compressed.compress_from(&system);
        assert_eq!(compressed.a.rows(), 5);
        assert_eq!(compressed.coordinates()[1], [2, 0]);
        assert!(compressed.a.is_symmetric(0.0));
        assert_eq!(compressed.b[4], 4.0);

        compressed.x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut x = FdmVector2::new([3, 2]);
        compressed.decompress_into(&mut x);
        assert_eq!(x.data(), &[1.0, 0.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_compressed_product_matches_stencil() {
        let system = build_laplacian_system([4, 3]);
        let mut compressed = FdmCompressedLinearSystem2::default();
        compressed.compress_from(&system);
        assert_eq!(compressed.a.number_of_non_zeros(), 12 + 2 * (3 * 3 + 4 * 2));

        let v = Array2::from_fn([4, 3], |i, j| (i * i + j) as Float);
        let mut expected = FdmVector2::new([4, 3]);
        FdmBlas2::mvm(&system.a, &v, &mut expected);
        let mut result = vec![0.0; 12];
        FdmCompressedBlas2::mvm(&compressed.a, &v.data().to_vec(), &mut result);
        assert_eq!(result.as_slice(), expected.data());
    }
}
