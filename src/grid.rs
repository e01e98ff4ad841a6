use crate::global_variables::*;
use rayon::prelude::*;
use std::ops::{Index, IndexMut};

/// Dense 2-D array stored row by row: cell `(i, j)` lives at `i + nx * j`.
#[derive(Clone, Debug, PartialEq)]
pub struct Array2<T> {
    size: [usize; D],
    data: Vec<T>,
}

impl<T: Clone> Array2<T> {
    pub fn filled(size: [usize; D], value: T) -> Self {
        Self {
            size,
            data: vec![value; size[0] * size[1]],
        }
    }

    pub fn resize(&mut self, size: [usize; D], value: T) {
        self.size = size;
        self.data.clear();
        self.data.resize(size[0] * size[1], value);
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value.clone());
    }
}

impl<T: Clone + Default> Array2<T> {
    pub fn new(size: [usize; D]) -> Self {
        Self::filled(size, T::default())
    }
}

impl<T: Clone + Default> Default for Array2<T> {
    fn default() -> Self {
        Self::new([0, 0])
    }
}

impl<T> Array2<T> {
    pub fn from_fn<F>(size: [usize; D], mut function: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(size[0] * size[1]);
        for j in 0..size[1] {
            for i in 0..size[0] {
                data.push(function(i, j));
            }
        }
        Self { size, data }
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size[0]
    }

    pub fn height(&self) -> usize {
        self.size[1]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn index_of(&self, i: usize, j: usize) -> usize {
        i + self.size[0] * j
    }

    pub fn coordinates_of(&self, index: usize) -> [usize; D] {
        [index % self.size[0], index / self.size[0]]
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        if i < self.size[0] && j < self.size[1] {
            Some(&self.data[i + self.size[0] * j])
        } else {
            None
        }
    }

    pub fn for_each_index<F>(&self, mut function: F)
    where
        F: FnMut(usize, usize),
    {
        for j in 0..self.size[1] {
            for i in 0..self.size[0] {
                function(i, j);
            }
        }
    }
}

impl<T: Send + Sync> Array2<T> {
    /// Visits every element in parallel, one row per task.
    pub fn par_for_each_mut<F>(&mut self, function: F)
    where
        F: Fn(usize, usize, &mut T) + Send + Sync,
    {
        let nx = self.size[0];
        if nx == 0 {
            return;
        }
        self.data
            .par_chunks_mut(nx)
            .enumerate()
            .for_each(|(j, row)| {
                row.iter_mut()
                    .enumerate()
                    .for_each(|(i, value)| function(i, j, value));
            });
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        debug_assert!(i < self.size[0] && j < self.size[1]);
        &self.data[i + self.size[0] * j]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        debug_assert!(i < self.size[0] && j < self.size[1]);
        &mut self.data[i + self.size[0] * j]
    }
}

/// Staggered (MAC) velocity grid: `u` on x-faces, `v` on y-faces.
#[derive(Clone, Debug)]
pub struct FaceCenteredGrid2 {
    resolution: [usize; D],
    grid_spacing: [Float; D],
    origin: [Float; D],
    u: Array2<Float>,
    v: Array2<Float>,
}

impl FaceCenteredGrid2 {
    pub fn new(resolution: [usize; D], grid_spacing: [Float; D], origin: [Float; D]) -> Self {
        let [nx, ny] = resolution;
        Self {
            resolution,
            grid_spacing,
            origin,
            u: Array2::new([nx + 1, ny]),
            v: Array2::new([nx, ny + 1]),
        }
    }

    pub fn resolution(&self) -> [usize; D] {
        self.resolution
    }

    pub fn grid_spacing(&self) -> [Float; D] {
        self.grid_spacing
    }

    pub fn origin(&self) -> [Float; D] {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.resolution[0] == 0 || self.resolution[1] == 0
    }

    pub fn u(&self) -> &Array2<Float> {
        &self.u
    }

    pub fn v(&self) -> &Array2<Float> {
        &self.v
    }

    pub fn u_mut(&mut self) -> &mut Array2<Float> {
        &mut self.u
    }

    pub fn v_mut(&mut self) -> &mut Array2<Float> {
        &mut self.v
    }

    pub fn u_origin(&self) -> [Float; D] {
        [self.origin[0], self.origin[1] + 0.5 * self.grid_spacing[1]]
    }

    pub fn v_origin(&self) -> [Float; D] {
        [self.origin[0] + 0.5 * self.grid_spacing[0], self.origin[1]]
    }

    pub fn u_position(&self, i: usize, j: usize) -> [Float; D] {
        let [ox, oy] = self.u_origin();
        [
            ox + (i as Float) * self.grid_spacing[0],
            oy + (j as Float) * self.grid_spacing[1],
        ]
    }

    pub fn v_position(&self, i: usize, j: usize) -> [Float; D] {
        let [ox, oy] = self.v_origin();
        [
            ox + (i as Float) * self.grid_spacing[0],
            oy + (j as Float) * self.grid_spacing[1],
        ]
    }

    pub fn cell_center_position(&self, i: usize, j: usize) -> [Float; D] {
        cell_center_position(self.origin, self.grid_spacing, i, j)
    }

    pub fn fill(&mut self, value: [Float; D]) {
        self.u.fill(value[0]);
        self.v.fill(value[1]);
    }

    pub fn fill_with<F>(&mut self, function: F)
    where
        F: Fn([Float; D]) -> [Float; D] + Send + Sync,
    {
        let u_origin = self.u_origin();
        let v_origin = self.v_origin();
        let h = self.grid_spacing;
        self.u.par_for_each_mut(|i, j, u| {
            *u = function(grid_position(u_origin, h, i, j))[0];
        });
        self.v.par_for_each_mut(|i, j, v| {
            *v = function(grid_position(v_origin, h, i, j))[1];
        });
    }

    /// Copies the face values of `other`, adopting its layout.
    pub fn set(&mut self, other: &FaceCenteredGrid2) {
        self.clone_from(other);
    }

    pub fn divergence_at_cell_center(&self, i: usize, j: usize) -> Float {
        let left = self.u[(i, j)];
        let right = self.u[(i + 1, j)];
        let down = self.v[(i, j)];
        let up = self.v[(i, j + 1)];
        (right - left) / self.grid_spacing[0] + (up - down) / self.grid_spacing[1]
    }

    pub fn value_at_cell_center(&self, i: usize, j: usize) -> [Float; D] {
        [
            0.5 * (self.u[(i, j)] + self.u[(i + 1, j)]),
            0.5 * (self.v[(i, j)] + self.v[(i, j + 1)]),
        ]
    }

    pub fn divergence(&self) -> Array2<Float> {
        let mut divergence = Array2::new(self.resolution);
        divergence.par_for_each_mut(|i, j, value| *value = self.divergence_at_cell_center(i, j));
        divergence
    }

    /// Bilinear sample of both components at world position `x`.
    pub fn sample(&self, x: [Float; D]) -> [Float; D] {
        [
            sample_linear(&self.u, self.u_origin(), self.grid_spacing, x),
            sample_linear(&self.v, self.v_origin(), self.grid_spacing, x),
        ]
    }
}

pub fn grid_position(origin: [Float; D], spacing: [Float; D], i: usize, j: usize) -> [Float; D] {
    [
        origin[0] + (i as Float) * spacing[0],
        origin[1] + (j as Float) * spacing[1],
    ]
}

pub fn cell_center_position(
    origin: [Float; D],
    spacing: [Float; D],
    i: usize,
    j: usize,
) -> [Float; D] {
    [
        origin[0] + (i as Float + 0.5) * spacing[0],
        origin[1] + (j as Float + 0.5) * spacing[1],
    ]
}

/// Bilinear interpolation of samples located at `origin + spacing * (i, j)`,
/// clamped to the data extent.
pub fn sample_linear(
    data: &Array2<Float>,
    origin: [Float; D],
    spacing: [Float; D],
    x: [Float; D],
) -> Float {
    let [nx, ny] = data.size();
    if nx == 0 || ny == 0 {
        return 0.0;
    }
    let locate = |axis: usize, n: usize| -> (usize, usize, Float) {
        let t = (x[axis] - origin[axis]) / spacing[axis];
        let max = (n - 1) as Float;
        let t = t.clamp(0.0, max);
        let i0 = t.floor() as usize;
        let i1 = (i0 + 1).min(n - 1);
        (i0, i1, t - i0 as Float)
    };
    let (i0, i1, fx) = locate(0, nx);
    let (j0, j1, fy) = locate(1, ny);
    let bottom = data[(i0, j0)] * (1.0 - fx) + data[(i1, j0)] * fx;
    let top = data[(i0, j1)] * (1.0 - fx) + data[(i1, j1)] * fx;
    bottom * (1.0 - fy) + top * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_row_major_layout() {
        let array = Array2::from_fn([3, 2], |i, j| 10 * j + i);
        assert_eq!(array.data(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(array[(2, 1)], 12);
        assert_eq!(array.coordinates_of(4), [1, 1]);
        assert!(array.get(3, 0).is_none());
    }

    #[test]
    fn test_par_for_each_mut_visits_every_cell() {
        let mut array = Array2::filled([4, 3], 0usize);
        array.par_for_each_mut(|i, j, value| *value = i + 4 * j);
        for (index, value) in array.data().iter().enumerate() {
            assert_eq!(*value, index);
        }
    }

    #[test]
    fn test_face_layout_and_divergence() {
        let mut grid = FaceCenteredGrid2::new([4, 3], [0.5, 0.5], [0.0, 0.0]);
        assert_eq!(grid.u().size(), [5, 3]);
        assert_eq!(grid.v().size(), [4, 4]);
        grid.fill_with(|x| [x[0], 0.0]);
        // du/dx = 1 everywhere
        for j in 0..3 {
            for i in 0..4 {
                assert!((grid.divergence_at_cell_center(i, j) - 1.0).abs() < 1e-12);
            }
        }
        let [u, _] = grid.sample([0.8, 0.7]);
        assert!((u - 0.8).abs() < 1e-12, "linear field must be sampled exactly, got {u}");
    }
}
