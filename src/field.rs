use crate::global_variables::*;

const GRADIENT_STEP: Float = 1e-6;

/// Scalar field sampled at world positions. Signed-distance fields follow
/// the convention of the quantity they describe (see the pressure solvers).
pub trait ScalarField2: Sync {
    fn sample(&self, x: [Float; D]) -> Float;

    fn gradient(&self, x: [Float; D]) -> [Float; D] {
        let [px, py] = x;
        let dx = self.sample([px + GRADIENT_STEP, py]) - self.sample([px - GRADIENT_STEP, py]);
        let dy = self.sample([px, py + GRADIENT_STEP]) - self.sample([px, py - GRADIENT_STEP]);
        [dx / (2.0 * GRADIENT_STEP), dy / (2.0 * GRADIENT_STEP)]
    }
}

pub trait VectorField2: Sync {
    fn sample(&self, x: [Float; D]) -> [Float; D];
}

#[derive(Clone, Copy, Debug)]
pub struct ConstantScalarField2 {
    pub value: Float,
}

impl ConstantScalarField2 {
    pub fn new(value: Float) -> Self {
        Self { value }
    }
}

impl ScalarField2 for ConstantScalarField2 {
    fn sample(&self, _x: [Float; D]) -> Float {
        self.value
    }

    fn gradient(&self, _x: [Float; D]) -> [Float; D] {
        [0.0; D]
    }
}

pub struct CustomScalarField2<F> {
    function: F,
}

impl<F> CustomScalarField2<F>
where
    F: Fn([Float; D]) -> Float + Sync,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> ScalarField2 for CustomScalarField2<F>
where
    F: Fn([Float; D]) -> Float + Sync,
{
    fn sample(&self, x: [Float; D]) -> Float {
        (self.function)(x)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConstantVectorField2 {
    pub value: [Float; D],
}

impl ConstantVectorField2 {
    pub fn new(value: [Float; D]) -> Self {
        Self { value }
    }
}

impl VectorField2 for ConstantVectorField2 {
    fn sample(&self, _x: [Float; D]) -> [Float; D] {
        self.value
    }
}

pub struct CustomVectorField2<F> {
    function: F,
}

impl<F> CustomVectorField2<F>
where
    F: Fn([Float; D]) -> [Float; D] + Sync,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> VectorField2 for CustomVectorField2<F>
where
    F: Fn([Float; D]) -> [Float; D] + Sync,
{
    fn sample(&self, x: [Float; D]) -> [Float; D] {
        (self.function)(x)
    }
}

fn length(x: Float, y: Float) -> Float {
    (x * x + y * y).sqrt()
}

/// Circle, negative inside unless flipped.
#[derive(Clone, Copy, Debug)]
pub struct ImplicitSphere2 {
    pub center: [Float; D],
    pub radius: Float,
    pub is_normal_flipped: bool,
}

impl ImplicitSphere2 {
    pub fn new(center: [Float; D], radius: Float) -> Self {
        Self {
            center,
            radius,
            is_normal_flipped: false,
        }
    }

    pub fn flipped(mut self) -> Self {
        self.is_normal_flipped = !self.is_normal_flipped;
        self
    }
}

impl ScalarField2 for ImplicitSphere2 {
    fn sample(&self, x: [Float; D]) -> Float {
        let distance = length(x[0] - self.center[0], x[1] - self.center[1]) - self.radius;
        if self.is_normal_flipped {
            -distance
        } else {
            distance
        }
    }
}

/// Axis-aligned box, negative inside unless flipped.
#[derive(Clone, Copy, Debug)]
pub struct ImplicitBox2 {
    pub lower: [Float; D],
    pub upper: [Float; D],
    pub is_normal_flipped: bool,
}

impl ImplicitBox2 {
    pub fn new(lower: [Float; D], upper: [Float; D]) -> Self {
        Self {
            lower,
            upper,
            is_normal_flipped: false,
        }
    }

    pub fn flipped(mut self) -> Self {
        self.is_normal_flipped = !self.is_normal_flipped;
        self
    }
}

impl ScalarField2 for ImplicitBox2 {
    fn sample(&self, x: [Float; D]) -> Float {
        let center_x = 0.5 * (self.lower[0] + self.upper[0]);
        let center_y = 0.5 * (self.lower[1] + self.upper[1]);
        let dx = (x[0] - center_x).abs() - 0.5 * (self.upper[0] - self.lower[0]);
        let dy = (x[1] - center_y).abs() - 0.5 * (self.upper[1] - self.lower[1]);
        let distance = if dx >= 0.0 || dy >= 0.0 {
            length(dx.max(0.0), dy.max(0.0))
        } else {
            dx.max(dy)
        };
        if self.is_normal_flipped {
            -distance
        } else {
            distance
        }
    }
}

/// Half-plane; the signed distance grows along `normal`.
#[derive(Clone, Copy, Debug)]
pub struct ImplicitPlane2 {
    pub normal: [Float; D],
    pub point: [Float; D],
}

impl ImplicitPlane2 {
    pub fn new(normal: [Float; D], point: [Float; D]) -> Self {
        let norm = length(normal[0], normal[1]);
        Self {
            normal: [normal[0] / norm, normal[1] / norm],
            point,
        }
    }
}

impl ScalarField2 for ImplicitPlane2 {
    fn sample(&self, x: [Float; D]) -> Float {
        (x[0] - self.point[0]) * self.normal[0] + (x[1] - self.point[1]) * self.normal[1]
    }
}

/// Union of several signed-distance fields (pointwise minimum).
#[derive(Default)]
pub struct ImplicitUnion2 {
    surfaces: Vec<Box<dyn ScalarField2 + Send>>,
}

impl ImplicitUnion2 {
    pub fn new() -> Self {
        Self {
            surfaces: Vec::new(),
        }
    }

    pub fn add<S>(&mut self, surface: S)
    where
        S: ScalarField2 + Send + 'static,
    {
        self.surfaces.push(Box::new(surface));
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl ScalarField2 for ImplicitUnion2 {
    fn sample(&self, x: [Float; D]) -> Float {
        self.surfaces
            .iter()
            .map(|surface| surface.sample(x))
            .fold(MAX_DISTANCE, Float::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_distance_inside_and_outside() {
        let solid = ImplicitBox2::new([0.0, 0.0], [1.0, 1.0]);
        assert!((solid.sample([0.5, 0.5]) + 0.5).abs() < 1e-12);
        assert!((solid.sample([2.0, 0.5]) - 1.0).abs() < 1e-12);
        assert!((solid.flipped().sample([2.0, 0.5]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_union_takes_closest_surface() {
        let mut union = ImplicitUnion2::new();
        union.add(ImplicitSphere2::new([0.0, 0.0], 1.0));
        union.add(ImplicitSphere2::new([4.0, 0.0], 1.0));
        assert!((union.sample([3.0, 0.0])).abs() < 1e-12);
        assert!((union.sample([2.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(ImplicitUnion2::new().sample([0.0, 0.0]), MAX_DISTANCE);
    }

    #[test]
    fn test_plane_gradient_is_normal() {
        let plane = ImplicitPlane2::new([0.0, -2.0], [0.0, 0.5]);
        assert!((plane.sample([0.3, 0.25]) - 0.25).abs() < 1e-12);
        let [gx, gy] = plane.gradient([0.1, 0.1]);
        assert!(gx.abs() < 1e-6 && (gy + 1.0).abs() < 1e-6);
    }
}
