pub const CASE_NAME: &'static str = "Dam Break";

pub type Float = f64;

pub const D: usize = 2;

pub const RESOLUTION: [usize; D] = [64, 64];

pub const DOMAIN_SIZE: [Float; D] = [1.0, 1.0];

pub const DELTA_T: Float = 1.0 / 60.0;

pub const NUMBER_OF_STEPS: usize = 10;

pub const GRAVITY: [Float; D] = [0.0, -9.8];

pub const FLUID_HEIGHT: Float = 0.5;

pub const TOLERANCE_PRESSURE: Float = 1e-6;

pub const MAX_ITER: u32 = 100;

pub const MAX_LEVELS: usize = 8;

pub const SOR_FACTOR: Float = 1.5;

pub const RESIDUAL_CHECK_INTERVAL: u32 = 5;

pub const EXTRAPOLATION_DEPTH: usize = 5;

pub const MIN_WEIGHT: Float = 0.01;

pub const MIN_THETA: Float = 0.01;

pub const EPSILON: Float = 1e-9;

pub const MAX_DISTANCE: Float = Float::MAX;
