pub mod blas;
pub mod boundary;
pub mod case;
pub mod cg;
pub mod diffusion;
pub mod error;
pub mod fdm;
pub mod field;
pub mod global_variables;
pub mod grid;
pub mod io;
pub mod level_set;
pub mod mg;
pub mod post;
pub mod pressure;

pub use error::PressureError;
pub use global_variables::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Marker {
    #[default]
    Fluid = 0,
    Boundary = 1,
    Air = 2,
}

/// Convergence figures of one projection step.
#[derive(Clone, Debug, Default)]
pub struct Residuals {
    pub number_of_iterations: u32,
    pub linear_solver: Float,
    pub divergence_before: Float,
    pub divergence_after: Float,
}
