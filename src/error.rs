use crate::global_variables::Float;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PressureError {
    /// The back-end solver cannot run on the requested system representation.
    UnsupportedRepresentation { solver: &'static str, compressed: bool },
    InvalidTimeStep(Float),
    InvalidSetting { key: String, value: String },
    Io(io::Error),
}

impl fmt::Display for PressureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressureError::UnsupportedRepresentation { solver, compressed } => {
                let representation = if *compressed { "compressed" } else { "stencil" };
                write!(
                    f,
                    "the {solver} solver cannot operate on a {representation} linear system"
                )
            }
            PressureError::InvalidTimeStep(dt) => {
                write!(f, "the time step must be positive and finite, got {dt}")
            }
            PressureError::InvalidSetting { key, value } => {
                write!(f, "invalid value {value:?} for setting {key:?}")
            }
            PressureError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for PressureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PressureError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PressureError {
    fn from(e: io::Error) -> Self {
        PressureError::Io(e)
    }
}
