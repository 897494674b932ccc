//! Validation errors shared by model constructors and repository writes.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Model-level validation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Place key has no town/city component.
    EmptyTownCity,
    /// Latitude outside [-90, 90] or not finite.
    LatitudeOutOfRange(f64),
    /// Longitude outside [-180, 180] or not finite.
    LongitudeOutOfRange(f64),
    /// Person correspondent without first or last name.
    EmptyPersonName,
    /// Entity correspondent with a blank name.
    EmptyEntityName,
    /// Postmark arrival order must start at 1.
    InvalidArrivalOrder(u32),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTownCity => write!(f, "place town/city cannot be empty"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude `{value}` is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude `{value}` is outside [-180, 180]")
            }
            Self::EmptyPersonName => {
                write!(f, "person correspondent needs a first or last name")
            }
            Self::EmptyEntityName => write!(f, "entity correspondent name cannot be empty"),
            Self::InvalidArrivalOrder(value) => {
                write!(f, "arrival order must be >= 1, got {value}")
            }
        }
    }
}

impl Error for ValidationError {}
