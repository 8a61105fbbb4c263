//! Errors reported while building or solving interface derivative systems.
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum MultipatchError {
    /// A boundary condition or chain layout that the requested operation does not support.
    Configuration(String),
    /// Too few cells on one side of an interface, or sample lines of the wrong length.
    Cardinality(String),
    /// Grids or data that violate a continuity or alignment precondition.
    Consistency(String),
    /// The iterative interface solve did not reach its tolerance.
    Convergence {
        iterations: usize,
        relative_residual: f64,
        message: String,
    },
}

impl MultipatchError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn cardinality(message: impl Into<String>) -> Self {
        Self::Cardinality(message.into())
    }

    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }
}

impl Display for MultipatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            MultipatchError::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            MultipatchError::Cardinality(msg) => write!(f, "Invalid number of grid points: {}", msg),
            MultipatchError::Consistency(msg) => write!(f, "Inconsistent grid or data: {}", msg),
            MultipatchError::Convergence {
                iterations,
                relative_residual,
                message,
            } => write!(
                f,
                "Interface solve did not converge after {} iterations (relative residual {:e}): {}",
                iterations, relative_residual, message
            ),
        }
    }
}

impl Error for MultipatchError {}
