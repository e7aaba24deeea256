//! Model parsing errors.

use std::fmt;

/// Failure to turn model file contents into a [`Geometry`](crate::Geometry).
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Malformed OBJ statement. `line` is 1-based.
    Obj { line: usize, message: String },
    /// Malformed ASCII STL statement. `line` is 1-based.
    Stl { line: usize, message: String },
    /// Binary STL shorter than its facet count requires.
    TruncatedStl { expected: usize, actual: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Obj { line, message } => write!(f, "OBJ line {line}: {message}"),
            ModelError::Stl { line, message } => write!(f, "STL line {line}: {message}"),
            ModelError::TruncatedStl { expected, actual } => write!(
                f,
                "binary STL is truncated: expected {expected} bytes, got {actual}"
            ),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
