//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Geometry text or document could not be parsed.
    #[error("invalid input geometry: {0}")]
    Parse(String),
    /// Geometry could not be converted into the requested representation.
    #[error("geometry conversion failed: {0}")]
    Conversion(String),
}
