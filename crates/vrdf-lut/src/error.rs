//! LUT error types.

use thiserror::Error;

/// Result type for LUT operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors that can occur when building lookup tables.
#[derive(Debug, Error)]
pub enum LutError {
    /// Table has the wrong number of texels.
    #[error("invalid LUT size: {0}")]
    InvalidSize(String),

    /// Texel holds NaN or infinity.
    #[error("non-finite texel at index {0}")]
    NonFinite(usize),
}
