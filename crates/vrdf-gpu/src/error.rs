//! GPU error types.

use thiserror::Error;
use vrdf_core::VolumeError;

use crate::TextureId;

/// Result type for texture operations.
pub type GpuResult<T> = Result<T, GpuError>;

/// Errors from texture building and GPU backends.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No usable adapter.
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    /// Backend compiled out or missing at runtime.
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    /// Device request failed.
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    /// Voxel buffer length disagrees with the grid.
    #[error("corrupt volume: {what} has {actual} elements, expected {expected}")]
    CorruptVolume {
        /// Offending channel
        what: &'static str,
        /// `x * y * z`
        expected: usize,
        /// Buffer length
        actual: usize,
    },

    /// Volume metadata is unusable.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    /// Texture size or format the target cannot handle.
    #[error("unsupported on this target: {0}")]
    Unsupported(String),

    /// Allocation failed or exceeded the memory budget.
    #[error("out of texture memory: {0}")]
    ResourceExhaustion(String),

    /// Handle not owned by the backend.
    #[error("unknown texture {0}")]
    UnknownTexture(TextureId),

    /// Write outside a texture's bounds.
    #[error("texel write {offset}..{end} outside texture of {len}")]
    OutOfBounds {
        /// First texel
        offset: usize,
        /// One past the last texel
        end: usize,
        /// Texture width
        len: usize,
    },
}

impl From<VolumeError> for GpuError {
    fn from(e: VolumeError) -> Self {
        match e {
            VolumeError::CorruptVolume { what, expected, actual } => {
                Self::CorruptVolume { what, expected, actual }
            }
            other => Self::InvalidVolume(other.to_string()),
        }
    }
}
