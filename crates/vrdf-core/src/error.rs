//! Error types for VRDF decoding and validation.
//!
//! Covers the structural failure modes of a volume file:
//! - the file is missing,
//! - the container or its header cannot be parsed,
//! - the voxel payload disagrees with the declared grid.
//!
//! GPU-side failures live in `vrdf-gpu`; controller-level failures in `vrdf-dvr`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for volume operations.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors that can occur while reading or validating a volume.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The requested path does not exist.
    #[error("volume file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The container structure or JSON header could not be parsed.
    #[error("malformed VRDF container: {0}")]
    MalformedContainer(String),

    /// Voxel payload size disagrees with the declared dimensions.
    #[error("corrupt volume ({what}): expected {expected} voxels, got {actual}")]
    CorruptVolume {
        /// Which payload failed the check.
        what: &'static str,
        /// Element count implied by `dim`.
        expected: usize,
        /// Element count actually present.
        actual: usize,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VolumeError {
    /// Shorthand for [`VolumeError::MalformedContainer`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedContainer(msg.into())
    }
}
