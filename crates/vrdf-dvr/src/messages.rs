//! Message types for controller <-> loader communication.
//!
//! The controller sends load requests, the loader sends back decoded
//! volumes. Every request carries a generation; results from older
//! generations are dropped.

use std::path::PathBuf;

use vrdf_core::{VolumeData, VolumeError, VolumeResult};
use vrdf_lut::LutPair;

/// Generation counter for invalidating stale results.
pub type Generation = u64;

/// A volume decoded on the loader thread, ready for GPU upload.
#[derive(Debug, Clone)]
pub struct DecodedVolume {
    /// File it came from, if any.
    pub source: Option<PathBuf>,
    /// Host-side voxels and metadata.
    pub data: VolumeData,
    /// Hard and soft LUTs.
    pub luts: LutPair,
}

impl DecodedVolume {
    /// Wraps in-memory data and builds its LUTs.
    pub fn from_data(data: VolumeData) -> Self {
        let luts = LutPair::build(&data.transfer_function);
        Self {
            source: None,
            data,
            luts,
        }
    }

    /// Reads and decodes a file.
    pub fn decode(path: impl Into<PathBuf>) -> VolumeResult<Self> {
        let path = path.into();
        let data = vrdf_io::read(&path)?;
        let mut decoded = Self::from_data(data);
        decoded.source = Some(path);
        Ok(decoded)
    }
}

/// Messages from controller to loader.
#[derive(Debug, Clone)]
pub enum LoaderMsg {
    /// Resolve and decode a modality code.
    Load {
        /// Request generation.
        generation: Generation,
        /// Modality code.
        code: String,
    },

    /// Stop the loader.
    Close,
}

/// Events from loader to controller.
#[derive(Debug)]
pub enum LoaderEvent {
    /// Decoding finished.
    Decoded {
        /// Request generation.
        generation: Generation,
        /// Requested code.
        code: String,
        /// Result.
        volume: Box<DecodedVolume>,
    },

    /// No file matched the code.
    NotFound {
        /// Request generation.
        generation: Generation,
        /// Requested code.
        code: String,
    },

    /// Reading or decoding failed.
    Failed {
        /// Request generation.
        generation: Generation,
        /// Requested code.
        code: String,
        /// Cause.
        error: VolumeError,
    },
}

impl LoaderEvent {
    /// Generation of the originating request.
    pub fn generation(&self) -> Generation {
        match self {
            Self::Decoded { generation, .. }
            | Self::NotFound { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}
