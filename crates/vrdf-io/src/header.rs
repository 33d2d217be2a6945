//! JSON header embedded in the container.

use serde::{Deserialize, Serialize};
use vrdf_core::{TransferFunction, VolumeError, VolumeMetadata, VolumeResult, VoxelType};

/// Descriptor of one voxel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadDesc {
    /// Element type name (`u8`, `u16`, `f16`, `f32`).
    pub dtype: String,
    /// Declared element count.
    pub count: u64,
}

impl PayloadDesc {
    pub(crate) fn new(dtype: VoxelType, count: usize) -> Self {
        Self {
            dtype: dtype.as_str().to_string(),
            count: count as u64,
        }
    }

    /// Parsed element type.
    pub fn voxel_type(&self) -> VolumeResult<VoxelType> {
        VoxelType::parse(&self.dtype)
            .ok_or_else(|| VolumeError::malformed(format!("unknown voxel dtype '{}'", self.dtype)))
    }
}

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VrdfHeader {
    /// Grid description.
    pub meta: VolumeMetadata,
    /// Transfer function.
    pub tf: TransferFunction,
    /// Label / intensity payload.
    pub labels: PayloadDesc,
    /// Optional weight payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<PayloadDesc>,
}

impl VrdfHeader {
    /// Parses and validates a JSON header.
    pub(crate) fn parse(json: &[u8]) -> VolumeResult<Self> {
        let mut header: Self = serde_json::from_slice(json)
            .map_err(|e| VolumeError::malformed(format!("invalid header: {e}")))?;
        header.meta.validate()?;
        header.tf.validate()?;
        header.tf.clamp_colors();
        header.labels.voxel_type()?;
        if let Some(w) = &header.weights {
            w.voxel_type()?;
        }
        Ok(header)
    }
}
