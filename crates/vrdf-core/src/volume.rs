//! Decoded volume: metadata, transfer function and host-side voxel buffers.

use crate::{TransferFunction, VolumeError, VolumeMetadata, VolumeResult};

/// Storage type of a voxel channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// 16-bit float (on-disk only, decoded to f32).
    F16,
    /// 32-bit float.
    F32,
}

impl VoxelType {
    /// Bytes per element on disk.
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::F32 => 4,
        }
    }

    /// Header name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::F16 => "f16",
            Self::F32 => "f32",
        }
    }

    /// Parses a header name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Some(Self::U8),
            "u16" | "uint16" => Some(Self::U16),
            "f16" | "float16" => Some(Self::F16),
            "f32" | "float32" => Some(Self::F32),
            _ => None,
        }
    }
}

/// Label / intensity channel, one element per voxel in x-fastest order.
#[derive(Debug, Clone, PartialEq)]
pub enum VoxelBuffer {
    /// Label indices.
    U8(Vec<u8>),
    /// Wide labels or raw scanner intensities.
    U16(Vec<u16>),
    /// Float intensities (or float-encoded labels).
    F32(Vec<f32>),
}

impl VoxelBuffer {
    /// Element count.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    /// True when the buffer holds no voxels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage type.
    pub fn voxel_type(&self) -> VoxelType {
        match self {
            Self::U8(_) => VoxelType::U8,
            Self::U16(_) => VoxelType::U16,
            Self::F32(_) => VoxelType::F32,
        }
    }

    /// Value at a linear index as f32.
    pub fn get(&self, index: usize) -> Option<f32> {
        match self {
            Self::U8(v) => v.get(index).map(|&x| x as f32),
            Self::U16(v) => v.get(index).map(|&x| x as f32),
            Self::F32(v) => v.get(index).copied(),
        }
    }

    /// Min and max value, `None` when empty.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        if self.is_empty() {
            return None;
        }
        let fold = |(lo, hi): (f32, f32), x: f32| (lo.min(x), hi.max(x));
        let init = (f32::INFINITY, f32::NEG_INFINITY);
        Some(match self {
            Self::U8(v) => v.iter().map(|&x| x as f32).fold(init, fold),
            Self::U16(v) => v.iter().map(|&x| x as f32).fold(init, fold),
            Self::F32(v) => v.iter().copied().filter(|x| x.is_finite()).fold(init, fold),
        })
    }
}

/// One decoded `.vrdf` file, still in host memory.
#[derive(Debug, Clone)]
pub struct VolumeData {
    /// Grid description.
    pub metadata: VolumeMetadata,
    /// Color/opacity mapping and label names.
    pub transfer_function: TransferFunction,
    /// Mandatory label / intensity channel.
    pub labels: VoxelBuffer,
    /// Optional per-voxel weight channel.
    pub weights: Option<Vec<f32>>,
}

impl VolumeData {
    /// Creates a volume without weights.
    pub fn new(metadata: VolumeMetadata, transfer_function: TransferFunction, labels: VoxelBuffer) -> Self {
        Self {
            metadata,
            transfer_function,
            labels,
            weights: None,
        }
    }

    /// Attaches a weight channel.
    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// True when a non-empty weight channel is present.
    #[inline]
    pub fn has_weights(&self) -> bool {
        self.weights.as_ref().is_some_and(|w| !w.is_empty())
    }

    /// Checks both payloads against `dim`.
    pub fn check_payload(&self) -> VolumeResult<()> {
        let expected = self.metadata.voxel_count();
        if self.labels.len() != expected {
            return Err(VolumeError::CorruptVolume {
                what: "labels",
                expected,
                actual: self.labels.len(),
            });
        }
        if let Some(weights) = &self.weights {
            if !weights.is_empty() && weights.len() != expected {
                return Err(VolumeError::CorruptVolume {
                    what: "weights",
                    expected,
                    actual: weights.len(),
                });
            }
        }
        Ok(())
    }

    /// Host memory held by the voxel buffers.
    pub fn payload_bytes(&self) -> usize {
        self.labels.len() * self.labels.voxel_type().size_bytes()
            + self.weights.as_ref().map_or(0, |w| w.len() * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferFunction;

    fn volume(dim: [u32; 3], n: usize) -> VolumeData {
        VolumeData::new(
            VolumeMetadata::new(dim),
            TransferFunction::default(),
            VoxelBuffer::U8(vec![0; n]),
        )
    }

    #[test]
    fn test_payload_matches() {
        assert!(volume([2, 3, 4], 24).check_payload().is_ok());
    }

    #[test]
    fn test_payload_mismatch() {
        let err = volume([2, 3, 4], 23).check_payload().unwrap_err();
        assert!(matches!(
            err,
            VolumeError::CorruptVolume { expected: 24, actual: 23, .. }
        ));
    }

    #[test]
    fn test_weight_mismatch() {
        let v = volume([2, 2, 2], 8).with_weights(vec![0.5; 7]);
        assert!(matches!(
            v.check_payload(),
            Err(VolumeError::CorruptVolume { what: "weights", .. })
        ));
    }

    #[test]
    fn test_empty_weights_are_absent() {
        let v = volume([1, 1, 1], 1).with_weights(Vec::new());
        assert!(!v.has_weights());
        assert!(v.check_payload().is_ok());
    }

    #[test]
    fn test_value_range() {
        let buf = VoxelBuffer::F32(vec![3.0, -1.0, f32::NAN, 7.5]);
        assert_eq!(buf.value_range(), Some((-1.0, 7.5)));
        assert_eq!(VoxelBuffer::U8(Vec::new()).value_range(), None);
    }

    #[test]
    fn test_voxel_type_parse() {
        assert_eq!(VoxelType::parse("F16"), Some(VoxelType::F16));
        assert_eq!(VoxelType::parse("float32"), Some(VoxelType::F32));
        assert_eq!(VoxelType::parse("i64"), None);
    }
}
