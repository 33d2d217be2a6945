//! VRDF container writer.
//!
//! Produces files [`crate::read`] accepts. Used by `vrdf pack` and by tests
//! to generate fixtures.

use byteorder::{LittleEndian, WriteBytesExt};
use half::f16;
use std::fs;
use std::path::Path;
use tracing::debug;

use vrdf_core::{VolumeData, VolumeError, VolumeResult, VoxelBuffer, VoxelType};

use crate::header::{PayloadDesc, VrdfHeader};
use crate::reader::{MAGIC, MAX_HEADER_LEN, VERSION_MAJOR};

/// Minor version written by this crate.
pub const VERSION_MINOR: u16 = 0;

/// Encoding options.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Element type of the weight payload.
    pub weight_type: VoxelType,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            weight_type: VoxelType::F32,
        }
    }
}

/// Encodes a volume to bytes.
///
/// The volume is checked against its own `dim` first, so a mismatched
/// buffer is reported as [`VolumeError::CorruptVolume`] instead of
/// producing an unreadable file.
pub fn write_bytes(volume: &VolumeData, opts: &WriteOptions) -> VolumeResult<Vec<u8>> {
    volume.metadata.validate()?;
    volume.transfer_function.validate()?;
    volume.check_payload()?;

    let count = volume.labels.len();
    let weights = volume.weights.as_deref().filter(|w| !w.is_empty());

    let header = VrdfHeader {
        meta: volume.metadata.clone(),
        tf: volume.transfer_function.clone(),
        labels: PayloadDesc::new(volume.labels.voxel_type(), count),
        weights: weights.map(|w| PayloadDesc::new(opts.weight_type, w.len())),
    };
    let json = serde_json::to_vec(&header)
        .map_err(|e| VolumeError::malformed(format!("cannot encode header: {e}")))?;
    if json.len() > MAX_HEADER_LEN as usize {
        return Err(VolumeError::malformed("header too large"));
    }

    let mut out = Vec::with_capacity(12 + json.len() + volume.payload_bytes());
    out.extend_from_slice(MAGIC);
    out.write_u16::<LittleEndian>(VERSION_MAJOR)?;
    out.write_u16::<LittleEndian>(VERSION_MINOR)?;
    out.write_u32::<LittleEndian>(json.len() as u32)?;
    out.extend_from_slice(&json);

    match &volume.labels {
        VoxelBuffer::U8(v) => out.extend_from_slice(v),
        VoxelBuffer::U16(v) => {
            for &x in v {
                out.write_u16::<LittleEndian>(x)?;
            }
        }
        VoxelBuffer::F32(v) => {
            for &x in v {
                out.write_f32::<LittleEndian>(x)?;
            }
        }
    }

    if let Some(w) = weights {
        encode_weights(&mut out, w, opts.weight_type)?;
    }
    Ok(out)
}

fn encode_weights(out: &mut Vec<u8>, weights: &[f32], ty: VoxelType) -> VolumeResult<()> {
    for &w in weights {
        match ty {
            VoxelType::U8 => out.push((w.clamp(0.0, 1.0) * 255.0).round() as u8),
            VoxelType::U16 => out.write_u16::<LittleEndian>((w.clamp(0.0, 1.0) * 65535.0).round() as u16)?,
            VoxelType::F16 => out.write_u16::<LittleEndian>(f16::from_f32(w).to_bits())?,
            VoxelType::F32 => out.write_f32::<LittleEndian>(w)?,
        }
    }
    Ok(())
}

/// Encodes a volume and writes it to `path`.
pub fn write<P: AsRef<Path>>(path: P, volume: &VolumeData, opts: &WriteOptions) -> VolumeResult<()> {
    let path = path.as_ref();
    let bytes = write_bytes(volume, opts)?;
    fs::write(path, &bytes)?;
    debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
