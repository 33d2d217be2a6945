//! VRDF container reader.
//!
//! # Layout
//!
//! All integers little-endian:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic `"VRDF"` |
//! | 4 | 2 | Major version (1) |
//! | 6 | 2 | Minor version |
//! | 8 | 4 | JSON header length `H` |
//! | 12 | H | JSON header ([`VrdfHeader`]) |
//! | 12+H | ... | Label payload, then optional weight payload |
//!
//! Trailing bytes after the last payload are rejected.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use half::f16;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::{debug, trace};

use vrdf_core::{VolumeData, VolumeError, VolumeResult, VoxelBuffer, VoxelType};

use crate::header::VrdfHeader;

/// Container magic.
pub const MAGIC: &[u8; 4] = b"VRDF";
/// Supported major version.
pub const VERSION_MAJOR: u16 = 1;
/// Bytes before the JSON header.
pub const PREAMBLE_LEN: usize = 12;
/// Upper bound on the JSON header size (16 MiB).
pub const MAX_HEADER_LEN: u32 = 16 * 1024 * 1024;

/// Header-only view of a file, used for inspection without loading voxels.
#[derive(Debug, Clone)]
pub struct VrdfInfo {
    /// Minor version found in the file.
    pub minor_version: u16,
    /// Parsed header.
    pub header: VrdfHeader,
    /// Label payload element type.
    pub label_type: VoxelType,
    /// Weight payload element type, if present.
    pub weight_type: Option<VoxelType>,
}

/// Reads and decodes a `.vrdf` file.
///
/// # Errors
///
/// - [`VolumeError::FileNotFound`] if `path` is not a file
/// - [`VolumeError::MalformedContainer`] on bad magic, version or header
/// - [`VolumeError::CorruptVolume`] when payload sizes disagree with `dim`
pub fn read<P: AsRef<Path>>(path: P) -> VolumeResult<VolumeData> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(VolumeError::FileNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    debug!("read {} ({} bytes)", path.display(), bytes.len());
    read_bytes(&bytes)
}

/// Decodes a container held in memory.
pub fn read_bytes(bytes: &[u8]) -> VolumeResult<VolumeData> {
    let mut cursor = Cursor::new(bytes);
    let (_, header) = read_preamble(&mut cursor)?;
    let offset = cursor.position() as usize;
    decode_payloads(header, &bytes[offset..])
}

/// Reads only the header of a file.
pub fn probe<P: AsRef<Path>>(path: P) -> VolumeResult<VrdfInfo> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(VolumeError::FileNotFound(path.to_path_buf()));
    }
    let mut reader = BufReader::new(File::open(path)?);
    let (minor_version, header) = read_preamble(&mut reader)?;
    let label_type = header.labels.voxel_type()?;
    let weight_type = header.weights.as_ref().map(|w| w.voxel_type()).transpose()?;
    Ok(VrdfInfo {
        minor_version,
        header,
        label_type,
        weight_type,
    })
}

/// Reads magic, version and JSON header. Leaves the reader at the first payload byte.
fn read_preamble<R: Read>(reader: &mut R) -> VolumeResult<(u16, VrdfHeader)> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| VolumeError::malformed("file too short for VRDF magic"))?;
    if &magic != MAGIC {
        return Err(VolumeError::malformed(format!("invalid VRDF magic: {magic:02X?}")));
    }

    let major = read_u16(reader)?;
    let minor = read_u16(reader)?;
    if major != VERSION_MAJOR {
        return Err(VolumeError::malformed(format!(
            "unsupported VRDF version {major}.{minor}"
        )));
    }

    let header_len = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| VolumeError::malformed("truncated VRDF preamble"))?;
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(VolumeError::malformed(format!("invalid header length {header_len}")));
    }

    let mut json = vec![0u8; header_len as usize];
    reader
        .read_exact(&mut json)
        .map_err(|_| VolumeError::malformed("truncated VRDF header"))?;
    trace!("header: {}", String::from_utf8_lossy(&json));

    Ok((minor, VrdfHeader::parse(&json)?))
}

fn read_u16<R: Read>(reader: &mut R) -> VolumeResult<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|_| VolumeError::malformed("truncated VRDF preamble"))
}

/// Splits the payload bytes and decodes both channels.
fn decode_payloads(header: VrdfHeader, payload: &[u8]) -> VolumeResult<VolumeData> {
    let expected = header.meta.voxel_count();

    let label_type = header.labels.voxel_type()?;
    check_declared("labels", expected, header.labels.count)?;

    let weight_type = match &header.weights {
        Some(desc) => {
            check_declared("weights", expected, desc.count)?;
            Some(desc.voxel_type()?)
        }
        None => None,
    };

    let label_bytes = byte_len(expected, label_type)?;
    let weight_bytes = match weight_type {
        Some(t) => byte_len(expected, t)?,
        None => 0,
    };

    // Report the channel that actually came up short.
    if payload.len() < label_bytes {
        return Err(VolumeError::CorruptVolume {
            what: "labels",
            expected,
            actual: payload.len() / label_type.size_bytes(),
        });
    }
    let rest = payload.len() - label_bytes;
    if rest != weight_bytes {
        return Err(match weight_type {
            Some(t) => VolumeError::CorruptVolume {
                what: "weights",
                expected,
                actual: rest / t.size_bytes(),
            },
            None => VolumeError::CorruptVolume {
                what: "labels",
                expected,
                actual: payload.len() / label_type.size_bytes(),
            },
        });
    }

    let (label_src, weight_src) = payload.split_at(label_bytes);
    let labels = decode_labels(label_src, label_type, expected);
    let weights = weight_type.map(|t| decode_weights(weight_src, t, expected));

    debug!(
        "decoded {} volume {} ({} labels as {}, weights: {})",
        header.tf.kind.as_str(),
        header.meta.dim_string(),
        labels.len(),
        label_type.as_str(),
        weight_type.map_or("none", VoxelType::as_str),
    );

    let mut volume = VolumeData::new(header.meta, header.tf, labels);
    volume.weights = weights;
    Ok(volume)
}

fn check_declared(what: &'static str, expected: usize, declared: u64) -> VolumeResult<()> {
    if declared != expected as u64 {
        return Err(VolumeError::CorruptVolume {
            what,
            expected,
            actual: usize::try_from(declared).unwrap_or(usize::MAX),
        });
    }
    Ok(())
}

fn byte_len(count: usize, voxel_type: VoxelType) -> VolumeResult<usize> {
    count
        .checked_mul(voxel_type.size_bytes())
        .ok_or_else(|| VolumeError::malformed("payload size overflows"))
}

fn decode_labels(src: &[u8], voxel_type: VoxelType, count: usize) -> VoxelBuffer {
    match voxel_type {
        VoxelType::U8 => VoxelBuffer::U8(src.to_vec()),
        VoxelType::U16 => {
            let mut dst = vec![0u16; count];
            LittleEndian::read_u16_into(src, &mut dst);
            VoxelBuffer::U16(dst)
        }
        VoxelType::F16 | VoxelType::F32 => VoxelBuffer::F32(decode_f32(src, voxel_type, count)),
    }
}

fn decode_weights(src: &[u8], voxel_type: VoxelType, count: usize) -> Vec<f32> {
    match voxel_type {
        VoxelType::U8 => src.iter().map(|&v| v as f32 / 255.0).collect(),
        VoxelType::U16 => {
            let mut raw = vec![0u16; count];
            LittleEndian::read_u16_into(src, &mut raw);
            raw.into_iter().map(|v| v as f32 / 65535.0).collect()
        }
        VoxelType::F16 | VoxelType::F32 => decode_f32(src, voxel_type, count),
    }
}

fn decode_f32(src: &[u8], voxel_type: VoxelType, count: usize) -> Vec<f32> {
    match voxel_type {
        VoxelType::F16 => {
            let mut raw = vec![0u16; count];
            LittleEndian::read_u16_into(src, &mut raw);
            raw.into_iter().map(|bits| f16::from_bits(bits).to_f32()).collect()
        }
        _ => {
            let mut dst = vec![0f32; count];
            LittleEndian::read_f32_into(src, &mut dst);
            dst
        }
    }
}
