//! Container packing from raw voxel dumps.
//!
//! Header JSON:
//!
//! ```json
//! {
//!   "meta": { "dim": [240, 240, 155], "spacing_mm": [1, 1, 1] },
//!   "tf": { "type": "labelmap", "entries": [{ "label": 1, "color": [1, 0, 0], "alpha": 1 }] },
//!   "label_type": "u8",
//!   "weight_type": "f32"
//! }
//! ```
//!
//! Raw payloads are little-endian, x fastest.

use crate::PackArgs;
use anyhow::{bail, Context, Result};
use half::f16;
use serde::Deserialize;
use std::fs;
use vrdf_core::{TransferFunction, VolumeData, VolumeMetadata, VoxelBuffer, VoxelType};
use vrdf_io::WriteOptions;

#[derive(Debug, Deserialize)]
struct PackHeader {
    meta: VolumeMetadata,
    #[serde(default)]
    tf: TransferFunction,
    #[serde(default = "default_label_type")]
    label_type: String,
    #[serde(default = "default_weight_type")]
    weight_type: String,
}

fn default_label_type() -> String {
    "u8".into()
}

fn default_weight_type() -> String {
    "f32".into()
}

fn voxel_type(name: &str) -> Result<VoxelType> {
    VoxelType::parse(name).with_context(|| format!("Unknown voxel type '{name}'"))
}

/// Decodes raw little-endian labels.
fn decode_labels(bytes: &[u8], ty: VoxelType) -> Result<VoxelBuffer> {
    check_stride(bytes, ty)?;
    Ok(match ty {
        VoxelType::U8 => VoxelBuffer::U8(bytes.to_vec()),
        VoxelType::U16 => VoxelBuffer::U16(
            bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect(),
        ),
        VoxelType::F16 => VoxelBuffer::F32(
            bytes
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
        ),
        VoxelType::F32 => VoxelBuffer::F32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    })
}

/// Decodes raw little-endian weights to [0, 1] floats.
fn decode_weights(bytes: &[u8], ty: VoxelType) -> Result<Vec<f32>> {
    Ok(match decode_labels(bytes, ty)? {
        VoxelBuffer::U8(v) => v.into_iter().map(|w| w as f32 / 255.0).collect(),
        VoxelBuffer::U16(v) => v.into_iter().map(|w| w as f32 / 65535.0).collect(),
        VoxelBuffer::F32(v) => v,
    })
}

fn check_stride(bytes: &[u8], ty: VoxelType) -> Result<()> {
    let size = ty.size_bytes();
    if bytes.len() % size != 0 {
        bail!("{} bytes is not a whole number of {} voxels", bytes.len(), ty.as_str());
    }
    Ok(())
}

/// Runs the pack command.
pub fn run(args: PackArgs, verbose: u8) -> Result<()> {
    let text = fs::read_to_string(&args.header)
        .with_context(|| format!("Failed to read header: {}", args.header.display()))?;
    let header: PackHeader = serde_json::from_str(&text)
        .with_context(|| format!("Invalid header: {}", args.header.display()))?;

    let label_type = voxel_type(&header.label_type)?;
    let raw = fs::read(&args.labels).with_context(|| format!("Failed to read: {}", args.labels.display()))?;
    let labels = decode_labels(&raw, label_type)?;

    let mut volume = VolumeData::new(header.meta, header.tf, labels);
    if let Some(path) = &args.weights {
        let raw = fs::read(path).with_context(|| format!("Failed to read: {}", path.display()))?;
        volume = volume.with_weights(decode_weights(&raw, voxel_type(&header.weight_type)?)?);
    }

    let opts = WriteOptions {
        weight_type: voxel_type(&args.store_weights)?,
    };
    vrdf_io::write(&args.output, &volume, &opts)
        .with_context(|| format!("Failed to write: {}", args.output.display()))?;

    if verbose > 0 {
        println!(
            "{}: {} {} labels{}",
            args.output.display(),
            volume.metadata.dim_string(),
            label_type.as_str(),
            if volume.has_weights() { " + weights" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_u16_labels() {
        let buf = decode_labels(&[1, 0, 0, 1], VoxelType::U16).unwrap();
        assert_eq!(buf, VoxelBuffer::U16(vec![1, 256]));
    }

    #[test]
    fn test_decode_weights_normalized() {
        let w = decode_weights(&[0, 255], VoxelType::U8).unwrap();
        assert_eq!(w, vec![0.0, 1.0]);
    }

    #[test]
    fn test_odd_stride_rejected() {
        assert!(decode_labels(&[0, 0, 0], VoxelType::F32).is_err());
    }

    #[test]
    fn test_pack_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("h.json");
        let labels = dir.path().join("l.raw");
        let weights = dir.path().join("w.raw");
        let output = dir.path().join("out.vrdf");
        fs::write(
            &header,
            r#"{"meta":{"dim":[2,2,1]},"tf":{"type":"labelmap","entries":[{"label":1,"color":[1,0,0],"alpha":1}]},"weight_type":"u8"}"#,
        )
        .unwrap();
        fs::write(&labels, [0u8, 1, 1, 0]).unwrap();
        fs::write(&weights, [0u8, 255, 255, 0]).unwrap();

        run(
            PackArgs {
                header,
                labels,
                weights: Some(weights),
                store_weights: "f32".into(),
                output: output.clone(),
            },
            0,
        )
        .unwrap();

        let v = vrdf_io::read(&output).unwrap();
        assert_eq!(v.metadata.dim, [2, 2, 1]);
        assert_eq!(v.labels, VoxelBuffer::U8(vec![0, 1, 1, 0]));
        assert_eq!(v.weights, Some(vec![0.0, 1.0, 1.0, 0.0]));
    }
}
