//! Volume info command.
//!
//! Shows grid, transfer function and payload layout without uploading
//! anything.

use crate::InfoArgs;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::Path;
use vrdf_core::{VolumeData, VoxelType};
use vrdf_io::VrdfInfo;

/// Runs the info command.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    let mut reports = Vec::with_capacity(args.input.len());
    for path in &args.input {
        let file_size = fs::metadata(path)
            .with_context(|| format!("Cannot stat: {}", path.display()))?
            .len();
        let info = vrdf_io::probe(path).with_context(|| format!("Not a VRDF container: {}", path.display()))?;
        let volume = super::load_volume(path)?;

        if args.json {
            reports.push(to_json(path, &info, &volume, file_size));
        } else {
            print_text(path, &info, &volume, file_size, verbose);
            if args.input.len() > 1 {
                println!();
            }
        }
    }

    if args.json {
        let out = if reports.len() == 1 { reports.remove(0) } else { json!(reports) };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

fn print_text(path: &Path, info: &VrdfInfo, volume: &VolumeData, file_size: u64, verbose: u8) {
    let meta = &volume.metadata;
    let tf = &volume.transfer_function;
    let size = meta.physical_size_m();

    println!("{}", path.display());
    println!("  Version:    1.{}", info.minor_version);
    println!("  Grid:       {} ({} voxels)", meta.dim_string(), meta.voxel_count());
    println!(
        "  Spacing:    {:.3} x {:.3} x {:.3} mm",
        meta.spacing_mm[0], meta.spacing_mm[1], meta.spacing_mm[2]
    );
    println!("  Size:       {:.3} x {:.3} x {:.3} m", size.x, size.y, size.z);
    println!("  TF:         {} ({} entries)", tf.kind.as_str(), tf.entries.len());
    println!("  Labels:     {}", info.label_type.as_str());
    println!(
        "  Weights:    {}",
        info.weight_type.map(VoxelType::as_str).unwrap_or("none")
    );
    if let Some((lo, hi)) = volume.labels.value_range() {
        println!("  Range:      {lo} .. {hi}");
    }
    if let Some([p1, p99]) = meta.intensity_range {
        println!("  Window:     {p1} .. {p99}");
    }
    println!("  File size:  {}", super::format_size(file_size));

    if verbose > 0 {
        println!("  Affine:");
        for row in &meta.affine {
            println!("    [{:9.4} {:9.4} {:9.4} {:9.4}]", row[0], row[1], row[2], row[3]);
        }
        for entry in &tf.entries {
            println!(
                "  [{:3}] {:<24} {}",
                entry.label,
                entry.display_name(),
                super::format_rgba(entry.rgba())
            );
        }
    }
}

fn to_json(path: &Path, info: &VrdfInfo, volume: &VolumeData, file_size: u64) -> serde_json::Value {
    let meta = &volume.metadata;
    let size = meta.physical_size_m();
    json!({
        "file": path.display().to_string(),
        "version": format!("1.{}", info.minor_version),
        "dim": meta.dim,
        "spacing_mm": meta.spacing_mm,
        "size_m": [size.x, size.y, size.z],
        "affine": meta.affine,
        "intensity_range": meta.intensity_range,
        "tf": volume.transfer_function,
        "label_type": info.label_type.as_str(),
        "weight_type": info.weight_type.map(VoxelType::as_str),
        "value_range": volume.labels.value_range().map(|(lo, hi)| [lo, hi]),
        "size_bytes": file_size,
    })
}
