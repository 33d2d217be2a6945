//! CLI command implementations

pub mod info;
pub mod labels;
pub mod load;
pub mod pack;
pub mod resolve;

use anyhow::{Context, Result};
use std::path::Path;
use vrdf_core::VolumeData;

/// Load volume from path
pub fn load_volume(path: &Path) -> Result<VolumeData> {
    vrdf_io::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}

/// Format byte size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Formats an RGBA color as `#rrggbb a=0.50`.
pub fn format_rgba(c: [f32; 4]) -> String {
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x} a={:.2}", byte(c[0]), byte(c[1]), byte(c[2]), c[3])
}
