//! Label registry listing.

use crate::LabelsArgs;
use anyhow::Result;
use serde_json::json;
use vrdf_dvr::LabelRegistry;
use vrdf_lut::LutPair;

/// Prints the labels a UI would offer for this volume.
pub fn run(args: LabelsArgs) -> Result<()> {
    let volume = super::load_volume(&args.input)?;
    let luts = LutPair::build(&volume.transfer_function);
    let registry = LabelRegistry::rebuild(&volume.transfer_function, Some(luts.active(args.hard)));

    if args.json {
        let labels: Vec<_> = registry
            .iter()
            .map(|l| {
                json!({
                    "index": l.index,
                    "name": l.display_name,
                    "color": l.color,
                    "visible": l.default_visible,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&labels)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("{}: no addressable labels", args.input.display());
        return Ok(());
    }
    println!(
        "{}: {} label(s), {} LUT",
        args.input.display(),
        registry.len(),
        if args.hard { "hard" } else { "soft" }
    );
    for label in &registry {
        println!(
            "  [{:3}] {:<24} {}{}",
            label.index,
            label.display_name,
            super::format_rgba(label.color),
            if label.default_visible { "" } else { "  (hidden)" }
        );
    }
    Ok(())
}
