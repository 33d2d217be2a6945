//! Headless controller run.
//!
//! Loads a volume exactly as the viewer would, then prints the parameters
//! pushed to the material, the object transform and the label registry.

use crate::LoadArgs;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vrdf_dvr::material::*;
use vrdf_dvr::{DebugView, DvrConfig, LoadOutcome, RecordingMaterial, VolumeController};
use vrdf_gpu::{create_backend, Backend, CpuBackend, TextureBackend};

const ASYNC_TIMEOUT: Duration = Duration::from_secs(60);

fn parse_backend(name: &str) -> Result<Backend> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "auto" => Backend::Auto,
        "cpu" => Backend::Cpu,
        "wgpu" | "gpu" => Backend::Wgpu,
        other => bail!("Unknown backend '{other}' (expected cpu, wgpu or auto)"),
    })
}

fn config(args: &LoadArgs, verbose: u8) -> Result<DvrConfig> {
    let mut config = match &args.config {
        Some(path) => DvrConfig::load(path)?,
        None => DvrConfig::load_or_default(),
    };
    if let Some(dir) = &args.cache {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.bundled {
        config.bundled_dir = Some(dir.clone());
    }
    if args.hard {
        config.use_hard_tf = true;
    }
    if let Some(view) = &args.debug_view {
        config.debug_view =
            DebugView::parse(view).with_context(|| format!("Unknown debug view '{view}'"))?;
    }
    config.verbose = config.verbose.max(verbose);
    Ok(config)
}

/// Runs the load command.
pub fn run(args: LoadArgs, verbose: u8) -> Result<()> {
    let config = config(&args, verbose)?;
    let backend: Arc<dyn TextureBackend> = match (parse_backend(&args.backend)?, args.budget_mb) {
        (Backend::Cpu, Some(mb)) => Arc::new(CpuBackend::new().with_budget(mb * 1024 * 1024)),
        (kind, _) => create_backend(kind)?,
    };

    let mut dvr = VolumeController::new(Arc::clone(&backend), RecordingMaterial::new(), &config);
    if !dvr.is_enabled() {
        bail!("Volume shader unavailable on this target");
    }

    let outcome = if args.background {
        dvr.request_load(&args.code);
        let deadline = Instant::now() + ASYNC_TIMEOUT;
        loop {
            if let Some(outcome) = dvr.poll() {
                break outcome;
            }
            if Instant::now() > deadline {
                bail!("Timed out waiting for '{}'", args.code);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    } else {
        dvr.load_by_code(&args.code)
    };

    match outcome {
        LoadOutcome::Loaded => {}
        LoadOutcome::NotFound => bail!("No volume matches '{}'", args.code),
        LoadOutcome::Failed(kind) => bail!("Loading '{}' failed: {kind:?}", args.code),
    }

    if let Some(label) = args.solo {
        dvr.solo_label(label);
    }

    print_report(&dvr, backend.as_ref());
    Ok(())
}

fn print_report(dvr: &VolumeController<RecordingMaterial>, backend: &dyn TextureBackend) {
    let m = dvr.material();
    if let Some(source) = dvr.source() {
        println!("{}", source.display());
    }
    println!("  Backend:    {} ({:?} profile)", backend.name(), dvr.profile());
    println!("  Shader:     {}", m.shader.as_deref().unwrap_or("-"));
    if let Some(gpu) = dvr.gpu_volume() {
        println!("  Format:     {}", gpu.format.as_str());
    }
    if let Some(t) = dvr.transform() {
        println!("  Scale:      {:.4} x {:.4} x {:.4} m", t.scale.x, t.scale.y, t.scale.z);
    }

    println!("  Parameters:");
    for (slot, id) in &m.textures {
        println!("    {slot:<18} {id}");
    }
    for (slot, v) in &m.ints {
        println!("    {slot:<18} {v}");
    }
    for (slot, v) in &m.floats {
        println!("    {slot:<18} {v}");
    }
    for (slot, v) in &m.vectors {
        println!("    {slot:<18} ({}, {}, {}, {})", v.x, v.y, v.z, v.w);
    }
    if let Some(affine) = m.matrices.get(MAT_AFFINE) {
        println!("    {MAT_AFFINE:<18} {:?}", affine.to_cols_array_2d());
    }
    for kw in &m.keywords {
        println!("    keyword            {kw}");
    }

    let labels = dvr.labels();
    println!(
        "  Labels ({}, {} LUT):",
        labels.len(),
        if dvr.use_hard_tf() { "hard" } else { "soft" }
    );
    let ctrl = dvr.label_control();
    for label in labels {
        let alpha = ctrl.map(|c| c.alpha(label.index)).unwrap_or(1.0);
        println!(
            "    [{:3}] {:<24} {} ctrl={alpha:.2}",
            label.index,
            label.display_name,
            super::format_rgba(label.color)
        );
    }

    let stats = backend.stats();
    println!(
        "  Textures:   {} live, {}",
        stats.live_textures,
        super::format_size(stats.live_bytes)
    );
}
