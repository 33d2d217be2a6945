//! vrdf - VRDF volume tool
//!
//! Inspects, packs and locates `.vrdf` volumes and runs the volume
//! controller headless.

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "vrdf")]
#[command(author, version, about = "VRDF volume tool")]
#[command(long_about = "
Inspect, pack and locate VRDF volume containers, and run the volume
controller headless.

Examples:
  vrdf info brain_t1c_lw.vrdf               # Grid, transfer function, payload
  vrdf info *.vrdf --json                   # Machine-readable
  vrdf labels seg_lw.vrdf --hard            # Label registry from the hard LUT
  vrdf resolve t1c --cache ~/.cache/vrdf-viewer --bundled assets
  vrdf list --bundled assets                # Available modality codes
  vrdf pack --header h.json --labels l.raw -o out.vrdf
  vrdf -v load flair --budget-mb 64         # Headless load with debug logs
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show container metadata
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// List addressable labels
    Labels(LabelsArgs),

    /// Resolve a modality code to a file
    Resolve(ResolveArgs),

    /// List modality codes found in the search roots
    #[command(visible_alias = "ls")]
    List(RootArgs),

    /// Build a container from a JSON header and raw payloads
    Pack(PackArgs),

    /// Load a volume through the controller and print what it pushed
    Load(LoadArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input volume(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LabelsArgs {
    /// Input volume
    input: PathBuf,

    /// Use the hard (nearest) LUT instead of the soft one
    #[arg(long)]
    hard: bool,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

/// Search roots shared by `resolve` and `list`.
#[derive(Args)]
struct RootArgs {
    /// Writable cache directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Bundled assets directory
    #[arg(long)]
    bundled: Option<PathBuf>,

    /// Search bundled assets before the cache
    #[arg(long)]
    bundled_first: bool,

    /// Fuzzy fallback: substring, delimited
    #[arg(long, default_value = "substring")]
    fuzzy: String,
}

#[derive(Args)]
struct ResolveArgs {
    /// Modality code (t1c, t1n, t2w, flair, ...)
    code: String,

    #[command(flatten)]
    roots: RootArgs,
}

#[derive(Args)]
struct PackArgs {
    /// JSON header: meta, tf, label_type, weight_type
    #[arg(long)]
    header: PathBuf,

    /// Raw little-endian label voxels
    #[arg(long)]
    labels: PathBuf,

    /// Raw little-endian weight voxels
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Weight storage type in the output: u8, u16, f16, f32
    #[arg(long, default_value = "f32")]
    store_weights: String,

    /// Output container
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct LoadArgs {
    /// Modality code
    code: String,

    /// Config file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override cache directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Override bundled directory
    #[arg(long)]
    bundled: Option<PathBuf>,

    /// Start with the hard LUT
    #[arg(long)]
    hard: bool,

    /// Debug view: off, labels, weights, uvw
    #[arg(long)]
    debug_view: Option<String>,

    /// Texture backend: cpu, wgpu, auto
    #[arg(short, long, default_value = "cpu")]
    backend: String,

    /// Texture memory budget in MiB (cpu backend)
    #[arg(long)]
    budget_mb: Option<u64>,

    /// Solo this label after loading
    #[arg(long)]
    solo: Option<u8>,

    /// Load on the background loader thread
    #[arg(long = "async")]
    background: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Labels(args) => commands::labels::run(args),
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::List(args) => commands::resolve::run_list(args),
        Commands::Pack(args) => commands::pack::run(args, cli.verbose),
        Commands::Load(args) => commands::load::run(args, cli.verbose),
    }
}
