//! # vrdf-dvr
//!
//! Direct-volume-rendering state controller.
//!
//! Turns a modality code (`"t1c"`, `"flair"`, ...) into a volume on screen:
//! resolves the `.vrdf` file, decodes it, uploads textures, pushes shader
//! parameters and keeps per-label visibility in sync with the UI.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vrdf_dvr::{DvrConfig, LoadOutcome, RecordingMaterial, VolumeController};
//! use vrdf_gpu::CpuBackend;
//!
//! let config = DvrConfig::load_or_default();
//! let mut dvr = VolumeController::new(Arc::new(CpuBackend::new()), RecordingMaterial::new(), &config);
//!
//! if dvr.load_by_code("t1c") == LoadOutcome::Loaded {
//!     for label in dvr.labels() {
//!         println!("{:3} {}", label.index, label.display_name);
//!     }
//!     dvr.solo_label(2);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! render thread                      loader thread
//! ─────────────                      ─────────────
//! VolumeController ──LoaderMsg──────> LoaderHandler
//!   │  poll()      <──LoaderEvent────   resolve + read + LUTs
//!   ▼
//! TextureBuilder ──> TextureBackend (cpu | wgpu)
//!   │
//!   ▼
//! MaterialSink (shader parameters)
//! ```
//!
//! Only the render thread touches textures. Async loads carry a
//! generation; results of superseded requests are dropped.
//!
//! # Dependencies
//!
//! - `glam` - matrices and vectors pushed to the material
//! - `serde`, `ron`, `dirs` - config persistence
//! - `tracing` - logging
//!
//! # Used By
//!
//! - `vrdf-cli` - `load` command

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod controller;
mod error;
pub mod loader;
pub mod material;
pub mod messages;
pub mod registry;
pub mod scale;

pub use config::{DebugView, DvrConfig, ShaderProfile, APP_DIR, CONSTRAINED_SHADER, DESKTOP_SHADER};
pub use controller::{LoadOutcome, VolumeController, VolumeState};
pub use error::{DvrError, DvrResult, ErrorKind};
pub use loader::{LoaderHandle, LoaderHandler};
pub use material::{MaterialSink, RecordingMaterial};
pub use messages::{DecodedVolume, Generation, LoaderEvent, LoaderMsg};
pub use registry::{LabelInfo, LabelRegistry, VISIBLE_ALPHA};
pub use scale::{Compensation, ScaleCompensation, VolumeTransform};
