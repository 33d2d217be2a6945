//! # vrdf-lut
//!
//! Lookup tables derived from a VRDF transfer function, plus the per-label
//! control table edited by the UI.
//!
//! # Tables
//!
//! - [`TfLut`] - 256×1 RGBA color/opacity table, hard or soft
//! - [`LutPair`] - both variants built once per load
//! - [`LabelControl`] - 256×1 RGBA visibility/tint table with dirty tracking
//!
//! # Usage
//!
//! ```rust
//! use vrdf_core::{TfEntry, TransferFunction};
//! use vrdf_lut::{LabelControl, LutPair};
//!
//! let tf = TransferFunction::labelmap(vec![TfEntry::new(2, [0.0, 1.0, 0.0], 0.8)]);
//! let luts = LutPair::build(&tf);
//! assert_eq!(luts.active(false).texel(2), Some([0.0, 1.0, 0.0, 0.8]));
//!
//! let mut ctrl = LabelControl::new();
//! ctrl.solo(2);
//! let span = ctrl.take_dirty().unwrap();
//! assert_eq!(span.offset, 0);
//! ```
//!
//! # Dependencies
//!
//! - [`vrdf-core`] - transfer-function types
//! - [`thiserror`] - error handling
//!
//! # Used By
//!
//! - `vrdf-gpu` - LUT texture upload
//! - `vrdf-dvr` - registry colors, label operations

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod control;
mod error;
mod tf_lut;

pub use control::{LabelControl, TexelSpan, CONTROL_DEFAULT};
pub use error::{LutError, LutResult};
pub use tf_lut::{LutFilter, LutPair, TfLut, LUT_WIDTH, TRANSPARENT};
