//! # vrdf-core
//!
//! Core data model for VRDF volumes.
//!
//! A `.vrdf` file describes one segmented or scalar medical volume:
//!
//! - [`VolumeMetadata`] - grid size, voxel spacing, voxel-to-world affine
//! - [`TransferFunction`] - labelmap or continuous color/opacity mapping
//! - [`VolumeData`] - the above plus label and optional weight voxels
//!
//! Nothing here touches the GPU; decoding lives in `vrdf-io`, texture
//! upload in `vrdf-gpu`.
//!
//! # Usage
//!
//! ```rust
//! use vrdf_core::{TfEntry, TransferFunction, VolumeData, VolumeMetadata, VoxelBuffer};
//!
//! let meta = VolumeMetadata::new([2, 2, 1]);
//! let tf = TransferFunction::labelmap(vec![TfEntry::new(1, [1.0, 0.0, 0.0], 1.0).named("Tumor")]);
//! let volume = VolumeData::new(meta, tf, VoxelBuffer::U8(vec![0, 1, 1, 0]));
//! assert!(volume.check_payload().is_ok());
//! ```
//!
//! # Dependencies
//!
//! - [`glam`] - affine matrices
//! - [`serde`] - header (de)serialization
//! - [`thiserror`] - error types
//!
//! # Used By
//!
//! - `vrdf-io` - container reader/writer
//! - `vrdf-lut` - LUT construction
//! - `vrdf-gpu` - texture upload
//! - `vrdf-dvr` - volume controller

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod meta;
mod tf;
mod volume;

pub use error::{VolumeError, VolumeResult};
pub use meta::{VolumeMetadata, DEFAULT_SPACING_MM, IDENTITY_AFFINE, MM_TO_M, UNIT_WINDOW};
pub use tf::{generic_label_name, TfEntry, TfKind, TransferFunction, LABEL_COUNT};
pub use volume::{VolumeData, VoxelBuffer, VoxelType};
