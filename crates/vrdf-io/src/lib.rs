//! # vrdf-io
//!
//! Reading, writing and locating `.vrdf` volume containers.
//!
//! A `.vrdf` file holds one segmented or scalar volume: a small binary
//! preamble, a JSON header (grid metadata and transfer function), the label
//! payload and an optional weight payload. See [`reader`] for the layout.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vrdf_io::{read, VolumeLocator};
//!
//! let locator = VolumeLocator::new().with_bundled_dir("assets");
//! if let Some(hit) = locator.resolve("flair") {
//!     let volume = read(&hit.path)?;
//!     println!("{} voxels", volume.metadata.voxel_count());
//! }
//! # Ok::<(), vrdf_core::VolumeError>(())
//! ```
//!
//! # Architecture
//!
//! - [`reader`] - container decoding, pure and GPU-free
//! - [`writer`] - container encoding
//! - [`detect`] - magic/extension detection
//! - [`locate`] - cache/bundled file resolution by modality code
//!
//! # Dependencies
//!
//! - `byteorder`, `half` - payload decoding
//! - `serde_json` - header
//! - `glob` - recursive scans
//!
//! # Used By
//!
//! - `vrdf-dvr` - loader worker
//! - `vrdf-cli` - `info`, `pack`, `resolve`, `list`

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod detect;
pub mod header;
pub mod locate;
pub mod reader;
pub mod writer;

pub use detect::{has_extension, is_vrdf, EXTENSION};
pub use header::{PayloadDesc, VrdfHeader};
pub use locate::{extract_code, FuzzyMatch, MatchKind, Resolution, RootKind, SearchOrder, VolumeLocator};
pub use reader::{probe, read, read_bytes, VrdfInfo, MAGIC, VERSION_MAJOR};
pub use writer::{write, write_bytes, WriteOptions, VERSION_MINOR};
