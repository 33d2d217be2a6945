//! # vrdf-gpu
//!
//! Texture building for VRDF volumes.
//!
//! Converts decoded voxel buffers and transfer-function LUTs into backend
//! textures: a single-channel 3D label texture, an optional 3D weight
//! texture, two 256×1 RGBA LUTs and the per-label control table.
//!
//! # Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | [`CpuBackend`] | always | Host memory, byte budget, used headless and in tests |
//! | `WgpuBackend` | `wgpu` | Vulkan/Metal/DX12 textures, OOM via error scopes |
//!
//! # Usage
//!
//! ```rust
//! use vrdf_core::{TransferFunction, VolumeData, VolumeMetadata, VoxelBuffer};
//! use vrdf_gpu::{create_backend, Backend, TextureBuilder};
//! use vrdf_lut::LutPair;
//!
//! let backend = create_backend(Backend::Cpu)?;
//! let volume = VolumeData::new(
//!     VolumeMetadata::new([2, 2, 2]),
//!     TransferFunction::default(),
//!     VoxelBuffer::U8(vec![0; 8]),
//! );
//! let luts = LutPair::build(&volume.transfer_function);
//! let textures = TextureBuilder::new(backend.as_ref()).build(&volume, &luts)?;
//! textures.release(backend.as_ref());
//! # Ok::<(), vrdf_gpu::GpuError>(())
//! ```
//!
//! # Format selection
//!
//! [`VolumeFormat::select`] picks the 3D texture format from the backend's
//! [`TextureCaps`]: `R8Unorm` on memory-constrained targets, `R32Float`
//! where 32-bit float textures are filterable, `R16Float` otherwise.
//!
//! # Dependencies
//!
//! - `wgpu`, `pollster`, `bytemuck` - GPU backend
//! - `rayon`, `half` - voxel conversion
//!
//! # Used By
//!
//! - `vrdf-dvr` - volume controller

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod builder;
mod caps;
mod error;

pub use backend::{create_backend, Backend, CpuBackend, ResidencyStats, TextureBackend, TextureId, VolumeTexels};
#[cfg(feature = "wgpu")]
pub use backend::WgpuBackend;
pub use builder::{convert_labels, convert_weights, GpuVolume, TextureBuilder};
pub use caps::{TextureCaps, VolumeFormat};
pub use error::{GpuError, GpuResult};
