//! Texture backends.
//!
//! Provides a host-memory backend and a wgpu backend with automatic selection.

mod cpu;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use cpu::CpuBackend;

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuBackend;

use half::f16;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use vrdf_lut::LutFilter;

use crate::{GpuError, GpuResult, TextureCaps, VolumeFormat};

/// Available texture backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// Host-resident textures.
    Cpu,
    /// wgpu textures (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuBackend::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }
}

/// Opaque handle to a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Converted single-channel voxel data, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeTexels {
    /// One byte per voxel.
    R8(Vec<u8>),
    /// Half float per voxel.
    R16F(Vec<f16>),
    /// Float per voxel.
    R32F(Vec<f32>),
}

impl VolumeTexels {
    /// Matching texture format.
    pub fn format(&self) -> VolumeFormat {
        match self {
            Self::R8(_) => VolumeFormat::R8Unorm,
            Self::R16F(_) => VolumeFormat::R16Float,
            Self::R32F(_) => VolumeFormat::R32Float,
        }
    }

    /// Voxel count.
    pub fn len(&self) -> usize {
        match self {
            Self::R8(v) => v.len(),
            Self::R16F(v) => v.len(),
            Self::R32F(v) => v.len(),
        }
    }

    /// True when no voxels are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes.
    pub fn byte_len(&self) -> u64 {
        (self.len() * self.format().bytes_per_texel()) as u64
    }

    /// Value at an index, as the shader would see it.
    pub fn sample(&self, index: usize) -> Option<f32> {
        match self {
            Self::R8(v) => v.get(index).map(|&b| b as f32 / 255.0),
            Self::R16F(v) => v.get(index).map(|h| h.to_f32()),
            Self::R32F(v) => v.get(index).copied(),
        }
    }

    /// All-zero texels of a format.
    pub fn zeroed(format: VolumeFormat, len: usize) -> Self {
        match format {
            VolumeFormat::R8Unorm => Self::R8(vec![0; len]),
            VolumeFormat::R16Float => Self::R16F(vec![f16::ZERO; len]),
            VolumeFormat::R32Float => Self::R32F(vec![0.0; len]),
        }
    }
}

/// Live texture accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidencyStats {
    /// Textures currently alive.
    pub live_textures: usize,
    /// Bytes currently held.
    pub live_bytes: u64,
    /// Highest `live_bytes` seen.
    pub peak_bytes: u64,
    /// Textures created since startup.
    pub created: u64,
    /// Textures released since startup.
    pub released: u64,
}

impl ResidencyStats {
    pub(crate) fn on_create(&mut self, bytes: u64) {
        self.live_textures += 1;
        self.live_bytes += bytes;
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
        self.created += 1;
    }

    pub(crate) fn on_release(&mut self, bytes: u64) {
        self.live_textures = self.live_textures.saturating_sub(1);
        self.live_bytes = self.live_bytes.saturating_sub(bytes);
        self.released += 1;
    }
}

/// Texture storage used by the builder and the controller.
///
/// All calls happen on the render thread; implementations still need to be
/// `Send + Sync` so the controller can share them behind an `Arc`.
pub trait TextureBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &'static str;

    /// Capabilities for format selection.
    fn caps(&self) -> &TextureCaps;

    /// Creates a single-channel 3D texture.
    fn create_volume(&self, label: &str, dim: [u32; 3], texels: VolumeTexels) -> GpuResult<TextureId>;

    /// Creates a `N`×1 RGBA table.
    fn create_table(&self, label: &str, texels: &[[f32; 4]], filter: LutFilter) -> GpuResult<TextureId>;

    /// Overwrites `texels.len()` texels of a table starting at `offset`.
    fn write_table(&self, id: TextureId, offset: usize, texels: &[[f32; 4]]) -> GpuResult<()>;

    /// Frees a texture. Returns false for unknown handles.
    fn release(&self, id: TextureId) -> bool;

    /// Residency counters.
    fn stats(&self) -> ResidencyStats;
}

/// Create a backend instance.
pub fn create_backend(backend: Backend) -> GpuResult<Arc<dyn TextureBackend>> {
    match backend {
        Backend::Auto => {
            let best = if Backend::Wgpu.is_available() { Backend::Wgpu } else { Backend::Cpu };
            debug!("auto-selected {best:?} texture backend");
            create_backend(best)
        }
        Backend::Cpu => Ok(Arc::new(CpuBackend::new())),
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                Ok(Arc::new(WgpuBackend::new()?))
            }
            #[cfg(not(feature = "wgpu"))]
            {
                Err(GpuError::BackendNotAvailable(
                    "wgpu feature not enabled".to_string()
                ))
            }
        }
    }
}

pub(crate) fn check_span(offset: usize, count: usize, len: usize) -> GpuResult<()> {
    let end = offset.saturating_add(count);
    if end > len {
        return Err(GpuError::OutOfBounds { offset, end, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_available() {
        assert!(Backend::Cpu.is_available());
        let backend = create_backend(Backend::Cpu).unwrap();
        assert_eq!(backend.name(), "cpu");
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_wgpu_compiled_out() {
        assert!(!Backend::Wgpu.is_available());
        assert!(matches!(
            create_backend(Backend::Wgpu),
            Err(GpuError::BackendNotAvailable(_))
        ));
        assert_eq!(create_backend(Backend::Auto).unwrap().name(), "cpu");
    }

    #[test]
    fn test_texels_sample() {
        let t = VolumeTexels::R8(vec![0, 255]);
        assert_eq!(t.sample(1), Some(1.0));
        assert_eq!(t.byte_len(), 2);
        assert_eq!(VolumeTexels::zeroed(VolumeFormat::R16Float, 3).byte_len(), 6);
    }
}
