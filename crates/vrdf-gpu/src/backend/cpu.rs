//! Host-memory texture backend.
//!
//! Keeps texel data in process memory behind a mutex. Used for headless
//! runs and tests; an optional byte budget makes allocation failures
//! reproducible.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

use vrdf_lut::LutFilter;

use super::{check_span, ResidencyStats, TextureBackend, TextureId, VolumeTexels};
use crate::{GpuError, GpuResult, TextureCaps};

/// Bytes per RGBA float texel in host memory.
const TABLE_TEXEL_BYTES: u64 = 16;

#[derive(Debug, Clone)]
enum CpuTexture {
    Volume {
        label: String,
        dim: [u32; 3],
        texels: VolumeTexels,
    },
    Table {
        label: String,
        texels: Vec<[f32; 4]>,
        filter: LutFilter,
    },
}

impl CpuTexture {
    fn byte_len(&self) -> u64 {
        match self {
            Self::Volume { texels, .. } => texels.byte_len(),
            Self::Table { texels, .. } => texels.len() as u64 * TABLE_TEXEL_BYTES,
        }
    }

    fn label(&self) -> &str {
        match self {
            Self::Volume { label, .. } | Self::Table { label, .. } => label,
        }
    }
}

#[derive(Debug, Default)]
struct CpuState {
    next_id: u64,
    textures: HashMap<TextureId, CpuTexture>,
    stats: ResidencyStats,
}

/// Host-resident texture backend.
#[derive(Debug)]
pub struct CpuBackend {
    caps: TextureCaps,
    budget: Option<u64>,
    state: Mutex<CpuState>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Desktop capabilities, unlimited memory.
    pub fn new() -> Self {
        Self::with_caps(TextureCaps::desktop())
    }

    /// Custom capabilities.
    pub fn with_caps(caps: TextureCaps) -> Self {
        Self {
            caps,
            budget: None,
            state: Mutex::new(CpuState::default()),
        }
    }

    /// Caps live texture memory at `bytes`.
    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CpuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, texture: CpuTexture) -> GpuResult<TextureId> {
        let bytes = texture.byte_len();
        let mut state = self.lock();
        if let Some(budget) = self.budget {
            let needed = state.stats.live_bytes + bytes;
            if needed > budget {
                warn!(
                    "texture '{}' needs {bytes} bytes, {} of {budget} in use",
                    texture.label(),
                    state.stats.live_bytes
                );
                return Err(GpuError::ResourceExhaustion(format!(
                    "'{}' needs {bytes} bytes, budget {budget} with {} live",
                    texture.label(),
                    state.stats.live_bytes
                )));
            }
        }
        state.next_id += 1;
        let id = TextureId(state.next_id);
        trace!("create {id} '{}' ({bytes} bytes)", texture.label());
        state.stats.on_create(bytes);
        state.textures.insert(id, texture);
        Ok(id)
    }

    /// Copy of a table's texels.
    pub fn read_table(&self, id: TextureId) -> Option<Vec<[f32; 4]>> {
        match self.lock().textures.get(&id)? {
            CpuTexture::Table { texels, .. } => Some(texels.clone()),
            CpuTexture::Volume { .. } => None,
        }
    }

    /// Sampler filter a table was created with.
    pub fn table_filter(&self, id: TextureId) -> Option<LutFilter> {
        match self.lock().textures.get(&id)? {
            CpuTexture::Table { filter, .. } => Some(*filter),
            CpuTexture::Volume { .. } => None,
        }
    }

    /// Copy of a volume's dimensions and texels.
    pub fn read_volume(&self, id: TextureId) -> Option<([u32; 3], VolumeTexels)> {
        match self.lock().textures.get(&id)? {
            CpuTexture::Volume { dim, texels, .. } => Some((*dim, texels.clone())),
            CpuTexture::Table { .. } => None,
        }
    }

    /// True while `id` is alive.
    pub fn is_live(&self, id: TextureId) -> bool {
        self.lock().textures.contains_key(&id)
    }

    /// Debug label of a live texture.
    pub fn label_of(&self, id: TextureId) -> Option<String> {
        self.lock().textures.get(&id).map(|t| t.label().to_string())
    }

    /// Live handles, sorted.
    pub fn live_ids(&self) -> Vec<TextureId> {
        let mut ids: Vec<_> = self.lock().textures.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl TextureBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn caps(&self) -> &TextureCaps {
        &self.caps
    }

    fn create_volume(&self, label: &str, dim: [u32; 3], texels: VolumeTexels) -> GpuResult<TextureId> {
        if !self.caps.fits(dim) {
            return Err(GpuError::Unsupported(format!(
                "3D texture {}x{}x{} exceeds {}",
                dim[0], dim[1], dim[2], self.caps.max_3d_dim
            )));
        }
        let expected = dim.iter().map(|&d| d as usize).product::<usize>();
        if texels.len() != expected {
            return Err(GpuError::CorruptVolume {
                what: "texels",
                expected,
                actual: texels.len(),
            });
        }
        self.insert(CpuTexture::Volume {
            label: label.to_string(),
            dim,
            texels,
        })
    }

    fn create_table(&self, label: &str, texels: &[[f32; 4]], filter: LutFilter) -> GpuResult<TextureId> {
        self.insert(CpuTexture::Table {
            label: label.to_string(),
            texels: texels.to_vec(),
            filter,
        })
    }

    fn write_table(&self, id: TextureId, offset: usize, src: &[[f32; 4]]) -> GpuResult<()> {
        let mut state = self.lock();
        match state.textures.get_mut(&id) {
            Some(CpuTexture::Table { texels, .. }) => {
                check_span(offset, src.len(), texels.len())?;
                texels[offset..offset + src.len()].copy_from_slice(src);
                Ok(())
            }
            _ => Err(GpuError::UnknownTexture(id)),
        }
    }

    fn release(&self, id: TextureId) -> bool {
        let mut state = self.lock();
        match state.textures.remove(&id) {
            Some(texture) => {
                trace!("release {id} '{}'", texture.label());
                state.stats.on_release(texture.byte_len());
                true
            }
            None => false,
        }
    }

    fn stats(&self) -> ResidencyStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_release() {
        let backend = CpuBackend::new();
        let id = backend
            .create_volume("labels", [2, 2, 2], VolumeTexels::R8(vec![1; 8]))
            .unwrap();
        assert!(backend.is_live(id));
        assert_eq!(backend.stats().live_bytes, 8);

        assert!(backend.release(id));
        assert!(!backend.release(id));
        let stats = backend.stats();
        assert_eq!(stats.live_textures, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_bytes, 8);
    }

    #[test]
    fn test_budget_exceeded() {
        let backend = CpuBackend::new().with_budget(100);
        backend
            .create_volume("a", [4, 4, 4], VolumeTexels::R8(vec![0; 64]))
            .unwrap();
        let err = backend
            .create_volume("b", [4, 4, 4], VolumeTexels::R8(vec![0; 64]))
            .unwrap_err();
        assert!(matches!(err, GpuError::ResourceExhaustion(_)));
        assert_eq!(backend.stats().live_textures, 1);
    }

    #[test]
    fn test_partial_table_write() {
        let backend = CpuBackend::new();
        let id = backend
            .create_table("ctrl", &[[1.0; 4]; 256], LutFilter::Nearest)
            .unwrap();
        backend.write_table(id, 10, &[[0.0; 4]; 2]).unwrap();
        let texels = backend.read_table(id).unwrap();
        assert_eq!(texels[9], [1.0; 4]);
        assert_eq!(texels[10], [0.0; 4]);
        assert_eq!(texels[11], [0.0; 4]);
        assert_eq!(texels[12], [1.0; 4]);

        assert!(matches!(
            backend.write_table(id, 255, &[[0.0; 4]; 2]),
            Err(GpuError::OutOfBounds { end: 257, .. })
        ));
    }

    #[test]
    fn test_write_to_volume_rejected() {
        let backend = CpuBackend::new();
        let id = backend
            .create_volume("v", [1, 1, 1], VolumeTexels::R32F(vec![0.0]))
            .unwrap();
        assert!(matches!(
            backend.write_table(id, 0, &[[0.0; 4]]),
            Err(GpuError::UnknownTexture(_))
        ));
    }

    #[test]
    fn test_oversized_volume() {
        let caps = TextureCaps {
            max_3d_dim: 4,
            ..TextureCaps::desktop()
        };
        let backend = CpuBackend::with_caps(caps);
        assert!(matches!(
            backend.create_volume("v", [8, 1, 1], VolumeTexels::R8(vec![0; 8])),
            Err(GpuError::Unsupported(_))
        ));
    }
}
