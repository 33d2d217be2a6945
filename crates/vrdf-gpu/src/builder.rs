//! Turns a decoded volume into backend textures.
//!
//! One [`TextureBuilder::build`] call creates up to four textures: the label
//! volume, the optional weight volume and the hard/soft LUTs. Creation is
//! all-or-nothing: if any allocation fails, every texture created earlier in
//! the same call is released before the error is returned.
//!
//! # Voxel encoding
//!
//! | Format     | Labels                         | Weights                  |
//! |------------|--------------------------------|--------------------------|
//! | `R8Unorm`  | value clamped to 0..=255       | `round(w * 255)`         |
//! | `R16Float` | value as half float            | weight as half float     |
//! | `R32Float` | value as float                 | weight as float          |

use half::f16;
use rayon::prelude::*;
use tracing::{debug, warn};

use vrdf_core::{VolumeData, VoxelBuffer};
use vrdf_lut::{LabelControl, LutFilter, LutPair};

use crate::{GpuError, GpuResult, TextureBackend, TextureId, VolumeFormat, VolumeTexels};

/// Textures of one loaded volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuVolume {
    /// Label / intensity 3D texture.
    pub label: TextureId,
    /// Weight 3D texture, if the volume has weights.
    pub weight: Option<TextureId>,
    /// Nearest-sampled LUT.
    pub hard_lut: TextureId,
    /// Linearly-sampled LUT.
    pub soft_lut: TextureId,
    /// Storage format of both 3D textures.
    pub format: VolumeFormat,
    /// Grid size.
    pub dim: [u32; 3],
}

impl GpuVolume {
    /// LUT for the given mode.
    pub fn lut(&self, hard: bool) -> TextureId {
        if hard { self.hard_lut } else { self.soft_lut }
    }

    /// Every texture handle held.
    pub fn ids(&self) -> Vec<TextureId> {
        let mut ids = vec![self.label];
        ids.extend(self.weight);
        ids.push(self.hard_lut);
        ids.push(self.soft_lut);
        ids
    }

    /// Releases all textures.
    pub fn release(self, backend: &dyn TextureBackend) {
        for id in self.ids() {
            if !backend.release(id) {
                warn!("texture {id} was already released");
            }
        }
    }
}

/// Releases everything it created unless committed.
struct Transaction<'a> {
    backend: &'a dyn TextureBackend,
    created: Vec<TextureId>,
}

impl<'a> Transaction<'a> {
    fn new(backend: &'a dyn TextureBackend) -> Self {
        Self {
            backend,
            created: Vec::with_capacity(4),
        }
    }

    fn track(&mut self, id: GpuResult<TextureId>) -> GpuResult<TextureId> {
        let id = id?;
        self.created.push(id);
        Ok(id)
    }

    fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.created.is_empty() {
            return;
        }
        debug!("rolling back {} texture(s)", self.created.len());
        for id in self.created.drain(..) {
            self.backend.release(id);
        }
    }
}

/// Builds textures on a backend.
pub struct TextureBuilder<'a> {
    backend: &'a dyn TextureBackend,
    format: VolumeFormat,
}

impl<'a> TextureBuilder<'a> {
    /// Builder using the format selected from the backend's capabilities.
    pub fn new(backend: &'a dyn TextureBackend) -> Self {
        Self {
            backend,
            format: VolumeFormat::select(backend.caps()),
        }
    }

    /// Overrides the volume format.
    pub fn with_format(mut self, format: VolumeFormat) -> Self {
        self.format = format;
        self
    }

    /// Selected volume format.
    pub fn format(&self) -> VolumeFormat {
        self.format
    }

    /// Checks a volume without allocating anything.
    pub fn validate(&self, volume: &VolumeData) -> GpuResult<()> {
        volume.metadata.validate()?;
        volume.check_payload()?;
        let dim = volume.metadata.dim;
        let caps = self.backend.caps();
        if !caps.fits(dim) {
            return Err(GpuError::Unsupported(format!(
                "volume {} exceeds max 3D texture size {}",
                volume.metadata.dim_string(),
                caps.max_3d_dim
            )));
        }
        Ok(())
    }

    /// Creates all textures for a volume.
    pub fn build(&self, volume: &VolumeData, luts: &LutPair) -> GpuResult<GpuVolume> {
        self.validate(volume)?;
        let dim = volume.metadata.dim;

        let mut tx = Transaction::new(self.backend);
        let label = tx.track(self.backend.create_volume(
            "vrdf_labels",
            dim,
            convert_labels(&volume.labels, self.format),
        ))?;
        let weight = match volume.weights.as_deref().filter(|w| !w.is_empty()) {
            Some(w) => Some(tx.track(self.backend.create_volume(
                "vrdf_weights",
                dim,
                convert_weights(w, self.format),
            ))?),
            None => None,
        };
        let hard_lut = tx.track(self.backend.create_table("vrdf_tf_hard", luts.hard.texels(), LutFilter::Nearest))?;
        let soft_lut = tx.track(self.backend.create_table("vrdf_tf_soft", luts.soft.texels(), LutFilter::Linear))?;
        tx.commit();

        debug!(
            "built {} textures ({}, weights: {})",
            volume.metadata.dim_string(),
            self.format.as_str(),
            weight.is_some()
        );
        Ok(GpuVolume {
            label,
            weight,
            hard_lut,
            soft_lut,
            format: self.format,
            dim,
        })
    }

    /// Creates the 256×1 label control texture.
    pub fn label_control(&self, ctrl: &LabelControl) -> GpuResult<TextureId> {
        self.backend.create_table("vrdf_label_ctrl", ctrl.texels(), LutFilter::Nearest)
    }

    /// Creates a 1×1×1 black volume bound when a slot has no data.
    pub fn placeholder(&self) -> GpuResult<TextureId> {
        self.backend.create_volume("vrdf_black", [1, 1, 1], VolumeTexels::zeroed(self.format, 1))
    }
}

/// Converts a label channel to texture storage.
pub fn convert_labels(labels: &VoxelBuffer, format: VolumeFormat) -> VolumeTexels {
    match (labels, format) {
        (VoxelBuffer::U8(v), VolumeFormat::R8Unorm) => VolumeTexels::R8(v.clone()),
        (VoxelBuffer::U8(v), VolumeFormat::R16Float) => {
            VolumeTexels::R16F(v.par_iter().map(|&x| f16::from_f32(x as f32)).collect())
        }
        (VoxelBuffer::U8(v), VolumeFormat::R32Float) => {
            VolumeTexels::R32F(v.par_iter().map(|&x| x as f32).collect())
        }
        (VoxelBuffer::U16(v), _) => from_f32_iter(v.par_iter().map(|&x| x as f32), format),
        (VoxelBuffer::F32(v), _) => from_f32_iter(v.par_iter().copied(), format),
    }
}

fn from_f32_iter<I>(values: I, format: VolumeFormat) -> VolumeTexels
where
    I: ParallelIterator<Item = f32>,
{
    match format {
        VolumeFormat::R8Unorm => VolumeTexels::R8(values.map(clamp_byte).collect()),
        VolumeFormat::R16Float => VolumeTexels::R16F(values.map(f16::from_f32).collect()),
        VolumeFormat::R32Float => VolumeTexels::R32F(values.collect()),
    }
}

/// NaN maps to 0.
#[inline]
fn clamp_byte(x: f32) -> u8 {
    if x.is_nan() { 0 } else { x.round().clamp(0.0, 255.0) as u8 }
}

/// Converts a weight channel (values in [0, 1]) to texture storage.
pub fn convert_weights(weights: &[f32], format: VolumeFormat) -> VolumeTexels {
    match format {
        VolumeFormat::R8Unorm => VolumeTexels::R8(weights.par_iter().map(|&w| clamp_byte(w * 255.0)).collect()),
        VolumeFormat::R16Float => VolumeTexels::R16F(weights.par_iter().map(|&w| f16::from_f32(w)).collect()),
        VolumeFormat::R32Float => VolumeTexels::R32F(weights.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CpuBackend, TextureCaps};
    use approx::assert_relative_eq;
    use vrdf_core::{TfEntry, TransferFunction, VolumeMetadata};

    fn volume(weights: bool) -> VolumeData {
        let tf = TransferFunction::labelmap(vec![TfEntry::new(1, [1.0, 0.0, 0.0], 1.0)]);
        let v = VolumeData::new(
            VolumeMetadata::new([4, 4, 4]),
            tf,
            VoxelBuffer::U8((0..64).map(|i| (i % 3) as u8).collect()),
        );
        if weights { v.with_weights(vec![0.5; 64]) } else { v }
    }

    #[test]
    fn test_build_all_textures() {
        let backend = CpuBackend::new();
        let v = volume(true);
        let luts = LutPair::build(&v.transfer_function);
        let gpu = TextureBuilder::new(&backend).build(&v, &luts).unwrap();

        assert_eq!(gpu.format, VolumeFormat::R32Float);
        assert_eq!(backend.stats().live_textures, 4);
        let (dim, texels) = backend.read_volume(gpu.label).unwrap();
        assert_eq!(dim, [4, 4, 4]);
        assert_eq!(texels.sample(2), Some(2.0));
        assert_eq!(backend.read_table(gpu.hard_lut).unwrap()[1], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(backend.table_filter(gpu.soft_lut), Some(LutFilter::Linear));

        gpu.release(&backend);
        assert_eq!(backend.stats().live_textures, 0);
    }

    #[test]
    fn test_no_weight_texture_without_weights() {
        let backend = CpuBackend::new();
        let v = volume(false);
        let gpu = TextureBuilder::new(&backend)
            .build(&v, &LutPair::build(&v.transfer_function))
            .unwrap();
        assert!(gpu.weight.is_none());
        assert_eq!(gpu.ids().len(), 3);
    }

    #[test]
    fn test_corrupt_volume_allocates_nothing() {
        let backend = CpuBackend::new();
        let mut v = volume(false);
        v.labels = VoxelBuffer::U8(vec![0; 63]);
        let err = TextureBuilder::new(&backend)
            .build(&v, &LutPair::build(&v.transfer_function))
            .unwrap_err();
        assert!(matches!(err, GpuError::CorruptVolume { expected: 64, actual: 63, .. }));
        assert_eq!(backend.stats().created, 0);
    }

    #[test]
    fn test_rollback_on_exhaustion() {
        // Room for the 256-byte label volume but not the weights.
        let backend = CpuBackend::new().with_budget(300);
        let v = volume(true);
        let err = TextureBuilder::new(&backend)
            .build(&v, &LutPair::build(&v.transfer_function))
            .unwrap_err();
        assert!(matches!(err, GpuError::ResourceExhaustion(_)));
        let stats = backend.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.live_textures, 0);
        assert_eq!(stats.live_bytes, 0);
    }

    #[test]
    fn test_constrained_target_uses_r8() {
        let backend = CpuBackend::with_caps(TextureCaps::constrained());
        let v = volume(true);
        let gpu = TextureBuilder::new(&backend)
            .build(&v, &LutPair::build(&v.transfer_function))
            .unwrap();
        assert_eq!(gpu.format, VolumeFormat::R8Unorm);
        let (_, weights) = backend.read_volume(gpu.weight.unwrap()).unwrap();
        assert_eq!(weights, VolumeTexels::R8(vec![128; 64]));
    }

    #[test]
    fn test_convert_labels() {
        let wide = VoxelBuffer::U16(vec![0, 300, 1024]);
        assert_eq!(
            convert_labels(&wide, VolumeFormat::R8Unorm),
            VolumeTexels::R8(vec![0, 255, 255])
        );
        let half = convert_labels(&wide, VolumeFormat::R16Float);
        assert_relative_eq!(half.sample(2).unwrap(), 1024.0);

        let floats = VoxelBuffer::F32(vec![f32::NAN, 2.6]);
        assert_eq!(convert_labels(&floats, VolumeFormat::R8Unorm), VolumeTexels::R8(vec![0, 3]));
    }

    #[test]
    fn test_placeholder() {
        let backend = CpuBackend::new();
        let id = TextureBuilder::new(&backend).placeholder().unwrap();
        let (dim, texels) = backend.read_volume(id).unwrap();
        assert_eq!(dim, [1, 1, 1]);
        assert_eq!(texels.sample(0), Some(0.0));
    }
}
