//! Render material interface.
//!
//! The controller never talks to a renderer directly. It pushes named
//! parameters into a [`MaterialSink`]; the host application forwards them
//! to whatever shader system it uses.

use glam::{Mat4, Quat, Vec3, Vec4};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use vrdf_gpu::TextureId;

/// 3D label texture.
pub const TEX_LABELS: &str = "_VolumeTexLabels";
/// 3D weight texture (placeholder when absent).
pub const TEX_WEIGHTS: &str = "_VolumeTexWeights";
/// Active transfer-function LUT.
pub const TEX_TF: &str = "_TFTex";
/// Per-label control table.
pub const TEX_LABEL_CTRL: &str = "_LabelCtrlTex";
/// Voxel-to-world matrix.
pub const MAT_AFFINE: &str = "_Affine";
/// World-to-voxel matrix.
pub const MAT_INV_AFFINE: &str = "_InvAffine";
/// Grid size `(x, y, z, 1)`.
pub const VEC_DIM: &str = "_Dim";
/// Per-axis scale compensation.
pub const VEC_SCALE_COMP: &str = "_ScaleComp";
/// Intensity window low.
pub const FLOAT_P1: &str = "_P1";
/// Intensity window high.
pub const FLOAT_P99: &str = "_P99";
/// Step density compensation.
pub const FLOAT_DENSITY_COMP: &str = "_DensityComp";
/// 1 when a weight texture is bound.
pub const INT_HAS_WEIGHTS: &str = "_HasWeights";
/// 1 for labelmap transfer functions.
pub const INT_IS_LABEL_MAP: &str = "_IsLabelMap";
/// Debug keyword: labels.
pub const KW_DEBUG_LABELS: &str = "_DEBUG_MODE_LABELS";
/// Debug keyword: weights.
pub const KW_DEBUG_WEIGHTS: &str = "_DEBUG_MODE_WEIGHTS";
/// Debug keyword: UVW.
pub const KW_DEBUG_UVW: &str = "_DEBUG_MODE_UVW";

/// All debug keywords.
pub const DEBUG_KEYWORDS: [&str; 3] = [KW_DEBUG_LABELS, KW_DEBUG_WEIGHTS, KW_DEBUG_UVW];

/// Receives render parameters from the controller.
pub trait MaterialSink {
    /// Switches to the named shader. Returns false if it does not exist.
    fn select_shader(&mut self, name: &str) -> bool;

    /// Binds a texture slot.
    fn set_texture(&mut self, slot: &'static str, texture: TextureId);

    /// Sets a matrix parameter.
    fn set_matrix(&mut self, slot: &'static str, value: Mat4);

    /// Sets a vector parameter.
    fn set_vector(&mut self, slot: &'static str, value: Vec4);

    /// Sets a float parameter.
    fn set_float(&mut self, slot: &'static str, value: f32);

    /// Sets an integer parameter.
    fn set_int(&mut self, slot: &'static str, value: i32);

    /// Enables or disables a shader keyword.
    fn set_keyword(&mut self, keyword: &'static str, enabled: bool);

    /// Places the volume object: local scale in meters and rotation.
    fn set_object_transform(&mut self, scale: Vec3, rotation: Quat);
}

/// Host-side material that records everything it receives.
///
/// Used for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingMaterial {
    /// Active shader.
    pub shader: Option<String>,
    /// Bound textures.
    pub textures: BTreeMap<&'static str, TextureId>,
    /// Matrix parameters.
    pub matrices: BTreeMap<&'static str, Mat4>,
    /// Vector parameters.
    pub vectors: BTreeMap<&'static str, Vec4>,
    /// Float parameters.
    pub floats: BTreeMap<&'static str, f32>,
    /// Integer parameters.
    pub ints: BTreeMap<&'static str, i32>,
    /// Enabled keywords.
    pub keywords: BTreeSet<&'static str>,
    /// Last object transform.
    pub transform: Option<(Vec3, Quat)>,
    writes: BTreeMap<&'static str, usize>,
    missing_shaders: HashSet<String>,
}

impl RecordingMaterial {
    /// Material where every shader exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a shader as unavailable.
    pub fn without_shader(mut self, name: impl Into<String>) -> Self {
        self.missing_shaders.insert(name.into());
        self
    }

    /// How many times a slot was written.
    pub fn writes(&self, slot: &str) -> usize {
        self.writes.get(slot).copied().unwrap_or(0)
    }

    fn count(&mut self, slot: &'static str) {
        *self.writes.entry(slot).or_default() += 1;
    }
}

impl MaterialSink for RecordingMaterial {
    fn select_shader(&mut self, name: &str) -> bool {
        if self.missing_shaders.contains(name) {
            return false;
        }
        self.shader = Some(name.to_string());
        true
    }

    fn set_texture(&mut self, slot: &'static str, texture: TextureId) {
        self.count(slot);
        self.textures.insert(slot, texture);
    }

    fn set_matrix(&mut self, slot: &'static str, value: Mat4) {
        self.count(slot);
        self.matrices.insert(slot, value);
    }

    fn set_vector(&mut self, slot: &'static str, value: Vec4) {
        self.count(slot);
        self.vectors.insert(slot, value);
    }

    fn set_float(&mut self, slot: &'static str, value: f32) {
        self.count(slot);
        self.floats.insert(slot, value);
    }

    fn set_int(&mut self, slot: &'static str, value: i32) {
        self.count(slot);
        self.ints.insert(slot, value);
    }

    fn set_keyword(&mut self, keyword: &'static str, enabled: bool) {
        if enabled {
            self.keywords.insert(keyword);
        } else {
            self.keywords.remove(keyword);
        }
    }

    fn set_object_transform(&mut self, scale: Vec3, rotation: Quat) {
        self.transform = Some((scale, rotation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_shader() {
        let mut m = RecordingMaterial::new().without_shader("Custom/VolumeDVR_URP");
        assert!(!m.select_shader("Custom/VolumeDVR_URP"));
        assert!(m.shader.is_none());
        assert!(m.select_shader("Volume/VolumeDVR_URP_Quest"));
    }

    #[test]
    fn test_write_counts() {
        let mut m = RecordingMaterial::new();
        m.set_float(FLOAT_P1, 0.0);
        m.set_float(FLOAT_P1, 0.5);
        assert_eq!(m.writes(FLOAT_P1), 2);
        assert_eq!(m.floats[FLOAT_P1], 0.5);
        assert_eq!(m.writes(FLOAT_P99), 0);
    }

    #[test]
    fn test_keywords() {
        let mut m = RecordingMaterial::new();
        m.set_keyword(KW_DEBUG_UVW, true);
        m.set_keyword(KW_DEBUG_UVW, false);
        assert!(m.keywords.is_empty());
    }
}
