//! Volume metadata: grid size, voxel spacing and voxel-to-world transform.
//!
//! The affine is stored row-major, exactly as it appears in the file header.
//! [`VolumeMetadata::affine_matrix`] converts it to a column-major [`glam::Mat4`].

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::{TfKind, VolumeError, VolumeResult};

/// Millimeters to meters.
pub const MM_TO_M: f32 = 0.001;

/// Default voxel spacing in millimeters.
pub const DEFAULT_SPACING_MM: [f32; 3] = [1.0, 1.0, 1.0];

/// Row-major identity.
pub const IDENTITY_AFFINE: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Intensity window used when the transfer function does not need one.
pub const UNIT_WINDOW: [f32; 2] = [0.0, 1.0];

fn default_spacing() -> [f32; 3] {
    DEFAULT_SPACING_MM
}

fn default_affine() -> [[f32; 4]; 4] {
    IDENTITY_AFFINE
}

/// Spatial description of a voxel grid.
///
/// # Example
///
/// ```rust
/// use vrdf_core::VolumeMetadata;
///
/// let meta = VolumeMetadata::new([100, 100, 50]).with_spacing([1.0, 1.0, 2.0]);
/// let size = meta.physical_size_m();
/// assert!((size.z - 0.1).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetadata {
    /// Voxel counts per axis (x, y, z).
    pub dim: [u32; 3],
    /// Voxel size in millimeters.
    #[serde(default = "default_spacing")]
    pub spacing_mm: [f32; 3],
    /// Voxel-to-world transform, row-major.
    #[serde(default = "default_affine")]
    pub affine: [[f32; 4]; 4],
    /// Display window (low, high) for continuous transfer functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_range: Option<[f32; 2]>,
}

impl VolumeMetadata {
    /// Creates metadata with default spacing and identity affine.
    pub fn new(dim: [u32; 3]) -> Self {
        Self {
            dim,
            spacing_mm: DEFAULT_SPACING_MM,
            affine: IDENTITY_AFFINE,
            intensity_range: None,
        }
    }

    /// Sets voxel spacing in millimeters.
    pub fn with_spacing(mut self, spacing_mm: [f32; 3]) -> Self {
        self.spacing_mm = spacing_mm;
        self
    }

    /// Sets the row-major voxel-to-world transform.
    pub fn with_affine(mut self, affine: [[f32; 4]; 4]) -> Self {
        self.affine = affine;
        self
    }

    /// Sets the intensity window.
    pub fn with_intensity_range(mut self, lo: f32, hi: f32) -> Self {
        self.intensity_range = Some([lo, hi]);
        self
    }

    /// Total number of voxels (`x * y * z`), saturating at `usize::MAX`.
    ///
    /// Headers that passed [`validate`](Self::validate) never saturate.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.checked_voxel_count().unwrap_or(usize::MAX)
    }

    /// Total number of voxels, or `None` if it does not fit in `usize`.
    pub fn checked_voxel_count(&self) -> Option<usize> {
        self.dim
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
    }

    /// Checks the structural invariants of the header.
    ///
    /// Dimensions must be strictly positive with a voxel count that fits in
    /// `usize`, spacing finite and positive.
    pub fn validate(&self) -> VolumeResult<()> {
        if self.dim.iter().any(|&d| d == 0) {
            return Err(VolumeError::malformed(format!(
                "dimensions must be positive, got {}x{}x{}",
                self.dim[0], self.dim[1], self.dim[2]
            )));
        }
        if self.checked_voxel_count().is_none() {
            return Err(VolumeError::malformed(format!(
                "dimensions overflow: {}",
                self.dim_string()
            )));
        }
        if self.spacing_mm.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::malformed(format!(
                "invalid voxel spacing {:?}",
                self.spacing_mm
            )));
        }
        if self.affine.iter().flatten().any(|v| !v.is_finite()) {
            return Err(VolumeError::malformed("affine contains non-finite values"));
        }
        Ok(())
    }

    /// Voxel-to-world matrix.
    pub fn affine_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.affine).transpose()
    }

    /// World-to-voxel matrix.
    ///
    /// A singular affine yields identity.
    pub fn inverse_affine(&self) -> Mat4 {
        let m = self.affine_matrix();
        if m.determinant().abs() <= f32::EPSILON {
            Mat4::IDENTITY
        } else {
            m.inverse()
        }
    }

    /// Physical extent of the grid in meters (`dim * spacing_mm * 0.001`).
    pub fn physical_size_m(&self) -> Vec3 {
        Vec3::new(
            self.dim[0] as f32 * self.spacing_mm[0] * MM_TO_M,
            self.dim[1] as f32 * self.spacing_mm[1] * MM_TO_M,
            self.dim[2] as f32 * self.spacing_mm[2] * MM_TO_M,
        )
    }

    /// Intensity window pushed to the shader.
    ///
    /// Only continuous transfer functions use the stored range; everything
    /// else gets `(0, 1)`.
    pub fn intensity_window(&self, kind: TfKind) -> [f32; 2] {
        match (kind, self.intensity_range) {
            (TfKind::Continuous, Some(range)) => range,
            _ => UNIT_WINDOW,
        }
    }

    /// `XxYxZ` string for logs.
    pub fn dim_string(&self) -> String {
        format!("{}x{}x{}", self.dim[0], self.dim[1], self.dim[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_physical_size() {
        let meta = VolumeMetadata::new([100, 100, 50]).with_spacing([1.0, 1.0, 2.0]);
        let size = meta.physical_size_m();
        assert_relative_eq!(size.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(size.y, 0.1, epsilon = 1e-6);
        assert_relative_eq!(size.z, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_defaults_from_json() {
        let meta: VolumeMetadata = serde_json::from_str(r#"{"dim": [4, 5, 6]}"#).unwrap();
        assert_eq!(meta.spacing_mm, DEFAULT_SPACING_MM);
        assert_eq!(meta.affine, IDENTITY_AFFINE);
        assert!(meta.intensity_range.is_none());
        assert_eq!(meta.voxel_count(), 120);
    }

    #[test]
    fn test_zero_dim_rejected() {
        let meta = VolumeMetadata::new([4, 0, 6]);
        assert!(matches!(meta.validate(), Err(VolumeError::MalformedContainer(_))));
    }

    #[test]
    fn test_dim_overflow_rejected() {
        let meta = VolumeMetadata::new([u32::MAX; 3]);
        assert_eq!(meta.checked_voxel_count(), None);
        assert_eq!(meta.voxel_count(), usize::MAX);
        assert!(matches!(meta.validate(), Err(VolumeError::MalformedContainer(_))));
    }

    #[test]
    fn test_affine_row_major() {
        let mut affine = IDENTITY_AFFINE;
        affine[0][3] = 10.0;
        affine[1][1] = 2.0;
        let meta = VolumeMetadata::new([1, 1, 1]).with_affine(affine);

        let world = meta.affine_matrix().transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(world.x, 11.0);
        assert_relative_eq!(world.y, 2.0);

        let back = meta.inverse_affine().transform_point3(world);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(back.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_singular_affine_inverse_is_identity() {
        let meta = VolumeMetadata::new([1, 1, 1]).with_affine([[0.0; 4]; 4]);
        assert_eq!(meta.inverse_affine(), Mat4::IDENTITY);
    }

    #[test]
    fn test_intensity_window() {
        let meta = VolumeMetadata::new([1, 1, 1]).with_intensity_range(-100.0, 900.0);
        assert_eq!(meta.intensity_window(TfKind::Continuous), [-100.0, 900.0]);
        assert_eq!(meta.intensity_window(TfKind::Labelmap), UNIT_WINDOW);
    }
}
