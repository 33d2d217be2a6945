//! Physical sizing of the volume object and host-scale compensation.

use glam::{Quat, Vec3};

use vrdf_core::VolumeMetadata;

/// Fixed rotation about X applied to every volume, in degrees.
pub const FIT_ROTATION_X_DEG: f32 = -90.0;

/// Lower bound on a scale axis before inversion.
pub const SCALE_EPSILON: f32 = 1e-4;

/// Host scale changes smaller than this are ignored.
pub const SCALE_TOLERANCE: f32 = 1e-5;

/// Local transform of the volume object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeTransform {
    /// Extent in meters.
    pub scale: Vec3,
    /// Orientation.
    pub rotation: Quat,
}

impl VolumeTransform {
    /// `dim * spacing_mm * 0.001` with the fixed X rotation.
    pub fn fit(meta: &VolumeMetadata) -> Self {
        Self {
            scale: meta.physical_size_m(),
            rotation: Quat::from_rotation_x(FIT_ROTATION_X_DEG.to_radians()),
        }
    }
}

/// Shader factors that undo a non-unit host scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensation {
    /// `1 / max(s_i, ε)` per axis.
    pub per_axis: Vec3,
    /// `1 / max(max(s), ε)`.
    pub density: f32,
}

impl Compensation {
    /// Factors for a world scale.
    pub fn for_scale(scale: Vec3) -> Self {
        let clamped = scale.max(Vec3::splat(SCALE_EPSILON));
        Self {
            per_axis: clamped.recip(),
            density: 1.0 / scale.max_element().max(SCALE_EPSILON),
        }
    }
}

/// Tracks the last observed host scale.
#[derive(Debug, Clone, Default)]
pub struct ScaleCompensation {
    last: Option<Vec3>,
}

impl ScaleCompensation {
    /// Returns new factors when `scale` moved beyond [`SCALE_TOLERANCE`].
    pub fn observe(&mut self, scale: Vec3) -> Option<Compensation> {
        if self.last.is_some_and(|last| last.abs_diff_eq(scale, SCALE_TOLERANCE)) {
            return None;
        }
        self.last = Some(scale);
        Some(Compensation::for_scale(scale))
    }

    /// Forgets the last scale so the next observation pushes again.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_scale() {
        let meta = VolumeMetadata::new([100, 100, 50]).with_spacing([1.0, 1.0, 2.0]);
        let t = VolumeTransform::fit(&meta);
        assert_relative_eq!(t.scale.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(t.scale.y, 0.1, epsilon = 1e-6);
        assert_relative_eq!(t.scale.z, 0.1, epsilon = 1e-6);

        // -90° about X maps +Y to -Z.
        let y = t.rotation * Vec3::Y;
        assert_relative_eq!(y.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_compensation() {
        let c = Compensation::for_scale(Vec3::new(2.0, 0.5, 0.0));
        assert_relative_eq!(c.per_axis.x, 0.5);
        assert_relative_eq!(c.per_axis.y, 2.0);
        assert_relative_eq!(c.per_axis.z, 1.0 / SCALE_EPSILON);
        assert_relative_eq!(c.density, 0.5);
    }

    #[test]
    fn test_observe_only_on_change() {
        let mut sc = ScaleCompensation::default();
        assert!(sc.observe(Vec3::ONE).is_some());
        assert!(sc.observe(Vec3::ONE).is_none());
        assert!(sc.observe(Vec3::new(1.0, 1.0, 1.000_001)).is_none());
        assert!(sc.observe(Vec3::splat(2.0)).is_some());
        sc.reset();
        assert!(sc.observe(Vec3::splat(2.0)).is_some());
    }
}
