//! Per-label visibility, opacity and tint.
//!
//! [`LabelControl`] mirrors the 256×1 control texture the shader multiplies
//! into each sample: RGB is a tint, alpha a visibility/opacity factor. Every
//! mutation records the smallest texel range that changed so callers upload
//! only that span.

use std::ops::Range;

use vrdf_core::LABEL_COUNT;

/// Default control texel: visible, untinted.
pub const CONTROL_DEFAULT: [f32; 4] = [1.0; 4];

/// Changed texels to upload, starting at `offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct TexelSpan {
    /// First texel index.
    pub offset: usize,
    /// Texel values.
    pub texels: Vec<[f32; 4]>,
}

/// Host copy of the label control texture.
#[derive(Debug, Clone)]
pub struct LabelControl {
    texels: [[f32; 4]; LABEL_COUNT],
    dirty: Option<Range<usize>>,
}

impl Default for LabelControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps into [0, 1], mapping NaN to 0.
#[inline]
fn unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl LabelControl {
    /// All labels visible with no tint. Starts clean.
    pub fn new() -> Self {
        Self {
            texels: [CONTROL_DEFAULT; LABEL_COUNT],
            dirty: None,
        }
    }

    /// All texels.
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Control texel for a label.
    #[inline]
    pub fn get(&self, index: u8) -> [f32; 4] {
        self.texels[index as usize]
    }

    /// Opacity factor for a label.
    #[inline]
    pub fn alpha(&self, index: u8) -> f32 {
        self.texels[index as usize][3]
    }

    /// Shows or hides one label.
    pub fn set_visible(&mut self, index: u8, visible: bool) {
        self.set_alpha(index, if visible { 1.0 } else { 0.0 });
    }

    /// Sets one label's opacity, clamped to [0, 1] (NaN becomes 0).
    pub fn set_opacity(&mut self, index: u8, opacity: f32) {
        self.set_alpha(index, unit(opacity));
    }

    /// Sets one label's tint as given, so HDR values above 1 survive.
    /// Non-finite channels become 0. Alpha is untouched.
    pub fn set_tint(&mut self, index: u8, rgb: [f32; 3]) {
        let i = index as usize;
        let [r, g, b] = rgb.map(|v| if v.is_finite() { v } else { 0.0 });
        let next = [r, g, b, self.texels[i][3]];
        self.write(i, next);
    }

    /// Hides every label except `index`. Tints are kept.
    pub fn solo(&mut self, index: u8) {
        for i in 0..LABEL_COUNT {
            let mut next = self.texels[i];
            next[3] = if i == index as usize { 1.0 } else { 0.0 };
            self.write(i, next);
        }
    }

    /// Resets every label to visible and untinted.
    pub fn show_all(&mut self) {
        for i in 0..LABEL_COUNT {
            self.write(i, CONTROL_DEFAULT);
        }
    }

    /// True when texels changed since the last [`Self::take_dirty`].
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Pending dirty range without clearing it.
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Returns the changed span and marks the table clean.
    pub fn take_dirty(&mut self) -> Option<TexelSpan> {
        let range = self.dirty.take()?;
        Some(TexelSpan {
            offset: range.start,
            texels: self.texels[range].to_vec(),
        })
    }

    fn set_alpha(&mut self, index: u8, alpha: f32) {
        let i = index as usize;
        let mut next = self.texels[i];
        next[3] = alpha;
        self.write(i, next);
    }

    fn write(&mut self, i: usize, value: [f32; 4]) {
        if self.texels[i] == value {
            return;
        }
        self.texels[i] = value;
        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(i)..r.end.max(i + 1),
            None => i..i + 1,
        });
    }
}
