//! Transfer-function lookup tables.
//!
//! Every load produces two 256×1 RGBA tables from the same transfer function:
//!
//! | Kind        | Hard (nearest)                    | Soft (linear)                      |
//! |-------------|-----------------------------------|------------------------------------|
//! | labelmap    | entry color at its label index    | same texels, sampled linearly      |
//! | continuous  | step function over control points | piecewise-linear ramp              |
//!
//! For continuous functions texels below the first control point are
//! transparent and texels above the last one hold the last point.

use vrdf_core::{TfEntry, TransferFunction, LABEL_COUNT};

use crate::{LutError, LutResult};

/// Width of a transfer-function LUT.
pub const LUT_WIDTH: usize = LABEL_COUNT;

/// Fully transparent black.
pub const TRANSPARENT: [f32; 4] = [0.0; 4];

/// Sampler filter the LUT is meant to be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LutFilter {
    /// Point sampling.
    Nearest,
    /// Bilinear sampling.
    Linear,
}

/// One 256×1 RGBA lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct TfLut {
    texels: Vec<[f32; 4]>,
    filter: LutFilter,
}

impl TfLut {
    /// Hard-edged table (nearest sampling, step function for continuous TFs).
    pub fn hard(tf: &TransferFunction) -> Self {
        let texels = if tf.is_labelmap() {
            scatter(&tf.entries)
        } else {
            step(&sorted_points(&tf.entries))
        };
        Self {
            texels,
            filter: LutFilter::Nearest,
        }
    }

    /// Smooth table (linear sampling, ramp for continuous TFs).
    pub fn soft(tf: &TransferFunction) -> Self {
        let texels = if tf.is_labelmap() {
            scatter(&tf.entries)
        } else {
            ramp(&sorted_points(&tf.entries))
        };
        Self {
            texels,
            filter: LutFilter::Linear,
        }
    }

    /// Wraps precomputed texels. Tables shorter than [`LUT_WIDTH`] are allowed.
    pub fn from_texels(texels: Vec<[f32; 4]>, filter: LutFilter) -> LutResult<Self> {
        if texels.is_empty() || texels.len() > LUT_WIDTH {
            return Err(LutError::InvalidSize(format!(
                "expected 1..={LUT_WIDTH} texels, got {}",
                texels.len()
            )));
        }
        if let Some(i) = texels.iter().position(|t| t.iter().any(|v| !v.is_finite())) {
            return Err(LutError::NonFinite(i));
        }
        Ok(Self { texels, filter })
    }

    /// Texel at a label index.
    #[inline]
    pub fn texel(&self, index: u8) -> Option<[f32; 4]> {
        self.texels.get(index as usize).copied()
    }

    /// All texels.
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Texel count.
    pub fn len(&self) -> usize {
        self.texels.len()
    }

    /// Always false for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    /// Intended sampler filter.
    pub fn filter(&self) -> LutFilter {
        self.filter
    }
}

fn scatter(entries: &[TfEntry]) -> Vec<[f32; 4]> {
    let mut texels = vec![TRANSPARENT; LUT_WIDTH];
    for e in entries {
        texels[e.label as usize] = e.rgba();
    }
    texels
}

fn sorted_points(entries: &[TfEntry]) -> Vec<(usize, [f32; 4])> {
    let mut points: Vec<_> = entries.iter().map(|e| (e.label as usize, e.rgba())).collect();
    points.sort_by_key(|(pos, _)| *pos);
    points
}

fn step(points: &[(usize, [f32; 4])]) -> Vec<[f32; 4]> {
    (0..LUT_WIDTH)
        .map(|i| {
            points
                .iter()
                .rev()
                .find(|(pos, _)| *pos <= i)
                .map_or(TRANSPARENT, |(_, c)| *c)
        })
        .collect()
}

fn ramp(points: &[(usize, [f32; 4])]) -> Vec<[f32; 4]> {
    let mut texels = vec![TRANSPARENT; LUT_WIDTH];
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return texels;
    };
    for (i, texel) in texels.iter_mut().enumerate() {
        if i < first.0 {
            continue;
        }
        if i >= last.0 {
            *texel = last.1;
            continue;
        }
        // Bracketing pair: a.pos <= i < b.pos
        let Some(w) = points.windows(2).find(|w| w[0].0 <= i && i < w[1].0) else {
            continue;
        };
        let (a, b) = (w[0], w[1]);
        let t = (i - a.0) as f32 / (b.0 - a.0) as f32;
        for c in 0..4 {
            texel[c] = a.1[c] + (b.1[c] - a.1[c]) * t;
        }
    }
    texels
}

/// Hard and soft tables built from one transfer function.
#[derive(Debug, Clone, PartialEq)]
pub struct LutPair {
    /// Nearest-sampled table.
    pub hard: TfLut,
    /// Linearly-sampled table.
    pub soft: TfLut,
}

impl LutPair {
    /// Builds both tables.
    pub fn build(tf: &TransferFunction) -> Self {
        Self {
            hard: TfLut::hard(tf),
            soft: TfLut::soft(tf),
        }
    }

    /// Table for the given mode.
    pub fn active(&self, hard: bool) -> &TfLut {
        if hard { &self.hard } else { &self.soft }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labelmap() -> TransferFunction {
        TransferFunction::labelmap(vec![
            TfEntry::new(1, [1.0, 0.0, 0.0], 1.0),
            TfEntry::new(4, [0.0, 0.0, 1.0], 0.5),
        ])
    }

    #[test]
    fn test_labelmap_verbatim() {
        let pair = LutPair::build(&labelmap());
        for lut in [&pair.hard, &pair.soft] {
            assert_eq!(lut.len(), LUT_WIDTH);
            assert_eq!(lut.texel(0), Some(TRANSPARENT));
            assert_eq!(lut.texel(1), Some([1.0, 0.0, 0.0, 1.0]));
            assert_eq!(lut.texel(2), Some(TRANSPARENT));
            assert_eq!(lut.texel(4), Some([0.0, 0.0, 1.0, 0.5]));
        }
        assert_eq!(pair.hard.filter(), LutFilter::Nearest);
        assert_eq!(pair.soft.filter(), LutFilter::Linear);
        assert_eq!(pair.active(true).filter(), LutFilter::Nearest);
    }

    fn continuous() -> TransferFunction {
        TransferFunction::continuous(vec![
            TfEntry::new(200, [1.0, 1.0, 1.0], 1.0),
            TfEntry::new(100, [0.0, 0.0, 0.0], 0.0),
        ])
    }

    #[test]
    fn test_continuous_step() {
        let lut = TfLut::hard(&continuous());
        assert_eq!(lut.texel(99), Some(TRANSPARENT));
        assert_eq!(lut.texel(150), Some([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(lut.texel(199), Some([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(lut.texel(200), Some([1.0; 4]));
        assert_eq!(lut.texel(255), Some([1.0; 4]));
    }

    #[test]
    fn test_continuous_ramp() {
        let lut = TfLut::soft(&continuous());
        assert_eq!(lut.texel(50), Some(TRANSPARENT));
        let mid = lut.texel(150).unwrap();
        assert_relative_eq!(mid[0], 0.5);
        assert_relative_eq!(mid[3], 0.5);
        assert_eq!(lut.texel(255), Some([1.0; 4]));
    }

    #[test]
    fn test_empty_tf_is_transparent() {
        let pair = LutPair::build(&TransferFunction::continuous(Vec::new()));
        assert!(pair.soft.texels().iter().all(|t| *t == TRANSPARENT));
        assert!(pair.hard.texels().iter().all(|t| *t == TRANSPARENT));
    }

    #[test]
    fn test_from_texels_bounds() {
        assert!(TfLut::from_texels(Vec::new(), LutFilter::Linear).is_err());
        assert!(TfLut::from_texels(vec![[0.0; 4]; 300], LutFilter::Linear).is_err());
        assert!(matches!(
            TfLut::from_texels(vec![[0.0, f32::NAN, 0.0, 0.0]], LutFilter::Linear),
            Err(LutError::NonFinite(0))
        ));
        let short = TfLut::from_texels(vec![[1.0; 4]; 8], LutFilter::Nearest).unwrap();
        assert_eq!(short.texel(7), Some([1.0; 4]));
        assert_eq!(short.texel(8), None);
    }
}
