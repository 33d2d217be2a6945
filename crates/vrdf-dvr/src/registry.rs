//! Addressable labels of the loaded volume.

use vrdf_core::{generic_label_name, TransferFunction};
use vrdf_lut::TfLut;

/// Alpha above which a label counts as visible by default.
pub const VISIBLE_ALPHA: f32 = 0.001;

/// One label the UI can list and address.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    /// Label index (0..=255).
    pub index: u8,
    /// Entry name or `Label {index}`.
    pub display_name: String,
    /// RGBA from the active LUT.
    pub color: [f32; 4],
    /// True when the LUT alpha exceeds [`VISIBLE_ALPHA`].
    pub default_visible: bool,
}

/// Ordered label list rebuilt on every load and LUT switch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelRegistry {
    labels: Vec<LabelInfo>,
}

impl LabelRegistry {
    /// Builds the registry.
    ///
    /// With explicit entries: one label per entry, in entry order, colored
    /// from `lut` (or the entry itself when the LUT is missing or too short).
    /// Without entries: one generic label per LUT texel with visible alpha.
    pub fn rebuild(tf: &TransferFunction, lut: Option<&TfLut>) -> Self {
        let labels = if tf.entries.is_empty() {
            lut.map(scan_lut).unwrap_or_default()
        } else {
            tf.entries
                .iter()
                .map(|entry| {
                    let color = lut.and_then(|l| l.texel(entry.label)).unwrap_or_else(|| entry.rgba());
                    LabelInfo {
                        index: entry.label,
                        display_name: entry.display_name(),
                        color,
                        default_visible: color[3] > VISIBLE_ALPHA,
                    }
                })
                .collect()
        };
        Self { labels }
    }

    /// Labels in display order.
    pub fn labels(&self) -> &[LabelInfo] {
        &self.labels
    }

    /// Label by index.
    pub fn get(&self, index: u8) -> Option<&LabelInfo> {
        self.labels.iter().find(|l| l.index == index)
    }

    /// Label by display name, case-insensitive.
    pub fn find_by_name(&self, name: &str) -> Option<&LabelInfo> {
        let name = name.trim();
        self.labels.iter().find(|l| l.display_name.eq_ignore_ascii_case(name))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no label is addressable.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates labels in order.
    pub fn iter(&self) -> std::slice::Iter<'_, LabelInfo> {
        self.labels.iter()
    }
}

fn scan_lut(lut: &TfLut) -> Vec<LabelInfo> {
    lut.texels()
        .iter()
        .enumerate()
        .filter(|(_, t)| t[3] > VISIBLE_ALPHA)
        .map(|(i, t)| LabelInfo {
            index: i as u8,
            display_name: generic_label_name(i as u8),
            color: *t,
            default_visible: true,
        })
        .collect()
}

impl<'a> IntoIterator for &'a LabelRegistry {
    type Item = &'a LabelInfo;
    type IntoIter = std::slice::Iter<'a, LabelInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}
