//! Transfer-function definitions.
//!
//! A transfer function maps voxel values to display color and opacity.
//! Two kinds exist:
//!
//! - [`TfKind::Labelmap`] - one color per integer label 0..=255
//! - [`TfKind::Continuous`] - entries are control points on a ramp over
//!   normalized intensity (`label / 255`)
//!
//! The same entries also name the anatomical structures listed in the UI.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::{VolumeError, VolumeResult};

/// Number of addressable labels.
pub const LABEL_COUNT: usize = 256;

/// Transfer-function kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TfKind {
    /// Discrete class index per voxel.
    #[default]
    Labelmap,
    /// Interpolated intensity per voxel.
    Continuous,
}

impl TfKind {
    /// Name as written in the file header.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Labelmap => "labelmap",
            Self::Continuous => "continuous",
        }
    }
}

/// Labels may be written as floats; they are rounded to the nearest integer.
fn de_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    let rounded = raw.round();
    if !(0.0..=255.0).contains(&rounded) {
        return Err(serde::de::Error::custom(format!(
            "label {raw} outside 0..=255"
        )));
    }
    Ok(rounded as u8)
}

/// One transfer-function entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfEntry {
    /// Label index (or control point position for continuous TFs).
    #[serde(deserialize_with = "de_label")]
    pub label: u8,
    /// Display name ("Tumor", "Edema", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Linear RGB in [0, 1].
    pub color: [f32; 3],
    /// Opacity in [0, 1].
    pub alpha: f32,
}

impl TfEntry {
    /// Creates an unnamed entry.
    pub fn new(label: u8, color: [f32; 3], alpha: f32) -> Self {
        Self {
            label,
            name: None,
            color,
            alpha,
        }
    }

    /// Sets the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Color with alpha appended.
    #[inline]
    pub fn rgba(&self) -> [f32; 4] {
        [self.color[0], self.color[1], self.color[2], self.alpha]
    }

    /// Entry name, or `Label {n}` when unnamed or blank.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => generic_label_name(self.label),
        }
    }
}

/// Generic display name for an unnamed label.
pub fn generic_label_name(label: u8) -> String {
    format!("Label {label}")
}

/// A transfer function: kind plus ordered entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferFunction {
    /// Labelmap or continuous.
    #[serde(rename = "type")]
    pub kind: TfKind,
    /// Entries in file order.
    #[serde(default)]
    pub entries: Vec<TfEntry>,
}

impl TransferFunction {
    /// Labelmap transfer function.
    pub fn labelmap(entries: Vec<TfEntry>) -> Self {
        Self {
            kind: TfKind::Labelmap,
            entries,
        }
    }

    /// Continuous transfer function.
    pub fn continuous(entries: Vec<TfEntry>) -> Self {
        Self {
            kind: TfKind::Continuous,
            entries,
        }
    }

    /// True for [`TfKind::Labelmap`].
    #[inline]
    pub fn is_labelmap(&self) -> bool {
        self.kind == TfKind::Labelmap
    }

    /// Entry for a label, if any.
    pub fn entry(&self, label: u8) -> Option<&TfEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Rejects duplicate labels and non-finite colors.
    pub fn validate(&self) -> VolumeResult<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.label) {
                return Err(VolumeError::malformed(format!(
                    "duplicate transfer-function label {}",
                    entry.label
                )));
            }
            if entry.rgba().iter().any(|v| !v.is_finite()) {
                return Err(VolumeError::malformed(format!(
                    "non-finite color for label {}",
                    entry.label
                )));
            }
        }
        Ok(())
    }

    /// Clamps every color component and alpha into [0, 1].
    pub fn clamp_colors(&mut self) {
        for entry in &mut self.entries {
            for c in &mut entry.color {
                *c = c.clamp(0.0, 1.0);
            }
            entry.alpha = entry.alpha.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelmap() {
        let tf: TransferFunction = serde_json::from_str(
            r#"{"type": "labelmap", "entries": [
                {"label": 1, "name": "Necrosis", "color": [1, 0, 0], "alpha": 1},
                {"label": 2.0, "color": [0, 1, 0], "alpha": 0.5}
            ]}"#,
        )
        .unwrap();
        assert_eq!(tf.kind, TfKind::Labelmap);
        assert_eq!(tf.entries.len(), 2);
        assert_eq!(tf.entries[1].label, 2);
        assert_eq!(tf.entries[0].display_name(), "Necrosis");
        assert_eq!(tf.entries[1].display_name(), "Label 2");
    }

    #[test]
    fn test_float_label_rounds() {
        let e: TfEntry =
            serde_json::from_str(r#"{"label": 6.6, "color": [0, 0, 0], "alpha": 0}"#).unwrap();
        assert_eq!(e.label, 7);
    }

    #[test]
    fn test_label_out_of_range() {
        let res: Result<TfEntry, _> =
            serde_json::from_str(r#"{"label": 300, "color": [0, 0, 0], "alpha": 0}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let res: Result<TransferFunction, _> = serde_json::from_str(r#"{"type": "ramp"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_duplicate_labels() {
        let tf = TransferFunction::labelmap(vec![
            TfEntry::new(3, [1.0, 0.0, 0.0], 1.0),
            TfEntry::new(3, [0.0, 1.0, 0.0], 1.0),
        ]);
        assert!(matches!(tf.validate(), Err(VolumeError::MalformedContainer(_))));
    }

    #[test]
    fn test_clamp_colors() {
        let mut tf = TransferFunction::labelmap(vec![TfEntry::new(1, [1.5, -0.2, 0.3], 2.0)]);
        tf.clamp_colors();
        assert_eq!(tf.entries[0].rgba(), [1.0, 0.0, 0.3, 1.0]);
    }

    #[test]
    fn test_blank_name_falls_back() {
        let e = TfEntry::new(9, [0.0; 3], 1.0).named("  ");
        assert_eq!(e.display_name(), "Label 9");
    }
}
