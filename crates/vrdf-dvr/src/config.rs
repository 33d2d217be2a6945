//! Controller configuration.
//!
//! Stored as RON, e.g. `~/.config/vrdf-viewer/config.ron`:
//!
//! ```ron
//! (
//!     cache_dir: Some("/home/me/.cache/vrdf-viewer"),
//!     bundled_dir: Some("assets"),
//!     search_order: CacheFirst,
//!     fuzzy_match: Substring,
//!     use_hard_tf: false,
//!     debug_view: Off,
//!     profile: Auto,
//!     verbose: 0,
//! )
//! ```
//!
//! Missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use vrdf_gpu::TextureCaps;
use vrdf_io::{FuzzyMatch, SearchOrder, VolumeLocator};

use crate::{DvrError, DvrResult};

/// Application directory name under the platform cache/config dirs.
pub const APP_DIR: &str = "vrdf-viewer";

/// Debug visualization selected by shader keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DebugView {
    /// Normal rendering.
    #[default]
    Off,
    /// Raw label values.
    Labels,
    /// Raw weight values.
    Weights,
    /// Texture coordinates.
    Uvw,
}

impl DebugView {
    /// Shader keyword enabling this view.
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Off => None,
            Self::Labels => Some(crate::material::KW_DEBUG_LABELS),
            Self::Weights => Some(crate::material::KW_DEBUG_WEIGHTS),
            Self::Uvw => Some(crate::material::KW_DEBUG_UVW),
        }
    }

    /// Parses `off`, `labels`, `weights` or `uvw` (also `0..=3`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Some(Self::Off),
            "labels" | "1" => Some(Self::Labels),
            "weights" | "2" => Some(Self::Weights),
            "uvw" | "3" => Some(Self::Uvw),
            _ => None,
        }
    }
}

/// Target class used for shader selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShaderProfile {
    /// Derive from backend capabilities.
    #[default]
    Auto,
    /// Desktop GPU.
    Desktop,
    /// Standalone headset / mobile GPU.
    Constrained,
}

/// Volume shader for desktop targets.
pub const DESKTOP_SHADER: &str = "Custom/VolumeDVR_URP";
/// Volume shader for constrained targets.
pub const CONSTRAINED_SHADER: &str = "Volume/VolumeDVR_URP_Quest";

impl ShaderProfile {
    /// Replaces `Auto` using the backend's capabilities.
    pub fn resolve(self, caps: &TextureCaps) -> Self {
        match self {
            Self::Auto if caps.memory_constrained => Self::Constrained,
            Self::Auto => Self::Desktop,
            other => other,
        }
    }

    /// Shader name for a resolved profile.
    pub const fn shader_name(self) -> &'static str {
        match self {
            Self::Constrained => CONSTRAINED_SHADER,
            Self::Auto | Self::Desktop => DESKTOP_SHADER,
        }
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(APP_DIR))
}

fn default_bundled_dir() -> Option<PathBuf> {
    Some(PathBuf::from("assets"))
}

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DvrConfig {
    /// Writable directory searched for downloaded/staged volumes.
    pub cache_dir: Option<PathBuf>,
    /// Read-only directory shipped with the application.
    pub bundled_dir: Option<PathBuf>,
    /// Which directory is searched first.
    pub search_order: SearchOrder,
    /// Policy for the filename scan fallback.
    pub fuzzy_match: FuzzyMatch,
    /// Start with the hard LUT instead of the soft one.
    pub use_hard_tf: bool,
    /// Initial debug view.
    pub debug_view: DebugView,
    /// Shader selection.
    pub profile: ShaderProfile,
    /// Verbosity level (0 = quiet).
    pub verbose: u8,
}

impl Default for DvrConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            bundled_dir: default_bundled_dir(),
            search_order: SearchOrder::CacheFirst,
            fuzzy_match: FuzzyMatch::Substring,
            use_hard_tf: false,
            debug_view: DebugView::Off,
            profile: ShaderProfile::Auto,
            verbose: 0,
        }
    }
}

impl DvrConfig {
    /// Platform config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.ron"))
    }

    /// Reads a RON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> DvrResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DvrError::Config(format!("{}: {e}", path.display())))?;
        let config = ron::from_str(&text)
            .map_err(|e| DvrError::Config(format!("{}: {e}", path.display())))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the platform config file, falling back to defaults.
    pub fn load_or_default() -> Self {
        Self::default_path()
            .filter(|p| p.is_file())
            .and_then(|p| Self::load(p).ok())
            .unwrap_or_default()
    }

    /// Writes the config as pretty RON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DvrResult<()> {
        let path = path.as_ref();
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DvrError::Config(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DvrError::Config(e.to_string()))?;
        }
        fs::write(path, text).map_err(|e| DvrError::Config(format!("{}: {e}", path.display())))
    }

    /// File resolver for these settings.
    pub fn locator(&self) -> VolumeLocator {
        VolumeLocator {
            cache_dir: self.cache_dir.clone(),
            bundled_dir: self.bundled_dir.clone(),
            order: self.search_order,
            fuzzy: self.fuzzy_match,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DvrConfig::default();
        assert!(!config.use_hard_tf);
        assert_eq!(config.search_order, SearchOrder::CacheFirst);
        assert_eq!(config.bundled_dir.as_deref(), Some(Path::new("assets")));
        assert_eq!(config.verbose, 0);
    }

    #[test]
    fn test_partial_ron() {
        let config: DvrConfig = ron::from_str("(use_hard_tf: true, fuzzy_match: Delimited)").unwrap();
        assert!(config.use_hard_tf);
        assert_eq!(config.fuzzy_match, FuzzyMatch::Delimited);
        assert_eq!(config.profile, ShaderProfile::Auto);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");
        let config = DvrConfig {
            cache_dir: Some(dir.path().join("cache")),
            debug_view: DebugView::Weights,
            profile: ShaderProfile::Constrained,
            ..DvrConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(DvrConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        fs::write(&path, "(verbose: \"loud\")").unwrap();
        assert!(matches!(DvrConfig::load(&path), Err(DvrError::Config(_))));
    }

    #[test]
    fn test_profile_resolution() {
        assert_eq!(
            ShaderProfile::Auto.resolve(&TextureCaps::constrained()).shader_name(),
            CONSTRAINED_SHADER
        );
        assert_eq!(
            ShaderProfile::Auto.resolve(&TextureCaps::desktop()).shader_name(),
            DESKTOP_SHADER
        );
        assert_eq!(
            ShaderProfile::Desktop.resolve(&TextureCaps::constrained()),
            ShaderProfile::Desktop
        );
    }

    #[test]
    fn test_debug_view_parse() {
        assert_eq!(DebugView::parse("UVW"), Some(DebugView::Uvw));
        assert_eq!(DebugView::parse("2"), Some(DebugView::Weights));
        assert_eq!(DebugView::parse("x"), None);
        assert_eq!(DebugView::Labels.keyword(), Some("_DEBUG_MODE_LABELS"));
    }
}
