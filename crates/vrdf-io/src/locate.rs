//! Modality code to file resolution.
//!
//! Volumes live in two roots: a writable cache directory (files staged
//! there at startup or downloaded later) and a read-only bundled directory
//! shipped with the application. A code such as `t1c` resolves as follows:
//!
//! 1. `{code}_lw.vrdf` directly inside each root, in [`SearchOrder`]
//! 2. recursive scan of `**/*.vrdf` in each root for file names containing
//!    the code (see [`FuzzyMatch`])
//!
//! All comparisons are case-insensitive.
//!
//! # Example
//!
//! ```rust,no_run
//! use vrdf_io::VolumeLocator;
//!
//! let locator = VolumeLocator::new()
//!     .with_cache_dir("/tmp/vrdf-cache")
//!     .with_bundled_dir("assets");
//! if let Some(hit) = locator.resolve("t1c") {
//!     println!("{} ({:?})", hit.path.display(), hit.root);
//! }
//! ```

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};

use vrdf_core::VolumeResult;

use crate::detect::EXTENSION;

/// Suffix of canonical file names (`{code}_lw.vrdf`).
pub const CANONICAL_SUFFIX: &str = "_lw";

/// Which root is searched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchOrder {
    /// Writable cache, then bundled assets.
    #[default]
    CacheFirst,
    /// Bundled assets, then cache.
    BundledFirst,
}

/// Fallback matching policy for the recursive scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FuzzyMatch {
    /// Any file name containing the code. Delimited hits still rank first.
    #[default]
    Substring,
    /// Only hits bounded by non-alphanumeric characters (`t1` does not match `t1c`).
    Delimited,
}

/// Root a file was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// Writable cache directory.
    Cache,
    /// Bundled asset directory.
    Bundled,
}

/// How a file matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    /// `{code}_lw.vrdf`.
    Exact,
    /// Code bounded by delimiters inside the file name.
    Delimited,
    /// Plain substring.
    Substring,
}

/// Result of [`VolumeLocator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved file.
    pub path: PathBuf,
    /// Root it was found in.
    pub root: RootKind,
    /// Match quality.
    pub kind: MatchKind,
}

/// Resolves modality codes to `.vrdf` files.
#[derive(Debug, Clone, Default)]
pub struct VolumeLocator {
    /// Writable cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Bundled asset directory.
    pub bundled_dir: Option<PathBuf>,
    /// Root order.
    pub order: SearchOrder,
    /// Fallback policy.
    pub fuzzy: FuzzyMatch,
}

impl VolumeLocator {
    /// Locator with no roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the bundled directory.
    pub fn with_bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    /// Sets root order.
    pub fn with_order(mut self, order: SearchOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the fallback policy.
    pub fn with_fuzzy(mut self, fuzzy: FuzzyMatch) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Existing roots in search order.
    pub fn roots(&self) -> Vec<(RootKind, &Path)> {
        let cache = self.cache_dir.as_deref().map(|p| (RootKind::Cache, p));
        let bundled = self.bundled_dir.as_deref().map(|p| (RootKind::Bundled, p));
        let ordered = match self.order {
            SearchOrder::CacheFirst => [cache, bundled],
            SearchOrder::BundledFirst => [bundled, cache],
        };
        ordered
            .into_iter()
            .flatten()
            .filter(|(_, p)| p.is_dir())
            .collect()
    }

    /// Resolves a modality code. `None` when nothing matches or the code is blank.
    ///
    /// Codes that are not a single plain file-name component (separators,
    /// `..`) are rejected so resolution never leaves the roots.
    pub fn resolve(&self, code: &str) -> Option<Resolution> {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return None;
        }
        if !is_plain_code(&code) {
            warn!("rejecting volume code '{code}': not a plain name");
            return None;
        }
        let roots = self.roots();
        let canonical = format!("{code}{CANONICAL_SUFFIX}.{EXTENSION}");

        for &(root, dir) in &roots {
            if let Some(path) = find_exact(dir, &canonical) {
                debug!("resolved '{code}' to {} ({root:?}, exact)", path.display());
                return Some(Resolution {
                    path,
                    root,
                    kind: MatchKind::Exact,
                });
            }
        }

        for &(root, dir) in &roots {
            let mut best: Option<(MatchKind, PathBuf)> = None;
            for path in scan(dir) {
                let Some(kind) = self.classify(&path, &code) else {
                    continue;
                };
                trace!("candidate {} ({kind:?})", path.display());
                // Scan order is sorted, so the first hit of each kind wins.
                if best.as_ref().is_none_or(|(k, _)| kind < *k) {
                    best = Some((kind, path));
                }
            }
            if let Some((kind, path)) = best {
                debug!("resolved '{code}' to {} ({root:?}, {kind:?})", path.display());
                return Some(Resolution { path, root, kind });
            }
        }

        debug!("no volume matches '{code}'");
        None
    }

    fn classify(&self, path: &Path, code: &str) -> Option<MatchKind> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if is_delimited_match(&name, code) {
            Some(MatchKind::Delimited)
        } else if self.fuzzy == FuzzyMatch::Substring && name.contains(code) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }

    /// Every volume reachable from the roots as `(code, path)`, keyed by
    /// [`extract_code`]. Earlier roots shadow later ones.
    pub fn available(&self) -> Vec<(String, PathBuf)> {
        let mut found = BTreeMap::new();
        for (_, dir) in self.roots() {
            for path in scan(dir) {
                let Some(code) = path.file_name().and_then(|n| n.to_str()).and_then(extract_code) else {
                    continue;
                };
                found.entry(code).or_insert(path);
            }
        }
        found.into_iter().collect()
    }

    /// Copies named files from the bundled dir into the cache dir.
    ///
    /// Missing sources are logged and skipped. Returns the staged paths.
    pub fn stage_bundled<S: AsRef<str>>(&self, names: &[S]) -> VolumeResult<Vec<PathBuf>> {
        let (Some(bundled), Some(cache)) = (&self.bundled_dir, &self.cache_dir) else {
            warn!("staging needs both a bundled and a cache directory");
            return Ok(Vec::new());
        };

        let mut staged = Vec::new();
        for name in names.iter().map(AsRef::as_ref) {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let src = bundled.join(name);
            if !src.is_file() {
                warn!("bundled volume {} not found, skipping", src.display());
                continue;
            }
            let dst = cache.join(name);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            let bytes = fs::copy(&src, &dst)?;
            debug!("staged {} -> {} ({bytes} bytes)", src.display(), dst.display());
            staged.push(dst);
        }
        Ok(staged)
    }
}

/// Terminal code of a file name: `BraTS-GLI-00014-000-t1c_lw.vrdf` → `t1c`.
///
/// Takes everything after the last `-` of the stem and strips a trailing
/// `_lw`. Returns `None` for empty results.
pub fn extract_code(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let tail = stem.rsplit('-').next().unwrap_or(stem);
    let lower = tail.to_lowercase();
    let code = lower.strip_suffix(CANONICAL_SUFFIX).unwrap_or(&lower);
    (!code.is_empty()).then(|| code.to_string())
}

/// `code` occurs in `name` with no alphanumeric neighbor on either side.
fn is_delimited_match(name: &str, code: &str) -> bool {
    name.match_indices(code).any(|(start, m)| {
        let before = name[..start].chars().next_back();
        let after = name[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Case-insensitive lookup of a file directly inside `dir`.
fn find_exact(dir: &Path, lower_name: &str) -> Option<PathBuf> {
    let direct = dir.join(lower_name);
    if direct.is_file() {
        return Some(direct);
    }
    let mut hits: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase() == lower_name)
        })
        .collect();
    hits.sort();
    hits.into_iter().next()
}

/// Single normal path component with no separators or `..`.
fn is_plain_code(code: &str) -> bool {
    if code.contains(['/', '\\']) || code.contains("..") {
        return false;
    }
    let mut parts = Path::new(code).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

/// Sorted recursive listing of `*.vrdf` under `dir`.
fn scan(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/**/*.{EXTENSION}",
        Pattern::escape(&dir.to_string_lossy())
    );
    let opts = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let mut paths: Vec<PathBuf> = match glob::glob_with(&pattern, opts) {
        Ok(entries) => entries.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            warn!("cannot scan {}: {e}", dir.display());
            Vec::new()
        }
    };
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code() {
        assert!(is_plain_code("t1c"));
        assert!(is_plain_code("brats-t2w"));
        for code in ["../secret", "..", ".", "a/b", "a\\b", "/etc", "a..b"] {
            assert!(!is_plain_code(code), "{code}");
        }
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("BraTS-GLI-00014-000-t1c_lw.vrdf").as_deref(), Some("t1c"));
        assert_eq!(extract_code("FLAIR_LW.vrdf").as_deref(), Some("flair"));
        assert_eq!(extract_code("scene.vrdf").as_deref(), Some("scene"));
        assert_eq!(extract_code("x-_lw.vrdf"), None);
    }

    #[test]
    fn test_delimited_match() {
        assert!(is_delimited_match("brats-00014-t1c_lw.vrdf", "t1c"));
        assert!(!is_delimited_match("brats-00014-t1c_lw.vrdf", "t1"));
        assert!(is_delimited_match("t1.vrdf", "t1"));
    }

    #[test]
    fn test_blank_code() {
        assert!(VolumeLocator::new().resolve("   ").is_none());
    }

    #[test]
    fn test_missing_roots_skipped() {
        let locator = VolumeLocator::new()
            .with_cache_dir("/no/such/cache")
            .with_bundled_dir("/no/such/bundle");
        assert!(locator.roots().is_empty());
        assert!(locator.resolve("t1c").is_none());
    }
}
