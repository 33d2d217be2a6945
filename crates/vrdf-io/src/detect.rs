//! Format detection by magic bytes and extension.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::reader::MAGIC;

/// Canonical file extension.
pub const EXTENSION: &str = "vrdf";

/// Checks magic bytes, falling back to the extension when the file cannot be read.
pub fn is_vrdf<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match has_magic(path) {
        Some(found) => found,
        None => has_extension(path),
    }
}

/// True for `*.vrdf` (any case).
pub fn has_extension<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION))
}

/// `None` if the file can't be opened.
fn has_magic(path: &Path) -> Option<bool> {
    let mut file = File::open(path).ok()?;
    let mut header = [0u8; 4];
    match file.read_exact(&mut header) {
        Ok(()) => Some(&header == MAGIC),
        Err(_) => Some(false),
    }
}
