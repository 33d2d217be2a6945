//! On-disk fixtures shaped like a segmented brain study.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use vrdf_core::{TfEntry, TransferFunction, VolumeData, VolumeMetadata, VoxelBuffer, VoxelType};
use vrdf_io::WriteOptions;

/// Standard tumor sub-region labels.
pub fn tumor_tf() -> TransferFunction {
    TransferFunction::labelmap(vec![
        TfEntry::new(1, [0.9, 0.2, 0.2], 1.0).named("Necrotic core"),
        TfEntry::new(2, [0.2, 0.8, 0.2], 0.6).named("Edema"),
        TfEntry::new(3, [0.2, 0.3, 0.9], 0.9).named("Enhancing tumor"),
    ])
}

/// Labelmap volume: a centered sphere of label 3 inside a shell of 2.
pub fn sphere(dim: [u32; 3], spacing_mm: [f32; 3], weights: bool) -> VolumeData {
    let [x, y, z] = dim;
    let c = [x as f32 / 2.0, y as f32 / 2.0, z as f32 / 2.0];
    let r = c.iter().copied().fold(f32::MAX, f32::min);
    let mut labels = Vec::with_capacity((x * y * z) as usize);
    for k in 0..z {
        for j in 0..y {
            for i in 0..x {
                let d = ((i as f32 + 0.5 - c[0]).powi(2)
                    + (j as f32 + 0.5 - c[1]).powi(2)
                    + (k as f32 + 0.5 - c[2]).powi(2))
                .sqrt();
                labels.push(if d < r * 0.4 {
                    3
                } else if d < r * 0.8 {
                    2
                } else {
                    0
                });
            }
        }
    }
    let n = labels.len();
    let meta = VolumeMetadata::new(dim).with_spacing(spacing_mm);
    let volume = VolumeData::new(meta, tumor_tf(), VoxelBuffer::U8(labels));
    if weights {
        volume.with_weights((0..n).map(|i| (i % 5) as f32 / 4.0).collect())
    } else {
        volume
    }
}

/// Cache and bundled roots in a temporary directory.
pub struct Roots {
    dir: TempDir,
}

impl Roots {
    /// Creates empty `cache/` and `bundled/` roots.
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("cache"))?;
        std::fs::create_dir_all(dir.path().join("bundled"))?;
        Ok(Self { dir })
    }

    /// Cache root.
    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Bundled root.
    pub fn bundled(&self) -> PathBuf {
        self.dir.path().join("bundled")
    }

    /// Temporary directory holding both roots.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a volume with 8-bit weights.
    pub fn put(&self, root: &Path, rel: &str, volume: &VolumeData) -> vrdf_core::VolumeResult<PathBuf> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = WriteOptions {
            weight_type: VoxelType::U8,
        };
        vrdf_io::write(&path, volume, &opts)?;
        Ok(path)
    }
}

#[derive(Clone, Default)]
struct LogBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut out) = self.0.lock() {
            out.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a WARN-level subscriber on this thread and returns its
/// output along with the formatted log lines.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = LogBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let text = buf
        .0
        .lock()
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    (out, text)
}
