//! Controller lifecycle against real files on disk.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vrdf_core::{TfEntry, TransferFunction, VolumeData, VolumeMetadata, VoxelBuffer};
use vrdf_dvr::material::{INT_HAS_WEIGHTS, TEX_TF};
use vrdf_dvr::{DvrConfig, ErrorKind, LoadOutcome, RecordingMaterial, VolumeController, VolumeState};
use vrdf_gpu::{CpuBackend, TextureBackend};
use vrdf_io::{write, WriteOptions};

fn write_volume(dir: &Path, name: &str, dim: [u32; 3], weights: bool) {
    let n = dim.iter().product::<u32>() as usize;
    let tf = TransferFunction::labelmap(vec![
        TfEntry::new(1, [1.0, 0.0, 0.0], 1.0).named("Necrosis"),
        TfEntry::new(2, [0.0, 1.0, 0.0], 1.0).named("Edema"),
        TfEntry::new(4, [0.0, 0.0, 1.0], 1.0).named("Enhancing"),
    ]);
    let labels = (0..n).map(|i| [0u8, 1, 2, 4][i % 4]).collect();
    let mut data = VolumeData::new(VolumeMetadata::new(dim), tf, VoxelBuffer::U8(labels));
    if weights {
        data = data.with_weights(vec![0.5; n]);
    }
    std::fs::create_dir_all(dir).unwrap();
    write(dir.join(name), &data, &WriteOptions::default()).unwrap();
}

struct Fixture {
    _root: tempfile::TempDir,
    backend: Arc<CpuBackend>,
    controller: VolumeController<RecordingMaterial>,
}

fn fixture(setup: impl FnOnce(&Path, &Path)) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let cache = root.path().join("cache");
    let bundled = root.path().join("bundled");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::create_dir_all(&bundled).unwrap();
    setup(&cache, &bundled);

    let config = DvrConfig {
        cache_dir: Some(cache),
        bundled_dir: Some(bundled),
        ..DvrConfig::default()
    };
    let backend = Arc::new(CpuBackend::new());
    let controller = VolumeController::new(backend.clone(), RecordingMaterial::new(), &config);
    Fixture {
        _root: root,
        backend,
        controller,
    }
}

#[derive(Clone, Default)]
struct LogBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a WARN-level subscriber and returns what it logged.
fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = LogBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
    (out, text)
}

fn wait_for(controller: &mut VolumeController<RecordingMaterial>) -> LoadOutcome {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(outcome) = controller.poll() {
            return outcome;
        }
        assert!(Instant::now() < deadline, "loader did not answer");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_cache_wins_over_bundled() {
    let mut f = fixture(|cache, bundled| {
        write_volume(cache, "t1c_lw.vrdf", [2, 2, 2], false);
        write_volume(bundled, "t1c_lw.vrdf", [4, 4, 4], false);
    });
    assert_eq!(f.controller.load_by_code("t1c"), LoadOutcome::Loaded);
    assert!(f.controller.source().unwrap().starts_with(f._root.path().join("cache")));
    assert_eq!(f.controller.metadata().unwrap().dim, [2, 2, 2]);
}

#[test]
fn test_unknown_code_keeps_current_volume() {
    let mut f = fixture(|cache, _| write_volume(cache, "t1c_lw.vrdf", [2, 2, 2], true));
    assert_eq!(f.controller.load_by_code("t1c"), LoadOutcome::Loaded);
    let live = f.backend.live_ids();
    let gpu = f.controller.gpu_volume().cloned();

    let (outcome, log) = capture_warnings(|| f.controller.load_by_code("zzz"));
    assert_eq!(outcome, LoadOutcome::NotFound);
    assert!(log.contains("WARN"), "{log}");
    assert!(log.contains("no volume file matches 'zzz'"), "{log}");
    assert_eq!(f.controller.state(), VolumeState::Loaded);
    assert_eq!(f.controller.gpu_volume().cloned(), gpu);
    assert_eq!(f.backend.live_ids(), live);
}

#[test]
fn test_unknown_code_with_nothing_loaded() {
    let mut f = fixture(|_, _| {});
    assert_eq!(f.controller.load_by_code("zzz"), LoadOutcome::NotFound);
    assert_eq!(f.controller.state(), VolumeState::Unloaded);
    assert_eq!(f.backend.stats().created, 0);
}

#[test]
fn test_truncated_file_keeps_current_volume() {
    let mut f = fixture(|cache, _| {
        write_volume(cache, "t1c_lw.vrdf", [2, 2, 2], false);
        write_volume(cache, "flair_lw.vrdf", [4, 4, 4], false);
        let path = cache.join("flair_lw.vrdf");
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
    });
    assert_eq!(f.controller.load_by_code("t1c"), LoadOutcome::Loaded);
    let created = f.backend.stats().created;

    assert_eq!(
        f.controller.load_by_code("flair"),
        LoadOutcome::Failed(ErrorKind::CorruptVolume)
    );
    assert_eq!(f.controller.state(), VolumeState::Loaded);
    assert_eq!(f.controller.metadata().unwrap().dim, [2, 2, 2]);
    assert_eq!(f.backend.stats().created, created);
}

#[test]
fn test_garbage_file_is_malformed() {
    let mut f = fixture(|cache, _| std::fs::write(cache.join("seg_lw.vrdf"), b"not a volume").unwrap());
    assert_eq!(
        f.controller.load_by_code("seg"),
        LoadOutcome::Failed(ErrorKind::MalformedContainer)
    );
    assert_eq!(f.controller.state(), VolumeState::Unloaded);
}

#[test]
fn test_back_to_back_loads_keep_only_last() {
    let mut f = fixture(|cache, _| {
        write_volume(cache, "t1c_lw.vrdf", [8, 8, 8], true);
        write_volume(cache, "t1n_lw.vrdf", [4, 4, 4], false);
    });
    assert_eq!(f.controller.load_by_code("t1c"), LoadOutcome::Loaded);
    let first = f.controller.gpu_volume().unwrap().ids();
    assert_eq!(f.controller.load_by_code("t1n"), LoadOutcome::Loaded);

    for id in first {
        assert!(!f.backend.is_live(id));
    }
    let gpu = f.controller.gpu_volume().unwrap();
    assert_eq!(gpu.dim, [4, 4, 4]);
    // t1n textures, control table, placeholder
    assert_eq!(f.backend.stats().live_textures, gpu.ids().len() + 2);
    assert_eq!(f.controller.material().ints[INT_HAS_WEIGHTS], 0);
}

#[test]
fn test_async_supersession() {
    let mut f = fixture(|cache, _| {
        write_volume(cache, "t1c_lw.vrdf", [16, 16, 16], true);
        write_volume(cache, "t1n_lw.vrdf", [4, 4, 4], false);
    });
    f.controller.request_load("t1c");
    f.controller.request_load("t1n");
    assert_eq!(f.controller.state(), VolumeState::Loading);
    assert_eq!(f.controller.pending(), Some("t1n"));

    assert_eq!(wait_for(&mut f.controller), LoadOutcome::Loaded);
    assert_eq!(f.controller.state(), VolumeState::Loaded);
    assert!(f.controller.source().unwrap().ends_with("t1n_lw.vrdf"));

    let gpu = f.controller.gpu_volume().unwrap();
    assert_eq!(gpu.dim, [4, 4, 4]);
    assert_eq!(f.backend.stats().live_textures, gpu.ids().len() + 2);
    assert!(f.controller.poll().is_none());
}

#[test]
fn test_async_not_found_restores_state() {
    let mut f = fixture(|cache, _| write_volume(cache, "t1c_lw.vrdf", [2, 2, 2], false));
    assert_eq!(f.controller.load_by_code("t1c"), LoadOutcome::Loaded);
    f.controller.request_load("zzz");
    let (outcome, log) = capture_warnings(|| wait_for(&mut f.controller));
    assert_eq!(outcome, LoadOutcome::NotFound);
    assert!(log.contains("no volume file matches 'zzz'"), "{log}");
    assert_eq!(f.controller.state(), VolumeState::Loaded);
}

#[test]
fn test_sync_load_supersedes_async() {
    let mut f = fixture(|cache, _| {
        write_volume(cache, "t1c_lw.vrdf", [8, 8, 8], false);
        write_volume(cache, "t2w_lw.vrdf", [2, 2, 2], false);
    });
    f.controller.request_load("t1c");
    assert_eq!(f.controller.load_by_code("t2w"), LoadOutcome::Loaded);
    assert!(f.controller.pending().is_none());

    std::thread::sleep(Duration::from_millis(50));
    assert!(f.controller.poll().is_none());
    assert_eq!(f.controller.metadata().unwrap().dim, [2, 2, 2]);
}

#[test]
fn test_solo_then_show_all() {
    let mut f = fixture(|cache, _| write_volume(cache, "seg_lw.vrdf", [2, 2, 2], false));
    assert_eq!(f.controller.load_by_code("seg"), LoadOutcome::Loaded);
    let ctrl = f.controller.control_texture().unwrap();

    f.controller.solo_label(7);
    let texels = f.backend.read_table(ctrl).unwrap();
    for (i, t) in texels.iter().enumerate() {
        assert_eq!(t[3], if i == 7 { 1.0 } else { 0.0 }, "label {i}");
    }

    f.controller.show_all();
    let texels = f.backend.read_table(ctrl).unwrap();
    assert!(texels.iter().all(|t| *t == [1.0; 4]));
}

#[test]
fn test_opacity_round_trip_and_clamp() {
    let mut f = fixture(|cache, _| write_volume(cache, "seg_lw.vrdf", [2, 2, 2], false));
    assert_eq!(f.controller.load_by_code("seg"), LoadOutcome::Loaded);
    let ctrl = f.controller.control_texture().unwrap();

    for i in 0..=255u8 {
        f.controller.set_label_opacity(i, 0.4);
    }
    let texels = f.backend.read_table(ctrl).unwrap();
    for t in &texels {
        approx::assert_relative_eq!(t[3], 0.4);
    }

    f.controller.set_label_opacity(9, 1.7);
    f.controller.set_label_opacity(10, -3.0);
    let texels = f.backend.read_table(ctrl).unwrap();
    assert_eq!(texels[9][3], 1.0);
    assert_eq!(texels[10][3], 0.0);
}

#[test]
fn test_visibility_is_idempotent() {
    let mut f = fixture(|cache, _| write_volume(cache, "seg_lw.vrdf", [2, 2, 2], false));
    assert_eq!(f.controller.load_by_code("seg"), LoadOutcome::Loaded);
    let ctrl = f.controller.control_texture().unwrap();

    f.controller.set_label_visible(3, false);
    f.controller.set_label_visible(3, true);
    let once = f.backend.read_table(ctrl).unwrap();
    f.controller.set_label_visible(3, true);
    assert_eq!(f.backend.read_table(ctrl).unwrap(), once);
}

#[test]
fn test_registry_follows_entries_and_mode() {
    let mut f = fixture(|cache, _| write_volume(cache, "seg_lw.vrdf", [2, 2, 2], false));
    assert_eq!(f.controller.load_by_code("seg"), LoadOutcome::Loaded);
    let names: Vec<_> = f.controller.labels().iter().map(|l| l.display_name.clone()).collect();
    assert_eq!(names, ["Necrosis", "Edema", "Enhancing"]);

    let soft = f.controller.material().textures[TEX_TF];
    f.controller.set_transfer_function_mode(true);
    let hard = f.controller.material().textures[TEX_TF];
    assert_ne!(soft, hard);
    assert_eq!(hard, f.controller.gpu_volume().unwrap().hard_lut);
    assert_eq!(f.controller.labels().len(), 3);
}

#[test]
fn test_placeholder_is_shared() {
    let mut f = fixture(|cache, _| {
        write_volume(cache, "a_lw.vrdf", [2, 2, 2], false);
        write_volume(cache, "b_lw.vrdf", [2, 2, 2], false);
    });
    assert_eq!(f.controller.load_by_code("a"), LoadOutcome::Loaded);
    let created = f.backend.stats().created;
    assert_eq!(f.controller.load_by_code("b"), LoadOutcome::Loaded);
    // labels, hard, soft, control; no second placeholder
    assert_eq!(f.backend.stats().created, created + 4);
}

#[test]
fn test_drop_releases_all_textures() {
    let f = fixture(|cache, _| write_volume(cache, "t1c_lw.vrdf", [2, 2, 2], true));
    let Fixture {
        _root,
        backend,
        mut controller,
    } = f;
    assert_eq!(controller.load_by_code("t1c"), LoadOutcome::Loaded);
    controller.request_load("t1c");
    drop(controller);
    assert_eq!(backend.stats().live_textures, 0);
    assert_eq!(backend.stats().live_bytes, 0);
}
