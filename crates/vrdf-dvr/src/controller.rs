//! Volume state controller.
//!
//! Owns the live volume's textures and drives the load/replace/apply
//! lifecycle:
//!
//! ```text
//! Unloaded ──load──> Loading ──ok──> Loaded ──load──> Loading ──ok──> Loaded
//!                       │                                │
//!                       └─fail─> previous state <────────┘
//! ```
//!
//! Applying a volume validates it first, so a corrupt file leaves the old
//! volume on screen. After validation the previous textures are released
//! before any new one is allocated. An allocation failure past that point
//! leaves the controller `Unloaded`.
//!
//! All texture work happens on the thread that owns the controller. The
//! asynchronous path ([`VolumeController::request_load`] +
//! [`VolumeController::poll`]) only moves file I/O and decoding to the
//! loader thread.

use glam::{Vec3, Vec4};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use vrdf_core::{TfKind, TransferFunction, VolumeMetadata};
use vrdf_gpu::{GpuError, GpuVolume, TextureBackend, TextureBuilder, TextureId};
use vrdf_io::VolumeLocator;
use vrdf_lut::{LabelControl, LutPair};

use crate::config::{DebugView, DvrConfig, ShaderProfile};
use crate::loader::LoaderHandle;
use crate::material::*;
use crate::messages::{DecodedVolume, Generation, LoaderEvent};
use crate::registry::{LabelInfo, LabelRegistry};
use crate::scale::{ScaleCompensation, VolumeTransform};
use crate::{DvrError, DvrResult, ErrorKind};

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    /// Nothing on screen.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// A volume is on screen.
    Loaded,
}

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New volume is live.
    Loaded,
    /// No file matched; nothing changed.
    NotFound,
    /// Load failed; see the log for details.
    Failed(ErrorKind),
}

/// Everything owned for the volume on screen.
struct LiveVolume {
    source: Option<PathBuf>,
    metadata: VolumeMetadata,
    tf: TransferFunction,
    luts: LutPair,
    gpu: GpuVolume,
    control: LabelControl,
    control_tex: TextureId,
    transform: VolumeTransform,
}

/// Drives one volume through load, display and teardown.
pub struct VolumeController<M: MaterialSink> {
    backend: Arc<dyn TextureBackend>,
    material: M,
    locator: VolumeLocator,
    profile: ShaderProfile,
    enabled: bool,
    state: VolumeState,
    resume_state: VolumeState,
    live: Option<LiveVolume>,
    placeholder: Option<TextureId>,
    use_hard_tf: bool,
    debug_view: DebugView,
    registry: LabelRegistry,
    scale_comp: ScaleCompensation,
    loader: Option<LoaderHandle>,
    generation: Generation,
    pending: Option<String>,
}

impl<M: MaterialSink> VolumeController<M> {
    /// Creates a controller and selects the volume shader.
    ///
    /// A missing shader is logged and disables volume rendering; the
    /// controller stays usable and every load becomes a no-op.
    pub fn new(backend: Arc<dyn TextureBackend>, mut material: M, config: &DvrConfig) -> Self {
        let profile = config.profile.resolve(backend.caps());
        let shader = profile.shader_name();
        let enabled = material.select_shader(shader);
        if enabled {
            info!("volume shader {shader} on {} backend", backend.name());
        } else {
            error!("{}", DvrError::ShaderUnsupported(shader.to_string()));
        }

        let mut controller = Self {
            backend,
            material,
            locator: config.locator(),
            profile,
            enabled,
            state: VolumeState::Unloaded,
            resume_state: VolumeState::Unloaded,
            live: None,
            placeholder: None,
            use_hard_tf: config.use_hard_tf,
            debug_view: DebugView::Off,
            registry: LabelRegistry::default(),
            scale_comp: ScaleCompensation::default(),
            loader: None,
            generation: 0,
            pending: None,
        };
        controller.set_debug_view(config.debug_view);
        controller
    }

    /// Replaces the file resolver.
    pub fn with_locator(mut self, locator: VolumeLocator) -> Self {
        self.locator = locator;
        self
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Resolves, decodes and applies a volume on the calling thread.
    ///
    /// Never panics and never propagates: failures are logged and reported
    /// through the returned outcome.
    pub fn load_by_code(&mut self, code: &str) -> LoadOutcome {
        if !self.enabled {
            warn!("volume rendering disabled, ignoring load of '{code}'");
            return LoadOutcome::Failed(ErrorKind::ShaderOrPlatformUnsupported);
        }
        self.supersede_pending();

        let Some(hit) = self.locator.resolve(code) else {
            warn!("no volume file matches '{code}' in cache or bundled assets");
            return LoadOutcome::NotFound;
        };
        info!("loading volume '{code}' from {}", hit.path.display());

        let previous = self.state;
        self.state = VolumeState::Loading;
        let decoded = match DecodedVolume::decode(hit.path) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.state = previous;
                let e = DvrError::from(e);
                warn!("cannot decode '{code}': {e}");
                return LoadOutcome::Failed(e.kind());
            }
        };
        self.state = previous;
        self.apply_outcome(code, decoded)
    }

    /// Queues an asynchronous load. Supersedes any load already in flight.
    ///
    /// Call [`Self::poll`] from the render loop to apply the result.
    pub fn request_load(&mut self, code: &str) {
        if !self.enabled {
            warn!("volume rendering disabled, ignoring load of '{code}'");
            return;
        }
        if self.loader.is_none() {
            match LoaderHandle::spawn(self.locator.clone()) {
                Ok(loader) => self.loader = Some(loader),
                Err(e) => {
                    error!("{e}");
                    return;
                }
            }
        }
        let Some(loader) = &self.loader else {
            return;
        };

        self.generation += 1;
        if let Err(e) = loader.request(self.generation, code) {
            error!("{e}");
            self.loader = None;
            return;
        }
        if self.state != VolumeState::Loading {
            self.resume_state = self.state;
        }
        self.state = VolumeState::Loading;
        self.pending = Some(code.to_string());
        debug!("requested '{code}' (gen {})", self.generation);
    }

    /// Applies finished loads. Returns the outcome of the current request
    /// once it completes; stale results are discarded.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let mut outcome = None;
        loop {
            let event = match self.loader.as_ref().map(LoaderHandle::try_recv) {
                Some(Ok(Some(event))) => event,
                Some(Ok(None)) | None => break,
                Some(Err(e)) => {
                    error!("{e}");
                    self.loader = None;
                    if self.pending.take().is_some() {
                        self.state = self.resume_state;
                        outcome = Some(LoadOutcome::Failed(e.kind()));
                    }
                    break;
                }
            };
            if event.generation() != self.generation || self.pending.is_none() {
                debug!("discarding stale load result (gen {})", event.generation());
                continue;
            }
            self.pending = None;
            self.state = self.resume_state;
            outcome = Some(match event {
                LoaderEvent::Decoded { code, volume, .. } => self.apply_outcome(&code, *volume),
                LoaderEvent::NotFound { code, .. } => {
                    warn!("no volume file matches '{code}' in cache or bundled assets");
                    LoadOutcome::NotFound
                }
                LoaderEvent::Failed { code, error, .. } => {
                    let e = DvrError::from(error);
                    warn!("cannot decode '{code}': {e}");
                    LoadOutcome::Failed(e.kind())
                }
            });
        }
        outcome
    }

    /// Code of the load in flight, if any.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    fn supersede_pending(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
            if let Some(loader) = &self.loader {
                loader.cancel(self.generation);
            }
            self.state = self.resume_state;
            debug!("superseded pending async load");
        }
    }

    fn apply_outcome(&mut self, code: &str, decoded: DecodedVolume) -> LoadOutcome {
        match self.apply_loaded_volume(decoded) {
            Ok(()) => LoadOutcome::Loaded,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ResourceExhaustion => {
                        error!("out of texture memory loading '{code}', previous volume already released: {e}")
                    }
                    ErrorKind::ShaderOrPlatformUnsupported => error!("cannot display '{code}': {e}"),
                    _ => warn!("cannot display '{code}': {e}"),
                }
                LoadOutcome::Failed(e.kind())
            }
        }
    }

    /// Makes a decoded volume the live one.
    ///
    /// Validation failures leave the previous volume untouched. Past
    /// validation, the previous textures are released first; a later
    /// failure leaves the controller `Unloaded`.
    pub fn apply_loaded_volume(&mut self, decoded: DecodedVolume) -> DvrResult<()> {
        if !self.enabled {
            return Err(DvrError::ShaderUnsupported(self.profile.shader_name().to_string()));
        }
        let backend = Arc::clone(&self.backend);
        let builder = TextureBuilder::new(backend.as_ref());
        builder.validate(&decoded.data)?;

        // (1) teardown
        self.release_live();
        self.state = VolumeState::Loading;

        let DecodedVolume { source, data, luts } = decoded;
        let gpu = match builder.build(&data, &luts) {
            Ok(gpu) => gpu,
            Err(e) => {
                self.state = VolumeState::Unloaded;
                return Err(e.into());
            }
        };

        let control = LabelControl::new();
        let control_tex = match builder.label_control(&control) {
            Ok(id) => id,
            Err(e) => {
                gpu.release(backend.as_ref());
                self.state = VolumeState::Unloaded;
                return Err(e.into());
            }
        };

        if gpu.weight.is_none() {
            if let Err(e) = self.ensure_placeholder(&builder) {
                gpu.release(backend.as_ref());
                backend.release(control_tex);
                self.state = VolumeState::Unloaded;
                return Err(e.into());
            }
        }

        let transform = VolumeTransform::fit(&data.metadata);
        self.live = Some(LiveVolume {
            source,
            metadata: data.metadata,
            tf: data.transfer_function,
            luts,
            gpu,
            control,
            control_tex,
            transform,
        });

        // (2) parameters, (3) transform, (4) fresh control table, (5) registry
        self.push_material();
        self.material.set_object_transform(transform.scale, transform.rotation);
        self.rebuild_registry();
        self.state = VolumeState::Loaded;

        if let Some(live) = &self.live {
            info!(
                "volume {} {} ({} labels, weights: {}, scale {:.3}x{:.3}x{:.3} m)",
                live.metadata.dim_string(),
                live.tf.kind.as_str(),
                self.registry.len(),
                live.gpu.weight.is_some(),
                transform.scale.x,
                transform.scale.y,
                transform.scale.z,
            );
        }
        Ok(())
    }

    fn ensure_placeholder(&mut self, builder: &TextureBuilder<'_>) -> Result<TextureId, GpuError> {
        if let Some(id) = self.placeholder {
            return Ok(id);
        }
        let id = builder.placeholder()?;
        self.placeholder = Some(id);
        Ok(id)
    }

    fn push_material(&mut self) {
        let Some(live) = &self.live else {
            return;
        };
        let m = &mut self.material;
        let meta = &live.metadata;

        m.set_texture(TEX_LABELS, live.gpu.label);
        match (live.gpu.weight, self.placeholder) {
            (Some(weight), _) => {
                m.set_texture(TEX_WEIGHTS, weight);
                m.set_int(INT_HAS_WEIGHTS, 1);
            }
            (None, placeholder) => {
                if let Some(black) = placeholder {
                    m.set_texture(TEX_WEIGHTS, black);
                }
                m.set_int(INT_HAS_WEIGHTS, 0);
            }
        }
        m.set_texture(TEX_TF, live.gpu.lut(self.use_hard_tf));
        m.set_texture(TEX_LABEL_CTRL, live.control_tex);
        m.set_int(INT_IS_LABEL_MAP, i32::from(live.tf.kind == TfKind::Labelmap));

        let [p1, p99] = meta.intensity_window(live.tf.kind);
        m.set_float(FLOAT_P1, p1);
        m.set_float(FLOAT_P99, p99);
        m.set_vector(
            VEC_DIM,
            Vec4::new(meta.dim[0] as f32, meta.dim[1] as f32, meta.dim[2] as f32, 1.0),
        );
        m.set_matrix(MAT_AFFINE, meta.affine_matrix());
        m.set_matrix(MAT_INV_AFFINE, meta.inverse_affine());
    }

    fn rebuild_registry(&mut self) {
        self.registry = match &self.live {
            Some(live) => LabelRegistry::rebuild(&live.tf, Some(live.luts.active(self.use_hard_tf))),
            None => LabelRegistry::default(),
        };
        debug!(
            "label registry: {} entries ({} LUT)",
            self.registry.len(),
            if self.use_hard_tf { "hard" } else { "soft" }
        );
    }

    fn release_live(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        let ids = live.gpu.ids().len() + 1;
        live.gpu.release(self.backend.as_ref());
        self.backend.release(live.control_tex);
        self.registry = LabelRegistry::default();
        self.state = VolumeState::Unloaded;
        debug!("released {ids} texture(s) of previous volume");
    }

    // =========================================================================
    // Display settings
    // =========================================================================

    /// Switches between hard and soft LUT.
    pub fn set_transfer_function_mode(&mut self, hard: bool) {
        self.use_hard_tf = hard;
        if let Some(live) = &self.live {
            self.material.set_texture(TEX_TF, live.gpu.lut(hard));
        }
        self.rebuild_registry();
    }

    /// Selects a debug visualization.
    pub fn set_debug_view(&mut self, view: DebugView) {
        for kw in DEBUG_KEYWORDS {
            self.material.set_keyword(kw, false);
        }
        if let Some(kw) = view.keyword() {
            self.material.set_keyword(kw, true);
        }
        self.debug_view = view;
    }

    /// Reports the host's world scale. Pushes compensation factors when it changed.
    pub fn observe_world_scale(&mut self, scale: Vec3) {
        if let Some(c) = self.scale_comp.observe(scale) {
            self.material.set_vector(VEC_SCALE_COMP, c.per_axis.extend(1.0));
            self.material.set_float(FLOAT_DENSITY_COMP, c.density);
        }
    }

    // =========================================================================
    // Label operations
    // =========================================================================

    /// Shows or hides one label.
    pub fn set_label_visible(&mut self, index: u8, visible: bool) {
        self.edit_labels("set_label_visible", |c| c.set_visible(index, visible));
    }

    /// Sets one label's opacity (clamped to [0, 1]).
    pub fn set_label_opacity(&mut self, index: u8, opacity: f32) {
        self.edit_labels("set_label_opacity", |c| c.set_opacity(index, opacity));
    }

    /// Tints one label.
    pub fn set_label_tint(&mut self, index: u8, rgb: [f32; 3]) {
        self.edit_labels("set_label_tint", |c| c.set_tint(index, rgb));
    }

    /// Hides every label but one.
    pub fn solo_label(&mut self, index: u8) {
        self.edit_labels("solo_label", |c| c.solo(index));
    }

    /// Makes every label visible and untinted.
    pub fn show_all(&mut self) {
        self.edit_labels("show_all", LabelControl::show_all);
    }

    fn edit_labels(&mut self, op: &str, edit: impl FnOnce(&mut LabelControl)) {
        let Some(live) = self.live.as_mut() else {
            warn!("{op}: no volume loaded");
            return;
        };
        edit(&mut live.control);
        let Some(span) = live.control.take_dirty() else {
            return;
        };
        if let Err(e) = self.backend.write_table(live.control_tex, span.offset, &span.texels) {
            warn!("{op}: label control upload failed: {e}");
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// False when the volume shader was missing.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolved shader profile.
    pub fn profile(&self) -> ShaderProfile {
        self.profile
    }

    /// Addressable labels.
    pub fn labels(&self) -> &[LabelInfo] {
        self.registry.labels()
    }

    /// Full registry.
    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    /// Label control table of the live volume.
    pub fn label_control(&self) -> Option<&LabelControl> {
        self.live.as_ref().map(|l| &l.control)
    }

    /// Textures of the live volume.
    pub fn gpu_volume(&self) -> Option<&GpuVolume> {
        self.live.as_ref().map(|l| &l.gpu)
    }

    /// Control texture of the live volume.
    pub fn control_texture(&self) -> Option<TextureId> {
        self.live.as_ref().map(|l| l.control_tex)
    }

    /// Metadata of the live volume.
    pub fn metadata(&self) -> Option<&VolumeMetadata> {
        self.live.as_ref().map(|l| &l.metadata)
    }

    /// Transfer function of the live volume.
    pub fn transfer_function(&self) -> Option<&TransferFunction> {
        self.live.as_ref().map(|l| &l.tf)
    }

    /// File the live volume came from.
    pub fn source(&self) -> Option<&Path> {
        self.live.as_ref().and_then(|l| l.source.as_deref())
    }

    /// Object transform of the live volume.
    pub fn transform(&self) -> Option<VolumeTransform> {
        self.live.as_ref().map(|l| l.transform)
    }

    /// True when the hard LUT is active.
    pub fn use_hard_tf(&self) -> bool {
        self.use_hard_tf
    }

    /// Active debug view.
    pub fn debug_view(&self) -> DebugView {
        self.debug_view
    }

    /// Render material.
    pub fn material(&self) -> &M {
        &self.material
    }

    /// Mutable render material.
    pub fn material_mut(&mut self) -> &mut M {
        &mut self.material
    }

    /// Texture backend.
    pub fn backend(&self) -> &Arc<dyn TextureBackend> {
        &self.backend
    }

    /// File resolver.
    pub fn locator(&self) -> &VolumeLocator {
        &self.locator
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Releases every texture, including the placeholder, and stops the loader.
    pub fn shutdown(&mut self) {
        self.loader = None;
        self.pending = None;
        self.release_live();
        if let Some(id) = self.placeholder.take() {
            self.backend.release(id);
        }
        self.state = VolumeState::Unloaded;
    }
}

impl<M: MaterialSink> Drop for VolumeController<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
