//! wgpu backend implementation.
//!
//! Real GPU textures: single-channel 3D volumes and `Rgba16Float` lookup
//! tables. Out-of-memory conditions are caught with error scopes and
//! reported as [`GpuError::ResourceExhaustion`].

use half::f16;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace};

use vrdf_lut::LutFilter;

use super::{check_span, ResidencyStats, TextureBackend, TextureId, VolumeTexels};
use crate::{GpuError, GpuResult, TextureCaps};

/// Bytes per `Rgba16Float` texel.
const TABLE_TEXEL_BYTES: u64 = 8;

struct WgpuTexture {
    texture: wgpu::Texture,
    width: u32,
    bytes: u64,
    is_table: bool,
}

#[derive(Default)]
struct WgpuState {
    next_id: u64,
    textures: HashMap<TextureId, WgpuTexture>,
    stats: ResidencyStats,
}

/// wgpu texture backend.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    caps: TextureCaps,
    state: Mutex<WgpuState>,
}

impl WgpuBackend {
    /// Check if wgpu is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Create a new backend on the default adapter.
    pub fn new() -> GpuResult<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Create a new backend asynchronously.
    pub async fn new_async() -> GpuResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let float32_filterable = adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE);
        let required_features = if float32_filterable {
            wgpu::Features::FLOAT32_FILTERABLE
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vrdf_gpu_device"),
                required_features,
                required_limits: adapter_limits.clone(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                ..Default::default()
            }, None)
            .await
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        let adapter_info = adapter.get_info();
        let memory_constrained = !float32_filterable
            && adapter_info.device_type != wgpu::DeviceType::DiscreteGpu;
        let caps = TextureCaps {
            max_3d_dim: adapter_limits.max_texture_dimension_3d,
            float32_filterable,
            memory_constrained,
        };
        info!(
            "wgpu adapter '{}' ({:?}): {caps:?}",
            adapter_info.name, adapter_info.backend
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            caps,
            state: Mutex::new(WgpuState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, WgpuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a texture inside an out-of-memory error scope.
    fn allocate(&self, desc: &wgpu::TextureDescriptor<'_>) -> GpuResult<wgpu::Texture> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(desc);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            texture.destroy();
            return Err(GpuError::ResourceExhaustion(format!(
                "{}: {err}",
                desc.label.unwrap_or("texture")
            )));
        }
        Ok(texture)
    }

    fn register(&self, texture: wgpu::Texture, width: u32, bytes: u64, is_table: bool) -> TextureId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = TextureId(state.next_id);
        state.stats.on_create(bytes);
        state.textures.insert(id, WgpuTexture { texture, width, bytes, is_table });
        trace!("create {id} ({bytes} bytes)");
        id
    }

    fn upload_table(&self, texture: &wgpu::Texture, offset: u32, texels: &[[f32; 4]]) {
        let half: Vec<u16> = texels
            .iter()
            .flat_map(|t| t.map(|v| f16::from_f32(v).to_bits()))
            .collect();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: offset, y: 0, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&half),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texels.len() as u32 * TABLE_TEXEL_BYTES as u32),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: texels.len() as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn texture_format(texels: &VolumeTexels) -> wgpu::TextureFormat {
    match texels {
        VolumeTexels::R8(_) => wgpu::TextureFormat::R8Unorm,
        VolumeTexels::R16F(_) => wgpu::TextureFormat::R16Float,
        VolumeTexels::R32F(_) => wgpu::TextureFormat::R32Float,
    }
}

fn texel_bytes(texels: &VolumeTexels) -> Vec<u8> {
    match texels {
        VolumeTexels::R8(v) => v.clone(),
        VolumeTexels::R16F(v) => {
            let bits: Vec<u16> = v.iter().map(|h| h.to_bits()).collect();
            bytemuck::cast_slice(&bits).to_vec()
        }
        VolumeTexels::R32F(v) => bytemuck::cast_slice(v).to_vec(),
    }
}

impl TextureBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn caps(&self) -> &TextureCaps {
        &self.caps
    }

    fn create_volume(&self, label: &str, dim: [u32; 3], texels: VolumeTexels) -> GpuResult<TextureId> {
        if !self.caps.fits(dim) {
            return Err(GpuError::Unsupported(format!(
                "3D texture {}x{}x{} exceeds {}",
                dim[0], dim[1], dim[2], self.caps.max_3d_dim
            )));
        }
        let expected = dim.iter().map(|&d| d as usize).product::<usize>();
        if texels.len() != expected {
            return Err(GpuError::CorruptVolume {
                what: "texels",
                expected,
                actual: texels.len(),
            });
        }

        let size = wgpu::Extent3d {
            width: dim[0],
            height: dim[1],
            depth_or_array_layers: dim[2],
        };
        let texture = self.allocate(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: texture_format(&texels),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })?;

        let bpp = texels.format().bytes_per_texel() as u32;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texel_bytes(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dim[0] * bpp),
                rows_per_image: Some(dim[1]),
            },
            size,
        );
        debug!("uploaded {label} {}x{}x{} {:?}", dim[0], dim[1], dim[2], texels.format());
        Ok(self.register(texture, dim[0], texels.byte_len(), false))
    }

    fn create_table(&self, label: &str, texels: &[[f32; 4]], _filter: LutFilter) -> GpuResult<TextureId> {
        // Filtering is a sampler property; the texture itself is the same.
        let width = texels.len() as u32;
        let texture = self.allocate(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })?;
        self.upload_table(&texture, 0, texels);
        Ok(self.register(texture, width, width as u64 * TABLE_TEXEL_BYTES, true))
    }

    fn write_table(&self, id: TextureId, offset: usize, texels: &[[f32; 4]]) -> GpuResult<()> {
        let state = self.lock();
        let entry = state
            .textures
            .get(&id)
            .filter(|t| t.is_table)
            .ok_or(GpuError::UnknownTexture(id))?;
        check_span(offset, texels.len(), entry.width as usize)?;
        if !texels.is_empty() {
            self.upload_table(&entry.texture, offset as u32, texels);
        }
        Ok(())
    }

    fn release(&self, id: TextureId) -> bool {
        let mut state = self.lock();
        match state.textures.remove(&id) {
            Some(entry) => {
                entry.texture.destroy();
                state.stats.on_release(entry.bytes);
                trace!("release {id}");
                true
            }
            None => false,
        }
    }

    fn stats(&self) -> ResidencyStats {
        self.lock().stats
    }
}
