//! Opening a wgpu device fit for a playout channel.
//!
//! A channel uploads frames of one video format into device buffers of a
//! few texel formats. [`GpuRequirements`] turns that into a texture size
//! limit and a list of formats the adapter must be able to copy into and
//! clear; adapters that fall short are rejected before a device is created.

use crate::backend::TexelFormat;
use crate::wgpu_backend::texture_format;
use playout_core::{PlayoutError, Result, VideoFormatDesc};
use std::sync::Arc;
use tracing::{debug, info};

/// Usages every device buffer texture is created with.
pub(crate) const DEVICE_BUFFER_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT);

/// What the device must support for the buffers a channel allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuRequirements {
    pub max_width: u32,
    pub max_height: u32,
    pub texel_formats: Vec<TexelFormat>,
}

impl GpuRequirements {
    /// Full-frame BGRA uploads of `format`.
    pub fn for_format(format: &VideoFormatDesc) -> Self {
        Self {
            max_width: format.width,
            max_height: format.height,
            texel_formats: vec![TexelFormat::Bgra8],
        }
    }

    /// Also allow buffers of `format`, e.g. single-channel key signals.
    pub fn with_texel_format(mut self, format: TexelFormat) -> Self {
        if !self.texel_formats.contains(&format) {
            self.texel_formats.push(format);
        }
        self
    }

    /// Largest texture edge the device must accept.
    pub fn max_dimension(&self) -> u32 {
        self.max_width.max(self.max_height)
    }

    /// Device limits: downlevel defaults, raised to fit the frame size.
    pub fn limits(&self) -> wgpu::Limits {
        let defaults = wgpu::Limits::downlevel_defaults();
        wgpu::Limits {
            max_texture_dimension_2d: defaults.max_texture_dimension_2d.max(self.max_dimension()),
            ..defaults
        }
    }

    /// Map every requested texel format to its wgpu format.
    fn wgpu_formats(&self) -> Result<Vec<wgpu::TextureFormat>> {
        self.texel_formats.iter().map(|f| texture_format(*f)).collect()
    }

    /// Reject an adapter that cannot hold the frame or lacks a format usage.
    fn check_adapter(&self, adapter: &wgpu::Adapter) -> Result<()> {
        let supported = adapter.limits().max_texture_dimension_2d;
        if supported < self.max_dimension() {
            return Err(PlayoutError::UnsupportedFormat(format!(
                "adapter textures are limited to {supported}px, frames need {}px",
                self.max_dimension()
            )));
        }
        for format in self.wgpu_formats()? {
            let features = adapter.get_texture_format_features(format);
            if !features.allowed_usages.contains(DEVICE_BUFFER_USAGES) {
                return Err(PlayoutError::UnsupportedFormat(format!(
                    "adapter cannot upload to and clear {format:?} textures"
                )));
            }
        }
        Ok(())
    }
}

/// Device and queue shared by every [`WgpuBackend`](crate::WgpuBackend) of a channel.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Pick a high-performance adapter meeting `requirements` and open a
    /// device on it. No surface is needed: outputs present on their own.
    ///
    /// Every failure is reported as [`PlayoutError::ResourceInit`], except
    /// [`PlayoutError::UnsupportedFormat`] for an adapter that is too small.
    pub async fn open(requirements: &GpuRequirements) -> Result<Self> {
        requirements.wgpu_formats()?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| PlayoutError::ResourceInit("no GPU adapter available".into()))?;

        let adapter_info = adapter.get_info();
        debug!(adapter = %adapter_info.name, backend = ?adapter_info.backend, "[gpu] checking adapter");
        requirements.check_adapter(&adapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Playout Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: requirements.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| PlayoutError::Gpu(format!("device request failed: {e}")).into_resource_init())?;

        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            max_dimension = requirements.max_dimension(),
            "GPU device opened"
        );
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Blocking [`GpuContext::open`].
    pub fn open_blocking(requirements: &GpuRequirements) -> Result<Self> {
        pollster::block_on(Self::open(requirements))
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }
}
