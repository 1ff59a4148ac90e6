//! Device-resident image buffers.

use crate::backend::{GpuBackend, HostBuffer, TexelFormat, TextureId};
use crate::fence::CompletionFence;
use playout_core::{PlayoutError, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// One 2D texture on the device plus the fence of its last upload.
///
/// Storage is allocated and cleared on construction and released on drop.
/// The buffer is single-owner; wrap it in an `Arc` to share it.
pub struct DeviceBuffer<B: GpuBackend> {
    backend: Arc<B>,
    texture: TextureId,
    width: u32,
    height: u32,
    format: TexelFormat,
    fence: CompletionFence,
}

impl<B: GpuBackend> DeviceBuffer<B> {
    /// Allocate a buffer with `stride` one-byte channels per texel (1-4).
    pub fn new(backend: Arc<B>, width: u32, height: u32, stride: usize) -> Result<Self> {
        let format = TexelFormat::from_stride(stride)?;
        Self::with_format(backend, width, height, format)
    }

    /// Allocate a buffer of the given texel format.
    ///
    /// Any backend failure is reported as [`PlayoutError::ResourceInit`];
    /// storage allocated before the failure is released again.
    pub fn with_format(
        backend: Arc<B>,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PlayoutError::InvalidParameter(format!(
                "device buffer must not be empty, got {width}x{height}"
            )));
        }

        let texture = backend
            .create_texture(width, height, format)
            .map_err(PlayoutError::into_resource_init)?;

        let buffer = Self {
            backend,
            texture,
            width,
            height,
            format,
            fence: CompletionFence::new(),
        };
        buffer.clear().map_err(PlayoutError::into_resource_init)?;

        debug!(
            texture = texture.0,
            size = format.image_size(width, height),
            "[device_buffer] allocated"
        );
        Ok(buffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per texel.
    pub fn stride(&self) -> usize {
        self.format.stride()
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn memory_size(&self) -> usize {
        self.format.image_size(self.width, self.height)
    }

    /// Bind on the active texture unit.
    pub fn bind(&self) -> Result<()> {
        self.backend.bind_texture(Some(self.texture))
    }

    /// Bind on texture unit `index`, making it the active unit.
    pub fn bind_unit(&self, index: u32) -> Result<()> {
        self.backend.set_active_unit(index)?;
        self.bind()
    }

    /// Clear the binding of the active texture unit.
    pub fn unbind(&self) -> Result<()> {
        self.backend.bind_texture(None)
    }

    /// Use this buffer as render-target color attachment `index`.
    pub fn attach(&self, index: u32) -> Result<()> {
        self.backend.attach_color(index, self.texture)
    }

    /// Attach at index 0 and clear to the backend's clear color.
    pub fn clear(&self) -> Result<()> {
        self.attach(0)?;
        self.backend.clear_color()
    }

    /// Start an asynchronous copy of `source` into this buffer.
    ///
    /// Ends the host mapping of `source` before the copy is issued. The caller
    /// must not write to `source` again, and must not read this buffer, until
    /// [`DeviceBuffer::ready`] returns true.
    pub fn begin_read(&mut self, source: &mut B::HostBuffer) -> Result<()> {
        self.bind()?;
        let issued = self.issue_upload(source);
        // bindings are restored even when the copy was never issued
        let source_unbound = source.unbind();
        let unbound = self.unbind();
        issued.and(source_unbound).and(unbound)?;
        self.fence.set(self.backend.insert_fence()?);
        Ok(())
    }

    fn issue_upload(&self, source: &mut B::HostBuffer) -> Result<()> {
        source.unmap()?;
        source.bind()?;
        self.backend
            .upload_bound(source, self.width, self.height, self.format)
    }

    /// Whether the last `begin_read` has completed. Never waits.
    pub fn ready(&self) -> bool {
        if self.fence.ready() {
            return true;
        }
        self.backend.poll();
        self.fence.ready()
    }
}

impl<B: GpuBackend> Drop for DeviceBuffer<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.delete_texture(self.texture) {
            error!(texture = self.texture.0, error = %e, "[device_buffer] failed to release texture");
        }
    }
}

impl<B: GpuBackend> std::fmt::Debug for DeviceBuffer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("texture", &self.texture)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("ready", &self.fence.ready())
            .finish()
    }
}
