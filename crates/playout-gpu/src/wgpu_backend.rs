//! [`GpuBackend`] on top of wgpu.
//!
//! wgpu has no global binding state, so the unit/binding/attachment model is
//! tracked here and resolved to explicit copy and render-pass commands.
//! Host buffers are mappable staging buffers; fences ride on
//! `Queue::on_submitted_work_done` and are advanced by non-blocking polls.

use crate::backend::{GpuBackend, HostBuffer, TexelFormat, TextureId};
use crate::context::{GpuContext, DEVICE_BUFFER_USAGES};
use crate::fence::FenceSignal;
use parking_lot::Mutex;
use playout_core::{PlayoutError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

pub(crate) fn texture_format(format: TexelFormat) -> Result<wgpu::TextureFormat> {
    match format {
        TexelFormat::R8 => Ok(wgpu::TextureFormat::R8Unorm),
        TexelFormat::Rg8 => Ok(wgpu::TextureFormat::Rg8Unorm),
        TexelFormat::Bgra8 => Ok(wgpu::TextureFormat::Bgra8Unorm),
        TexelFormat::Bgr8 => Err(PlayoutError::UnsupportedFormat(
            "wgpu has no 3-channel 8-bit texture format".into(),
        )),
    }
}

struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TexelFormat,
}

#[derive(Default)]
struct WgpuState {
    next_id: u32,
    textures: HashMap<TextureId, WgpuTexture>,
    active_unit: u32,
    bound: HashMap<u32, TextureId>,
    attachments: BTreeMap<u32, TextureId>,
}

/// A GPU backend driving a real wgpu device.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    clear_color: wgpu::Color,
    state: Mutex<WgpuState>,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            clear_color: wgpu::Color::TRANSPARENT,
            state: Mutex::new(WgpuState::default()),
        }
    }

    pub fn from_context(context: &GpuContext) -> Self {
        Self::new(Arc::clone(&context.device), Arc::clone(&context.queue))
    }
}

impl GpuBackend for WgpuBackend {
    type HostBuffer = WgpuHostBuffer;

    fn create_texture(&self, width: u32, height: u32, format: TexelFormat) -> Result<TextureId> {
        let wgpu_format = texture_format(format)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Device Buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format,
            usage: DEVICE_BUFFER_USAGES,
            view_formats: &[],
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = validation.or(out_of_memory) {
            texture.destroy();
            return Err(PlayoutError::Gpu(format!(
                "Failed to create {width}x{height} {format:?} texture: {e}"
            )));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = TextureId(state.next_id);
        state.textures.insert(
            id,
            WgpuTexture {
                texture,
                view,
                width,
                height,
                format,
            },
        );
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .textures
            .remove(&texture)
            .ok_or_else(|| PlayoutError::Gpu(format!("unknown texture {}", texture.0)))?;
        state.bound.retain(|_, t| *t != texture);
        state.attachments.retain(|_, t| *t != texture);
        entry.texture.destroy();
        Ok(())
    }

    fn set_active_unit(&self, unit: u32) -> Result<()> {
        self.state.lock().active_unit = unit;
        Ok(())
    }

    fn bind_texture(&self, texture: Option<TextureId>) -> Result<()> {
        let mut state = self.state.lock();
        let unit = state.active_unit;
        match texture {
            Some(id) if !state.textures.contains_key(&id) => {
                Err(PlayoutError::Gpu(format!("unknown texture {}", id.0)))
            }
            Some(id) => {
                state.bound.insert(unit, id);
                Ok(())
            }
            None => {
                state.bound.remove(&unit);
                Ok(())
            }
        }
    }

    fn attach_color(&self, index: u32, texture: TextureId) -> Result<()> {
        let max = self.device.limits().max_color_attachments;
        if index >= max {
            return Err(PlayoutError::Gpu(format!(
                "color attachment {index} exceeds device limit {max}"
            )));
        }
        let mut state = self.state.lock();
        if !state.textures.contains_key(&texture) {
            return Err(PlayoutError::Gpu(format!("unknown texture {}", texture.0)));
        }
        state.attachments.insert(index, texture);
        Ok(())
    }

    fn clear_color(&self) -> Result<()> {
        let state = self.state.lock();
        if state.attachments.is_empty() {
            return Err(PlayoutError::Gpu("no color attachment to clear".into()));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Device Buffer Clear"),
            });
        // one pass per attachment: attachments may differ in size
        for id in state.attachments.values() {
            let target = &state.textures[id];
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Device Buffer Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn upload_bound(
        &self,
        source: &WgpuHostBuffer,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<()> {
        if source.is_mapped() || !source.is_bound() {
            return Err(PlayoutError::Gpu(
                "host buffer must be unmapped and bound before upload".into(),
            ));
        }
        if (source.width, source.height, source.format) != (width, height, format) {
            return Err(PlayoutError::Gpu(format!(
                "host buffer {}x{} {:?} does not match upload {}x{} {:?}",
                source.width, source.height, source.format, width, height, format
            )));
        }

        let state = self.state.lock();
        let unit = state.active_unit;
        let target = state
            .bound
            .get(&unit)
            .and_then(|id| state.textures.get(id))
            .ok_or_else(|| PlayoutError::Gpu(format!("no texture bound on unit {unit}")))?;
        if (target.width, target.height, target.format) != (width, height, format) {
            return Err(PlayoutError::Gpu(format!(
                "upload {}x{} {:?} does not match texture {}x{} {:?}",
                width, height, format, target.width, target.height, target.format
            )));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Device Buffer Upload"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &source.buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(source.bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            target.texture.as_image_copy(),
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn insert_fence(&self) -> Result<FenceSignal> {
        let signal = FenceSignal::new();
        let on_done = signal.clone();
        self.queue.on_submitted_work_done(move || on_done.signal());
        Ok(signal)
    }

    fn poll(&self) {
        let _ = self.device.poll(wgpu::Maintain::Poll);
    }
}

/// Mappable staging buffer laid out for texture copies.
///
/// Rows are padded to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`. The buffer is
/// created mapped; after a `begin_read` it must be remapped before the next
/// write.
pub struct WgpuHostBuffer {
    device: Arc<wgpu::Device>,
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    format: TexelFormat,
    bytes_per_row: u32,
    mapped: bool,
    bound: bool,
}

impl WgpuHostBuffer {
    pub fn new(backend: &WgpuBackend, width: u32, height: u32, format: TexelFormat) -> Result<Self> {
        texture_format(format)?;
        let unpadded = width * format.stride() as u32;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let bytes_per_row = unpadded.div_ceil(align) * align;
        let size = bytes_per_row as u64 * height as u64;

        let buffer = backend.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Host Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        debug!(size, bytes_per_row, "[host_buffer] allocated");

        Ok(Self {
            device: Arc::clone(&backend.device),
            buffer,
            width,
            height,
            format,
            bytes_per_row,
            mapped: true,
            bound: false,
        })
    }

    /// Copy a tightly packed image into the padded rows of the buffer.
    pub fn write(&mut self, packed: &[u8]) -> Result<()> {
        if !self.mapped {
            return Err(PlayoutError::Gpu("host buffer is not mapped".into()));
        }
        let row = self.width as usize * self.format.stride();
        let needed = row * self.height as usize;
        if packed.len() < needed {
            return Err(PlayoutError::InvalidParameter(format!(
                "image holds {} bytes, host buffer needs {needed}",
                packed.len()
            )));
        }

        let mut view = self.buffer.slice(..).get_mapped_range_mut();
        for (y, src) in packed.chunks_exact(row).take(self.height as usize).enumerate() {
            let start = y * self.bytes_per_row as usize;
            view[start..start + row].copy_from_slice(src);
        }
        Ok(())
    }

    /// Map the buffer for writing again.
    ///
    /// Blocks until the device has finished reading the previous contents,
    /// so call it only once the device buffer reports ready.
    pub fn remap(&mut self) -> Result<()> {
        if self.mapped {
            return Ok(());
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Write, move |result| {
                let _ = tx.send(result);
            });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| PlayoutError::Gpu("map callback was dropped".into()))?
            .map_err(|e| PlayoutError::Gpu(format!("Failed to map host buffer: {e}")))?;
        self.mapped = true;
        Ok(())
    }
}

impl HostBuffer for WgpuHostBuffer {
    fn size(&self) -> usize {
        self.buffer.size() as usize
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn unmap(&mut self) -> Result<()> {
        if self.mapped {
            self.buffer.unmap();
            self.mapped = false;
        }
        Ok(())
    }

    fn bind(&mut self) -> Result<()> {
        self.bound = true;
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        self.bound = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_channel_textures_are_unsupported() {
        assert!(matches!(
            texture_format(TexelFormat::Bgr8),
            Err(PlayoutError::UnsupportedFormat(_))
        ));
        assert_eq!(
            texture_format(TexelFormat::Bgra8).unwrap(),
            wgpu::TextureFormat::Bgra8Unorm
        );
    }
}
