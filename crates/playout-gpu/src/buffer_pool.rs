//! Pool of device buffers for per-frame reuse.
//!
//! Avoids allocating/deallocating textures every frame by keeping released
//! buffers keyed by (width, height, format).

use crate::backend::{GpuBackend, TexelFormat};
use crate::device_buffer::DeviceBuffer;
use playout_core::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Key for pooled buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    width: u32,
    height: u32,
    format: TexelFormat,
}

impl<B: GpuBackend> From<&DeviceBuffer<B>> for BufferKey {
    fn from(buffer: &DeviceBuffer<B>) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            format: buffer.format(),
        }
    }
}

/// Pool of reusable device buffers under a memory budget.
pub struct DeviceBufferPool<B: GpuBackend> {
    backend: Arc<B>,
    /// Free buffers, keyed by dimensions + format.
    free: HashMap<BufferKey, Vec<DeviceBuffer<B>>>,
    /// Memory held by free buffers.
    total_memory: usize,
    max_memory: usize,
}

impl<B: GpuBackend> DeviceBufferPool<B> {
    pub fn new(backend: Arc<B>, max_memory: usize) -> Self {
        Self {
            backend,
            free: HashMap::new(),
            total_memory: 0,
            max_memory,
        }
    }

    /// Take a free buffer whose last upload has completed, or allocate one.
    pub fn acquire(&mut self, width: u32, height: u32, stride: usize) -> Result<DeviceBuffer<B>> {
        let format = TexelFormat::from_stride(stride)?;
        let key = BufferKey {
            width,
            height,
            format,
        };

        if let Some(buffers) = self.free.get_mut(&key) {
            if let Some(pos) = buffers.iter().position(DeviceBuffer::ready) {
                let buffer = buffers.swap_remove(pos);
                self.total_memory -= buffer.memory_size();
                return Ok(buffer);
            }
        }

        DeviceBuffer::with_format(Arc::clone(&self.backend), width, height, format)
    }

    /// Return a buffer for reuse. Dropped instead if the pool is over budget.
    pub fn release(&mut self, buffer: DeviceBuffer<B>) {
        let mem = buffer.memory_size();
        if self.total_memory + mem > self.max_memory {
            return;
        }

        self.total_memory += mem;
        self.free
            .entry(BufferKey::from(&buffer))
            .or_default()
            .push(buffer);
    }

    /// Memory held by free buffers.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Number of free buffers.
    pub fn buffer_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Release every free buffer.
    pub fn clear(&mut self) {
        self.free.clear();
        self.total_memory = 0;
    }

    /// Drop free buffers until memory is at or below `target_memory`.
    pub fn evict_to(&mut self, target_memory: usize) {
        while self.total_memory > target_memory {
            let key = self
                .free
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .max_by_key(|(_, v)| v.len())
                .map(|(k, _)| *k);

            let Some(key) = key else { break };
            if let Some(buffers) = self.free.get_mut(&key) {
                if let Some(buffer) = buffers.pop() {
                    self.total_memory -= buffer.memory_size();
                }
                if buffers.is_empty() {
                    self.free.remove(&key);
                }
            }
        }
    }
}
