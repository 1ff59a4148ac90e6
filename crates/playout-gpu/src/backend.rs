//! The GPU capability layer seen by device buffers.
//!
//! The interface is modeled on a stateful texture API: there is an active
//! texture unit, a texture bound on each unit, a set of render-target color
//! attachments, and a host buffer that must be bound and unmapped before the
//! device may read from it. Backends keep that state internally and report
//! every failure as an error instead of aborting.

use crate::fence::FenceSignal;
use playout_core::{PlayoutError, Result};
use serde::{Deserialize, Serialize};

/// Handle to a texture owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Texel layout of a device buffer, selected by channel stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexelFormat {
    /// 1 channel
    R8,
    /// 2 channels
    Rg8,
    /// 3 channels, blue first
    Bgr8,
    /// 4 channels, blue first
    Bgra8,
}

impl TexelFormat {
    /// Map a channel stride (1-4) to a texel format.
    pub fn from_stride(stride: usize) -> Result<Self> {
        match stride {
            1 => Ok(Self::R8),
            2 => Ok(Self::Rg8),
            3 => Ok(Self::Bgr8),
            4 => Ok(Self::Bgra8),
            other => Err(PlayoutError::InvalidParameter(format!(
                "channel stride must be 1-4, got {other}"
            ))),
        }
    }

    /// Channels per texel; one byte each.
    pub fn stride(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Bgr8 => 3,
            Self::Bgra8 => 4,
        }
    }

    /// Tightly packed size of a `width` x `height` image.
    pub fn image_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.stride()
    }
}

/// Host-resident pixel storage the device can copy from.
pub trait HostBuffer: Send {
    /// Size of the storage in bytes.
    fn size(&self) -> usize;

    /// Whether the host currently has the storage mapped for writing.
    fn is_mapped(&self) -> bool;

    /// Whether the buffer is bound as the upload source.
    fn is_bound(&self) -> bool;

    /// End host access so the device may read. Unmapping twice is a no-op.
    fn unmap(&mut self) -> Result<()>;

    fn bind(&mut self) -> Result<()>;

    fn unbind(&mut self) -> Result<()>;
}

/// Texture lifecycle, upload and fence primitives of a GPU.
///
/// Calls are not atomic with respect to each other: a bind followed by an
/// upload must not be interleaved with another caller's bind. Callers
/// serialize use of one backend.
pub trait GpuBackend: Send + Sync {
    type HostBuffer: HostBuffer;

    /// Allocate a `width` x `height` texture. Contents are undefined.
    fn create_texture(&self, width: u32, height: u32, format: TexelFormat) -> Result<TextureId>;

    /// Release a texture, unbinding and detaching it first.
    fn delete_texture(&self, texture: TextureId) -> Result<()>;

    /// Select the texture unit later binds apply to.
    fn set_active_unit(&self, unit: u32) -> Result<()>;

    /// Bind `texture` on the active unit, or clear the binding with `None`.
    fn bind_texture(&self, texture: Option<TextureId>) -> Result<()>;

    /// Use `texture` as render-target color attachment `index`.
    fn attach_color(&self, index: u32, texture: TextureId) -> Result<()>;

    /// Clear every color attachment to the backend's clear color.
    fn clear_color(&self) -> Result<()>;

    /// Start copying `source` into the texture bound on the active unit.
    ///
    /// `source` must be bound and unmapped. Returns once the copy has been
    /// submitted; completion is observed through [`GpuBackend::insert_fence`].
    fn upload_bound(
        &self,
        source: &Self::HostBuffer,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<()>;

    /// A signal that fires once all work submitted so far has completed.
    fn insert_fence(&self) -> Result<FenceSignal>;

    /// Let the backend deliver completions without waiting. Must not block.
    fn poll(&self) {}
}
