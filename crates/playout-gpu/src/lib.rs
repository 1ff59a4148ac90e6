//! Playout GPU - device buffers and asynchronous upload
//!
//! Frames reach the GPU through [`DeviceBuffer::begin_read`], which issues
//! the copy from a host buffer and returns at once. Completion is observed
//! by polling [`DeviceBuffer::ready`]; nothing in this crate waits on the
//! device except context creation and host buffer remapping.
//!
//! Backends implement [`GpuBackend`]: [`WgpuBackend`] drives a real device,
//! [`SoftwareBackend`] keeps textures in memory for tests.

pub mod backend;
pub mod buffer_pool;
pub mod context;
pub mod device_buffer;
pub mod fence;
pub mod software;
pub mod wgpu_backend;

pub use backend::{GpuBackend, HostBuffer, TexelFormat, TextureId};
pub use buffer_pool::DeviceBufferPool;
pub use context::{GpuContext, GpuRequirements};
pub use device_buffer::DeviceBuffer;
pub use fence::{CompletionFence, FenceSignal};
pub use software::{BackendOp, SoftwareBackend, SoftwareHostBuffer};
pub use wgpu_backend::{WgpuBackend, WgpuHostBuffer};
