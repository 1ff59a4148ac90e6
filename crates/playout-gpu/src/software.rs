//! In-memory GPU backend.
//!
//! Textures live in host memory and uploads stay in flight until
//! [`SoftwareBackend::complete_pending`] is called, which lets tests observe
//! a fence before and after completion. Individual operations can be made
//! to fail once with [`SoftwareBackend::fail_next`].

use crate::backend::{GpuBackend, HostBuffer, TexelFormat, TextureId};
use crate::fence::FenceSignal;
use parking_lot::Mutex;
use playout_core::{PlayoutError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateTexture,
    DeleteTexture,
    Bind,
    Attach,
    Clear,
    Upload,
    Fence,
}

struct SoftwareTexture {
    width: u32,
    height: u32,
    format: TexelFormat,
    texels: Vec<u8>,
}

struct PendingUpload {
    target: TextureId,
    texels: Vec<u8>,
}

#[derive(Default)]
struct SoftwareState {
    next_id: u32,
    textures: HashMap<TextureId, SoftwareTexture>,
    active_unit: u32,
    bound: HashMap<u32, TextureId>,
    attachments: BTreeMap<u32, TextureId>,
    clear_value: [u8; 4],
    in_flight: Vec<PendingUpload>,
    fences: Vec<FenceSignal>,
    faults: HashSet<BackendOp>,
}

impl SoftwareState {
    fn check(&mut self, op: BackendOp) -> Result<()> {
        if self.faults.remove(&op) {
            return Err(PlayoutError::Gpu(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

/// GPU backend double with synchronous readback.
#[derive(Default)]
pub struct SoftwareBackend {
    state: Mutex<SoftwareState>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear color in texture channel order; channels beyond the texture's
    /// stride are ignored.
    pub fn with_clear_value(self, clear_value: [u8; 4]) -> Self {
        self.state.lock().clear_value = clear_value;
        self
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: BackendOp) {
        self.state.lock().faults.insert(op);
    }

    /// Finish every in-flight upload and signal the fences covering them.
    /// Returns the number of uploads applied.
    pub fn complete_pending(&self) -> usize {
        let mut state = self.state.lock();
        let uploads = std::mem::take(&mut state.in_flight);
        let applied = uploads.len();
        for upload in uploads {
            // the texture may have been deleted while the copy was in flight
            if let Some(texture) = state.textures.get_mut(&upload.target) {
                texture.texels = upload.texels;
            }
        }
        for fence in state.fences.drain(..) {
            fence.signal();
        }
        applied
    }

    pub fn pending_uploads(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Copy of a texture's contents, tightly packed.
    pub fn read_texels(&self, texture: TextureId) -> Result<Vec<u8>> {
        self.state
            .lock()
            .textures
            .get(&texture)
            .map(|t| t.texels.clone())
            .ok_or_else(|| PlayoutError::Gpu(format!("unknown texture {}", texture.0)))
    }

    pub fn texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn active_unit(&self) -> u32 {
        self.state.lock().active_unit
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.state.lock().bound.get(&unit).copied()
    }

    pub fn attachment(&self, index: u32) -> Option<TextureId> {
        self.state.lock().attachments.get(&index).copied()
    }
}

impl GpuBackend for SoftwareBackend {
    type HostBuffer = SoftwareHostBuffer;

    fn create_texture(&self, width: u32, height: u32, format: TexelFormat) -> Result<TextureId> {
        let mut state = self.state.lock();
        state.check(BackendOp::CreateTexture)?;
        state.next_id += 1;
        let id = TextureId(state.next_id);
        state.textures.insert(
            id,
            SoftwareTexture {
                width,
                height,
                format,
                // garbage until cleared, like real device memory
                texels: vec![0xCD; format.image_size(width, height)],
            },
        );
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) -> Result<()> {
        let mut state = self.state.lock();
        state.check(BackendOp::DeleteTexture)?;
        if state.textures.remove(&texture).is_none() {
            return Err(PlayoutError::Gpu(format!("unknown texture {}", texture.0)));
        }
        state.bound.retain(|_, t| *t != texture);
        state.attachments.retain(|_, t| *t != texture);
        Ok(())
    }

    fn set_active_unit(&self, unit: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.check(BackendOp::Bind)?;
        state.active_unit = unit;
        Ok(())
    }

    fn bind_texture(&self, texture: Option<TextureId>) -> Result<()> {
        let mut state = self.state.lock();
        state.check(BackendOp::Bind)?;
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
        let mut state = self.state.lock();
        state.check(BackendOp::Attach)?;
        if !state.textures.contains_key(&texture) {
            return Err(PlayoutError::Gpu(format!("unknown texture {}", texture.0)));
        }
        state.attachments.insert(index, texture);
        Ok(())
    }

    fn clear_color(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.check(BackendOp::Clear)?;
        if state.attachments.is_empty() {
            return Err(PlayoutError::Gpu("no color attachment to clear".into()));
        }
        let clear_value = state.clear_value;
        let targets: Vec<TextureId> = state.attachments.values().copied().collect();
        for id in targets {
            if let Some(texture) = state.textures.get_mut(&id) {
                let stride = texture.format.stride();
                for texel in texture.texels.chunks_mut(stride) {
                    texel.copy_from_slice(&clear_value[..stride]);
                }
            }
        }
        Ok(())
    }

    fn upload_bound(
        &self,
        source: &SoftwareHostBuffer,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check(BackendOp::Upload)?;
        if source.is_mapped() || !source.is_bound() {
            return Err(PlayoutError::Gpu(
                "host buffer must be unmapped and bound before upload".into(),
            ));
        }
        let unit = state.active_unit;
        let target = *state
            .bound
            .get(&unit)
            .ok_or_else(|| PlayoutError::Gpu(format!("no texture bound on unit {unit}")))?;
        let texture = &state.textures[&target];
        if (texture.width, texture.height, texture.format) != (width, height, format) {
            return Err(PlayoutError::Gpu(format!(
                "upload {}x{} {:?} does not match texture {}x{} {:?}",
                width, height, format, texture.width, texture.height, texture.format
            )));
        }
        let len = format.image_size(width, height);
        if source.size() < len {
            return Err(PlayoutError::Gpu(format!(
                "host buffer holds {} bytes, upload needs {len}",
                source.size()
            )));
        }
        let texels = source.data[..len].to_vec();
        state.in_flight.push(PendingUpload { target, texels });
        Ok(())
    }

    fn insert_fence(&self) -> Result<FenceSignal> {
        let mut state = self.state.lock();
        state.check(BackendOp::Fence)?;
        if state.in_flight.is_empty() {
            return Ok(FenceSignal::signaled());
        }
        let signal = FenceSignal::new();
        state.fences.push(signal.clone());
        Ok(signal)
    }
}

/// Host buffer in plain memory. Starts out mapped.
#[derive(Debug, Clone)]
pub struct SoftwareHostBuffer {
    data: Vec<u8>,
    mapped: bool,
    bound: bool,
}

impl SoftwareHostBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            mapped: true,
            bound: false,
        }
    }

    /// Copy `bytes` to the start of the buffer. Fails unless mapped.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let target = self
            .as_mut_slice()
            .ok_or_else(|| PlayoutError::Gpu("host buffer is not mapped".into()))?;
        if bytes.len() > target.len() {
            return Err(PlayoutError::InvalidParameter(format!(
                "{} bytes do not fit a {} byte host buffer",
                bytes.len(),
                target.len()
            )));
        }
        target[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Writable view while mapped.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        self.mapped.then_some(self.data.as_mut_slice())
    }

    /// Restore host access for the next frame.
    pub fn map(&mut self) {
        self.mapped = true;
    }
}

impl HostBuffer for SoftwareHostBuffer {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn unmap(&mut self) -> Result<()> {
        self.mapped = false;
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
