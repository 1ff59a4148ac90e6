//! Outputs used by the demo channel.

use playout_consumer::{FrameConsumer, SyncMode};
use playout_core::{Frame, PlayoutError, Result, VideoFormatDesc};
use playout_gpu::{DeviceBuffer, TexelFormat, WgpuBackend, WgpuHostBuffer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Counts frames and logs the delivered rate once per second.
pub struct StatsOutput {
    window_start: Instant,
    window_frames: u64,
    total_frames: u64,
    last_number: Option<u64>,
}

impl StatsOutput {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            window_frames: 0,
            total_frames: 0,
            last_number: None,
        }
    }
}

impl Default for StatsOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConsumer for StatsOutput {
    fn buffer_depth(&self) -> usize {
        0
    }

    fn send(&mut self, frame: &Frame) {
        if let Some(last) = self.last_number {
            if frame.number() != last + 1 {
                warn!(expected = last + 1, got = frame.number(), "Frame sequence gap");
            }
        }
        self.last_number = Some(frame.number());
        self.window_frames += 1;
        self.total_frames += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.window_frames as f64 / elapsed.as_secs_f64();
            info!(fps = format!("{fps:.2}"), total = self.total_frames, "Output rate");
            self.window_start = Instant::now();
            self.window_frames = 0;
        }
    }

    fn synchronize(&mut self) -> Result<SyncMode> {
        Ok(SyncMode::Ready)
    }

    fn name(&self) -> &str {
        "stats"
    }
}

/// Uploads frames to a GPU texture, dropping frames while the previous
/// upload is in flight.
pub struct GpuUploadOutput {
    buffer: DeviceBuffer<WgpuBackend>,
    host: WgpuHostBuffer,
    uploaded: u64,
    skipped: u64,
    failure: Option<PlayoutError>,
}

impl GpuUploadOutput {
    pub fn new(backend: Arc<WgpuBackend>, format: &VideoFormatDesc) -> Result<Self> {
        let host = WgpuHostBuffer::new(&backend, format.width, format.height, TexelFormat::Bgra8)?;
        let buffer = DeviceBuffer::with_format(backend, format.width, format.height, TexelFormat::Bgra8)?;
        Ok(Self {
            buffer,
            host,
            uploaded: 0,
            skipped: 0,
            failure: None,
        })
    }

    fn upload(&mut self, frame: &Frame) -> Result<()> {
        self.host.remap()?;
        self.host.write(&frame.image().to_packed())?;
        self.buffer.begin_read(&mut self.host)
    }
}

impl FrameConsumer for GpuUploadOutput {
    fn buffer_depth(&self) -> usize {
        1
    }

    fn send(&mut self, frame: &Frame) {
        if self.failure.is_some() {
            return;
        }
        if !self.buffer.ready() {
            self.skipped += 1;
            return;
        }
        match self.upload(frame) {
            Ok(()) => self.uploaded += 1,
            Err(e) => self.failure = Some(e),
        }
    }

    fn synchronize(&mut self) -> Result<SyncMode> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(SyncMode::Ready),
        }
    }

    fn name(&self) -> &str {
        "gpu upload"
    }
}

impl Drop for GpuUploadOutput {
    fn drop(&mut self) {
        info!(
            uploaded = self.uploaded,
            skipped = self.skipped,
            "GPU upload output closed"
        );
    }
}
