//! Scriptable consumers shared by the integration tests.

use parking_lot::Mutex;
use playout_consumer::{FrameConsumer, SyncMode};
use playout_core::{Frame, FrameRate, PlayoutError, Result, VideoFormatDesc};
use std::sync::Arc;
use std::time::Instant;

/// What a recorder saw, readable from the test thread.
#[derive(Debug, Default)]
pub struct Recording {
    pub frames: Vec<u64>,
    pub sent_at: Vec<Instant>,
    pub syncs: usize,
}

pub type SharedRecording = Arc<Mutex<Recording>>;

/// Records every frame and answers `synchronize` with a fixed mode, failing
/// on the `fail_on_sync`-th call (1-based) if set.
pub struct Recorder {
    pub name: String,
    pub depth: usize,
    pub mode: SyncMode,
    pub fail_on_sync: Option<usize>,
    pub recording: SharedRecording,
}

impl Recorder {
    pub fn new(name: &str, depth: usize) -> (Self, SharedRecording) {
        let recording = SharedRecording::default();
        let recorder = Self {
            name: name.to_string(),
            depth,
            mode: SyncMode::Ready,
            fail_on_sync: None,
            recording: Arc::clone(&recording),
        };
        (recorder, recording)
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn failing_on_sync(mut self, call: usize) -> Self {
        self.fail_on_sync = Some(call);
        self
    }

    pub fn boxed(self) -> Box<dyn FrameConsumer> {
        Box::new(self)
    }
}

impl FrameConsumer for Recorder {
    fn buffer_depth(&self) -> usize {
        self.depth
    }

    fn send(&mut self, frame: &Frame) {
        let mut recording = self.recording.lock();
        recording.frames.push(frame.number());
        recording.sent_at.push(Instant::now());
    }

    fn synchronize(&mut self) -> Result<SyncMode> {
        let mut recording = self.recording.lock();
        recording.syncs += 1;
        if Some(recording.syncs) == self.fail_on_sync {
            return Err(PlayoutError::Consumer(format!("{} lost its output", self.name)));
        }
        Ok(self.mode)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Small format at the given rate, so frames are cheap.
pub fn format(frame_rate: FrameRate) -> VideoFormatDesc {
    VideoFormatDesc::new("test", 4, 4, frame_rate)
}

pub fn frames(recording: &SharedRecording) -> Vec<u64> {
    recording.lock().frames.clone()
}
