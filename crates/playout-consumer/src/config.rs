//! Frame consumer device configuration.

use playout_core::VideoFormatDesc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which retained frame an admitted consumer receives.
///
/// A consumer with buffer depth `d` has offset `max_depth - d` and is
/// admitted once the history holds more than `offset` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Every admitted consumer gets the newest frame. Shallow consumers
    /// start later.
    #[default]
    Latest,
    /// An admitted consumer gets the frame `offset` positions before the
    /// newest, so frame `f` leaves every consumer `max_depth` ticks after
    /// it arrived regardless of that consumer's own depth.
    LatencyAligned,
}

/// Configuration of a [`crate::FrameConsumerDevice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Channel format; its frame period drives software pacing.
    pub format: VideoFormatDesc,
    pub dispatch: DispatchMode,
    /// Software pacing stops this long before the next frame boundary.
    pub pacing_headroom: Duration,
    /// Name of the worker thread.
    pub thread_name: String,
}

impl DeviceConfig {
    pub fn new(format: VideoFormatDesc) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_pacing_headroom(mut self, headroom: Duration) -> Self {
        self.pacing_headroom = headroom;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Time between frames.
    pub fn period(&self) -> Duration {
        self.format.period()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            format: VideoFormatDesc::default(),
            dispatch: DispatchMode::default(),
            pacing_headroom: Duration::from_millis(5),
            thread_name: "frame-consumer-device".into(),
        }
    }
}
