//! The output consumer capability.

use playout_core::{Frame, Result};

/// How a consumer paces its output after receiving a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// The consumer is ready for the next frame; the device paces itself.
    Ready,
    /// The consumer paces output from its own clock (e.g. hardware vsync).
    Clock,
}

/// A frame output: screen, playout card, file writer.
///
/// Consumers are driven from the device's worker thread only.
pub trait FrameConsumer: Send {
    /// Frames the consumer's internal pipeline queues before real output
    /// starts. Must not change over the consumer's lifetime.
    fn buffer_depth(&self) -> usize;

    /// Hand over the frame for this tick.
    fn send(&mut self, frame: &Frame);

    /// Called after every `send`. An error removes the consumer from the
    /// device for good.
    fn synchronize(&mut self) -> Result<SyncMode>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "frame consumer"
    }
}

/// Stable identity of a consumer within one device, by registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub usize);
