//! Where composited frames come from.

use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use playout_core::{Frame, FrameBuffer, PlayoutError, Result, SharedFrameBuffer};

/// Upstream producer of composited frames.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    ///
    /// Returns [`PlayoutError::SourceClosed`] once no more frames will come.
    fn receive(&mut self) -> Result<Frame>;

    /// Like [`FrameSource::receive`], but gives up with `Ok(None)` once a
    /// message arrives on `shutdown` or its sender is dropped.
    ///
    /// The default cannot be interrupted; it only checks `shutdown` before
    /// blocking. Sources that can wait on both should override it.
    fn receive_or_shutdown(&mut self, shutdown: &Receiver<()>) -> Result<Option<Frame>> {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => Ok(None),
            Err(TryRecvError::Empty) => self.receive().map(Some),
        }
    }
}

/// Create a bounded frame channel. The sender numbers frames in send order.
pub fn frame_channel(capacity: usize) -> (FrameSender, ChannelFrameSource) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        FrameSender { tx, next_number: 0 },
        ChannelFrameSource { rx },
    )
}

/// Producer half of [`frame_channel`].
pub struct FrameSender {
    tx: Sender<Frame>,
    next_number: u64,
}

impl FrameSender {
    /// Send an image as the next frame, blocking while the channel is full.
    /// Returns the frame's sequence number.
    pub fn push(&mut self, image: impl Into<SharedFrameBuffer>) -> Result<u64> {
        let number = self.next_number;
        self.tx
            .send(Frame::new(number, image))
            .map_err(|_| PlayoutError::SourceClosed)?;
        self.next_number += 1;
        Ok(number)
    }

    /// Send an already numbered frame.
    pub fn send(&mut self, frame: Frame) -> Result<()> {
        self.next_number = frame.number() + 1;
        self.tx.send(frame).map_err(|_| PlayoutError::SourceClosed)
    }

    /// Push `count` tiny frames; handy for driving a device in tests.
    pub fn push_blank(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.push(FrameBuffer::new(1, 1, Default::default()))?;
        }
        Ok(())
    }

    /// Frames waiting to be received.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

/// Consumer half of [`frame_channel`].
pub struct ChannelFrameSource {
    rx: Receiver<Frame>,
}

impl FrameSource for ChannelFrameSource {
    fn receive(&mut self) -> Result<Frame> {
        self.rx.recv().map_err(|_| PlayoutError::SourceClosed)
    }

    fn receive_or_shutdown(&mut self, shutdown: &Receiver<()>) -> Result<Option<Frame>> {
        select! {
            recv(self.rx) -> frame => frame.map(Some).map_err(|_| PlayoutError::SourceClosed),
            recv(shutdown) -> _ => Ok(None),
        }
    }
}
