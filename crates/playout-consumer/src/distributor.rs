//! One tick of frame distribution: retain, dispatch, synchronize, evict.
//!
//! [`FrameDistributor`] holds the consumer set and the frame history and
//! is driven one frame at a time. It never blocks and never sleeps; the
//! device's worker decides what to do with the returned [`TickReport`].

use crate::config::DispatchMode;
use crate::consumer::{ConsumerId, FrameConsumer, SyncMode};
use crate::history::FrameHistory;
use playout_core::{Frame, PlayoutError, Result};
use tracing::{debug, info, warn};

/// Who paces the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// At least one consumer follows its own clock; do not sleep.
    Clock,
    /// Sleep out the rest of the frame period.
    Software,
}

/// Outcome of [`FrameDistributor::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Sequence number of the frame that arrived this tick.
    pub frame: u64,
    /// Consumers that received a frame.
    pub dispatched: usize,
    /// Consumers removed after failing to synchronize.
    pub removed: Vec<ConsumerId>,
    pub pacing: Pacing,
}

struct ConsumerSlot {
    id: ConsumerId,
    offset: usize,
    started: bool,
    consumer: Box<dyn FrameConsumer>,
}

/// Consumer set plus frame history.
pub struct FrameDistributor {
    mode: DispatchMode,
    max_depth: usize,
    history: FrameHistory,
    consumers: Vec<ConsumerSlot>,
}

impl FrameDistributor {
    /// Register `consumers`. At least one is required.
    pub fn new(consumers: Vec<Box<dyn FrameConsumer>>, mode: DispatchMode) -> Result<Self> {
        let max_depth = consumers
            .iter()
            .map(|c| c.buffer_depth())
            .max()
            .ok_or_else(|| {
                PlayoutError::Configuration(
                    "frame consumer device needs at least one consumer".into(),
                )
            })?;

        let consumers = consumers
            .into_iter()
            .enumerate()
            .map(|(i, consumer)| ConsumerSlot {
                id: ConsumerId(i),
                offset: max_depth - consumer.buffer_depth(),
                started: false,
                consumer,
            })
            .collect();

        Ok(Self {
            mode,
            max_depth,
            history: FrameHistory::with_capacity(max_depth + 1),
            consumers,
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// No consumers left; nothing will ever be dispatched again.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Ids of the consumers still registered, in registration order.
    pub fn consumer_ids(&self) -> Vec<ConsumerId> {
        self.consumers.iter().map(|slot| slot.id).collect()
    }

    /// Run one tick for a newly arrived frame.
    pub fn process(&mut self, frame: Frame) -> TickReport {
        let number = frame.number();
        self.history.push(frame);
        let len = self.history.len();

        let mut dispatched = 0;
        for slot in self.consumers.iter_mut().filter(|slot| slot.offset < len) {
            let frame = match self.mode {
                DispatchMode::Latest => self.history.newest(),
                DispatchMode::LatencyAligned => self.history.back(slot.offset),
            };
            let Some(frame) = frame else { continue };
            if !slot.started {
                slot.started = true;
                info!(
                    consumer = slot.consumer.name(),
                    frame = frame.number(),
                    "Consumer started receiving frames"
                );
            }
            slot.consumer.send(frame);
            dispatched += 1;
        }

        let mut pacing = Pacing::Software;
        let mut removed = Vec::new();
        for slot in self.consumers.iter_mut().filter(|slot| slot.offset < len) {
            match slot.consumer.synchronize() {
                Ok(SyncMode::Clock) => pacing = Pacing::Clock,
                Ok(SyncMode::Ready) => {}
                Err(e) => {
                    warn!(consumer = slot.consumer.name(), error = %e, "Consumer failed to synchronize");
                    removed.push(slot.id);
                }
            }
        }
        if !removed.is_empty() {
            self.consumers.retain(|slot| !removed.contains(&slot.id));
            warn!(
                removed = removed.len(),
                remaining = self.consumers.len(),
                "Removed consumer from frame consumer device"
            );
        }

        self.history.evict_to(self.max_depth);
        debug!(frame = number, dispatched, ?pacing, "tick");

        TickReport {
            frame: number,
            dispatched,
            removed,
            pacing,
        }
    }
}
