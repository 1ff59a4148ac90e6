//! The frame consumer device: a dedicated worker feeding every output.
//!
//! # Tick
//!
//! 1. Block on the frame source.
//! 2. Retain the frame, dispatch it, synchronize admitted consumers and
//!    drop the ones that fail (see [`FrameDistributor`]).
//! 3. Unless a consumer reported [`SyncMode::Clock`](crate::SyncMode::Clock),
//!    sleep out the frame period minus the pacing headroom.
//! 4. Stop once no consumer is left, the source closes, or shutdown was
//!    requested.
//!
//! History and consumer set live on the worker thread only. A shutdown
//! request wakes both blocking points: the wait for the next frame (for
//! sources overriding [`FrameSource::receive_or_shutdown`]) and the pacing
//! sleep.

use crate::clock::ClockSync;
use crate::config::DeviceConfig;
use crate::consumer::FrameConsumer;
use crate::distributor::{FrameDistributor, Pacing};
use crate::source::FrameSource;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use playout_core::{PlayoutError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

/// Counters published by the worker.
#[derive(Debug, Default)]
pub struct DeviceStats {
    ticks: AtomicU64,
    frames_dispatched: AtomicU64,
    consumers_removed: AtomicU64,
    active_consumers: AtomicUsize,
    running: AtomicBool,
}

impl DeviceStats {
    /// Completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Sum over ticks of consumers that received a frame.
    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched.load(Ordering::Acquire)
    }

    pub fn consumers_removed(&self) -> u64 {
        self.consumers_removed.load(Ordering::Acquire)
    }

    pub fn active_consumers(&self) -> usize {
        self.active_consumers.load(Ordering::Acquire)
    }

    /// Whether the worker loop is still going.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

struct Worker {
    source: Box<dyn FrameSource>,
    distributor: FrameDistributor,
    period: Duration,
    headroom: Duration,
    shutdown: Receiver<()>,
    stats: Arc<DeviceStats>,
}

/// Clears [`DeviceStats::is_running`] when the worker exits, including by
/// unwinding out of a consumer.
struct RunningGuard(Arc<DeviceStats>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

impl Worker {
    /// Sleep for `duration` unless shutdown is requested first.
    /// Returns true on shutdown.
    fn pace(&self, duration: Duration) -> bool {
        match self.shutdown.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn run(self) {
        let _running = RunningGuard(Arc::clone(&self.stats));
        self.run_until_stopped();
    }

    fn run_until_stopped(mut self) {
        loop {
            let frame = match self.source.receive_or_shutdown(&self.shutdown) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame consumer device shutting down");
                    break;
                }
                Err(PlayoutError::SourceClosed) => {
                    info!("Frame source closed, frame consumer device stopping");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Frame source failed, frame consumer device stopping");
                    break;
                }
            };

            let clock = ClockSync::start();
            let report = self.distributor.process(frame);

            self.stats.ticks.fetch_add(1, Ordering::AcqRel);
            self.stats
                .frames_dispatched
                .fetch_add(report.dispatched as u64, Ordering::AcqRel);
            self.stats
                .consumers_removed
                .fetch_add(report.removed.len() as u64, Ordering::AcqRel);
            self.stats
                .active_consumers
                .store(self.distributor.consumer_count(), Ordering::Release);

            if self.distributor.is_empty() {
                info!("No consumers left, frame consumer device idle");
                break;
            }

            if report.pacing == Pacing::Software {
                if let Some(sleep) = clock.sleep_time(self.period, self.headroom) {
                    if self.pace(sleep) {
                        info!("Frame consumer device shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Distributes frames from one source to a set of output consumers on a
/// dedicated thread.
pub struct FrameConsumerDevice {
    shutdown: Sender<()>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<DeviceStats>,
    max_depth: usize,
}

impl FrameConsumerDevice {
    /// Start distributing frames from `source` to `consumers`.
    ///
    /// Fails with [`PlayoutError::Configuration`] if `consumers` is empty.
    pub fn new(
        source: impl FrameSource + 'static,
        config: DeviceConfig,
        consumers: Vec<Box<dyn FrameConsumer>>,
    ) -> Result<Self> {
        let distributor = FrameDistributor::new(consumers, config.dispatch)?;
        let max_depth = distributor.max_depth();
        let stats = Arc::new(DeviceStats::default());
        stats
            .active_consumers
            .store(distributor.consumer_count(), Ordering::Release);
        stats.running.store(true, Ordering::Release);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let worker = Worker {
            source: Box::new(source),
            distributor,
            period: config.period(),
            headroom: config.pacing_headroom,
            shutdown: shutdown_rx,
            stats: Arc::clone(&stats),
        };

        info!(
            format = %config.format.name,
            consumers = stats.active_consumers(),
            max_depth,
            "Starting frame consumer device"
        );
        let handle = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker.run())?;

        Ok(Self {
            shutdown: shutdown_tx,
            worker: Some(handle),
            stats,
            max_depth,
        })
    }

    /// Largest consumer buffer depth at construction.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    /// Shared handle to the counters, for monitoring from other threads.
    pub fn stats_handle(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.stats.is_running()
    }

    /// Ask the worker to stop after the current tick. Does not wait.
    pub fn request_shutdown(&self) {
        // a full channel already carries a request
        let _ = self.shutdown.try_send(());
    }

    /// Request shutdown and wait for the worker to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.request_shutdown();
        self.join_worker()
    }

    /// Wait for the worker to stop on its own: source closed or no
    /// consumers left.
    pub fn join(mut self) -> Result<()> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlayoutError::Internal("frame consumer worker panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for FrameConsumerDevice {
    fn drop(&mut self) {
        self.request_shutdown();
    }
}
