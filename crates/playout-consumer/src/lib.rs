//! Playout Consumer - frame distribution to outputs
//!
//! Architecture:
//! - `FrameSource`: blocking supplier of composited frames
//! - `FrameConsumer`: an output with its own buffer depth and pacing
//! - `FrameDistributor`: history + consumer set, one tick at a time
//! - `FrameConsumerDevice`: worker thread running the distributor at the
//!   channel's frame rate

pub mod clock;
pub mod config;
pub mod consumer;
pub mod device;
pub mod distributor;
pub mod history;
pub mod source;

pub use clock::ClockSync;
pub use config::{DeviceConfig, DispatchMode};
pub use consumer::{ConsumerId, FrameConsumer, SyncMode};
pub use device::{DeviceStats, FrameConsumerDevice};
pub use distributor::{FrameDistributor, Pacing, TickReport};
pub use history::FrameHistory;
pub use source::{frame_channel, ChannelFrameSource, FrameSender, FrameSource};
