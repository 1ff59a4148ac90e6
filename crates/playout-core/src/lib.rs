//! Playout Core - shared types for the playout engine
//!
//! This crate provides the types every other playout crate speaks:
//! - Composited frames and their pixel storage
//! - Frame rates and video format descriptors
//! - The common error type

pub mod error;
pub mod format;
pub mod frame;
pub mod time;

pub use error::{PlayoutError, Result};
pub use format::{FieldMode, VideoFormatDesc};
pub use frame::{Frame, FrameBuffer, FramePlane, PixelFormat, SharedFrameBuffer};
pub use time::FrameRate;
