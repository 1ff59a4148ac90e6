//! Video format descriptors.

use crate::time::FrameRate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scan mode of a video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldMode {
    #[default]
    Progressive,
    UpperFieldFirst,
    LowerFieldFirst,
}

/// Describes the channel's output format.
///
/// `frame_rate` is the rate at which composited frames are produced; for
/// interlaced formats that is the frame rate, not the field rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormatDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub field_mode: FieldMode,
}

impl VideoFormatDesc {
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            frame_rate,
            field_mode: FieldMode::Progressive,
        }
    }

    pub fn with_field_mode(mut self, field_mode: FieldMode) -> Self {
        self.field_mode = field_mode;
        self
    }

    /// Time between two frames.
    pub fn period(&self) -> Duration {
        self.frame_rate.period()
    }

    /// Size of one BGRA frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn pal() -> Self {
        Self::new("PAL", 720, 576, FrameRate::FPS_25).with_field_mode(FieldMode::UpperFieldFirst)
    }

    pub fn ntsc() -> Self {
        Self::new("NTSC", 720, 486, FrameRate::FPS_29_97)
            .with_field_mode(FieldMode::LowerFieldFirst)
    }

    pub fn x720p5000() -> Self {
        Self::new("720p5000", 1280, 720, FrameRate::FPS_50)
    }

    pub fn x1080i5000() -> Self {
        Self::new("1080i5000", 1920, 1080, FrameRate::FPS_25)
            .with_field_mode(FieldMode::UpperFieldFirst)
    }

    pub fn x1080p2500() -> Self {
        Self::new("1080p2500", 1920, 1080, FrameRate::FPS_25)
    }

    pub fn x1080p5994() -> Self {
        Self::new("1080p5994", 1920, 1080, FrameRate::FPS_59_94)
    }

    pub fn x2160p2500() -> Self {
        Self::new("2160p2500", 3840, 2160, FrameRate::FPS_25)
    }

    /// All built-in formats.
    pub fn presets() -> Vec<Self> {
        vec![
            Self::pal(),
            Self::ntsc(),
            Self::x720p5000(),
            Self::x1080i5000(),
            Self::x1080p2500(),
            Self::x1080p5994(),
            Self::x2160p2500(),
        ]
    }

    /// Look up a built-in format by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Self> {
        Self::presets()
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

impl Default for VideoFormatDesc {
    fn default() -> Self {
        Self::x1080i5000()
    }
}
