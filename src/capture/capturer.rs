//! Screen capture abstraction
//!
//! Provides a unified interface for enumerating and grabbing monitors.

use crate::capture::frame::RawFrame;
use std::fmt;

/// One capturable surface, as enumerated by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    /// 1-based position in host enumeration order
    pub index: usize,

    /// Human-readable label
    pub label: String,

    /// Left edge on the root window
    pub x: i16,

    /// Top edge on the root window
    pub y: i16,

    /// Width in pixels
    pub width: u16,

    /// Height in pixels
    pub height: u16,
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Monitor {}: {} ({}x{}+{}+{})",
            self.index, self.label, self.width, self.height, self.x, self.y
        )
    }
}

/// Capture errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to connect to X display: {0}")]
    Connect(String),

    #[error("capture target {0} is not available")]
    TargetUnavailable(usize),

    #[error("unsupported pixel format: depth {depth}, {bits_per_pixel} bits per pixel")]
    UnsupportedFormat { depth: u8, bits_per_pixel: u8 },

    #[error("short image: expected {expected} bytes, got {actual}")]
    ShortImage { expected: usize, actual: usize },

    #[error("X11 request failed: {0}")]
    Backend(String),
}

impl From<x11rb::errors::ConnectionError> for CaptureError {
    fn from(err: x11rb::errors::ConnectionError) -> Self {
        CaptureError::Backend(err.to_string())
    }
}

impl From<x11rb::errors::ReplyError> for CaptureError {
    fn from(err: x11rb::errors::ReplyError) -> Self {
        CaptureError::Backend(err.to_string())
    }
}

/// Trait for frame source implementations
pub trait FrameSource {
    /// Enumerate capture targets in host order
    fn list_targets(&self) -> Vec<CaptureTarget>;

    /// Grab the current pixels of `target`
    fn capture(&mut self, target: &CaptureTarget) -> Result<RawFrame, CaptureError>;
}
