//! Raw capture frame data structure
//!
//! Represents one grabbed monitor image exactly as the X server delivered it.

use chrono::{DateTime, Local};
use std::fmt;

/// Bytes per pixel of every raw frame
pub const BYTES_PER_PIXEL: usize = 4;

/// Channel order of a 4-byte pixel as it sits in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// `[B, G, R, X]` - 32bpp Z-pixmap from an LSB-first server
    Bgrx,
    /// `[X, R, G, B]` - 32bpp Z-pixmap from an MSB-first server
    Xrgb,
}

impl PixelLayout {
    /// Byte offsets of the red, green and blue channels within one pixel
    pub fn rgb_offsets(self) -> [usize; 3] {
        match self {
            PixelLayout::Bgrx => [2, 1, 0],
            PixelLayout::Xrgb => [1, 2, 3],
        }
    }

    /// Pick the layout for a server image byte order (0 = LSB first)
    pub fn from_byte_order(byte_order: u8) -> Self {
        if byte_order == 0 {
            PixelLayout::Bgrx
        } else {
            PixelLayout::Xrgb
        }
    }
}

/// Represents a captured frame
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Raw pixel data, `width * 4` bytes per row, no padding
    pub data: Vec<u8>,

    /// Channel order of `data`
    pub layout: PixelLayout,

    /// Wall-clock capture time
    pub captured_at: DateTime<Local>,
}

impl RawFrame {
    /// Row length in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Expected buffer length for the frame's dimensions
    pub fn expected_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Exact equality: same dimensions and byte-identical buffers.
    pub fn same_pixels(&self, other: &RawFrame) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawFrame({}x{}, {} bytes, {:?})",
            self.width,
            self.height,
            self.data.len(),
            self.layout
        )
    }
}

/// Frame statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    /// Total frames captured
    pub total_frames: u64,

    /// Total bytes captured
    pub total_bytes: u64,

    /// Total capture time in microseconds
    pub total_capture_time_us: u64,

    /// Last capture time in microseconds
    pub last_capture_time_us: u64,
}

impl FrameStats {
    /// Record a frame capture
    pub fn record_capture(&mut self, bytes: usize, time_us: u64) {
        self.total_frames += 1;
        self.total_bytes += bytes as u64;
        self.last_capture_time_us = time_us;
        self.total_capture_time_us += time_us;
    }

    /// Mean capture time in microseconds
    pub fn average_capture_time_us(&self) -> u64 {
        if self.total_frames == 0 {
            0
        } else {
            self.total_capture_time_us / self.total_frames
        }
    }
}
