//! X11 Screen capture
//!
//! Enumerates monitors and grabs their pixels using X11 GetImage / XShm.

mod capturer;
mod xshm;
pub use capturer::{CaptureError, CaptureTarget, FrameSource};
pub use xshm::X11Source;

pub mod frame;
pub use frame::{FrameStats, PixelLayout, RawFrame};
