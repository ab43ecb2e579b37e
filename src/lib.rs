//! snapwatch - change-triggered screen snapshots
//!
//! Polls one X11 monitor at a fixed interval and writes a PNG only when its
//! pixels differ from the previous poll.

pub mod capture;
pub mod config;
pub mod control;
pub mod encode;
pub mod scheduler;
pub mod status;
pub mod store;

// Re-exports
pub use capture::{CaptureError, CaptureTarget, FrameSource, RawFrame, X11Source};
pub use config::Config;
pub use encode::{FrameComparator, SnapshotEncoder, Verdict};
pub use scheduler::{CaptureScheduler, CaptureState, ControlCommand};
pub use status::{StatusBoard, StatusObserver};
pub use store::{SnapshotStore, StorageError};
