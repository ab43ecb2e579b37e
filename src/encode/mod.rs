//! Change detection and PNG encoding
//!
//! Decides whether a frame differs from the last one and encodes it.

pub mod comparator;
pub mod encoder;
pub use comparator::{FrameComparator, Verdict};
pub use encoder::{EncodePath, EncodedImage, EncodingError, SnapshotEncoder};
