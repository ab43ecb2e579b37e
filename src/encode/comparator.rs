//! Whole-frame change detection
//!
//! Keeps the last acquired frame and compares every new one against it
//! byte for byte.

use crate::capture::RawFrame;

/// Outcome of comparing a frame against the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Changed,
    Unchanged,
}

/// Holds the baseline frame
#[derive(Debug, Default)]
pub struct FrameComparator {
    last: Option<RawFrame>,
}

impl FrameComparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `frame` with the baseline, then make it the new baseline.
    ///
    /// With no baseline the verdict is always `Changed`.
    pub fn observe(&mut self, frame: RawFrame) -> Verdict {
        let verdict = match &self.last {
            Some(last) if last.same_pixels(&frame) => Verdict::Unchanged,
            _ => Verdict::Changed,
        };
        self.last = Some(frame);
        verdict
    }

    /// The most recently observed frame
    pub fn last(&self) -> Option<&RawFrame> {
        self.last.as_ref()
    }

    /// Drop the baseline so the next frame counts as changed
    pub fn clear(&mut self) {
        self.last = None;
    }
}
