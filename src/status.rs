//! Status reporting from the capture loop to whatever control surface is attached.

use log::info;
use parking_lot::RwLock;

pub const STATUS_IDLE: &str = "idle";
pub const STATUS_CAPTURING: &str = "capturing...";

/// Receives human-readable status updates
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, message: &str);
}

/// Keeps the latest status and logs every update
pub struct StatusBoard {
    current: RwLock<String>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(STATUS_IDLE.to_string()),
        }
    }

    /// Most recent status text
    pub fn current(&self) -> String {
        self.current.read().clone()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusObserver for StatusBoard {
    fn on_status(&self, message: &str) {
        info!("Status: {}", message);
        *self.current.write() = message.to_string();
    }
}
