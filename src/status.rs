//! Status surface - the user-facing console/overlay chrome.
//!
//! Purely cosmetic: calibration prompts, warnings and the one-shot pose
//! debug print go through here. Nothing behind this trait ever gates engine
//! logic, and every operation is idempotent so a delayed auto-hide racing a
//! manual hide is harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub trait StatusSurface: Send + Sync {
    fn show(&self);
    fn hide(&self);

    /// Shows the surface, then hides it again after `duration` via a one-shot
    /// background task. Must tolerate the surface being hidden or gone by the
    /// time the task fires.
    fn show_for(&self, duration: Duration);

    /// Prints one user-facing line (calibration prompts, warnings, debug
    /// dumps).
    fn line(&self, message: &str);
}

/// Console-backed status surface. "Showing" is a visibility flag plus log
/// output; a real platform port would restore/hide an actual console window
/// here.
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    visible: AtomicBool,
}

impl ConsoleStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            visible: AtomicBool::new(true),
        })
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
}

impl StatusSurface for Arc<ConsoleStatus> {
    fn show(&self) {
        if !self.visible.swap(true, Ordering::Relaxed) {
            debug!("status surface shown");
        }
    }

    fn hide(&self) {
        if self.visible.swap(false, Ordering::Relaxed) {
            debug!("status surface hidden");
        }
    }

    fn show_for(&self, duration: Duration) {
        self.show();
        let surface = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Idempotent: the surface may already be hidden.
            surface.hide();
        });
    }

    fn line(&self, message: &str) {
        info!("{}", message);
    }
}

/// Silent status surface for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatus;

impl StatusSurface for NullStatus {
    fn show(&self) {}
    fn hide(&self) {}
    fn show_for(&self, _duration: Duration) {}
    fn line(&self, _message: &str) {}
}
