use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum spacing between successful frame sends.
///
/// The capture loop polls this on every repaint tick; a tick that comes too
/// early is simply skipped, so the effective rate never exceeds
/// `1 / min_interval` whatever the tick rate.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Only successful sends move the window; skipped or dropped frames don't.
    pub fn record_sent(&mut self, at: Instant) {
        self.last_sent = Some(at);
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
