//! Minimum spacing between consecutive screenshot captures.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant};

/// Cloneable handle; every clone shares the same "last capture" slot.
///
/// The slot is reserved under the lock before sleeping, so concurrent callers queue up at
/// interval spacing instead of racing for the same window.
#[derive(Clone, Debug)]
pub struct ScreenshotThrottle {
    interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl ScreenshotThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a capture is allowed and records it as taken.
    pub async fn wait(&self) {
        let slot = {
            let mut last = self.last.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) if prev + self.interval > now => prev + self.interval,
                _ => now,
            };
            *last = Some(slot);
            slot
        };
        if slot > Instant::now() {
            time::sleep_until(slot).await;
        }
    }
}
