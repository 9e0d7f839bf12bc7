use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    started_at: Instant,
    suppressed: u64,
}

/// Rate limiter for noisy log lines, keyed by an arbitrary string.
///
/// Each key gets one emission per `interval`; events inside the window are
/// counted and the count is handed back with the next emission.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Some(suppressed_count)` when a log for `key` should be emitted,
    /// otherwise `None` and the event is counted against the active window.
    pub fn should_emit(&self, key: &str) -> Option<u64> {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();

        match windows.get_mut(key) {
            Some(window) if now.duration_since(window.started_at) >= self.interval => {
                let suppressed = window.suppressed;
                window.started_at = now;
                window.suppressed = 0;
                Some(suppressed)
            }
            Some(window) => {
                window.suppressed += 1;
                None
            }
            None => {
                windows.insert(
                    key.to_string(),
                    Window {
                        started_at: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }
}
