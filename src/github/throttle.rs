//! Minimum spacing between consecutive requests.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between the starts of two requests.
///
/// The first call never waits.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Build from a number of seconds; negative or NaN means no delay.
    pub fn from_secs_f64(secs: f64) -> Self {
        let secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
        Self::new(Duration::from_secs_f64(secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the interval since the previous call has elapsed.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let ready_at = last + self.interval;
            let now = Instant::now();
            if ready_at > now {
                debug!("Throttling for {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last = Some(Instant::now());
    }
}
