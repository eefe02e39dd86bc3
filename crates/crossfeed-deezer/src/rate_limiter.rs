// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

/// Spaces Deezer requests at least `min_interval` apart.
///
/// Deezer allows 50 requests per 5 seconds per client. Each caller reserves the next free
/// slot under the lock, so clones of one client share a single schedule.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;

        if let Some(slot) = *next_slot {
            if slot > Instant::now() {
                tracing::trace!(target: "deezer", wait = ?(slot - Instant::now()), "pacing request");
                sleep_until(slot).await;
            }
        }

        *next_slot = Some(Instant::now() + self.min_interval);
    }
}
