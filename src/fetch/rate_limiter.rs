// Request pacing for NCBI E-utilities.
//
// NCBI allows 3 requests per second without an API key and 10 with one.
// Going over gets the client temporarily blocked, so every E-utilities call
// waits on this limiter first. Requests are spaced evenly rather than
// allowed in bursts.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Requests per second NCBI allows without an API key.
pub const NCBI_ANONYMOUS_RPS: f64 = 3.0;
/// Requests per second NCBI allows with an API key.
pub const NCBI_KEYED_RPS: f64 = 10.0;

/// Enforces a minimum spacing between requests. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<PacingState>>,
}

struct PacingState {
    spacing: Duration,
    next_slot: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let rps = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            NCBI_ANONYMOUS_RPS
        };
        Self {
            state: Arc::new(Mutex::new(PacingState {
                spacing: Duration::from_secs_f64(1.0 / rps),
                next_slot: None,
            })),
        }
    }

    /// The NCBI limit for a client with or without an API key.
    pub fn for_ncbi(has_api_key: bool) -> Self {
        Self::new(if has_api_key {
            NCBI_KEYED_RPS
        } else {
            NCBI_ANONYMOUS_RPS
        })
    }

    /// Wait for the next free slot.
    ///
    /// Slots are reserved under the lock and slept on outside it, so
    /// concurrent callers queue up one spacing apart.
    pub async fn acquire(&self) {
        let wait_until = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = match state.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            state.next_slot = Some(slot + state.spacing);
            slot
        };
        tokio::time::sleep_until(wait_until).await;
    }
}
