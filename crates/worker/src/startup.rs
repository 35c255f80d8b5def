//! Relaxer construction with indefinite retry.

use std::time::{Duration, Instant};

use relax_core::collaborators::{Relaxer, RelaxerFactory};

/// Granularity at which a sleeping retry loop notices a stop request.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Build a relaxer, retrying after `backoff` on every failure.
///
/// Construction failures are logged and never escalated. Returns `None` only
/// when `should_stop` turns true, which is checked between attempts and
/// while waiting.
pub fn construct_with_retry(
    factory: &dyn RelaxerFactory,
    backoff: Duration,
    should_stop: &dyn Fn() -> bool,
) -> Option<Box<dyn Relaxer>> {
    let mut attempt: u32 = 0;
    loop {
        if should_stop() {
            return None;
        }
        attempt += 1;
        match factory.create() {
            Ok(relaxer) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Relaxer constructed after retries");
                }
                return Some(relaxer);
            }
            Err(e) => {
                tracing::error!(
                    attempt,
                    error = %e,
                    retry_in_secs = backoff.as_secs_f64(),
                    "Relaxer construction failed, retrying",
                );
            }
        }

        let deadline = Instant::now() + backoff;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() || should_stop() {
                break;
            }
            std::thread::sleep(remaining.min(STOP_POLL));
        }
    }
}
