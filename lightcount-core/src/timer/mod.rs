//! Interval timer: fires every `interval_seconds`, aligned to wall-clock
//! boundaries so samples from multiple hosts overlay without resampling
//! (spec.md §4.3). Runs on a dedicated thread, the timer-side half of the
//! two-thread model in spec.md §5.

use crate::sink::Sink;
use crate::store::StorePair;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Default flush interval, in seconds (spec.md §4.3).
pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;

/// Pause between flipping the active store and enumerating the retired
/// one, letting any in-flight `add` on the retiring store complete
/// (spec.md §4.3 step 3, §5's settle-interval ordering guarantee).
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Sleep granularity while waiting for the next boundary — short enough
/// that `done` is noticed promptly without busy-spinning.
const POLL_QUANTUM: Duration = Duration::from_millis(200);

/// Runs until `done` is set. At each wall-clock boundary: swap the active
/// store, settle, invoke the sink on the retired store, then reset it.
/// The first tick swaps and resets but skips the sink call, since the
/// first interval started mid-boundary and its data is incomplete
/// (spec.md §4.3's first-cycle handling).
pub fn run_timer_loop(stores: Arc<StorePair>, sink: Arc<dyn Sink>, interval_seconds: u64, done: Arc<AtomicBool>) {
    info!(interval_seconds, "timer loop started");
    let mut first_tick = true;

    loop {
        if done.load(Ordering::Relaxed) {
            break;
        }
        if !sleep_until_next_boundary(interval_seconds, &done) {
            break;
        }

        let sample_begin_time = current_boundary(interval_seconds);
        stores.swap();
        std::thread::sleep(SETTLE_DELAY);

        let retired = stores.retired();
        if first_tick {
            first_tick = false;
            info!("skipping sink call for incomplete first interval");
        } else if let Err(e) = sink.write(sample_begin_time, interval_seconds, retired) {
            warn!(error = %e, "sink write failed, discarding this interval");
        }
        retired.reset();
    }

    if let Err(e) = sink.close() {
        error!(error = %e, "error closing sink at shutdown");
    }
    info!("timer loop stopped");
}

/// Block (in short polls, so `done` is noticed promptly) until the next
/// multiple of `interval_seconds` since the epoch. Returns `false` if
/// `done` fired while waiting.
fn sleep_until_next_boundary(interval_seconds: u64, done: &AtomicBool) -> bool {
    loop {
        if done.load(Ordering::Relaxed) {
            return false;
        }
        let remaining = duration_until_next_boundary(interval_seconds);
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(POLL_QUANTUM));
    }
}

/// `useconds_until_next_boundary` from spec.md §4.3, expressed as a
/// `Duration`: `10^6 * (interval - now.seconds % interval) - now.micros`.
fn duration_until_next_boundary(interval_seconds: u64) -> Duration {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs_into_interval = now.as_secs() % interval_seconds;
    let secs_remaining = interval_seconds - secs_into_interval;
    let micros_elapsed = now.subsec_micros() as u64;
    let total_micros = secs_remaining.saturating_mul(1_000_000).saturating_sub(micros_elapsed);
    Duration::from_micros(total_micros)
}

/// `sample_begin_time = floor(now / interval) * interval`.
fn current_boundary(interval_seconds: u64) -> u64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    (now / interval_seconds) * interval_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_aligned_to_interval() {
        let b = current_boundary(300);
        assert_eq!(b % 300, 0);
    }

    #[test]
    fn wait_never_exceeds_interval() {
        let d = duration_until_next_boundary(300);
        assert!(d <= Duration::from_secs(300));
    }
}
