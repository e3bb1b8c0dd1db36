mod frame;
#[cfg(target_os = "linux")]
mod socket;

pub use frame::{parse_frame, Packet};
#[cfg(target_os = "linux")]
pub use socket::RawSocketFrameSource;

use crate::error::{CaptureError, CaptureResult};
use crate::store::StorePair;
use crate::telemetry::CaptureMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Abstracts the packet source (spec.md §6's "frame stream"): anything
/// that can hand back raw link-layer frames, polling with a timeout so the
/// capture loop can notice shutdown promptly without blocking forever.
pub trait FrameSource: Send {
    /// Wait up to `timeout` for the next frame. `Ok(None)` means the wait
    /// elapsed with nothing received (not an error) — the caller should
    /// just poll again.
    fn recv_timeout(&mut self, timeout: Duration) -> CaptureResult<Option<Vec<u8>>>;
}

/// A `FrameSource` backed by an `mpsc` channel — the source used by tests
/// and by any external packet producer that isn't a raw socket.
pub struct ChannelFrameSource {
    rx: Receiver<Vec<u8>>,
}

impl ChannelFrameSource {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }
}

impl FrameSource for ChannelFrameSource {
    fn recv_timeout(&mut self, timeout: Duration) -> CaptureResult<Option<Vec<u8>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Closed),
        }
    }
}

const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Runs on a dedicated thread (spec.md §5): pull frames, parse them, and
/// call `CounterStore::add` on whichever store is currently active. Never
/// returns an error short of the frame source itself being permanently
/// closed — a malformed frame is logged once per occurrence and dropped,
/// never pauses ingest (spec.md §7's "capture loop is infallible by
/// design").
pub fn run_capture_loop(
    mut source: impl FrameSource,
    stores: Arc<StorePair>,
    done: Arc<AtomicBool>,
    metrics: Arc<CaptureMetrics>,
) {
    info!("capture loop started");
    loop {
        if done.load(Ordering::Relaxed) {
            break;
        }
        let frame = match source.recv_timeout(POLL_TIMEOUT) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(CaptureError::Closed) => {
                info!("frame source closed, stopping capture loop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "frame receive failed, dropping and continuing");
                metrics.record_error();
                continue;
            }
        };

        match parse_frame(&frame) {
            Some(pkt) => {
                stores.active().add(pkt.src, pkt.dst, pkt.vlan, pkt.frame_len);
                metrics.record_packet();
            }
            None => metrics.record_ignored(),
        }
    }
    info!("capture loop stopped");
}
