//! Lightweight process metrics for the capture path. Grounded on the
//! teacher's `tcp::metrics::ConnectionCount`/`serve_prometheus_metrics` —
//! plain atomics rendered to Prometheus exposition text — rather than its
//! heavier OpenTelemetry/`prometheus`-crate stack, which exists to serve
//! histogram-shaped HTTP-proxy metrics this daemon doesn't have (spec.md
//! §6's ambient metrics section).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::warn;

#[derive(Debug, Default)]
pub struct CaptureMetrics {
    packets: AtomicU64,
    ignored: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureSnapshot {
    pub packets: u64,
    pub ignored: u64,
    pub errors: u64,
}

impl CaptureMetrics {
    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Render counters in Prometheus exposition text format.
    pub fn to_prometheus(&self) -> String {
        let snap = self.snapshot();
        format!(
            "# HELP lightcount_packets_total Frames accepted into the counter store\n\
             # TYPE lightcount_packets_total counter\n\
             lightcount_packets_total {packets}\n\
             # HELP lightcount_ignored_total Frames ignored (unknown ethertype, non-IPv4, truncated)\n\
             # TYPE lightcount_ignored_total counter\n\
             lightcount_ignored_total {ignored}\n\
             # HELP lightcount_errors_total Frame receive errors\n\
             # TYPE lightcount_errors_total counter\n\
             lightcount_errors_total {errors}\n",
            packets = snap.packets,
            ignored = snap.ignored,
            errors = snap.errors,
        )
    }
}

/// Serve `CaptureMetrics` as Prometheus exposition text on `addr` until
/// the process exits. Intended to run as its own tokio task alongside the
/// two OS threads that do the actual counting (spec.md §6's optional
/// metrics endpoint).
pub async fn serve_metrics(addr: SocketAddr, metrics: Arc<CaptureMetrics>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    loop {
        let (mut stream, _peer) = listener.accept().await?;
        let body = metrics.to_prometheus();
        let resp = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        tokio::spawn(async move {
            if let Err(e) = stream.write_all(resp.as_bytes()).await {
                warn!(error = %e, "failed writing metrics response");
            }
            let _ = stream.shutdown().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = CaptureMetrics::default();
        let snap = m.snapshot();
        assert_eq!(snap.packets, 0);
        assert_eq!(snap.ignored, 0);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn records_increment_independently() {
        let m = CaptureMetrics::default();
        m.record_packet();
        m.record_packet();
        m.record_ignored();
        m.record_error();
        let snap = m.snapshot();
        assert_eq!(snap.packets, 2);
        assert_eq!(snap.ignored, 1);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn prometheus_text_includes_all_counters() {
        let m = CaptureMetrics::default();
        m.record_packet();
        let text = m.to_prometheus();
        assert!(text.contains("lightcount_packets_total 1"));
        assert!(text.contains("lightcount_ignored_total 0"));
        assert!(text.contains("lightcount_errors_total 0"));
    }
}
