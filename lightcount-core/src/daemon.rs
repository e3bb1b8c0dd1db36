//! Wires the counter store, capture loop, interval timer and sink together
//! into a runnable daemon (spec.md §5's two-thread model plus the ambient
//! metrics/signal handling described in spec.md §6).

use crate::capture::{run_capture_loop, FrameSource};
#[cfg(target_os = "linux")]
use crate::capture::RawSocketFrameSource;
use crate::config::{Config, SinkBackend};
use crate::error::{CaptureError, CaptureResult};
use crate::sink::{console::ConsoleSink, node, sql::SqlSink, IpRange, IpRangeFilter, Sink};
use crate::store::StorePair;
use crate::telemetry::{metrics::serve_metrics, CaptureMetrics};
use crate::timer::run_timer_loop;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Run the daemon until a termination signal arrives. Spawns the capture
/// and timer threads, optionally serves the metrics endpoint on the
/// current (async) runtime, and joins everything back up on shutdown.
///
/// `config_path` is kept around (not just the parsed `Config`) because the
/// SQL sink re-reads it on every flush to pick up rotated credentials
/// (spec.md §6).
pub async fn run(config_path: PathBuf, config: Config) -> CaptureResult<()> {
    let node_name = config.node_name.clone().unwrap_or_else(node::safe_node_name);
    let filter = build_filter(&config);
    let sink = build_sink(&config_path, &config, node_name.clone(), filter)
        .map_err(|e| CaptureError::Bind { iface: config.interface.clone(), source: std::io::Error::other(e) })?;

    let stores = Arc::new(StorePair::new(config.hash_bits, config.bucket_size));
    let done = Arc::new(AtomicBool::new(false));
    let metrics = Arc::new(CaptureMetrics::default());

    info!(node_name, interface = %config.interface, interval_seconds = config.interval_seconds, "starting lightcount");

    #[cfg(target_os = "linux")]
    let source = RawSocketFrameSource::bind(&config.interface)?;
    #[cfg(not(target_os = "linux"))]
    let source: crate::capture::ChannelFrameSource = {
        return Err(CaptureError::Bind {
            iface: config.interface.clone(),
            source: std::io::Error::other("raw packet capture is only implemented on Linux"),
        });
    };

    let capture_handle = {
        let stores = stores.clone();
        let done = done.clone();
        let metrics = metrics.clone();
        std::thread::Builder::new()
            .name("lightcount-capture".into())
            .spawn(move || run_capture_loop(source, stores, done, metrics))
            .expect("failed to spawn capture thread")
    };

    let timer_handle = {
        let stores = stores.clone();
        let done = done.clone();
        let interval = config.interval_seconds;
        std::thread::Builder::new()
            .name("lightcount-timer".into())
            .spawn(move || run_timer_loop(stores, sink, interval, done))
            .expect("failed to spawn timer thread")
    };

    if let Some(port) = config.metrics_port {
        let metrics = metrics.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            tokio::select! {
                result = serve_metrics(addr, metrics) => {
                    if let Err(e) = result {
                        error!(error = %e, "metrics endpoint stopped");
                    }
                }
                _ = wait_for_done(&done) => {}
            }
        });
    }

    wait_for_shutdown_signal(&stores).await;
    info!("shutdown signal received");
    done.store(true, Ordering::Relaxed);

    capture_handle.join().expect("capture thread panicked");
    timer_handle.join().expect("timer thread panicked");
    info!("lightcount stopped");
    Ok(())
}

/// Generic entry point used by tests: runs capture + timer against an
/// arbitrary `FrameSource` and `Sink`, returning once `done` is set by the
/// caller (rather than by an OS signal).
pub fn run_with(
    source: impl FrameSource + 'static,
    sink: Arc<dyn Sink>,
    stores: Arc<StorePair>,
    interval_seconds: u64,
    done: Arc<AtomicBool>,
    metrics: Arc<CaptureMetrics>,
) -> (std::thread::JoinHandle<()>, std::thread::JoinHandle<()>) {
    let capture_handle = {
        let stores = stores.clone();
        let done = done.clone();
        std::thread::spawn(move || run_capture_loop(source, stores, done, metrics))
    };
    let timer_handle = std::thread::spawn(move || run_timer_loop(stores, sink, interval_seconds, done));
    (capture_handle, timer_handle)
}

fn build_filter(config: &Config) -> IpRangeFilter {
    let ranges = config
        .ip_ranges
        .iter()
        .map(|r| IpRange { begin: u32::from(r.begin), end: u32::from(r.end), node_id: r.node_id })
        .collect();
    IpRangeFilter::new(ranges)
}

fn build_sink(
    config_path: &Path,
    config: &Config,
    node_name: String,
    filter: IpRangeFilter,
) -> Result<Arc<dyn Sink>, Box<dyn std::error::Error + Send + Sync>> {
    match config.sink.backend {
        SinkBackend::Console => Ok(Arc::new(ConsoleSink::new(config.store_zero, filter, 0))),
        SinkBackend::Sql => {
            let sql_config = config
                .sink
                .sql
                .as_ref()
                .ok_or("sink.backend = \"sql\" requires a [sink.sql] section")?;
            let sink = SqlSink::open(config_path, sql_config, node_name, config.store_zero, filter)?;
            Ok(Arc::new(sink))
        }
    }
}

async fn wait_for_done(done: &AtomicBool) {
    while !done.load(Ordering::Relaxed) {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Blocks until a termination signal (INT/HUP/QUIT/TERM) arrives. USR1 is
/// handled separately: it flips the active store and the wait resumes,
/// rather than terminating the process (spec.md §6: "USR1 (internal) flips
/// the active store ... may also be invoked externally to force a
/// rotation, though this desynchronizes the sample alignment and is
/// discouraged").
async fn wait_for_shutdown_signal(stores: &StorePair) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut sigusr1 = signal(SignalKind::user_defined1()).expect("failed to install SIGUSR1 handler");

    loop {
        tokio::select! {
            _ = sigterm.recv() => { info!("received SIGTERM"); return; }
            _ = sigint.recv() => { info!("received SIGINT"); return; }
            _ = sigquit.recv() => { info!("received SIGQUIT"); return; }
            _ = sighup.recv() => { info!("received SIGHUP"); return; }
            _ = sigusr1.recv() => {
                warn!("received SIGUSR1, forcing a store rotation outside the regular interval (desynchronizes sample alignment)");
                stores.swap();
            }
        }
    }
}
