pub mod metrics;
pub mod tracing_init;

pub use metrics::CaptureMetrics;
pub use tracing_init::init_tracing;
