//! Per-(IP, VLAN) passive traffic counter: a fixed-capacity lock-free
//! store fed by a dedicated capture thread, flushed to a pluggable sink on
//! a wall-clock-aligned interval by a dedicated timer thread.
//!
//! See `daemon::run` for how the pieces in this crate are wired together.

pub mod capture;
pub mod config;
pub mod daemon;
pub mod error;
pub mod sink;
pub mod store;
pub mod telemetry;
pub mod timer;

pub use config::Config;
pub use error::{CaptureError, ConfigError, SinkError};
pub use store::{CellView, CounterStore, StorePair};
