use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from the capture path (frame source, socket init).
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to bind capture socket on interface {iface}: {source}")]
    Bind { iface: String, source: std::io::Error },

    #[error("frame receive failed: {0}")]
    Recv(std::io::Error),

    #[error("frame source closed")]
    Closed,
}

/// Errors from a sink's `open`/`write`/`close` lifecycle.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink configuration error: {0}")]
    Config(String),

    #[error("sink connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
pub type SinkResult<T> = std::result::Result<T, SinkError>;
