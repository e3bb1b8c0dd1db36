use serde::Deserialize;
use std::net::Ipv4Addr;

use crate::store::{DEFAULT_BUCKET_SIZE, DEFAULT_HASH_BITS};
use crate::timer::DEFAULT_INTERVAL_SECONDS;

/// Top-level daemon configuration (spec.md §6's configuration file,
/// restated in typed, validated TOML — see DESIGN.md for why).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Interface to capture on, or `"any"`.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Seconds between flushes. Default 300 (spec.md §4.3).
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// `H`: selects `2^hash_bits` primary slots.
    #[serde(default = "default_hash_bits")]
    pub hash_bits: u32,

    /// `B`: in-line cells per slot.
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,

    /// Keep cells whose four rate fields are all zero in the flushed
    /// snapshot rather than dropping them.
    #[serde(default)]
    pub store_zero: bool,

    /// Override the auto-derived (uname-based) node name.
    #[serde(default)]
    pub node_name: Option<String>,

    /// IP ranges consulted before writing a record (spec.md §4.4).
    #[serde(default)]
    pub ip_ranges: Vec<IpRangeConfig>,

    #[serde(default)]
    pub sink: SinkConfig,

    /// Port to serve Prometheus-style metrics on, if any.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IpRangeConfig {
    pub begin: Ipv4Addr,
    pub end: Ipv4Addr,
    #[serde(default)]
    pub node_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SinkConfig {
    #[serde(default)]
    pub backend: SinkBackend,
    #[serde(default)]
    pub sql: Option<SqlConfig>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    #[default]
    Console,
    Sql,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SqlConfig {
    pub storage_host: String,
    #[serde(default = "default_storage_port")]
    pub storage_port: u16,
    pub storage_user: String,
    pub storage_pass: String,
    pub storage_dbase: String,
    #[serde(default)]
    pub driver: SqlDriver,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqlDriver {
    #[default]
    Sqlite,
    Postgres,
}

impl SqlConfig {
    /// Build an `sqlx`-compatible connection URL. For `sqlite`,
    /// `storage_dbase` is a filesystem path (or `:memory:`); for
    /// `postgres` it's the database name.
    pub fn connection_url(&self) -> String {
        match self.driver {
            SqlDriver::Sqlite if self.storage_dbase == ":memory:" => "sqlite::memory:".to_string(),
            SqlDriver::Sqlite => format!("sqlite://{}", self.storage_dbase),
            SqlDriver::Postgres => format!(
                "postgres://{user}:{pass}@{host}:{port}/{dbase}",
                user = self.storage_user,
                pass = self.storage_pass,
                host = self.storage_host,
                port = self.storage_port,
                dbase = self.storage_dbase,
            ),
        }
    }
}

fn default_interface() -> String {
    "any".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECONDS
}

fn default_hash_bits() -> u32 {
    DEFAULT_HASH_BITS
}

fn default_bucket_size() -> usize {
    DEFAULT_BUCKET_SIZE
}

fn default_storage_port() -> u16 {
    5432
}

fn default_log_level() -> String {
    "info".to_string()
}
