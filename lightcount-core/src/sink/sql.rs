//! Relational sink backend. spec.md §6 describes only the schema and the
//! `open`/`write`/`close` contract; the original's `storage_my.c` built
//! each `INSERT` by hand and reconnected every flush. This implementation
//! uses prepared statements against a pool held for the process lifetime
//! (spec.md §9's redesign note), via `sqlx` — grounded on
//! `examples/other_examples/.../panoptikon__server-src-netflow.rs`'s
//! `sqlx::query`/pool shape, since the teacher workspace carries no
//! database dependency of its own.
//!
//! spec.md §6 also requires the config file to be "re-read on every write
//! so credentials may be rotated": `write` re-loads the config from
//! `config_path` each call and only tears down and reconnects the pool if
//! the derived connection string actually changed, so a stable config
//! still gets the persistent-pool behavior spec.md §9 asks for.

use super::{collect_records, IpRangeFilter, Sink};
use crate::config::{load_from_path, SqlConfig};
use crate::error::{SinkError, SinkResult};
use crate::store::CounterStore;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

pub struct SqlSink {
    config_path: PathBuf,
    pool: Mutex<AnyPool>,
    connection_url: Mutex<String>,
    rt: Runtime,
    store_zero: bool,
    filter: IpRangeFilter,
    node_name: String,
    node_id: Mutex<Option<i64>>,
}

impl SqlSink {
    /// `open`: validate the connection, create the schema if missing, and
    /// register (or look up) this node. Called once at startup per
    /// spec.md §6. `config_path` is kept so `write` can re-read credentials
    /// on every flush.
    pub fn open(
        config_path: impl Into<PathBuf>,
        config: &SqlConfig,
        node_name: String,
        store_zero: bool,
        filter: IpRangeFilter,
    ) -> SinkResult<Self> {
        install_default_drivers();
        let rt = Runtime::new().map_err(SinkError::Io)?;
        let url = config.connection_url();
        let pool = rt.block_on(connect(&url))?;

        let sink = Self {
            config_path: config_path.into(),
            pool: Mutex::new(pool),
            connection_url: Mutex::new(url),
            rt,
            store_zero,
            filter,
            node_name,
            node_id: Mutex::new(None),
        };
        let node_id = {
            let pool = sink.pool.lock().unwrap_or_else(|e| e.into_inner());
            sink.rt.block_on(lookup_or_insert_node(&pool, &sink.node_name))?
        };
        *sink.node_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(node_id);
        info!(node_name = %sink.node_name, node_id, "sql sink opened");
        Ok(sink)
    }

    fn node_id(&self) -> i64 {
        self.node_id.lock().unwrap_or_else(|e| e.into_inner()).unwrap_or(0)
    }

    /// Re-read `config_path` and reconnect only if the derived connection
    /// string changed. Best-effort: a transiently unreadable or invalid
    /// config file is logged and the existing pool keeps serving, since a
    /// sink failure must never propagate into the capture loop.
    fn reload_connection_if_changed(&self) {
        let new_url = match config_at(&self.config_path) {
            Ok(sql_config) => sql_config.connection_url(),
            Err(e) => {
                warn!(error = %e, path = %self.config_path.display(), "failed to re-read sql sink config, keeping existing connection");
                return;
            }
        };

        let mut cached_url = self.connection_url.lock().unwrap_or_else(|e| e.into_inner());
        if *cached_url == new_url {
            return;
        }

        match self.rt.block_on(connect(&new_url)) {
            Ok(new_pool) => {
                let old_pool = {
                    let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
                    std::mem::replace(&mut *pool, new_pool)
                };
                self.rt.block_on(old_pool.close());
                *cached_url = new_url;
                info!("sql sink reconnected after config change");
            }
            Err(e) => {
                warn!(error = %e, "failed to reconnect with rotated credentials, keeping existing connection");
            }
        }
    }
}

/// Load just the `[sink.sql]` section from `path`, re-using the full
/// config loader/validator (spec.md §6's config format is one file, not a
/// pair of main/secret files).
fn config_at(path: &Path) -> Result<SqlConfig, Box<dyn std::error::Error + Send + Sync>> {
    let config = load_from_path(path)?;
    config.sink.sql.ok_or_else(|| "config no longer has a [sink.sql] section".into())
}

async fn connect(url: &str) -> Result<AnyPool, sqlx::Error> {
    // A single connection is enough: exactly one flush is ever in flight
    // (spec.md §5's "at most one snapshot is in flight"), and a larger pool
    // would give each connection its own private `:memory:` database for
    // sqlite's in-memory driver.
    let pool = AnyPoolOptions::new().max_connections(1).connect(url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

async fn ensure_schema(pool: &AnyPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS node (
            node_id INTEGER PRIMARY KEY,
            node_name TEXT UNIQUE NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ip_range (
            ip_begin BIGINT NOT NULL,
            ip_end BIGINT NOT NULL,
            node_id INTEGER
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sample (
            unixtime BIGINT NOT NULL,
            node_id INTEGER NOT NULL,
            vlan_id INTEGER NOT NULL,
            ip BIGINT NOT NULL,
            in_pps BIGINT NOT NULL,
            in_bps BIGINT NOT NULL,
            out_pps BIGINT NOT NULL,
            out_bps BIGINT NOT NULL,
            PRIMARY KEY (unixtime, node_id, ip, vlan_id)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn lookup_or_insert_node(pool: &AnyPool, node_name: &str) -> Result<i64, sqlx::Error> {
    if let Some((id,)) = sqlx::query_as::<_, (i64,)>("SELECT node_id FROM node WHERE node_name = ?")
        .bind(node_name)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    sqlx::query("INSERT INTO node (node_name) VALUES (?)").bind(node_name).execute(pool).await?;

    let (id,): (i64,) = sqlx::query_as("SELECT node_id FROM node WHERE node_name = ?")
        .bind(node_name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

impl Sink for SqlSink {
    fn write(&self, unixtime_begin: u64, interval_seconds: u64, store: &CounterStore) -> SinkResult<()> {
        self.reload_connection_if_changed();

        let node_id = self.node_id();
        let records = collect_records(store, interval_seconds, self.store_zero, &self.filter, node_id);
        if records.is_empty() {
            return Ok(());
        }

        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        let result = self.rt.block_on(async {
            let mut tx = pool.begin().await?;
            for r in &records {
                sqlx::query(
                    "INSERT INTO sample (unixtime, node_id, vlan_id, ip, in_pps, in_bps, out_pps, out_bps)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(unixtime_begin as i64)
                .bind(node_id)
                .bind(r.vlan as i64)
                .bind(u32::from(r.ip) as i64)
                .bind(r.in_pps as i64)
                .bind(r.in_bps as i64)
                .bind(r.out_pps as i64)
                .bind(r.out_bps as i64)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        });

        match result {
            Ok(()) => {
                info!(unixtime_begin, records = records.len(), "flush committed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "sql flush failed, abandoning this interval");
                Err(SinkError::Connection(e))
            }
        }
    }

    fn close(&self) -> SinkResult<()> {
        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        self.rt.block_on(pool.close());
        Ok(())
    }
}

impl Drop for SqlSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "error closing sql sink");
        }
    }
}
