//! Per-series document store
//!
//! One SQLite file per series. `BomDatabase` is the single active handle the
//! manager owns; `close()` invalidates it and any later call fails with
//! `StoreClosed`. All writes serialize through one per-store lock so the
//! duplicate check and the eventual insert/update behave as one transaction.

mod bom;
mod group;
mod schema;
mod series;
mod types;

pub use types::{
    Bom, FullBom, Group, Part, SelectedBoms, Series, SeriesConfig, Statistics,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::BomError;

/// Interval between background compaction passes
const COMPACTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct BomDatabase {
    pool: SqlitePool,
    path: PathBuf,
    write_lock: Mutex<()>,
    compactor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BomDatabase {
    /// Create a new store file (and its schema) at `path`
    pub async fn create(path: &Path) -> Result<Self> {
        Self::connect(path, true).await
    }

    /// Open an existing store file
    pub async fn open(path: &Path) -> Result<Self> {
        Self::connect(path, false).await
    }

    async fn connect(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        sqlx::raw_sql(schema::SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create database schema")?;
        log::debug!("Database schema ready: {}", path.display());

        let db = BomDatabase {
            pool,
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            compactor: std::sync::Mutex::new(None),
        };
        db.start_compactor();
        Ok(db)
    }

    /// Background compaction, mirrored by one synchronous pass on close
    fn start_compactor(&self) {
        let pool = self.pool.clone();
        let path = self.path.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COMPACTION_INTERVAL);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                if pool.is_closed() {
                    break;
                }
                match sqlx::query("VACUUM").execute(&pool).await {
                    Ok(_) => log::debug!("Compacted {}", path.display()),
                    Err(e) => log::warn!("Compaction failed for {}: {e}", path.display()),
                }
            }
        });
        if let Ok(mut slot) = self.compactor.lock() {
            *slot = Some(handle);
        }
    }

    /// Path of the backing store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem of the backing store file
    pub(crate) fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }

    /// Pool guarded by the closed-handle contract
    fn pool(&self) -> Result<&SqlitePool, BomError> {
        if self.pool.is_closed() {
            Err(BomError::StoreClosed)
        } else {
            Ok(&self.pool)
        }
    }

    /// Final compaction, then release. The handle is unusable afterwards.
    pub async fn close(&self) -> Result<()> {
        let pool = self.pool()?.clone();
        if let Ok(mut slot) = self.compactor.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        // Best effort: a failed compaction must not keep the store open
        if let Err(e) = sqlx::query("VACUUM").execute(&pool).await {
            log::warn!("Final compaction failed for {}: {e}", self.path.display());
        }
        pool.close().await;
        log::info!("Database closed and compacted: {}", self.path.display());
        Ok(())
    }
}

impl Drop for BomDatabase {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.compactor.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
