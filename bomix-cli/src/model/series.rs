//! Series operations: the singleton record describing the store

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::BomError;

use super::types::{Series, SeriesConfig, normalize};
use super::BomDatabase;

impl BomDatabase {
    /// Insert the singleton series row. A second call fails on the fixed id;
    /// idempotence is the caller's concern.
    pub async fn init_series(&self, name: &str, note: &str) -> Result<Series> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let config = serde_json::to_string(&SeriesConfig::default())
            .context("Failed to serialize series config")?;
        sqlx::query(
            "INSERT INTO series (id, name, note, path, filename, config, created_at, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(normalize(name))
        .bind(normalize(note))
        .bind(self.path().display().to_string())
        .bind(self.file_stem())
        .bind(config)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to initialize series")?;

        log::info!("Series initialized: {name}");
        self.require_series().await
    }

    /// The singleton series row, if the store has one
    pub async fn series_info(&self) -> Result<Option<Series>> {
        let pool = self.pool()?;
        let row = sqlx::query(
            "SELECT name, note, path, filename, config, created_at, updated_at
             FROM series WHERE id = 1",
        )
        .fetch_optional(pool)
        .await
        .context("Failed to read series info")?;
        row.map(|r| series_from_row(&r)).transpose()
    }

    /// Rename the series (and refresh path/filename), creating the row when
    /// the store predates it. `name` is mandatory.
    pub async fn update_series_info(&self, name: &str, note: &str) -> Result<Series> {
        if name.trim().is_empty() {
            return Err(BomError::MissingRequiredField("name").into());
        }
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let config = serde_json::to_string(&SeriesConfig::default())
            .context("Failed to serialize series config")?;
        sqlx::query(
            "INSERT INTO series (id, name, note, path, filename, config, created_at, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 note = excluded.note,
                 path = excluded.path,
                 filename = excluded.filename,
                 updated_at = excluded.updated_at",
        )
        .bind(normalize(name))
        .bind(normalize(note))
        .bind(self.path().display().to_string())
        .bind(self.file_stem())
        .bind(config)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to update series info")?;

        self.require_series().await
    }

    /// Replace the series selection config
    pub async fn update_series_config(&self, config: &SeriesConfig) -> Result<Series> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_string(config)
            .context("Failed to serialize series config")?;
        let result = sqlx::query("UPDATE series SET config = ?, updated_at = ? WHERE id = 1")
            .bind(json)
            .bind(Utc::now())
            .execute(pool)
            .await
            .context("Failed to update series config")?;
        if result.rows_affected() == 0 {
            bail!("Series not initialized");
        }

        log::debug!("Series config updated");
        self.require_series().await
    }

    async fn require_series(&self) -> Result<Series> {
        self.series_info()
            .await?
            .context("Series row missing after write")
    }
}

fn series_from_row(row: &SqliteRow) -> Result<Series> {
    let config_json: String = row.try_get("config")?;
    let config: SeriesConfig =
        serde_json::from_str(&config_json).context("Failed to parse series config")?;
    Ok(Series {
        name: row.try_get("name")?,
        note: row.try_get("note")?,
        path: row.try_get("path")?,
        filename: row.try_get("filename")?,
        config,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
