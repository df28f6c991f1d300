//! Group operations: creation under a BOM, queries, matrix updates

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::BomError;
use crate::spreadsheet::{GroupDraft, join_key};

use super::types::{Group, Part, normalize};
use super::BomDatabase;

impl BomDatabase {
    /// Insert a parsed group under a BOM. The draft must carry exactly one
    /// main-source part; the group's join key derives from it.
    pub async fn create_group(&self, bom_id: i64, draft: &GroupDraft) -> Result<Group> {
        let pool = self.pool()?;

        let mains: Vec<_> = draft.parts.iter().filter(|p| p.is_main).collect();
        let [main] = mains.as_slice() else {
            return Err(BomError::MissingMainPart {
                process: draft.process.clone(),
                item: draft.item.clone(),
            }
            .into());
        };
        let key = join_key(&main.mfg, &main.mfgpn);
        let parts: Vec<Part> = draft.parts.iter().map(Part::from_draft).collect();
        let parts_json =
            serde_json::to_string(&parts).context("Failed to serialize parts")?;

        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO groups (bom_id, process, item, qty, location, ccl, mfgpn_key,
                 parts, matrix, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(bom_id)
        .bind(normalize(&draft.process))
        .bind(normalize(&draft.item))
        .bind(normalize(&draft.qty))
        .bind(normalize(&draft.location))
        .bind(normalize(&draft.ccl))
        .bind(&key)
        .bind(parts_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create group")?;

        Ok(Group {
            id: result.last_insert_rowid(),
            bom_id,
            process: normalize(&draft.process),
            item: normalize(&draft.item),
            qty: normalize(&draft.qty),
            location: normalize(&draft.location),
            ccl: normalize(&draft.ccl),
            mfgpn_key: key,
            parts,
            matrix: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// All groups of one BOM
    pub async fn groups_by_bom(&self, bom_id: i64) -> Result<Vec<Group>> {
        let pool = self.pool()?;
        let rows = sqlx::query(
            "SELECT id, bom_id, process, item, qty, location, ccl, mfgpn_key, parts,
                    matrix, created_at, updated_at
             FROM groups WHERE bom_id = ? ORDER BY id",
        )
        .bind(bom_id)
        .fetch_all(pool)
        .await
        .context("Failed to read groups")?;
        rows.iter().map(group_from_row).collect()
    }

    /// First group stored under a join key, if any
    pub async fn find_group_by_key(&self, key: &str) -> Result<Option<Group>> {
        let pool = self.pool()?;
        let row = sqlx::query(
            "SELECT id, bom_id, process, item, qty, location, ccl, mfgpn_key, parts,
                    matrix, created_at, updated_at
             FROM groups WHERE mfgpn_key = ? ORDER BY id LIMIT 1",
        )
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to find group by key")?;
        row.map(|r| group_from_row(&r)).transpose()
    }

    /// Replace a group's matrix selections. An all-empty matrix collapses to
    /// "absent" to keep storage compact.
    pub async fn update_group_matrix(
        &self,
        group_id: i64,
        matrix: &[Option<String>],
    ) -> Result<()> {
        let pool = self.pool()?;

        let is_empty = matrix
            .iter()
            .all(|slot| slot.as_deref().is_none_or(str::is_empty));
        let json = if is_empty {
            None
        } else {
            Some(serde_json::to_string(matrix).context("Failed to serialize matrix")?)
        };

        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE groups SET matrix = ?, updated_at = ? WHERE id = ?")
            .bind(json)
            .bind(Utc::now())
            .bind(group_id)
            .execute(pool)
            .await
            .context("Failed to update group matrix")?;
        Ok(())
    }
}

fn group_from_row(row: &SqliteRow) -> Result<Group> {
    let parts_json: String = row.try_get("parts")?;
    let parts: Vec<Part> =
        serde_json::from_str(&parts_json).context("Failed to parse group parts")?;
    let matrix = row
        .try_get::<Option<String>, _>("matrix")?
        .map(|json| serde_json::from_str(&json).context("Failed to parse group matrix"))
        .transpose()?;
    Ok(Group {
        id: row.try_get("id")?,
        bom_id: row.try_get("bom_id")?,
        process: row.try_get("process")?,
        item: row.try_get("item")?,
        qty: row.try_get("qty")?,
        location: row.try_get("location")?,
        ccl: row.try_get("ccl")?,
        mfgpn_key: row.try_get("mfgpn_key")?,
        parts,
        matrix,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
