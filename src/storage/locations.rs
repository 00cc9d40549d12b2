// OfflineHLS - Persistent HLS downloads with offline content keys
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Persisted download locations, keyed by asset name

use crate::error::{Result, VaultError};
use sqlx::{Row, SqlitePool};

/// One persisted location record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    pub asset_name: String,
    /// Path relative to the downloads root, `/`-separated
    pub relative_path: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

impl LocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, asset_name: &str) -> Result<Option<AssetLocation>> {
        let row = sqlx::query(
            "SELECT asset_name, relative_path, updated_at FROM asset_locations WHERE asset_name = ?",
        )
        .bind(asset_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(AssetLocation {
                asset_name: row.try_get("asset_name")?,
                relative_path: row.try_get("relative_path")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    pub async fn set(&self, asset_name: &str, relative_path: &str) -> Result<()> {
        if relative_path.is_empty() || relative_path.starts_with('/') {
            return Err(VaultError::invalid_input(format!(
                "location must be relative: '{}'",
                relative_path
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO asset_locations (asset_name, relative_path, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(asset_name) DO UPDATE SET
                relative_path = excluded.relative_path,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(asset_name)
        .bind(relative_path)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove(&self, asset_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM asset_locations WHERE asset_name = ?")
            .bind(asset_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<AssetLocation>> {
        let rows = sqlx::query(
            "SELECT asset_name, relative_path, updated_at FROM asset_locations ORDER BY asset_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AssetLocation {
                    asset_name: row.try_get("asset_name")?,
                    relative_path: row.try_get("relative_path")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}
