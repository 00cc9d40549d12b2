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


//! Persistent cache of license keys and signing certificates
//!
//! Keys are indexed by content identifier, certificates by the pair
//! (certificate URL, cache version). Entries never expire; a key stays until
//! the download it belongs to is deleted.

use crate::error::Result;
use sqlx::SqlitePool;

/// Key-cache store backed by the shared SQLite pool
#[derive(Debug, Clone)]
pub struct KeyCacheStore {
    pool: SqlitePool,
}

impl KeyCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Cached persistable key for a content identifier
    pub async fn get(&self, content_id: &str) -> Result<Option<Vec<u8>>> {
        let blob: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT key_blob FROM license_keys WHERE content_id = ?")
                .bind(content_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(blob)
    }

    /// Store (or replace) the key for a content identifier
    pub async fn put(&self, content_id: &str, blob: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO license_keys (content_id, key_blob, written_at)
            VALUES (?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                key_blob = excluded.key_blob,
                written_at = excluded.written_at
            "#,
        )
        .bind(content_id)
        .bind(blob)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(content_id, bytes = blob.len(), "cached license key");
        Ok(())
    }

    /// Remove a cached key. Returns whether an entry existed.
    pub async fn remove(&self, content_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM license_keys WHERE content_id = ?")
            .bind(content_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// When the key for a content identifier was written (RFC 3339)
    pub async fn written_at(&self, content_id: &str) -> Result<Option<String>> {
        let ts: Option<String> =
            sqlx::query_scalar("SELECT written_at FROM license_keys WHERE content_id = ?")
                .bind(content_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(ts)
    }

    pub async fn get_certificate(&self, url: &str, version: &str) -> Result<Option<Vec<u8>>> {
        let blob: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT certificate FROM certificates WHERE url = ? AND cache_version = ?",
        )
        .bind(url)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(blob)
    }

    pub async fn put_certificate(&self, url: &str, version: &str, blob: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO certificates (url, cache_version, certificate, fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url, cache_version) DO UPDATE SET
                certificate = excluded.certificate,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(url)
        .bind(version)
        .bind(blob)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(url, version, bytes = blob.len(), "cached certificate");
        Ok(())
    }

    pub async fn remove_certificate(&self, url: &str, version: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM certificates WHERE url = ? AND cache_version = ?")
            .bind(url)
            .bind(version)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop certificates cached under any other version tag
    ///
    /// Returns the number of entries removed.
    pub async fn clear_certificates_except(&self, version: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM certificates WHERE cache_version <> ?")
            .bind(version)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
