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


//! Database storage
//!
//! All persisted state lives in one SQLite database:
//! - `license_keys`: persistable key blobs per content identifier
//! - `certificates`: signing certificates per (URL, cache version)
//! - `asset_locations`: relative on-disk location per downloaded asset
//!
//! # Usage Example
//! ```no_run
//! use offline_hls_core::storage::{Database, KeyCacheStore};
//!
//! # async fn example() -> offline_hls_core::error::Result<()> {
//! let db = Database::new("./vault.db").await?;
//! let keys = KeyCacheStore::new(db.pool().clone());
//! keys.put("demo", b"persistable-key").await?;
//! assert!(keys.get("demo").await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod key_cache;
pub mod locations;
pub mod migrations;

pub use database::Database;
pub use key_cache::KeyCacheStore;
pub use locations::{AssetLocation, LocationStore};
