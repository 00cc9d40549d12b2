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


//! Persistent HLS downloads with offline content keys
//!
//! - [`license`]: acquires, persists and replays content keys for `skd://` requests
//! - [`download`]: tracks aggregate download tasks and where finished packages live
//! - [`catalog`]: the list of streams and how each one resolves to a playable asset
//! - [`storage`]: SQLite persistence for keys, certificates and locations
//!
//! Services are constructed explicitly and passed by handle:
//!
//! ```rust,no_run
//! use offline_hls_core::config::VaultConfig;
//! use offline_hls_core::license::{KeySystem, LicenseOrchestrator, ReqwestTransport};
//! use offline_hls_core::storage::{Database, KeyCacheStore};
//! use std::sync::Arc;
//!
//! # async fn example(key_system: Arc<dyn KeySystem>) -> offline_hls_core::Result<()> {
//! let config = VaultConfig::load("vault.json").await?;
//! let db = Database::new("vault.db").await?;
//! let transport = Arc::new(ReqwestTransport::new(&config.license)?);
//! let orchestrator = LicenseOrchestrator::new(
//!     &config.license,
//!     KeyCacheStore::new(db.pool().clone()),
//!     transport,
//!     key_system,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod license;
pub mod origin;
pub mod storage;

pub use catalog::{Catalog, StreamEntry};
pub use config::VaultConfig;
pub use download::{Asset, DownloadEvent, DownloadRegistry, DownloadState};
pub use error::{Result, VaultError};
pub use license::{LicenseOrchestrator, LicenseState, LoadingRequest};
pub use origin::LocalContentOrigin;
