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


//! Stream catalog
//!
//! A JSON list of streams the user can play or download:
//!
//! ```json
//! [
//!   {
//!     "name": "Demo",
//!     "contentId": "demo",
//!     "programId": "p1",
//!     "playlistURL": "https://cdn.example.com/demo/master.m3u8"
//!   }
//! ]
//! ```

use crate::download::{Asset, DownloadRegistry};
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    pub name: String,
    pub content_id: String,
    pub program_id: String,
    #[serde(rename = "playlistURL")]
    pub playlist_url: Url,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<StreamEntry>,
}

impl Catalog {
    /// Parse a catalog; names must be unique
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<StreamEntry> = serde_json::from_str(json)?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.is_empty() {
                return Err(VaultError::invalid_input("catalog entry with empty name"));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(VaultError::invalid_input(format!("duplicate catalog entry: {}", entry.name)));
            }
        }

        Ok(Self { entries })
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let catalog = Self::from_json(&json)?;
        tracing::debug!(path = %path.as_ref().display(), entries = catalog.entries.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&StreamEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Resolve every entry: the active download, else the local copy, else the remote stream
    pub async fn build_assets(&self, registry: &DownloadRegistry) -> Vec<Asset> {
        let mut assets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            if let Some(active) = registry.lookup_active_by_name(&entry.name).await {
                assets.push(active);
                continue;
            }

            if let Some(local) = registry
                .resolve_local_by_name(&entry.name, &entry.content_id, &entry.program_id)
                .await
            {
                assets.push(local);
                continue;
            }

            let remote = Asset::new(
                entry.name.clone(),
                entry.content_id.clone(),
                entry.program_id.clone(),
                entry.playlist_url.clone(),
            );
            registry.attach_key_handler(&remote);
            assets.push(remote);
        }

        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"name": "Demo", "contentId": "demo", "programId": "p1",
         "playlistURL": "https://cdn.example.com/demo/master.m3u8"},
        {"name": "Other", "contentId": "other", "programId": "p2",
         "playlistURL": "https://cdn.example.com/other/master.m3u8"}
    ]"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.entries().len(), 2);

        let demo = catalog.find("Demo").unwrap();
        assert_eq!(demo.content_id, "demo");
        assert_eq!(demo.program_id, "p1");
        assert_eq!(demo.playlist_url.as_str(), "https://cdn.example.com/demo/master.m3u8");
        assert!(catalog.find("Missing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"[
            {"name": "Demo", "contentId": "a", "programId": "p", "playlistURL": "https://a.example/x.m3u8"},
            {"name": "Demo", "contentId": "b", "programId": "p", "playlistURL": "https://b.example/x.m3u8"}
        ]"#;
        assert!(matches!(Catalog::from_json(json), Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_bad_url_rejected() {
        let json = r#"[{"name": "Demo", "contentId": "a", "programId": "p", "playlistURL": "not a url"}]"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        tokio::fs::write(&path, CATALOG).await.unwrap();

        let catalog = Catalog::load(&path).await.unwrap();
        assert_eq!(catalog.entries().len(), 2);
    }
}
