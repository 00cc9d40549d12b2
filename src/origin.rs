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


//! Local content origin
//!
//! Downloaded packages are played back through a loopback HTTP origin that
//! serves the downloads root under `/downloads/`. Locations are persisted
//! relative to that root, with `/` separators, so they survive the platform
//! moving the container between launches.

use crate::error::{Result, VaultError};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// URL path prefix under which the downloads root is served
pub const DOWNLOADS_PATH_PREFIX: &str = "downloads";

#[derive(Debug, Clone)]
pub struct LocalContentOrigin {
    base_url: Url,
    root: PathBuf,
}

impl LocalContentOrigin {
    pub fn new(base_url: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(VaultError::invalid_config(format!("origin URL cannot be a base: {}", base_url)));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            root: root.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loopback URL for a relative location (`<base>/downloads/<relative>`)
    pub fn url_for(&self, relative: &str) -> Result<Url> {
        let segments = segments(relative)?;
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();

        let url = self
            .base_url
            .join(&format!("{}/{}", DOWNLOADS_PATH_PREFIX, encoded.join("/")))?;
        Ok(url)
    }

    /// Absolute path on disk for a relative location
    pub fn path_for(&self, relative: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in segments(relative)? {
            path.push(segment);
        }
        Ok(path)
    }

    /// Top-level directory that holds a relative location
    pub fn package_dir_for(&self, relative: &str) -> Result<PathBuf> {
        let first = segments(relative)?
            .into_iter()
            .next()
            .ok_or_else(|| VaultError::invalid_input("empty relative location"))?;
        Ok(self.root.join(first))
    }

    /// Relative location of an absolute path, if it lives under the root
    pub fn relative_of(&self, path: &Path) -> Option<String> {
        let rest = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

fn segments(relative: &str) -> Result<Vec<&str>> {
    if relative.starts_with('/') {
        return Err(VaultError::invalid_input(format!("location must be relative: {}", relative)));
    }

    let parts: Vec<&str> = relative.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    if parts.is_empty() {
        return Err(VaultError::invalid_input("empty relative location"));
    }
    if parts.iter().any(|s| *s == "..") {
        return Err(VaultError::invalid_input(format!("location escapes the downloads root: {}", relative)));
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> LocalContentOrigin {
        LocalContentOrigin::new("http://127.0.0.1:8080", "/data/downloads").unwrap()
    }

    #[test]
    fn test_url_for_relative_location() {
        let url = origin().url_for("demo/master.m3u8").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/downloads/demo/master.m3u8");
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let url = origin().url_for("My Show/master.m3u8").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/downloads/My%20Show/master.m3u8");
    }

    #[test]
    fn test_base_path_is_kept() {
        let origin = LocalContentOrigin::new("http://127.0.0.1:8080/media", "/data").unwrap();
        let url = origin.url_for("demo/master.m3u8").unwrap();
        assert_eq!(url.path(), "/media/downloads/demo/master.m3u8");
    }

    #[test]
    fn test_path_round_trip() {
        let origin = origin();
        let path = origin.path_for("demo/master.m3u8").unwrap();
        assert_eq!(path, PathBuf::from("/data/downloads/demo/master.m3u8"));
        assert_eq!(origin.relative_of(&path).as_deref(), Some("demo/master.m3u8"));
        assert_eq!(
            origin.package_dir_for("demo/master.m3u8").unwrap(),
            PathBuf::from("/data/downloads/demo")
        );
    }

    #[test]
    fn test_paths_outside_root() {
        let origin = origin();
        assert!(origin.relative_of(Path::new("/tmp/demo/master.m3u8")).is_none());
        assert!(origin.relative_of(Path::new("/data/downloads")).is_none());
        assert!(origin.path_for("../etc/passwd").is_err());
        assert!(origin.path_for("/abs").is_err());
        assert!(origin.url_for("").is_err());
    }
}
