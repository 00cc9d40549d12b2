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


//! Playable assets
//!
//! An [`Asset`] is a named stream plus the resource the playback engine
//! loads it through. The resource carries the key-request handler slot: when
//! the engine meets an encrypted segment it hands a [`LoadingRequest`] to
//! [`AssetResource::request_key`], which forwards it to whichever handler is
//! attached.

use crate::license::{ContentKeyHandler, LoadingRequest};
use std::fmt;
use std::sync::{Arc, RwLock};
use url::Url;

/// Playable resource with a pluggable key-request handler
pub struct AssetResource {
    url: Url,
    key_handler: RwLock<Option<Arc<dyn ContentKeyHandler>>>,
}

impl AssetResource {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            key_handler: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Attach the handler that services key requests for this resource
    pub fn set_key_handler(&self, handler: Arc<dyn ContentKeyHandler>) {
        let mut slot = self.key_handler.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(handler);
    }

    pub fn has_key_handler(&self) -> bool {
        self.key_handler
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or_else(|p| p.into_inner().is_some())
    }

    /// Entry point for the playback engine.
    ///
    /// Returns `false` when no handler is attached or the handler declines,
    /// in which case the engine treats the key as unavailable.
    pub fn request_key(&self, request: LoadingRequest) -> bool {
        let handler = {
            let slot = self.key_handler.read().unwrap_or_else(|p| p.into_inner());
            slot.clone()
        };

        match handler {
            Some(handler) => handler.should_wait_for_loading(request),
            None => {
                tracing::debug!(url = %self.url, "key request with no handler attached");
                false
            }
        }
    }
}

impl fmt::Debug for AssetResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetResource")
            .field("url", &self.url.as_str())
            .field("has_key_handler", &self.has_key_handler())
            .finish()
    }
}

/// A stream the user can play or download
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub content_id: String,
    pub program_id: String,
    resource: Arc<AssetResource>,
}

impl Asset {
    pub fn new(
        name: impl Into<String>,
        content_id: impl Into<String>,
        program_id: impl Into<String>,
        url: Url,
    ) -> Self {
        Self {
            name: name.into(),
            content_id: content_id.into(),
            program_id: program_id.into(),
            resource: Arc::new(AssetResource::new(url)),
        }
    }

    pub fn url(&self) -> &Url {
        self.resource.url()
    }

    pub fn resource(&self) -> &Arc<AssetResource> {
        &self.resource
    }

    /// Served from the local content origin rather than the network
    pub fn is_local(&self) -> bool {
        match self.url().host() {
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            Some(url::Host::Domain(domain)) => domain == "localhost",
            None => false,
        }
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.content_id == other.content_id
            && self.program_id == other.program_id
            && self.url() == other.url()
    }
}
