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


//! License response handling
//!
//! The license server answers with the key-exchange response encoded as
//! base64 text. The handler decodes it, asks the key system for a
//! persistable key, stores that key and resolves the waiting request.
//!
//! Every path that does not end in [`HandleOutcome::Abandoned`] finalizes
//! the request exactly once. The key is written only after the request is
//! reserved, so a cancelled request never leaves a cache write behind. A body that cannot be decoded finishes the
//! request with `KeyDerivationFailed` instead of leaving it pending.

use crate::error::VaultError;
use crate::license::key_system::KeySystem;
use crate::license::loading_request::{LoadingRequest, PERSISTENT_KEY_CONTENT_TYPE};
use crate::storage::KeyCacheStore;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

/// What happened to the pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Key stored and request resolved
    Resolved,
    /// Request finished with an error
    Failed,
    /// Issuer cancelled; nothing was touched
    Abandoned,
}

#[derive(Clone)]
pub struct LicenseResponseHandler {
    cache: KeyCacheStore,
    key_system: Arc<dyn KeySystem>,
}

impl LicenseResponseHandler {
    pub fn new(cache: KeyCacheStore, key_system: Arc<dyn KeySystem>) -> Self {
        Self { cache, key_system }
    }

    pub async fn handle(
        &self,
        content_id: &str,
        response_bytes: Option<&[u8]>,
        request: &LoadingRequest,
    ) -> HandleOutcome {
        if request.is_cancelled() {
            tracing::debug!(content_id, "request cancelled before license response was handled");
            return HandleOutcome::Abandoned;
        }

        let decoded = response_bytes
            .ok_or_else(|| "missing license response body".to_string())
            .and_then(decode_key_response);

        let key_response = match decoded {
            Ok(bytes) => bytes,
            Err(reason) => {
                tracing::warn!(content_id, %reason, "unusable license response");
                return self.fail(request, VaultError::KeyDerivationFailed(reason));
            }
        };

        let persistable = match self.key_system.persistable_key(&key_response) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(content_id, error = %e, "key system rejected key-exchange response");
                return self.fail(request, VaultError::KeyDerivationFailed(e.to_string()));
            }
        };

        // From here on a cancel no longer races the cache write.
        let reservation = match request.reserve() {
            Some(reservation) => reservation,
            None => {
                tracing::debug!(content_id, "request cancelled before the key was stored");
                return HandleOutcome::Abandoned;
            }
        };

        if let Err(e) = self.cache.put(content_id, &persistable).await {
            tracing::error!(content_id, error = %e, "failed to persist license key");
            reservation.finish_with_error(e);
            return HandleOutcome::Failed;
        }

        reservation.finish_loading(PERSISTENT_KEY_CONTENT_TYPE, persistable);
        tracing::info!(content_id, "license key persisted and delivered");
        HandleOutcome::Resolved
    }

    fn fail(&self, request: &LoadingRequest, error: VaultError) -> HandleOutcome {
        if request.finish_with_error(error) {
            HandleOutcome::Failed
        } else {
            HandleOutcome::Abandoned
        }
    }
}

fn decode_key_response(body: &[u8]) -> Result<Vec<u8>, String> {
    let text = std::str::from_utf8(body).map_err(|e| format!("response is not text: {}", e))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty license response".to_string());
    }

    general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| format!("response is not valid base64: {}", e))
}
