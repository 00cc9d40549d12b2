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


//! License acquisition state machine
//!
//! # Flow
//! ```text
//!            cached key
//!   Idle ─────────────────────────────────────────────► Resolved
//!    │ no cached certificate          certificate cached
//!    ▼                                       │
//!   AwaitingCertificate ──fetch ok──► AwaitingLicense ──200 + handler──► Resolved
//!    │ fetch failed                          │ build failed / non-200 / transport
//!    ▼                                       ▼
//!   Failed                                 Failed
//! ```
//! Cancellation by the issuer is checked before every transition and after
//! every await; it ends the machine in `Abandoned` without further side
//! effects. Work that already committed (a cached certificate) stays.
//!
//! Pending requests are tracked per content identifier, so acquisitions for
//! different assets run concurrently. A second request for an identifier that
//! is still in flight is finished with `RequestInFlight`.

use crate::config::LicenseConfig;
use crate::error::{Result, VaultError};
use crate::license::certificate::CertificateFetcher;
use crate::license::key_system::KeySystem;
use crate::license::loading_request::{LoadingRequest, PERSISTENT_KEY_CONTENT_TYPE};
use crate::license::request::LicenseRequestBuilder;
use crate::license::response::{HandleOutcome, LicenseResponseHandler};
use crate::license::transport::HttpTransport;
use crate::storage::KeyCacheStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// States of one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Idle,
    AwaitingCertificate,
    AwaitingLicense,
    Resolved,
    Failed,
    /// Issuer cancelled the request
    Abandoned,
}

/// Something that can service key-loading requests for a playable resource
pub trait ContentKeyHandler: Send + Sync {
    /// `true` when the handler took ownership of the request and will
    /// finalize it; `false` when it cannot service the request at all.
    fn should_wait_for_loading(&self, request: LoadingRequest) -> bool;
}

struct PendingEntry {
    request: LoadingRequest,
    state: LicenseState,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingEntry>>>;

/// Removes the pending entry when the acquisition ends, however it ends
struct PendingGuard {
    pending: PendingMap,
    content_id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.content_id);
    }
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Central coordinator for content-key requests
#[derive(Clone)]
pub struct LicenseOrchestrator {
    scheme: String,
    certificate_url: Url,
    cache: KeyCacheStore,
    certificates: CertificateFetcher,
    builder: LicenseRequestBuilder,
    responses: LicenseResponseHandler,
    transport: Arc<dyn HttpTransport>,
    key_system: Arc<dyn KeySystem>,
    pending: PendingMap,
}

impl LicenseOrchestrator {
    pub fn new(
        config: &LicenseConfig,
        cache: KeyCacheStore,
        transport: Arc<dyn HttpTransport>,
        key_system: Arc<dyn KeySystem>,
    ) -> Result<Self> {
        let certificate_url = config.certificate_url()?;
        let license_url = config.license_url()?;

        Ok(Self {
            scheme: config.key_scheme.clone(),
            certificate_url,
            certificates: CertificateFetcher::new(
                transport.clone(),
                cache.clone(),
                config.cache_version.clone(),
            ),
            builder: LicenseRequestBuilder::new(license_url, config.session.clone()),
            responses: LicenseResponseHandler::new(cache.clone(), key_system.clone()),
            cache,
            transport,
            key_system,
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Current state of the acquisition for a content identifier, if one is running
    pub fn state_of(&self, content_id: &str) -> Option<LicenseState> {
        lock(&self.pending).get(content_id).map(|entry| entry.state)
    }

    /// Number of acquisitions in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Cancel the in-flight request for a content identifier on behalf of its issuer
    pub fn cancel_pending(&self, content_id: &str) -> bool {
        match lock(&self.pending).get(content_id) {
            Some(entry) => {
                entry.request.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the cached key for a content identifier
    pub async fn forget_key(&self, content_id: &str) -> Result<bool> {
        self.cache.remove(content_id).await
    }

    /// Run one acquisition to a terminal state.
    ///
    /// Returns `Err(SchemeMismatch)` without touching the request when its
    /// scheme is not ours. Every other outcome is reported through the
    /// request and summarized by the returned state.
    pub async fn acquire(&self, request: LoadingRequest) -> Result<LicenseState> {
        if request.scheme() != self.scheme {
            return Err(VaultError::SchemeMismatch {
                scheme: request.scheme().to_string(),
            });
        }

        let content_id = match request.content_id() {
            Some(id) => id,
            None => {
                let state = fail(
                    &request,
                    VaultError::invalid_input(format!("key URL carries no content id: {}", request.url())),
                );
                return Ok(state);
            }
        };

        let _guard = match self.register(&content_id, &request) {
            Some(guard) => guard,
            None => {
                tracing::warn!(content_id = %content_id, "license request already in flight");
                return Ok(fail(&request, VaultError::RequestInFlight(content_id)));
            }
        };

        let state = self.run(&content_id, &request).await;
        tracing::debug!(content_id = %content_id, ?state, "license acquisition finished");
        Ok(state)
    }

    async fn run(&self, content_id: &str, request: &LoadingRequest) -> LicenseState {
        // Idle
        if request.is_cancelled() {
            return LicenseState::Abandoned;
        }

        match self.cache.get(content_id).await {
            Ok(Some(key)) => {
                tracing::debug!(content_id, "answering from cached license key");
                return if request.finish_loading(PERSISTENT_KEY_CONTENT_TYPE, key) {
                    LicenseState::Resolved
                } else {
                    LicenseState::Abandoned
                };
            }
            Ok(None) => {}
            Err(e) => return fail(request, e),
        }

        let certificate = match self.certificates.cached(&self.certificate_url).await {
            Ok(Some(certificate)) => certificate,
            Ok(None) => {
                self.transition(content_id, LicenseState::AwaitingCertificate);
                let fetched = self.certificates.fetch(&self.certificate_url).await;
                if request.is_cancelled() {
                    return LicenseState::Abandoned;
                }
                match fetched {
                    Ok(certificate) => certificate,
                    Err(e) => {
                        tracing::warn!(content_id, error = %e, "certificate fetch failed");
                        return fail(request, e);
                    }
                }
            }
            Err(e) => return fail(request, e),
        };

        self.transition(content_id, LicenseState::AwaitingLicense);

        let wire = match self.builder.prepare(&certificate, content_id, self.key_system.as_ref()) {
            Ok(wire) => wire,
            Err(e) => return fail(request, e),
        };

        let sent = self.transport.send(wire).await;
        if request.is_cancelled() {
            return LicenseState::Abandoned;
        }

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(content_id, error = %e, "license request failed in transport");
                return fail(request, VaultError::license_failed(e.to_string(), None));
            }
        };

        if response.status != 200 {
            tracing::warn!(content_id, status = response.status, "license server rejected request");
            return fail(
                request,
                VaultError::license_failed(format!("HTTP {}", response.status), Some(response.status)),
            );
        }

        match self.responses.handle(content_id, Some(&response.body), request).await {
            HandleOutcome::Resolved => LicenseState::Resolved,
            HandleOutcome::Failed => LicenseState::Failed,
            HandleOutcome::Abandoned => LicenseState::Abandoned,
        }
    }

    fn register(&self, content_id: &str, request: &LoadingRequest) -> Option<PendingGuard> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(content_id) {
            return None;
        }

        pending.insert(
            content_id.to_string(),
            PendingEntry {
                request: request.clone(),
                state: LicenseState::Idle,
            },
        );

        Some(PendingGuard {
            pending: self.pending.clone(),
            content_id: content_id.to_string(),
        })
    }

    fn transition(&self, content_id: &str, state: LicenseState) {
        if let Some(entry) = lock(&self.pending).get_mut(content_id) {
            tracing::trace!(content_id, from = ?entry.state, to = ?state, "license state transition");
            entry.state = state;
        }
    }
}

impl ContentKeyHandler for LicenseOrchestrator {
    fn should_wait_for_loading(&self, request: LoadingRequest) -> bool {
        if request.scheme() != self.scheme {
            tracing::debug!(url = %request.url(), "not a protected-content key request");
            return false;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let orchestrator = self.clone();
                handle.spawn(async move {
                    // Scheme was checked above; the only Err is SchemeMismatch.
                    let _ = orchestrator.acquire(request).await;
                });
            }
            Err(_) => {
                request.finish_with_error(VaultError::invalid_input("no async runtime to service key request"));
            }
        }

        true
    }
}

/// Finish the request with an error; `Abandoned` if it was cancelled first
fn fail(request: &LoadingRequest, error: VaultError) -> LicenseState {
    if request.finish_with_error(error) {
        LicenseState::Failed
    } else {
        LicenseState::Abandoned
    }
}
