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


//! Pending key-loading requests
//!
//! A [`LoadingRequest`] is what the playback engine hands us when it needs a
//! content key. The issuer keeps the paired [`LoadingResponse`] and awaits
//! it. The request is finalized at most once, either with a key
//! ([`LoadingRequest::finish_loading`]) or with an error
//! ([`LoadingRequest::finish_with_error`]). Once the issuer cancels, the
//! request is never finalized. Work that must not outlive a cancel first
//! takes a [`Reservation`], which settles the race with `cancel`.

use crate::error::{Result, VaultError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use url::Url;

/// Content type announced when answering with a persistable key
pub const PERSISTENT_KEY_CONTENT_TYPE: &str = "persistent-key";

/// Successful answer to a loading request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub content_type: String,
    pub data: Vec<u8>,
}

type Responder = oneshot::Sender<Result<ResolvedKey>>;

#[derive(Debug)]
struct Inner {
    url: Url,
    cancelled: AtomicBool,
    finalized: AtomicUsize,
    responder: Mutex<Option<Responder>>,
}

/// Handle to an in-flight key request. Cloning shares the same request.
#[derive(Debug, Clone)]
pub struct LoadingRequest {
    inner: Arc<Inner>,
}

/// Issuer side of a loading request
#[derive(Debug)]
pub struct LoadingResponse {
    rx: oneshot::Receiver<Result<ResolvedKey>>,
}

impl LoadingRequest {
    pub fn new(url: Url) -> (Self, LoadingResponse) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            inner: Arc::new(Inner {
                url,
                cancelled: AtomicBool::new(false),
                finalized: AtomicUsize::new(0),
                responder: Mutex::new(Some(tx)),
            }),
        };
        (request, LoadingResponse { rx })
    }

    /// Parse a key URL such as `skd://demo`
    pub fn parse(raw: &str) -> Result<(Self, LoadingResponse)> {
        Ok(Self::new(Url::parse(raw)?))
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn scheme(&self) -> &str {
        self.inner.url.scheme()
    }

    /// Content identifier carried by the key URL
    ///
    /// `skd://<id>` carries it as the host; `skd:<id>` as the path.
    pub fn content_id(&self) -> Option<String> {
        let url = &self.inner.url;
        let id = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => url.path().trim_matches('/').to_string(),
        };

        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    /// Issuer-side cancellation. The waiting [`LoadingResponse`] resolves to
    /// `Cancelled` and the request is never finalized afterwards, unless a
    /// [`Reservation`] was already taken.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.take_responder();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the request has been finalized
    pub fn is_finished(&self) -> bool {
        self.finalize_count() > 0
    }

    /// How many times the request was finalized (0 or 1)
    pub fn finalize_count(&self) -> usize {
        self.inner.finalized.load(Ordering::SeqCst)
    }

    /// Resolve the request with key material.
    ///
    /// Returns `false` if the request was already finalized or cancelled.
    pub fn finish_loading(&self, content_type: &str, data: Vec<u8>) -> bool {
        self.finalize(Ok(ResolvedKey {
            content_type: content_type.to_string(),
            data,
        }))
    }

    /// Finish the request with an error.
    ///
    /// Returns `false` if the request was already finalized or cancelled.
    pub fn finish_with_error(&self, error: VaultError) -> bool {
        self.finalize(Err(error))
    }

    /// Claim the right to answer the request.
    ///
    /// `None` if it was cancelled or already finalized. Once reserved, a
    /// later `cancel` no longer takes the answer away, so side effects done
    /// while holding the reservation are never orphaned by a cancel.
    pub fn reserve(&self) -> Option<Reservation> {
        if self.is_cancelled() {
            return None;
        }

        self.take_responder().map(|responder| Reservation {
            inner: self.inner.clone(),
            responder,
        })
    }

    fn finalize(&self, outcome: Result<ResolvedKey>) -> bool {
        match self.reserve() {
            Some(reservation) => {
                reservation.finish(outcome);
                true
            }
            None => false,
        }
    }

    fn take_responder(&self) -> Option<Responder> {
        let mut guard = self
            .inner
            .responder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }
}

/// Exclusive right to finalize a [`LoadingRequest`]
///
/// Dropping it unused leaves the issuer with `Cancelled`.
#[derive(Debug)]
pub struct Reservation {
    inner: Arc<Inner>,
    responder: Responder,
}

impl Reservation {
    pub fn finish_loading(self, content_type: &str, data: Vec<u8>) {
        self.finish(Ok(ResolvedKey {
            content_type: content_type.to_string(),
            data,
        }));
    }

    pub fn finish_with_error(self, error: VaultError) {
        self.finish(Err(error));
    }

    fn finish(self, outcome: Result<ResolvedKey>) {
        self.inner.finalized.fetch_add(1, Ordering::SeqCst);
        // The issuer may have dropped its response handle; nothing to do then.
        let _ = self.responder.send(outcome);
    }
}

impl LoadingResponse {
    /// Wait for the request to be finalized.
    ///
    /// Resolves to `Cancelled` when the request is cancelled or abandoned
    /// without an answer.
    pub async fn wait(self) -> Result<ResolvedKey> {
        self.rx.await.unwrap_or(Err(VaultError::Cancelled))
    }

    /// Non-blocking poll; `None` while the request is still pending
    pub fn try_outcome(&mut self) -> Option<Result<ResolvedKey>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(VaultError::Cancelled)),
        }
    }
}
