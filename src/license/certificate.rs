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


//! Application certificate retrieval
//!
//! The certificate endpoint answers a plain GET with the raw certificate
//! bytes. A successful fetch is cached under the configured cache version so
//! later acquisitions read it locally.

use crate::error::{Result, VaultError};
use crate::license::transport::{HttpTransport, WireRequest};
use crate::storage::KeyCacheStore;
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct CertificateFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: KeyCacheStore,
    cache_version: String,
}

impl CertificateFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: KeyCacheStore, cache_version: String) -> Self {
        Self {
            transport,
            cache,
            cache_version,
        }
    }

    pub fn cache_version(&self) -> &str {
        &self.cache_version
    }

    /// Certificate from the cache, if this (url, version) was fetched before
    pub async fn cached(&self, url: &Url) -> Result<Option<Vec<u8>>> {
        self.cache.get_certificate(url.as_str(), &self.cache_version).await
    }

    /// Issue a single GET and cache the result on success.
    ///
    /// Transport failures and non-2xx answers leave the cache untouched.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .transport
            .send(WireRequest::get(url.clone()))
            .await
            .map_err(|e| VaultError::certificate_failed(e.to_string(), None))?;

        if !response.is_success() {
            tracing::warn!(url = %url, status = response.status, "certificate request rejected");
            return Err(VaultError::certificate_failed(
                format!("HTTP {}", response.status),
                Some(response.status),
            ));
        }

        if response.body.is_empty() {
            return Err(VaultError::certificate_failed("empty certificate body", Some(response.status)));
        }

        self.cache
            .put_certificate(url.as_str(), &self.cache_version, &response.body)
            .await?;

        tracing::info!(url = %url, version = %self.cache_version, bytes = response.body.len(), "fetched certificate");
        Ok(response.body)
    }

    /// Cached certificate, falling back to a network fetch
    pub async fn load(&self, url: &Url) -> Result<Vec<u8>> {
        match self.cached(url).await? {
            Some(certificate) => Ok(certificate),
            None => self.fetch(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::transport::WireResponse;
    use crate::storage::Database;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTransport {
        response: Option<WireResponse>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, _request: WireRequest) -> Result<WireResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| VaultError::invalid_input("connection refused"))
        }
    }

    async fn fetcher(response: Option<WireResponse>) -> (CertificateFetcher, Arc<FixedTransport>, KeyCacheStore) {
        let db = Database::new_in_memory().await.unwrap();
        let cache = KeyCacheStore::new(db.pool().clone());
        let transport = Arc::new(FixedTransport {
            response,
            calls: AtomicUsize::new(0),
        });
        let fetcher = CertificateFetcher::new(transport.clone(), cache.clone(), "1".into());
        (fetcher, transport, cache)
    }

    fn cert_url() -> Url {
        Url::parse("https://lic.example.com/cert").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_caches_certificate() {
        let (fetcher, _transport, cache) = fetcher(Some(WireResponse::new(200, b"CERT1".to_vec()))).await;

        assert_eq!(fetcher.fetch(&cert_url()).await.unwrap(), b"CERT1");
        assert_eq!(
            cache.get_certificate(cert_url().as_str(), "1").await.unwrap(),
            Some(b"CERT1".to_vec())
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_cached() {
        let (fetcher, _transport, cache) = fetcher(Some(WireResponse::new(500, b"oops".to_vec()))).await;

        let err = fetcher.fetch(&cert_url()).await.unwrap_err();
        assert!(matches!(err, VaultError::CertificateFetchFailed { status: Some(500), .. }));
        assert!(cache.get_certificate(cert_url().as_str(), "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_network_error() {
        let (fetcher, transport, _cache) = fetcher(None).await;

        let err = fetcher.fetch(&cert_url()).await.unwrap_err();
        assert!(matches!(err, VaultError::CertificateFetchFailed { status: None, .. }));
        // no internal retry
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_reads_cache_after_first_fetch() {
        let (fetcher, transport, _cache) = fetcher(Some(WireResponse::new(200, b"CERT1".to_vec()))).await;

        fetcher.load(&cert_url()).await.unwrap();
        fetcher.load(&cert_url()).await.unwrap();
        fetcher.load(&cert_url()).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
