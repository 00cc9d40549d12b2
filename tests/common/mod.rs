//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use offline_hls_core::config::{LicenseConfig, SessionAuth, VaultConfig};
use offline_hls_core::download::{Asset, AssetDownloadSession, TaskHandle};
use offline_hls_core::license::{HttpTransport, KeySystem, LicenseOrchestrator, WireRequest, WireResponse};
use offline_hls_core::storage::{Database, KeyCacheStore};
use offline_hls_core::{Result, VaultError};
use reqwest::Method;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const CERT_URL: &str = "https://license.test/cert";
pub const LICENSE_URL: &str = "https://license.test/license";

/// Transport answering from a fixed table, recording every request
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, WireResponse>>,
    requests: Mutex<Vec<WireRequest>>,
    failing: Mutex<Vec<String>>,
    license_gate: Option<Arc<Notify>>,
    license_arrived: Arc<Notify>,
    certificate_gate: Option<Arc<Notify>>,
    certificate_arrived: Arc<Notify>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// License POSTs wait until the returned gate is notified
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Self {
            license_gate: Some(gate.clone()),
            ..Self::default()
        };
        (transport, gate)
    }

    /// Certificate GETs wait until the returned gate is notified
    pub fn gated_certificate() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Self {
            certificate_gate: Some(gate.clone()),
            ..Self::default()
        };
        (transport, gate)
    }

    /// Requests to `url` fail in the transport without an HTTP answer
    pub fn fail(self, url: &str) -> Self {
        self.failing.lock().unwrap().push(url.to_string());
        self
    }

    pub fn route(self, url: &str, status: u16, body: &[u8]) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), WireResponse::new(status, body.to_vec()));
        self
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.as_str() == url)
            .count()
    }

    /// Resolves once a certificate GET has reached the transport
    pub async fn certificate_arrived(&self) {
        self.certificate_arrived.notified().await;
    }

    /// Resolves once a license POST has reached the transport
    pub async fn license_arrived(&self) {
        self.license_arrived.notified().await;
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if request.method == Method::POST {
            self.license_arrived.notify_one();
            if let Some(gate) = &self.license_gate {
                gate.notified().await;
            }
        } else {
            self.certificate_arrived.notify_one();
            if let Some(gate) = &self.certificate_gate {
                gate.notified().await;
            }
        }

        let fails = self.failing.lock().unwrap().iter().any(|url| url == request.url.as_str());
        if fails {
            return Err(VaultError::invalid_input("connection reset by peer"));
        }

        let response = self
            .routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| WireResponse::new(404, Vec::new()));
        Ok(response)
    }
}

/// Content id the demo key system refuses to build a payload for
pub const DECLINED_CONTENT_ID: &str = "declined";

/// Key system whose payload is `SPC:<certificate>:<content id>` and whose
/// persistable key is the key-exchange response itself
pub struct DemoKeySystem;

impl KeySystem for DemoKeySystem {
    fn key_request_payload(&self, certificate: &[u8], content_id: &str) -> Result<Vec<u8>> {
        if content_id == DECLINED_CONTENT_ID {
            return Err(VaultError::invalid_input("content id not provisioned"));
        }
        let mut payload = b"SPC:".to_vec();
        payload.extend_from_slice(certificate);
        payload.push(b':');
        payload.extend_from_slice(content_id.as_bytes());
        Ok(payload)
    }

    fn persistable_key(&self, key_response: &[u8]) -> Result<Vec<u8>> {
        if key_response.is_empty() {
            return Err(VaultError::invalid_input("empty ckc"));
        }
        Ok(key_response.to_vec())
    }
}

/// Session that records calls instead of transferring anything
#[derive(Default)]
pub struct RecordingSession {
    pub created: Mutex<Vec<(TaskHandle, String)>>,
    pub resumed: Mutex<Vec<TaskHandle>>,
    pub cancelled: Mutex<Vec<TaskHandle>>,
}

impl AssetDownloadSession for RecordingSession {
    fn create_task(&self, handle: TaskHandle, asset: &Asset) -> Result<()> {
        self.created.lock().unwrap().push((handle, asset.name.clone()));
        Ok(())
    }

    fn resume(&self, handle: TaskHandle) {
        self.resumed.lock().unwrap().push(handle);
    }

    fn cancel(&self, handle: TaskHandle) {
        self.cancelled.lock().unwrap().push(handle);
    }
}

pub fn test_config(downloads_root: &Path) -> VaultConfig {
    VaultConfig::builder()
        .license_url(LICENSE_URL)
        .certificate_url(CERT_URL)
        .session(SessionAuth {
            user_id: "user-1".into(),
            session_id: "session-1".into(),
            merchant: "merchant-1".into(),
        })
        .downloads_root(downloads_root)
        .origin_base_url("http://127.0.0.1:8080")
        .build()
        .unwrap()
}

pub fn license_config() -> LicenseConfig {
    test_config(Path::new("/tmp/offline-hls-tests")).license
}

pub async fn orchestrator_with(
    db: &Database,
    transport: Arc<dyn HttpTransport>,
) -> (LicenseOrchestrator, KeyCacheStore) {
    let cache = KeyCacheStore::new(db.pool().clone());
    let orchestrator =
        LicenseOrchestrator::new(&license_config(), cache.clone(), transport, Arc::new(DemoKeySystem)).unwrap();
    (orchestrator, cache)
}
