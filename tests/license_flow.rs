//! License acquisition scenarios against a scripted license server

mod common;

use base64::{engine::general_purpose, Engine as _};
use common::{orchestrator_with, ScriptedTransport, CERT_URL, DECLINED_CONTENT_ID, LICENSE_URL};
use offline_hls_core::license::request::{decode_spc, CUSTOM_DATA_HEADER};
use offline_hls_core::license::{ContentKeyHandler, LicenseState, LoadingRequest, PERSISTENT_KEY_CONTENT_TYPE};
use offline_hls_core::storage::Database;
use offline_hls_core::VaultError;
use reqwest::Method;
use std::sync::Arc;

#[tokio::test]
async fn test_demo_key_is_fetched_persisted_and_delivered() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    let state = orchestrator.acquire(request.clone()).await.unwrap();

    assert_eq!(state, LicenseState::Resolved);
    assert_eq!(request.finalize_count(), 1);

    let key = response.wait().await.unwrap();
    assert_eq!(key.content_type, PERSISTENT_KEY_CONTENT_TYPE);
    assert_eq!(key.data, b"KEY");

    assert_eq!(cache.get("demo").await.unwrap(), Some(b"KEY".to_vec()));
    assert_eq!(cache.get_certificate(CERT_URL, "1").await.unwrap(), Some(b"CERT1".to_vec()));

    // Wire format of the license request
    let license = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::POST)
        .unwrap();
    assert_eq!(license.url.as_str(), LICENSE_URL);
    assert_eq!(license.header("content-type"), Some("application/x-www-form-urlencoded"));

    let body = license.body_str().unwrap();
    assert!(body.starts_with("offline=true&spc="));
    let spc = general_purpose::STANDARD.decode(decode_spc(body).unwrap()).unwrap();
    assert_eq!(spc, b"SPC:CERT1:demo");

    let custom = general_purpose::STANDARD
        .decode(license.header(CUSTOM_DATA_HEADER).unwrap())
        .unwrap();
    let custom: serde_json::Value = serde_json::from_slice(&custom).unwrap();
    assert_eq!(custom["userId"], "user-1");
    assert_eq!(custom["sessionId"], "session-1");
    assert_eq!(custom["merchant"], "merchant-1");
}

#[tokio::test]
async fn test_cached_key_answers_without_network() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;
    cache.put("demo", b"CACHED").await.unwrap();

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(request).await.unwrap(), LicenseState::Resolved);

    let key = response.wait().await.unwrap();
    assert_eq!(key.content_type, PERSISTENT_KEY_CONTENT_TYPE);
    assert_eq!(key.data, b"CACHED");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_certificate_fetched_once_per_version() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, _cache) = orchestrator_with(&db, transport.clone()).await;

    for id in ["first", "second", "third"] {
        let (request, _response) = LoadingRequest::parse(&format!("skd://{}", id)).unwrap();
        assert_eq!(orchestrator.acquire(request).await.unwrap(), LicenseState::Resolved);
    }

    assert_eq!(transport.count(Method::GET, CERT_URL), 1);
    assert_eq!(transport.count(Method::POST, LICENSE_URL), 3);
}

#[tokio::test]
async fn test_certificate_server_error_stops_the_flow() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(ScriptedTransport::new().route(CERT_URL, 500, b"oops"));
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(request.clone()).await.unwrap(), LicenseState::Failed);
    assert_eq!(request.finalize_count(), 1);

    match response.wait().await {
        Err(VaultError::CertificateFetchFailed { status, .. }) => assert_eq!(status, Some(500)),
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert!(cache.get_certificate(CERT_URL, "1").await.unwrap().is_none());
    assert!(cache.get("demo").await.unwrap().is_none());
    assert_eq!(transport.count(Method::POST, LICENSE_URL), 0);
}

#[tokio::test]
async fn test_license_rejection_reports_status() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 403, b"denied"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(request).await.unwrap(), LicenseState::Failed);

    let err = response.wait().await.unwrap_err();
    assert!(err.is_license_error());
    assert_eq!(err.status_code(), Some(403));
    assert!(cache.get("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_undecodable_license_body_fails_request() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"***"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(request.clone()).await.unwrap(), LicenseState::Failed);
    assert_eq!(request.finalize_count(), 1);
    assert!(matches!(response.wait().await, Err(VaultError::KeyDerivationFailed(_))));
    assert!(cache.get("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_request_is_not_finalized_or_cached() {
    let db = Database::new_in_memory().await.unwrap();
    let (transport, gate) = ScriptedTransport::gated();
    let transport = Arc::new(
        transport
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    let running = {
        let orchestrator = orchestrator.clone();
        let request = request.clone();
        tokio::spawn(async move { orchestrator.acquire(request).await })
    };

    transport.license_arrived().await;
    assert_eq!(orchestrator.state_of("demo"), Some(LicenseState::AwaitingLicense));

    assert!(orchestrator.cancel_pending("demo"));
    gate.notify_one();

    assert_eq!(running.await.unwrap().unwrap(), LicenseState::Abandoned);
    assert_eq!(request.finalize_count(), 0);
    assert!(cache.get("demo").await.unwrap().is_none());
    assert!(matches!(response.wait().await, Err(VaultError::Cancelled)));
    assert_eq!(orchestrator.in_flight(), 0);
}

#[tokio::test]
async fn test_duplicate_request_is_rejected_while_in_flight() {
    let db = Database::new_in_memory().await.unwrap();
    let (transport, gate) = ScriptedTransport::gated();
    let transport = Arc::new(
        transport
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, _cache) = orchestrator_with(&db, transport.clone()).await;

    let (first, first_response) = LoadingRequest::parse("skd://demo").unwrap();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.acquire(first).await })
    };
    transport.license_arrived().await;

    let (second, second_response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(second).await.unwrap(), LicenseState::Failed);
    assert!(matches!(second_response.wait().await, Err(VaultError::RequestInFlight(_))));

    gate.notify_one();
    assert_eq!(running.await.unwrap().unwrap(), LicenseState::Resolved);
    assert_eq!(first_response.wait().await.unwrap().data, b"KEY");
}

#[tokio::test]
async fn test_other_schemes_are_not_handled() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    let (orchestrator, _cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, _response) = LoadingRequest::parse("https://keys.example.com/demo").unwrap();
    assert!(matches!(
        orchestrator.acquire(request.clone()).await,
        Err(VaultError::SchemeMismatch { .. })
    ));
    assert!(!orchestrator.should_wait_for_loading(request.clone()));
    assert_eq!(request.finalize_count(), 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_handler_entry_point_resolves_in_background() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, _cache) = orchestrator_with(&db, transport).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert!(orchestrator.should_wait_for_loading(request));

    let key = response.wait().await.unwrap();
    assert_eq!(key.data, b"KEY");
}

#[tokio::test]
async fn test_cancel_while_fetching_certificate() {
    let db = Database::new_in_memory().await.unwrap();
    let (transport, gate) = ScriptedTransport::gated_certificate();
    let transport = Arc::new(
        transport
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    let running = {
        let orchestrator = orchestrator.clone();
        let request = request.clone();
        tokio::spawn(async move { orchestrator.acquire(request).await })
    };

    transport.certificate_arrived().await;
    assert_eq!(orchestrator.state_of("demo"), Some(LicenseState::AwaitingCertificate));

    assert!(orchestrator.cancel_pending("demo"));
    gate.notify_one();

    assert_eq!(running.await.unwrap().unwrap(), LicenseState::Abandoned);
    assert_eq!(request.finalize_count(), 0);
    assert!(matches!(response.wait().await, Err(VaultError::Cancelled)));

    // The certificate fetch had committed; nothing after it ran
    assert_eq!(cache.get_certificate(CERT_URL, "1").await.unwrap(), Some(b"CERT1".to_vec()));
    assert!(cache.get("demo").await.unwrap().is_none());
    assert_eq!(transport.count(Method::POST, LICENSE_URL), 0);
}

#[tokio::test]
async fn test_cancelled_before_acquire_with_cached_key() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;
    cache.put("demo", b"CACHED").await.unwrap();

    let (request, mut response) = LoadingRequest::parse("skd://demo").unwrap();
    request.cancel();

    assert_eq!(orchestrator.acquire(request.clone()).await.unwrap(), LicenseState::Abandoned);
    assert_eq!(request.finalize_count(), 0);
    assert!(matches!(response.try_outcome(), Some(Err(VaultError::Cancelled))));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_declined_payload_fails_without_license_request() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .route(LICENSE_URL, 200, b"S0VZ"),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse(&format!("skd://{}", DECLINED_CONTENT_ID)).unwrap();
    assert_eq!(orchestrator.acquire(request.clone()).await.unwrap(), LicenseState::Failed);

    assert_eq!(request.finalize_count(), 1);
    assert!(matches!(response.wait().await, Err(VaultError::LicenseBuildFailed(_))));
    assert_eq!(transport.count(Method::POST, LICENSE_URL), 0);
    assert!(cache.get(DECLINED_CONTENT_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn test_license_transport_error_has_no_status() {
    let db = Database::new_in_memory().await.unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(CERT_URL, 200, b"CERT1")
            .fail(LICENSE_URL),
    );
    let (orchestrator, cache) = orchestrator_with(&db, transport.clone()).await;

    let (request, response) = LoadingRequest::parse("skd://demo").unwrap();
    assert_eq!(orchestrator.acquire(request.clone()).await.unwrap(), LicenseState::Failed);
    assert_eq!(request.finalize_count(), 1);

    match response.wait().await {
        Err(VaultError::LicenseFetchFailed { status, .. }) => assert_eq!(status, None),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(transport.count(Method::POST, LICENSE_URL), 1);
    assert!(cache.get("demo").await.unwrap().is_none());
}
