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


//! License request construction
//!
//! # Wire format
//! **POST** `<license_url>`
//!
//! Headers:
//! - `Content-Type: application/x-www-form-urlencoded`
//! - `dt-custom-data: base64({"userId":..,"sessionId":..,"merchant":..})`
//!
//! Body:
//! ```text
//! offline=true&spc=<percent-encoded base64 of the key-request payload>
//! ```
//!
//! The payload (SPC) comes from the key system and is passed through
//! untouched; percent-encoding uses the RFC 3986 unreserved set, so `+`, `/`
//! and `=` from the base64 alphabet are always escaped.

use crate::config::SessionAuth;
use crate::error::{Result, VaultError};
use crate::license::key_system::KeySystem;
use crate::license::transport::WireRequest;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Method;
use url::Url;

pub const CUSTOM_DATA_HEADER: &str = "dt-custom-data";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct LicenseRequestBuilder {
    license_url: Url,
    session: SessionAuth,
}

impl LicenseRequestBuilder {
    pub fn new(license_url: Url, session: SessionAuth) -> Self {
        Self { license_url, session }
    }

    /// Build the wire request for an already generated payload
    pub fn build(&self, certificate: &[u8], content_id: &str, key_request_payload: &[u8]) -> Result<WireRequest> {
        if certificate.is_empty() {
            return Err(VaultError::LicenseBuildFailed(format!(
                "no certificate for content '{}'",
                content_id
            )));
        }
        if key_request_payload.is_empty() {
            return Err(VaultError::LicenseBuildFailed(format!(
                "empty key request payload for content '{}'",
                content_id
            )));
        }

        let custom_data = self.custom_data()?;
        let spc = general_purpose::STANDARD.encode(key_request_payload);
        let body = format!("offline=true&spc={}", urlencoding::encode(&spc));

        Ok(WireRequest {
            method: Method::POST,
            url: self.license_url.clone(),
            headers: vec![
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
                (CUSTOM_DATA_HEADER.to_string(), custom_data),
            ],
            body: Some(body.into_bytes()),
        })
    }

    /// Ask the key system for the payload, then build the request
    pub fn prepare(&self, certificate: &[u8], content_id: &str, key_system: &dyn KeySystem) -> Result<WireRequest> {
        let payload = key_system
            .key_request_payload(certificate, content_id)
            .map_err(|e| {
                tracing::warn!(content_id, error = %e, "key system declined to produce a request payload");
                VaultError::LicenseBuildFailed(e.to_string())
            })?;

        self.build(certificate, content_id, &payload)
    }

    /// base64 of the session JSON
    fn custom_data(&self) -> Result<String> {
        let json = serde_json::to_vec(&self.session)?;
        Ok(general_purpose::STANDARD.encode(json))
    }
}

/// Extract and decode the `spc` field of a license request body
pub fn decode_spc(body: &str) -> Result<String> {
    let encoded = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("spc="))
        .ok_or_else(|| VaultError::invalid_input("body has no spc field"))?;

    urlencoding::decode(encoded)
        .map(|s| s.into_owned())
        .map_err(|e| VaultError::invalid_input(format!("spc is not valid percent-encoding: {}", e)))
}
