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


//! Error types for OfflineHLS
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the subsystem that raises them:
//!
//! ### License acquisition
//! - `SchemeMismatch` - key request for a scheme we do not service
//! - `CertificateFetchFailed` - network failure or non-success status on the certificate endpoint
//! - `LicenseBuildFailed` - the key system declined to produce a key-request payload
//! - `LicenseFetchFailed` - network failure or non-200 status on the license endpoint
//! - `KeyDerivationFailed` - malformed or rejected key-exchange response
//! - `Cancelled` - the issuer of the loading request cancelled it
//! - `RequestInFlight` - a second request for a content identifier that is already being served
//!
//! ### Downloads
//! - `TaskNotFound`
//!
//! ### Storage / configuration / general
//! - `MigrationFailed`, `InvalidConfig`, `InvalidInput`, plus `#[from]` wrappers

use thiserror::Error;

/// Result type alias using our VaultError type
pub type Result<T> = std::result::Result<T, VaultError>;

/// Main error type for OfflineHLS
///
/// No error in this crate is fatal to the process. Every variant describes the
/// failure of one asset's operation.
#[derive(Error, Debug)]
pub enum VaultError {
    // ===== License Errors =====

    /// The key request uses a URL scheme other than the protected-content scheme
    #[error("Unsupported key request scheme: {scheme}")]
    SchemeMismatch {
        scheme: String,
    },

    /// Certificate could not be retrieved
    #[error("Certificate fetch failed: {message}")]
    CertificateFetchFailed {
        message: String,
        /// HTTP status code if the server answered
        status: Option<u16>,
    },

    /// The key system declined to produce a key-request payload
    #[error("License request could not be built: {0}")]
    LicenseBuildFailed(String),

    /// License endpoint failed or answered with a non-200 status
    #[error("License fetch failed: {message}")]
    LicenseFetchFailed {
        message: String,
        /// HTTP status code if the server answered
        status: Option<u16>,
    },

    /// The key-exchange response could not be turned into a persistable key
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Loading request cancelled by its issuer
    #[error("Loading request cancelled")]
    Cancelled,

    /// Another acquisition for this content identifier is still running
    #[error("License request already in flight for content: {0}")]
    RequestInFlight(String),

    // ===== Download Errors =====

    /// No active download task with this handle
    #[error("Download task not found: {0}")]
    TaskNotFound(String),

    // ===== Storage / Configuration =====

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Configuration is missing a value or holds an invalid one
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== External Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

// Helper methods for creating common errors
impl VaultError {
    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        VaultError::InvalidInput(message.into())
    }

    /// Create an InvalidConfig error with a message
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        VaultError::InvalidConfig(message.into())
    }

    /// Create a CertificateFetchFailed error
    pub fn certificate_failed<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        VaultError::CertificateFetchFailed {
            message: message.into(),
            status,
        }
    }

    /// Create a LicenseFetchFailed error
    pub fn license_failed<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        VaultError::LicenseFetchFailed {
            message: message.into(),
            status,
        }
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            VaultError::CertificateFetchFailed { status, .. }
            | VaultError::LicenseFetchFailed { status, .. } => *status,
            VaultError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error belongs to the license acquisition path
    pub fn is_license_error(&self) -> bool {
        matches!(
            self,
            VaultError::SchemeMismatch { .. }
                | VaultError::CertificateFetchFailed { .. }
                | VaultError::LicenseBuildFailed(_)
                | VaultError::LicenseFetchFailed { .. }
                | VaultError::KeyDerivationFailed(_)
                | VaultError::Cancelled
                | VaultError::RequestInFlight(_)
        )
    }

    /// Check if error is retryable
    ///
    /// Returns `true` for transport failures and 5xx answers from the
    /// certificate or license endpoints. The orchestrator never retries on its
    /// own; callers decide whether to issue a new loading request.
    pub fn is_retryable(&self) -> bool {
        match self {
            VaultError::CertificateFetchFailed { status, .. }
            | VaultError::LicenseFetchFailed { status, .. } => {
                matches!(status, None | Some(500..=599))
            }
            VaultError::ReqwestError(e) => e.is_timeout() || e.is_connect(),
            VaultError::RequestInFlight(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_extraction() {
        let err = VaultError::certificate_failed("HTTP 500", Some(500));
        assert_eq!(err.status_code(), Some(500));

        let err = VaultError::license_failed("connection reset", None);
        assert_eq!(err.status_code(), None);

        assert_eq!(VaultError::Cancelled.status_code(), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VaultError::certificate_failed("HTTP 503", Some(503)).is_retryable());
        assert!(VaultError::license_failed("timeout", None).is_retryable());
        assert!(!VaultError::license_failed("HTTP 403", Some(403)).is_retryable());
        assert!(!VaultError::KeyDerivationFailed("bad ckc".into()).is_retryable());
    }

    #[test]
    fn test_license_error_category() {
        assert!(VaultError::SchemeMismatch { scheme: "https".into() }.is_license_error());
        assert!(VaultError::Cancelled.is_license_error());
        assert!(!VaultError::TaskNotFound("x".into()).is_license_error());
    }
}
