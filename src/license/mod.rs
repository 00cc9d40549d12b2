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


//! Content-key license acquisition
//!
//! # License Request Flow
//! 1. The playback engine asks for a key through a `skd://<content id>` URL
//! 2. A cached persistable key for the content id answers immediately
//! 3. Otherwise the application certificate is loaded (cache, then network)
//! 4. The key system turns certificate + content id into a request payload (SPC)
//! 5. The payload is POSTed to the license server
//! 6. The base64 key-exchange response (CKC) is decoded and handed to the key
//!    system, which returns a persistable key
//! 7. The key is cached and delivered as `persistent-key`

pub mod certificate;
pub mod key_system;
pub mod loading_request;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod transport;

pub use certificate::CertificateFetcher;
pub use key_system::KeySystem;
pub use loading_request::{LoadingRequest, LoadingResponse, Reservation, ResolvedKey, PERSISTENT_KEY_CONTENT_TYPE};
pub use orchestrator::{ContentKeyHandler, LicenseOrchestrator, LicenseState};
pub use request::LicenseRequestBuilder;
pub use response::{HandleOutcome, LicenseResponseHandler};
pub use transport::{HttpTransport, ReqwestTransport, WireRequest, WireResponse};
