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


//! Playback engine key-system capabilities
//!
//! The two cryptographic steps of the license flow belong to the playback
//! engine, not to this crate: producing the key-request payload (SPC) from
//! the application certificate, and turning the server's key-exchange
//! response (CKC) into a key that can be stored and replayed offline. Both
//! are opaque byte transformations from our point of view.

use crate::error::Result;

pub trait KeySystem: Send + Sync {
    /// Produce the opaque key-request payload for `content_id`.
    ///
    /// An `Err` means the platform declined (for example a malformed content
    /// identifier); the orchestrator reports it as `LicenseBuildFailed`.
    fn key_request_payload(&self, certificate: &[u8], content_id: &str) -> Result<Vec<u8>>;

    /// Turn a decoded key-exchange response into a persistable key blob.
    ///
    /// An `Err` is reported as `KeyDerivationFailed`.
    fn persistable_key(&self, key_response: &[u8]) -> Result<Vec<u8>>;
}
