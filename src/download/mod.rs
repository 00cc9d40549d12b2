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


//! Download bookkeeping
//!
//! The platform session performs the transfer; this module tracks tasks,
//! computes progress, persists finished locations and publishes events.

pub mod asset;
pub mod events;
pub mod progress;
pub mod registry;
pub mod session;

pub use asset::{Asset, AssetResource};
pub use events::{DownloadEvent, DownloadEvents, EventSender};
pub use progress::{fraction_complete, DownloadState, TimeRange};
pub use registry::DownloadRegistry;
pub use session::{AssetDownloadSession, MediaSelection, TaskHandle, TaskOutcome};
