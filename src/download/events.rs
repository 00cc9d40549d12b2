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


//! Typed download events for the UI layer

use crate::download::progress::DownloadState;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    StateChanged {
        asset_name: String,
        state: DownloadState,
        /// Display names of the media selection that just finished, if any
        selection: Option<String>,
    },
    ProgressUpdated {
        asset_name: String,
        fraction: f64,
    },
    /// The asset list should be rebuilt
    CatalogReloadRequested,
}

pub type DownloadEvents = mpsc::Receiver<DownloadEvent>;

/// Sending half of the bounded event channel
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<DownloadEvent>,
}

/// Create a bounded event channel
pub fn channel(capacity: usize) -> (EventSender, DownloadEvents) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

impl EventSender {
    /// Deliver an event if there is room; never waits.
    ///
    /// Session callbacks run on the platform's serialized context, so a slow
    /// or absent consumer loses events instead of stalling the caller.
    pub fn send(&self, event: DownloadEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                match &event {
                    DownloadEvent::ProgressUpdated { .. } => {
                        tracing::trace!(?event, "download event channel full")
                    }
                    _ => tracing::warn!(?event, "download event dropped: channel full"),
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("download event dropped: no receiver");
                false
            }
        }
    }

    pub fn state_changed(&self, asset_name: &str, state: DownloadState, selection: Option<String>) -> bool {
        self.send(DownloadEvent::StateChanged {
            asset_name: asset_name.to_string(),
            state,
            selection,
        })
    }

    pub fn progress(&self, asset_name: &str, fraction: f64) -> bool {
        self.send(DownloadEvent::ProgressUpdated {
            asset_name: asset_name.to_string(),
            fraction,
        })
    }
}
