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


//! Platform download session seam
//!
//! The platform owns the actual segment transfer. It creates one aggregate
//! task per asset and reports back through the registry callbacks
//! (`on_will_download_to`, `on_media_selection_complete`, `on_progress`,
//! `on_complete`).

use crate::download::asset::Asset;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one aggregate download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tracks chosen for one media selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSelection {
    pub display_names: Vec<String>,
}

impl MediaSelection {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            display_names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Display names joined by ", "
    pub fn summary(&self) -> String {
        self.display_names.join(", ")
    }
}

/// How an aggregate task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

/// Platform download session
pub trait AssetDownloadSession: Send + Sync {
    /// Create the aggregate task for `asset` under `handle`
    fn create_task(&self, handle: TaskHandle, asset: &Asset) -> Result<()>;

    /// Start or continue the task (after creation and after each media selection)
    fn resume(&self, handle: TaskHandle);

    /// Stop the task; the platform later reports `TaskOutcome::Cancelled`
    fn cancel(&self, handle: TaskHandle);
}
