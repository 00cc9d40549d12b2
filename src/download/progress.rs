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


//! Download state and progress computation
//!
//! Aggregate downloads report progress as media time, not bytes: the session
//! hands over the time ranges loaded so far and the time range it expects to
//! load for the current media selection. Completion is the loaded duration
//! divided by the expected duration. The value is per media selection and is
//! not clamped, so a UI summing selections can see values above 1.0.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Download state of an asset as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadState {
    #[serde(rename = "not_downloaded")]
    NotDownloaded,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "downloaded")]
    Downloaded,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::NotDownloaded => "not_downloaded",
            DownloadState::Downloading => "downloading",
            DownloadState::Downloaded => "downloaded",
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A range of media time, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }
}

/// Fraction of `expected` covered by `loaded`
///
/// Sum of loaded durations over the expected duration. Returns 0.0 when the
/// expected duration is not positive.
pub fn fraction_complete(loaded: &[TimeRange], expected: &TimeRange) -> f64 {
    if expected.duration <= 0.0 || !expected.duration.is_finite() {
        return 0.0;
    }

    let loaded_secs: f64 = loaded
        .iter()
        .map(|range| range.duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum();

    loaded_secs / expected.duration
}
