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


//! Download registry
//!
//! Tracks in-flight aggregate download tasks, persists where finished
//! packages live and reports state to the UI through typed events.
//!
//! # State
//! - `Downloading`: a task record exists for the asset name
//! - `Downloaded`: a persisted location exists and the file is present
//! - `NotDownloaded`: anything else
//!
//! All mutation of the task map happens under one async mutex. Session
//! callbacks may arrive from any task; they only ever touch the map through
//! that lock.

use crate::config::DownloadConfig;
use crate::download::asset::Asset;
use crate::download::events::{self, DownloadEvent, DownloadEvents, EventSender};
use crate::download::progress::{fraction_complete, DownloadState, TimeRange};
use crate::download::session::{AssetDownloadSession, MediaSelection, TaskHandle, TaskOutcome};
use crate::error::{Result, VaultError};
use crate::license::{ContentKeyHandler, LicenseOrchestrator};
use crate::origin::LocalContentOrigin;
use crate::storage::LocationStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug)]
struct TaskRecord {
    asset: Asset,
    destination: Option<PathBuf>,
}

pub struct DownloadRegistry {
    session: Arc<dyn AssetDownloadSession>,
    orchestrator: LicenseOrchestrator,
    key_handler: Arc<dyn ContentKeyHandler>,
    locations: LocationStore,
    origin: LocalContentOrigin,
    tasks: Mutex<HashMap<TaskHandle, TaskRecord>>,
    events: EventSender,
    receiver: std::sync::Mutex<Option<DownloadEvents>>,
}

impl DownloadRegistry {
    pub fn new(
        config: &DownloadConfig,
        session: Arc<dyn AssetDownloadSession>,
        orchestrator: LicenseOrchestrator,
        locations: LocationStore,
    ) -> Result<Self> {
        let origin = LocalContentOrigin::new(&config.origin_base_url, config.downloads_root.clone())?;
        let (events, receiver) = events::channel(config.event_capacity);

        Ok(Self {
            session,
            key_handler: Arc::new(orchestrator.clone()),
            orchestrator,
            locations,
            origin,
            tasks: Mutex::new(HashMap::new()),
            events,
            receiver: std::sync::Mutex::new(Some(receiver)),
        })
    }

    /// Receiving end of the event channel; handed out once
    pub fn events(&self) -> Option<DownloadEvents> {
        self.receiver
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }

    pub fn origin(&self) -> &LocalContentOrigin {
        &self.origin
    }

    pub fn orchestrator(&self) -> &LicenseOrchestrator {
        &self.orchestrator
    }

    /// Route key requests from the asset's resource to the license orchestrator
    pub fn attach_key_handler(&self, asset: &Asset) {
        asset.resource().set_key_handler(self.key_handler.clone());
    }

    /// Start downloading an asset; returns the existing handle if it is already running
    pub async fn start(&self, asset: &Asset) -> Result<TaskHandle> {
        let mut tasks = self.tasks.lock().await;

        if let Some((handle, _)) = tasks.iter().find(|(_, record)| record.asset.name == asset.name) {
            tracing::debug!(asset = %asset.name, task = %handle, "download already running");
            return Ok(*handle);
        }

        self.attach_key_handler(asset);

        let handle = TaskHandle::new();
        self.session.create_task(handle, asset)?;
        tasks.insert(
            handle,
            TaskRecord {
                asset: asset.clone(),
                destination: None,
            },
        );
        self.session.resume(handle);
        drop(tasks);

        tracing::info!(asset = %asset.name, task = %handle, "download started");
        self.events.state_changed(&asset.name, DownloadState::Downloading, None);

        Ok(handle)
    }

    /// Record where the session is writing the package; the first report wins
    pub async fn on_will_download_to(&self, task: TaskHandle, destination: PathBuf) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let record = tasks
            .get_mut(&task)
            .ok_or_else(|| VaultError::TaskNotFound(task.to_string()))?;

        match &record.destination {
            Some(existing) if existing != &destination => {
                tracing::warn!(
                    task = %task,
                    existing = %existing.display(),
                    ignored = %destination.display(),
                    "destination already recorded"
                );
            }
            Some(_) => {}
            None => {
                tracing::debug!(task = %task, destination = %destination.display(), "download destination recorded");
                record.destination = Some(destination);
            }
        }

        Ok(())
    }

    /// One media selection finished; continue with the next
    pub async fn on_media_selection_complete(&self, task: TaskHandle, selection: &MediaSelection) -> Result<()> {
        let asset_name = {
            let tasks = self.tasks.lock().await;
            tasks
                .get(&task)
                .map(|record| record.asset.name.clone())
                .ok_or_else(|| VaultError::TaskNotFound(task.to_string()))?
        };

        self.session.resume(task);
        self.events.state_changed(&asset_name, DownloadState::Downloading, Some(selection.summary()));

        Ok(())
    }

    /// Compute and publish progress for the current media selection
    ///
    /// Returns `None` for unknown tasks. The event is dropped when the
    /// channel is full.
    pub async fn on_progress(
        &self,
        task: TaskHandle,
        loaded: &[TimeRange],
        expected: &TimeRange,
    ) -> Option<f64> {
        let asset_name = {
            let tasks = self.tasks.lock().await;
            tasks.get(&task).map(|record| record.asset.name.clone())?
        };

        let fraction = fraction_complete(loaded, expected);
        self.events.progress(&asset_name, fraction);
        Some(fraction)
    }

    /// The aggregate task ended
    pub async fn on_complete(&self, task: TaskHandle, outcome: TaskOutcome) {
        let record = match self.tasks.lock().await.remove(&task) {
            Some(record) => record,
            None => {
                tracing::warn!(task = %task, ?outcome, "completion for unknown task");
                return;
            }
        };

        let name = record.asset.name.clone();
        let state = match outcome {
            TaskOutcome::Finished => self.persist_finished(&record).await,
            TaskOutcome::Cancelled | TaskOutcome::Failed(_) => {
                if let TaskOutcome::Failed(reason) = &outcome {
                    tracing::warn!(asset = %name, %reason, "download failed");
                } else {
                    tracing::info!(asset = %name, "download cancelled");
                }
                self.discard_partial(&record).await;
                DownloadState::NotDownloaded
            }
        };

        self.events.state_changed(&name, state, None);
    }

    async fn persist_finished(&self, record: &TaskRecord) -> DownloadState {
        let name = &record.asset.name;

        let relative = match record.destination.as_deref() {
            Some(destination) => match self.origin.relative_of(destination) {
                Some(relative) => relative,
                None => {
                    tracing::error!(
                        asset = %name,
                        destination = %destination.display(),
                        "download finished outside the downloads root"
                    );
                    return DownloadState::NotDownloaded;
                }
            },
            None => {
                tracing::error!(asset = %name, "download finished without a destination");
                return DownloadState::NotDownloaded;
            }
        };

        match self.locations.set(name, &relative).await {
            Ok(()) => {
                tracing::info!(asset = %name, location = %relative, "download finished");
                DownloadState::Downloaded
            }
            Err(e) => {
                tracing::error!(asset = %name, error = %e, "failed to persist download location");
                DownloadState::NotDownloaded
            }
        }
    }

    async fn discard_partial(&self, record: &TaskRecord) {
        let name = &record.asset.name;

        if let Some(destination) = &record.destination {
            if let Err(e) = remove_path(destination).await {
                tracing::warn!(asset = %name, path = %destination.display(), error = %e, "failed to remove partial download");
            }
        }

        if let Err(e) = self.locations.remove(name).await {
            tracing::warn!(asset = %name, error = %e, "failed to clear download location");
        }
    }

    /// Ask the session to stop the asset's task; `false` if none is running
    pub async fn cancel(&self, asset: &Asset) -> bool {
        let handle = {
            let tasks = self.tasks.lock().await;
            tasks
                .iter()
                .find(|(_, record)| record.asset.name == asset.name)
                .map(|(handle, _)| *handle)
        };

        match handle {
            Some(handle) => {
                self.session.cancel(handle);
                self.orchestrator.cancel_pending(&asset.content_id);
                tracing::info!(asset = %asset.name, task = %handle, "download cancel requested");
                true
            }
            None => false,
        }
    }

    pub async fn lookup_active_by_name(&self, name: &str) -> Option<Asset> {
        let tasks = self.tasks.lock().await;
        tasks
            .values()
            .find(|record| record.asset.name == name)
            .map(|record| record.asset.clone())
    }

    /// Asset for a finished download, addressed at the local origin
    pub async fn resolve_local_by_name(&self, name: &str, content_id: &str, program_id: &str) -> Option<Asset> {
        let relative = self.present_location(name).await?;

        match self.origin.url_for(&relative) {
            Ok(url) => {
                let asset = Asset::new(name, content_id, program_id, url);
                self.attach_key_handler(&asset);
                Some(asset)
            }
            Err(e) => {
                tracing::warn!(asset = %name, location = %relative, error = %e, "unusable download location");
                None
            }
        }
    }

    pub async fn current_state(&self, asset: &Asset) -> DownloadState {
        if self.lookup_active_by_name(&asset.name).await.is_some() {
            return DownloadState::Downloading;
        }

        if self.present_location(&asset.name).await.is_some() {
            DownloadState::Downloaded
        } else {
            DownloadState::NotDownloaded
        }
    }

    /// Remove a downloaded package and its persisted location
    pub async fn delete(&self, asset: &Asset) {
        match self.locations.get(&asset.name).await {
            Ok(Some(location)) => {
                match self.origin.package_dir_for(&location.relative_path) {
                    Ok(dir) => {
                        if let Err(e) = remove_path(&dir).await {
                            tracing::warn!(asset = %asset.name, path = %dir.display(), error = %e, "failed to remove download");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(asset = %asset.name, error = %e, "unusable download location");
                    }
                }

                if let Err(e) = self.locations.remove(&asset.name).await {
                    tracing::warn!(asset = %asset.name, error = %e, "failed to clear download location");
                }
                if let Err(e) = self.orchestrator.forget_key(&asset.content_id).await {
                    tracing::warn!(asset = %asset.name, error = %e, "failed to drop cached license key");
                }

                tracing::info!(asset = %asset.name, "download deleted");
            }
            Ok(None) => {
                tracing::debug!(asset = %asset.name, "nothing to delete");
            }
            Err(e) => {
                tracing::warn!(asset = %asset.name, error = %e, "failed to read download location");
            }
        }

        self.events.state_changed(&asset.name, DownloadState::NotDownloaded, None);
        self.events.send(DownloadEvent::CatalogReloadRequested);
    }

    /// Persisted location for the asset, if the file is still on disk
    async fn present_location(&self, name: &str) -> Option<String> {
        let location = match self.locations.get(name).await {
            Ok(location) => location?,
            Err(e) => {
                tracing::warn!(asset = %name, error = %e, "failed to read download location");
                return None;
            }
        };

        let path = self.origin.path_for(&location.relative_path).ok()?;
        if fs::metadata(&path).await.is_ok() {
            Some(location.relative_path)
        } else {
            tracing::debug!(asset = %name, path = %path.display(), "recorded download is missing on disk");
            None
        }
    }
}

async fn remove_path(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
