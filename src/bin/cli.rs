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


use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use offline_hls_core::catalog::Catalog;
use offline_hls_core::config::VaultConfig;
use offline_hls_core::download::{Asset, AssetDownloadSession, DownloadRegistry, TaskHandle};
use offline_hls_core::license::{KeySystem, LicenseOrchestrator, ReqwestTransport};
use offline_hls_core::storage::{Database, KeyCacheStore, LocationStore};
use offline_hls_core::VaultError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "offline-hls-cli")]
#[command(about = "Inspect and manage offline HLS downloads", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "vault.json")]
    config: PathBuf,

    /// Stream catalog (JSON)
    #[arg(long, default_value = "streams.json")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the download state of every catalog entry
    Status,
    /// Delete a downloaded stream and its cached key
    Delete {
        /// Stream name as it appears in the catalog
        name: String,
    },
    /// List catalog entries with the URL each one plays from
    Catalog,
}

/// Downloads are driven by the platform; the CLI only inspects.
struct InspectOnlySession;

impl AssetDownloadSession for InspectOnlySession {
    fn create_task(&self, _handle: TaskHandle, asset: &Asset) -> offline_hls_core::Result<()> {
        Err(VaultError::invalid_input(format!(
            "cannot download '{}' from the command line",
            asset.name
        )))
    }

    fn resume(&self, _handle: TaskHandle) {}

    fn cancel(&self, _handle: TaskHandle) {}
}

/// Key derivation needs the platform key system.
struct NoKeySystem;

impl KeySystem for NoKeySystem {
    fn key_request_payload(&self, _certificate: &[u8], _content_id: &str) -> offline_hls_core::Result<Vec<u8>> {
        Err(VaultError::invalid_input("no key system available"))
    }

    fn persistable_key(&self, _key_response: &[u8]) -> offline_hls_core::Result<Vec<u8>> {
        Err(VaultError::invalid_input("no key system available"))
    }
}

async fn open_registry(config: &VaultConfig) -> anyhow::Result<DownloadRegistry> {
    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| config.downloads.downloads_root.join("vault.db"));
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let transport = Arc::new(ReqwestTransport::new(&config.license)?);
    let orchestrator = LicenseOrchestrator::new(
        &config.license,
        KeyCacheStore::new(db.pool().clone()),
        transport,
        Arc::new(NoKeySystem),
    )?;

    let registry = DownloadRegistry::new(
        &config.downloads,
        Arc::new(InspectOnlySession),
        orchestrator,
        LocationStore::new(db.pool().clone()),
    )?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let config = VaultConfig::load(&cli.config)
        .await
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let catalog = Catalog::load(&cli.catalog)
        .await
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let registry = open_registry(&config).await?;

    match cli.command {
        Commands::Status => {
            for asset in catalog.build_assets(&registry).await {
                let state = registry.current_state(&asset).await;
                println!("{:<32} {}", asset.name, state);
            }
        }
        Commands::Delete { name } => {
            let entry = catalog
                .find(&name)
                .ok_or_else(|| anyhow!("'{}' is not in the catalog", name))?;
            let asset = Asset::new(
                entry.name.clone(),
                entry.content_id.clone(),
                entry.program_id.clone(),
                entry.playlist_url.clone(),
            );
            registry.delete(&asset).await;
            println!("Deleted {}", name);
        }
        Commands::Catalog => {
            for asset in catalog.build_assets(&registry).await {
                let origin = if asset.is_local() { "local" } else { "remote" };
                println!("{:<32} {:<7} {}", asset.name, origin, asset.url());
            }
        }
    }

    Ok(())
}
