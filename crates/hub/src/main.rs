// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sendensed`: the Sendense hub binary. Wires the tracker, chain manager,
//! export service, orchestrator, and progress pipeline behind the
//! push-telemetry/health HTTP surface and the background reconciliation
//! tasks, following a fixed-path startup convention (load config, acquire
//! the lock, replay the WAL onto the last snapshot, bind, spawn maintenance
//! tasks). Shutdown on `ctrl_c`/`SIGTERM` drains the HTTP listener, stops
//! the background tasks, and writes a final checkpoint before exiting.

mod config;
mod reconcile;
mod routes;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex as SyncMutex;
use sendense_agent_client::HttpAgentClient;
use sendense_core::{RepositoryId, SystemClock};
use sendense_export::{ExportService, NbdKitDaemon};
use sendense_orchestrator::{Orchestrator, PipelineConfig, ProgressPipeline};
use sendense_repository::{ChainManager, RepositoryHandle, RepositoryKind};
use sendense_storage::{Checkpointer, Wal};
use sendense_tracker::{LogSink, Tracker, WalBackedStore};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::HubConfig;
use routes::AppState;

#[derive(Debug, Error)]
enum StartupError {
    #[error("no $HOME and SENDENSE_STATE_DIR unset: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to acquire lock at {path}: daemon already running?")]
    LockFailed { path: PathBuf, source: std::io::Error },
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] sendense_storage::CheckpointError),
    #[error("WAL error: {0}")]
    Wal(#[from] sendense_storage::WalError),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error("agent base url {0:?} is not a valid URL: {1}")]
    InvalidAgentUrl(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository {name:?} has kind {kind:?}, which has no driver in this build")]
    UnsupportedRepositoryKind { name: String, kind: RepositoryKind },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(error) = run().await {
        tracing::error!(%error, "sendensed exited with an error");
        return Err(error.into());
    }
    Ok(())
}

async fn run() -> Result<(), StartupError> {
    let config_path = std::env::var("SENDENSE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/sendense/hub.toml"));
    let hub_config = HubConfig::load(&config_path)?;

    std::fs::create_dir_all(&hub_config.state_dir)?;
    if let Some(parent) = hub_config.wal_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(hub_config.export_root())?;

    // Lock file first: a second instance must fail fast rather than race
    // the first over the WAL.
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(hub_config.lock_path())?;
    lock_file
        .try_lock_exclusive()
        .map_err(|source| StartupError::LockFailed { path: hub_config.lock_path(), source })?;
    {
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    let checkpointer = Arc::new(Checkpointer::new(hub_config.snapshot_path()));
    let (loaded_state, start_seq) = checkpointer.load()?;
    info!(
        vm_contexts = loaded_state.vm_contexts.len(),
        backup_jobs = loaded_state.backup_jobs.len(),
        start_seq,
        "loaded snapshot"
    );

    let wal = Wal::open(hub_config.wal_path(), start_seq)?;
    let replay = wal.entries_after(start_seq.saturating_sub(1))?;
    let mut state = loaded_state;
    let replay_count = replay.len();
    for entry in replay {
        state.apply_event(&entry.event);
    }
    if replay_count > 0 {
        info!(replay_count, "replayed WAL entries onto snapshot");
    }

    let state = Arc::new(SyncMutex::new(state));
    let wal = Arc::new(SyncMutex::new(wal));

    let mut repos = HashMap::new();
    for (name, repo_config) in &hub_config.repositories {
        if !matches!(repo_config.kind, RepositoryKind::Local) {
            return Err(StartupError::UnsupportedRepositoryKind { name: name.clone(), kind: repo_config.kind });
        }
        std::fs::create_dir_all(&repo_config.path)?;
        // Deterministic, not random: the id must survive a restart since
        // `backup_job.repository_id` is part of the persisted WAL/snapshot
        // state.
        let repository_id = RepositoryId::from_string(format!("{}{}", RepositoryId::PREFIX, name));
        repos.insert(
            repository_id,
            RepositoryHandle {
                driver: Arc::new(sendense_repository::LocalFsRepository::new(repo_config.path.clone())),
                root: repo_config.path.clone(),
            },
        );
    }

    let chain = Arc::new(
        ChainManager::new(Arc::clone(&state), Arc::clone(&wal), repos, hub_config.max_chain_depth)
            .with_min_free_bytes_hard(hub_config.min_free_bytes_hard),
    );

    let daemon = Arc::new(NbdKitDaemon::new(hub_config.export_root(), hub_config.export_pid_file()));
    let exports = Arc::new(ExportService::new(daemon, Arc::clone(&state), Arc::clone(&wal), hub_config.export_port));

    let tracker_store = Arc::new(WalBackedStore::new(Arc::clone(&state), Arc::clone(&wal)));
    let (log_sink, log_writer) = LogSink::spawn(tracker_store.clone(), hub_config.log_channel_capacity);
    let clock = SystemClock;
    let tracker = Tracker::new(tracker_store, clock.clone(), log_sink);

    let agent_base_url = reqwest::Url::parse(&hub_config.agent_base_url)
        .map_err(|e| StartupError::InvalidAgentUrl(hub_config.agent_base_url.clone(), e.to_string()))?;
    let agent = Arc::new(HttpAgentClient::new(agent_base_url));

    let pipeline_config = PipelineConfig::default();
    let pipeline = Arc::new(ProgressPipeline::new(
        clock.clone(),
        tracker.clone(),
        Arc::clone(&chain) as Arc<dyn sendense_repository::ChainManagerApi>,
        Arc::clone(&agent) as Arc<dyn sendense_agent_client::AgentClient>,
        pipeline_config,
    ));

    let _orchestrator = Orchestrator::new(
        Arc::clone(&chain) as Arc<dyn sendense_repository::ChainManagerApi>,
        Arc::clone(&exports) as Arc<dyn sendense_export::ExportServiceApi>,
        Arc::clone(&agent) as Arc<dyn sendense_agent_client::AgentClient>,
        tracker.clone(),
        Arc::clone(&pipeline),
        hub_config.pull_mode,
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let checkpoint_handle = reconcile::spawn_checkpoint_task(
        Arc::clone(&checkpointer),
        Arc::clone(&state),
        Arc::clone(&wal),
        hub_config.checkpoint_interval,
        shutdown.clone(),
    );
    let export_sync_handle = reconcile::spawn_export_sync_task(
        Arc::clone(&exports) as Arc<dyn sendense_export::ExportServiceApi>,
        hub_config.reconcile_interval,
        shutdown.clone(),
    );
    let watchdog_handle = pipeline.spawn_stall_watchdog();

    let app_state = Arc::new(AppState { pipeline, tracker });
    let app = routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&hub_config.http_addr)
        .await
        .map_err(|source| StartupError::Bind { addr: hub_config.http_addr.clone(), source })?;
    info!(addr = %hub_config.http_addr, "sendensed listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await
        .map_err(|error| {
            warn!(%error, "HTTP server exited");
            StartupError::Io(error.into())
        })?;

    info!("HTTP listener drained, stopping background tasks");
    checkpoint_handle.abort();
    export_sync_handle.abort();
    watchdog_handle.abort();

    let (snapshot, seq) = {
        let state = state.lock();
        (state.clone(), wal.lock().write_seq())
    };
    {
        let mut wal = wal.lock();
        checkpointer.checkpoint(&snapshot, seq, &mut wal)?;
    }
    info!(seq, "final shutdown checkpoint written");

    // Keep the writer handle and lock file alive for the life of the
    // process so the drop doesn't race a still-running log batch or
    // release the lock early.
    drop(log_writer);
    drop(lock_file);
    Ok(())
}

/// Cancels `shutdown` on the first `ctrl_c` or `SIGTERM`, whichever arrives
/// first; a second signal while already draining just lands a no-op cancel.
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl_c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
