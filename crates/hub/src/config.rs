// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub configuration: a TOML file with `SENDENSE_`-prefixed environment
//! overrides layered on top, following the daemon's `Config::load()`
//! fixed-path convention (state dir first, everything else derived).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("no repositories configured; at least one [repositories.*] table is required")]
    NoRepositories,
    #[error("$HOME is not set and SENDENSE_STATE_DIR was not provided")]
    NoStateDir,
}

/// One configured storage backend. Only `kind = "local"` has a driver in
/// this workspace; the other kinds deserialize fine so an operator's config
/// isn't silently misread, but `main.rs` refuses to start a repository whose
/// kind has no driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_kind")]
    pub kind: sendense_repository::RepositoryKind,
    pub path: PathBuf,
}

fn default_repository_kind() -> sendense_repository::RepositoryKind {
    sendense_repository::RepositoryKind::Local
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Root state directory holding the WAL, snapshot, and export fragments.
    pub state_dir: PathBuf,
    /// Address the push-telemetry / health HTTP server binds.
    pub http_addr: String,
    /// Shared NBD-style listen port advertised to the capture agent
    /// (default is NBD's IANA-assigned port).
    pub export_port: u16,
    /// Whether the progress pipeline pulls `/progress/{backup_id}` from the
    /// agent or waits for pushes to the hub's telemetry endpoint.
    pub pull_mode: bool,
    /// Base URL of the capture agent's control endpoint. One agent per hub
    /// in this workspace — multi-agent routing by VM context is left
    /// unresolved (see DESIGN.md).
    pub agent_base_url: String,
    /// Maximum backup-chain length before a new full is required.
    pub max_chain_depth: u32,
    /// Durable log sink bounded-channel capacity (default 1024).
    pub log_channel_capacity: usize,
    /// Hard free-space floor enforced ahead of `create_backup` (bytes).
    pub min_free_bytes_hard: u64,
    /// Named storage backends, keyed by a stable operator-chosen name
    /// (`repositories.<name>` in TOML) and mapped to a `RepositoryId`
    /// derived deterministically from that name.
    pub repositories: HashMap<String, RepositoryConfig>,
    /// Checkpoint/snapshot interval.
    #[serde(with = "duration_secs")]
    pub checkpoint_interval: std::time::Duration,
    /// Reconciliation (`sync_exports_with_images`) interval.
    #[serde(with = "duration_secs")]
    pub reconcile_interval: std::time::Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/sendense"),
            http_addr: "0.0.0.0:7870".to_string(),
            export_port: sendense_export::DEFAULT_EXPORT_PORT,
            pull_mode: true,
            agent_base_url: "http://127.0.0.1:7880".to_string(),
            max_chain_depth: 64,
            log_channel_capacity: 1024,
            min_free_bytes_hard: 0,
            repositories: HashMap::new(),
            checkpoint_interval: std::time::Duration::from_secs(60),
            reconcile_interval: std::time::Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    pub fn wal_path(&self) -> PathBuf {
        self.state_dir.join("wal").join("events.wal")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join("snapshot.json")
    }

    pub fn export_root(&self) -> PathBuf {
        self.state_dir.join("exports")
    }

    pub fn export_pid_file(&self) -> PathBuf {
        self.state_dir.join("nbdkit.pid")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("hub.pid")
    }

    /// Loads configuration from `path` (if it exists), falling back to
    /// defaults, then applies `SENDENSE_`-prefixed environment overrides.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        if config.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SENDENSE_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("SENDENSE_HTTP_ADDR") {
            self.http_addr = addr;
        }
        if let Some(port) = env_u16("SENDENSE_EXPORT_PORT") {
            self.export_port = port;
        }
        if let Ok(raw) = std::env::var("SENDENSE_PULL_MODE") {
            if let Ok(value) = raw.parse::<bool>() {
                self.pull_mode = value;
            }
        }
        if let Ok(url) = std::env::var("SENDENSE_AGENT_BASE_URL") {
            self.agent_base_url = url;
        }
        if let Some(depth) = env_u32("SENDENSE_MAX_CHAIN_DEPTH") {
            self.max_chain_depth = depth;
        }
        if let Some(bytes) = env_u64("SENDENSE_MIN_FREE_BYTES_HARD") {
            self.min_free_bytes_hard = bytes;
        }
    }
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

/// `$HOME/.local/state/sendense`, or `$SENDENSE_STATE_DIR` if set —
/// resolved before `HubConfig::load` so the config file path itself can
/// live under the same root.
pub fn default_state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("SENDENSE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sendense"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/sendense"))
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
