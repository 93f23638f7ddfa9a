// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `nbdkit`/nbd-server style export daemon driver: writes one configuration
//! fragment per export under `export_root` and reloads by sending `SIGHUP`
//! to the pid recorded in `pid_file`. All exports share one listen port
//! (default 10809, NBD's IANA-assigned port) and reload is signal-driven.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::capability::{ExportDaemon, ExportFragment};
use crate::error::DaemonError;

pub struct NbdKitDaemon {
    export_root: PathBuf,
    pid_file: PathBuf,
}

impl NbdKitDaemon {
    pub fn new(export_root: impl Into<PathBuf>, pid_file: impl Into<PathBuf>) -> Self {
        Self {
            export_root: export_root.into(),
            pid_file: pid_file.into(),
        }
    }

    fn fragment_path(&self, export_name: &str) -> PathBuf {
        self.export_root.join(format!("{export_name}.export"))
    }
}

fn write_fragment_blocking(path: &Path, fragment: &ExportFragment) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = format!(
        "name={}\npath={}\nwritable={}\nport={}\n",
        fragment.export_name, fragment.file_path, fragment.writable, fragment.port
    );
    let tmp = path.with_extension("export.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}

fn remove_fragment_blocking(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn read_pid_blocking(pid_file: &Path) -> io::Result<i32> {
    let raw = std::fs::read_to_string(pid_file)?;
    raw.trim()
        .parse::<i32>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[async_trait]
impl ExportDaemon for NbdKitDaemon {
    async fn write_fragment(&self, fragment: &ExportFragment) -> Result<(), DaemonError> {
        let path = self.fragment_path(&fragment.export_name);
        let fragment = fragment.clone();
        tokio::task::spawn_blocking(move || write_fragment_blocking(&path, &fragment))
            .await
            .map_err(|e| DaemonError::Io(io::Error::other(e)))?
            .map_err(DaemonError::Io)
    }

    async fn remove_fragment(&self, export_name: &str) -> Result<(), DaemonError> {
        let path = self.fragment_path(export_name);
        tokio::task::spawn_blocking(move || remove_fragment_blocking(&path))
            .await
            .map_err(|e| DaemonError::Io(io::Error::other(e)))?
            .map_err(DaemonError::Io)
    }

    async fn reload(&self) -> Result<(), DaemonError> {
        let pid_file = self.pid_file.clone();
        let pid = tokio::task::spawn_blocking(move || read_pid_blocking(&pid_file))
            .await
            .map_err(|e| DaemonError::Io(io::Error::other(e)))?
            .map_err(DaemonError::Io)?;

        kill(Pid::from_raw(pid), Signal::SIGHUP).map_err(|errno| DaemonError::Signal(errno.to_string()))
    }
}

#[cfg(test)]
#[path = "nbdkit_tests.rs"]
mod tests;
