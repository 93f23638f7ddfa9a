// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by [`crate::capability::ExportDaemon`] implementations.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("signal delivery failed: {0}")]
    Signal(String),
}

/// Errors surfaced by [`crate::service::ExportService`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export file path is not absolute: {0}")]
    PathNotAbsolute(String),
    #[error("export file path is not readable: {0}")]
    PathNotReadable(String),
    #[error("export daemon reload failed after retry")]
    ReloadFailed,
    #[error("export not found")]
    NotFound,
    #[error(transparent)]
    Daemon(#[from] DaemonError),
}
