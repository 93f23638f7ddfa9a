// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The signal-driven reload contract a block-export daemon must implement.

use async_trait::async_trait;

use crate::error::DaemonError;

/// One fragment of the export table: the configuration a daemon needs to
/// publish a single file-backed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFragment {
    pub export_name: String,
    pub file_path: String,
    pub writable: bool,
    pub port: u16,
}

/// A block-export daemon that publishes file-backed exports from an
/// on-disk configuration fragment directory and reloads on signal
/// Implementations must make `write_fragment` and
/// `remove_fragment` atomic with respect to concurrent readers of the
/// fragment directory; [`crate::service::ExportService`] is responsible
/// for serializing calls across export names.
#[async_trait]
pub trait ExportDaemon: Send + Sync {
    async fn write_fragment(&self, fragment: &ExportFragment) -> Result<(), DaemonError>;

    /// Not an error if the fragment does not exist.
    async fn remove_fragment(&self, export_name: &str) -> Result<(), DaemonError>;

    /// Asks the daemon to re-read the fragment directory.
    async fn reload(&self) -> Result<(), DaemonError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
