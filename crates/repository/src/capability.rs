// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The minimal capability surface a storage backend must implement so the
//! chain manager can allocate, inspect, and retire image files without
//! knowing anything about the backend's real storage medium.

use crate::error::DriverError;
use async_trait::async_trait;

/// Metadata about an on-disk image file, as reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStat {
    pub size_bytes: u64,
    pub backing_path: Option<String>,
}

/// Storage backend capability surface.
///
/// A repository kind (local filesystem, object store, network share) each
/// gets one implementation. The chain manager depends only on this trait,
/// never on a concrete backend, so new kinds can be added without touching
/// chain logic.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Creates an image file at `path`, atomically linked to `backing_path`
    /// if given. No caller may observe a partially linked image: either the
    /// whole create succeeds, or nothing is left behind.
    async fn create_image(&self, path: &str, backing_path: Option<&str>, size_bytes: u64) -> Result<(), DriverError>;

    /// Removes the image file (and any sidecar metadata) at `path`. Not an
    /// error if nothing exists there — callers are expected to have already
    /// checked existence via [`Repository::stat_image`] when that matters.
    async fn delete_image(&self, path: &str) -> Result<(), DriverError>;

    async fn stat_image(&self, path: &str) -> Result<ImageStat, DriverError>;

    /// Lists image paths under `prefix`, used by reconciliation.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, DriverError>;

    /// Verifies the backend currently accepts writes.
    async fn test_writable(&self) -> Result<(), DriverError>;

    /// Free space remaining, used for the soft/hard floor checks ahead of
    /// `create_backup`.
    async fn free_bytes(&self) -> Result<u64, DriverError>;
}
