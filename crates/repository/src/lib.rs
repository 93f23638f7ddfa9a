// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sendense-repository: the repository & chain manager.
//!
//! Owns image-file allocation, parent/child chain linkage, and the
//! storage-backend capability trait local and future repository kinds
//! implement.

pub mod capability;
pub mod chain;
pub mod error;
pub mod local_fs;
pub mod paths;

pub use capability::{ImageStat, Repository};
pub use chain::{ChainManager, ChainManagerApi, CreateBackupRequest, RepositoryHandle};
pub use error::{DriverError, RepositoryError};
pub use local_fs::LocalFsRepository;
pub use paths::image_path;

#[cfg(any(test, feature = "test-support"))]
pub use chain::fake::FakeChainManager;

/// The kind of storage backend a configured repository targets.
/// Only `Local` has a driver in this workspace; the other kinds
/// are represented so configuration can name them and get a clear
/// `RepositoryUnavailable` rather than silently falling back to `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    Local,
    Object,
    NetworkShare,
}
