// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by a [`crate::capability::Repository`] driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository path is not absolute: {0}")]
    PathNotAbsolute(String),
    #[error("repository refused writes: {0}")]
    NotWritable(String),
    #[error("backing image not found: {0}")]
    BackingNotFound(String),
}

/// Errors surfaced by [`crate::chain::ChainManager`].
///
/// `Conflict`/`InvalidInput` are checked here because `create_backup` is
/// the one place both can first be detected.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("another backup job is already pending or running for this (vm, disk)")]
    Conflict,
    #[error("incremental backup requested with an empty chain")]
    NoParent,
    #[error("chain has reached the maximum configured depth")]
    ChainFull,
    #[error("chain is inconsistent and requires operator repair: {0}")]
    ChainInconsistent(String),
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),
    #[error("backup job not found")]
    NotFound,
    #[error("backup is not the tail of its chain and cannot be deleted")]
    NotTail,
    #[error(transparent)]
    Driver(#[from] DriverError),
}
