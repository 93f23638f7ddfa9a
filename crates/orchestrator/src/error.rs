// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable error kinds surfaced by the backup orchestrator. Lower-layer
//! errors convert into this via an explicit `match`, never a blanket
//! re-wrap, so a caller can rely on the variant set being exactly this set.

use sendense_export::ExportError;
use sendense_repository::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
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
    #[error("export publication failed: {0}")]
    ExportFailed(String),
    #[error("capture agent unreachable: {0}")]
    AgentUnreachable(String),
    #[error("progress stream stalled")]
    StreamTimeout,
    #[error("capture agent reported failure: {0}")]
    AgentFailed(String),
    #[error("backup job not found")]
    NotFound,
}

impl From<RepositoryError> for OrchestratorError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::InvalidInput(msg) => Self::InvalidInput(msg),
            RepositoryError::Conflict => Self::Conflict,
            RepositoryError::NoParent => Self::NoParent,
            RepositoryError::ChainFull => Self::ChainFull,
            RepositoryError::ChainInconsistent(msg) => Self::ChainInconsistent(msg),
            RepositoryError::RepositoryUnavailable(msg) => Self::RepositoryUnavailable(msg),
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::NotTail => {
                Self::InvalidInput("backup is not the tail of its chain".to_string())
            }
            RepositoryError::Driver(driver_error) => Self::RepositoryUnavailable(driver_error.to_string()),
        }
    }
}

impl From<ExportError> for OrchestratorError {
    fn from(error: ExportError) -> Self {
        Self::ExportFailed(error.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
