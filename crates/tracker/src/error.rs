// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced to tracker callers. Durability failures inside the
/// store are never represented here — they are reported to a fallback
/// logger and counted (`sendense_core::TrackerHealth`), never surfaced on
/// the business path.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("job or step not found")]
    NotFound,
    #[error("job or step is already in a terminal state")]
    AlreadyTerminal,
    #[error("step panicked: {0}")]
    StepPanicked(String),
}
