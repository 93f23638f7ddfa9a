// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker health snapshot, exposed for operator-facing observability.

use serde::{Deserialize, Serialize};

/// Health information for the durable log sink's bounded channel.
///
/// Surfaces the drop-oldest counter so an operator can tell when the log
/// writers are falling behind, without the tracker ever surfacing a backlog
/// as a business-path error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerHealth {
    pub jobs_tracked: usize,
    pub queue_depth: usize,
    pub dropped_total: u64,
    pub last_writer_error: Option<String>,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
