// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job/step tracker domain types (status, log level).

/// Status of a tracker job or step.
///
/// The same set of variants applies to both jobs and steps: a job starts
/// `running` and moves to exactly one terminal state; a step opened by
/// `run_step` likewise always closes in `succeeded` or `failed`, never stays
/// `running`, even when the business closure aborts abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TrackerStatus {
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TrackerStatus {
    /// Terminal status is immutable once set (tracker invariant).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Severity of a tracker log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
