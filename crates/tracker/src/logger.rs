// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logger returned by `Tracker::logger`: fans every emitted event out to
//! `tracing` (stderr/whatever subscriber is installed) and to the durable
//! log-events sink, automatically attaching `(job_id, step_id)`.

use std::collections::HashMap;

use sendense_core::LogLevel;

use crate::context::ExecutionContext;
use crate::log_sink::{LogEntry, LogSink};

/// Handle bound to one [`ExecutionContext`]. Cloning is cheap; the sink
/// handle inside is an `Arc`-backed channel sender.
#[derive(Clone)]
pub struct Logger {
    ctx: ExecutionContext,
    sink: LogSink,
}

impl Logger {
    pub(crate) fn new(ctx: ExecutionContext, sink: LogSink) -> Self {
        Self { ctx, sink }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message.into(), HashMap::new());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into(), HashMap::new());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into(), HashMap::new());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into(), HashMap::new());
    }

    /// Emits with extra structured attributes attached (e.g. `backup_id`,
    /// `bytes_transferred`).
    pub fn with_attrs(&self, level: LogLevel, message: impl Into<String>, attrs: HashMap<String, String>) {
        self.emit(level, message.into(), attrs);
    }

    fn emit(&self, level: LogLevel, message: String, attrs: HashMap<String, String>) {
        match level {
            LogLevel::Debug => tracing::debug!(job_id = %self.ctx.job_id, step_id = ?self.ctx.step_id, "{message}"),
            LogLevel::Info => tracing::info!(job_id = %self.ctx.job_id, step_id = ?self.ctx.step_id, "{message}"),
            LogLevel::Warn => tracing::warn!(job_id = %self.ctx.job_id, step_id = ?self.ctx.step_id, "{message}"),
            LogLevel::Error => tracing::error!(job_id = %self.ctx.job_id, step_id = ?self.ctx.step_id, "{message}"),
        }
        self.sink.submit(LogEntry {
            job_id: Some(self.ctx.job_id),
            step_id: self.ctx.step_id,
            level,
            message,
            attrs,
        });
    }
}
