// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sendense-tracker: the hierarchical job/step execution tracker (C1).
//!
//! `Tracker` is generic over a durable [`store::TrackerStore`] and a
//! `sendense_core::Clock`; `run_step` is the sole API long-running
//! sub-operations should execute through, since it guarantees the step
//! closes exactly once even if the business closure panics.

pub mod context;
pub mod error;
pub mod log_sink;
pub mod logger;
pub mod store;
pub mod tracker;

pub use context::ExecutionContext;
pub use error::TrackerError;
pub use log_sink::{LogEntry, LogSink, DEFAULT_CHANNEL_CAPACITY};
pub use logger::Logger;
pub use store::{NewJob, NewStep, StepCounts, TrackerStore, WalBackedStore};
pub use tracker::{JobProgress, StepError, Tracker};
