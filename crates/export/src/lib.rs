// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sendense-export: the block-export service. Publishes and
//! retracts file-backed exports for the capture agent to stream into.

pub mod capability;
pub mod error;
pub mod nbdkit;
pub mod service;

pub use capability::{ExportDaemon, ExportFragment};
pub use error::{DaemonError, ExportError};
pub use nbdkit::NbdKitDaemon;
pub use service::{ExportInfo, ExportService, ExportServiceApi, DEFAULT_EXPORT_PORT};

#[cfg(any(test, feature = "test-support"))]
pub use capability::fake::FakeExportDaemon;
#[cfg(any(test, feature = "test-support"))]
pub use service::fake::FakeExportService;
