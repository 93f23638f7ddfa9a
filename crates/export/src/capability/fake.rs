// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`ExportDaemon`] for tests: no disk IO, no signals.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ExportDaemon, ExportFragment};
use crate::error::DaemonError;

#[derive(Default)]
struct Inner {
    fragments: HashMap<String, ExportFragment>,
    reload_count: u32,
    fail_next_reloads: u32,
}

/// Test double for a real export daemon. Call
/// [`FakeExportDaemon::fail_next_reloads`] to make the next N `reload()`
/// calls return an error, to exercise the retry-once-then-fail path.
#[derive(Default)]
pub struct FakeExportDaemon {
    inner: Mutex<Inner>,
}

impl FakeExportDaemon {
    pub fn fail_next_reloads(&self, count: u32) {
        self.inner.lock().fail_next_reloads = count;
    }

    pub fn reload_count(&self) -> u32 {
        self.inner.lock().reload_count
    }

    pub fn fragments(&self) -> Vec<ExportFragment> {
        self.inner.lock().fragments.values().cloned().collect()
    }
}

#[async_trait]
impl ExportDaemon for FakeExportDaemon {
    async fn write_fragment(&self, fragment: &ExportFragment) -> Result<(), DaemonError> {
        self.inner.lock().fragments.insert(fragment.export_name.clone(), fragment.clone());
        Ok(())
    }

    async fn remove_fragment(&self, export_name: &str) -> Result<(), DaemonError> {
        self.inner.lock().fragments.remove(export_name);
        Ok(())
    }

    async fn reload(&self) -> Result<(), DaemonError> {
        let mut inner = self.inner.lock();
        inner.reload_count += 1;
        if inner.fail_next_reloads > 0 {
            inner.fail_next_reloads -= 1;
            return Err(DaemonError::Signal("fake reload failure".into()));
        }
        Ok(())
    }
}
