// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution context carried through a call chain so collaborators can
//! attach `(job_id, step_id)` to logs without threading them through every
//! function signature individually.

use sendense_core::{JobId, StepId};

/// Carries the current job and (if inside a step) step identity.
///
/// Cheap to clone (`Copy`): passed by value into `run_step`'s business
/// closure and stored wherever a collaborator needs to attach logs to the
/// right job/step later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub job_id: JobId,
    pub step_id: Option<StepId>,
}

impl ExecutionContext {
    pub fn root(job_id: JobId) -> Self {
        Self { job_id, step_id: None }
    }

    /// Returns a context scoped to `step_id`, same job.
    pub fn with_step(&self, step_id: StepId) -> Self {
        Self {
            job_id: self.job_id,
            step_id: Some(step_id),
        }
    }
}
