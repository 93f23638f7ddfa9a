// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-telemetry and health-check HTTP surface. The push handler and the
//! pull-mode [`sendense_agent_client::HttpAgentClient`] share the same
//! `ProgressRecord` wire type, so the two flavors of the progress pipeline
//! differ only in who calls `ProgressPipeline::update`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sendense_core::{BackupId, Clock, ProgressRecord};
use sendense_orchestrator::{OrchestratorError, ProgressPipeline};
use sendense_tracker::{Tracker, TrackerStore};
use serde::Serialize;

pub struct AppState<S, C> {
    pub pipeline: Arc<ProgressPipeline<S, C>>,
    pub tracker: Tracker<S, C>,
}

pub fn router<S, C>(state: Arc<AppState<S, C>>) -> Router
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/telemetry/backup/:backup_id", post(push_telemetry::<S, C>))
        .route("/healthz", get(health::<S, C>))
        .with_state(state)
}

async fn push_telemetry<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(backup_id): Path<String>,
    Json(record): Json<ProgressRecord>,
) -> Response
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    let backup_id: BackupId = backup_id.as_str().into();
    match state.pipeline.update(backup_id, record).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(OrchestratorError::NotFound) => (StatusCode::NOT_FOUND, "unknown backup_id").into_response(),
        Err(error) => {
            tracing::warn!(%error, %backup_id, "rejecting telemetry push");
            (StatusCode::BAD_REQUEST, error.to_string()).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    tracker: sendense_core::TrackerHealth,
}

async fn health<S, C>(State(state): State<Arc<AppState<S, C>>>) -> Json<HealthBody>
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    Json(HealthBody {
        status: "ok",
        tracker: state.tracker.health(),
    })
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
