// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schedule routes, including session completion.

use crate::error::Result;
use crate::models::{Actor, ExerciseRecord, ScheduledEvent};
use crate::services::schedule::{EventUpdate, NewEvent};
use crate::services::CompletionReport;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/{email}/schedules", get(get_schedules))
        .route("/api/schedules", post(add_schedule))
        .route("/api/schedules/{id}", put(update_schedule))
        .route("/api/schedules/{id}/complete", post(complete_session))
        .route("/api/schedules/{id}/workout-logs", post(append_workout_log))
}

async fn get_schedules(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(email): Path<String>,
) -> Result<Json<Vec<ScheduledEvent>>> {
    Ok(Json(state.schedules.get_schedules(&email, &actor).await?))
}

async fn add_schedule(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(new_event): Json<NewEvent>,
) -> Result<(StatusCode, Json<ScheduledEvent>)> {
    new_event.validate()?;
    let event = state.schedules.add_schedule(new_event, &actor).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(updates): Json<EventUpdate>,
) -> Result<Json<ScheduledEvent>> {
    Ok(Json(
        state.schedules.update_schedule(&id, updates, &actor).await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CompleteSessionRequest {
    #[validate(url)]
    signature_url: Option<String>,
}

async fn complete_session(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<CompleteSessionRequest>,
) -> Result<Json<CompletionReport>> {
    request.validate()?;
    Ok(Json(
        state
            .ledger
            .complete_session(&id, request.signature_url, &actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct WorkoutLogRequest {
    records: Vec<ExerciseRecord>,
}

#[derive(Serialize)]
struct WorkoutLogResponse {
    written: usize,
}

async fn append_workout_log(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<WorkoutLogRequest>,
) -> Result<Json<WorkoutLogResponse>> {
    let written = state
        .schedules
        .append_class_workout_log(&id, request.records, &actor)
        .await?;
    Ok(Json(WorkoutLogResponse { written }))
}
