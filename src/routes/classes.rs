// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Group classes and their rosters.

use crate::error::Result;
use crate::middleware::require_trainer;
use crate::models::{Actor, GymClass, ScheduledEvent};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    let trainer_only = Router::new()
        .route("/api/classes", post(create_class))
        .route(
            "/api/classes/{id}/trainees/{email}",
            put(add_trainee).delete(remove_trainee),
        )
        .route_layer(middleware::from_fn(require_trainer));

    Router::new()
        .route("/api/classes/{id}/schedules", get(get_class_schedules))
        .route("/api/users/{email}/classes", get(get_trainer_classes))
        .merge(trainer_only)
}

#[derive(Debug, Deserialize, Validate)]
struct CreateClassRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
}

async fn create_class(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<GymClass>)> {
    request.validate()?;
    let class = state.schedules.create_class(&request.name, &actor).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

async fn get_class_schedules(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ScheduledEvent>>> {
    Ok(Json(
        state.schedules.get_schedules_by_class(&id, &actor).await?,
    ))
}

async fn get_trainer_classes(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(email): Path<String>,
) -> Result<Json<Vec<GymClass>>> {
    Ok(Json(
        state.schedules.get_classes_by_trainer(&email, &actor).await?,
    ))
}

async fn add_trainee(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((id, email)): Path<(String, String)>,
) -> Result<Json<GymClass>> {
    Ok(Json(
        state
            .schedules
            .add_trainee_to_class(&id, &email, &actor)
            .await?,
    ))
}

async fn remove_trainee(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((id, email)): Path<(String, String)>,
) -> Result<Json<GymClass>> {
    Ok(Json(
        state
            .schedules
            .remove_trainee_from_class(&id, &email, &actor)
            .await?,
    ))
}
