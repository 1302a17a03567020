// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clients, session balances, trainer profiles and body records.

use crate::error::Result;
use crate::middleware::require_trainer;
use crate::models::{
    Actor, BodyRecord, ClientInfo, ProfileFields, ProfileHistory, SessionLedgerEntry,
    TrainerProfile,
};
use crate::services::members::NewBodyRecord;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    let trainer_only = Router::new()
        .route("/api/clients", get(get_clients).post(add_client))
        .route("/api/clients/{uid}/sessions", put(update_client_sessions))
        .route("/api/trainer-profile", put(update_trainer_profile))
        .route_layer(middleware::from_fn(require_trainer));

    Router::new()
        .route("/api/users/{email}/sessions", get(get_session_history))
        .route(
            "/api/users/{email}/body-profiles",
            get(get_body_profiles).post(add_body_profile),
        )
        .route("/api/trainer-profiles/{email}", get(get_trainer_profile))
        .route(
            "/api/trainer-profiles/{email}/history",
            get(get_profile_history),
        )
        .merge(trainer_only)
}

// ─── Clients ─────────────────────────────────────────────────

async fn get_clients(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ClientInfo>>> {
    Ok(Json(state.members.get_clients_by_trainer(&actor).await?))
}

#[derive(Debug, Deserialize, Validate)]
struct AddClientRequest {
    #[validate(email)]
    email: String,
}

async fn add_client(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<AddClientRequest>,
) -> Result<Json<ClientInfo>> {
    request.validate()?;
    Ok(Json(
        state
            .members
            .add_client_by_email(&request.email, &actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSessionsRequest {
    remaining_sessions: i64,
    expiration_date: Option<String>,
}

async fn update_client_sessions(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<UpdateSessionsRequest>,
) -> Result<Json<ClientInfo>> {
    Ok(Json(
        state
            .ledger
            .update_client_sessions(
                &uid,
                request.remaining_sessions,
                request.expiration_date,
                &actor,
            )
            .await?,
    ))
}

async fn get_session_history(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(email): Path<String>,
) -> Result<Json<Vec<SessionLedgerEntry>>> {
    Ok(Json(
        state.ledger.get_session_history(&email, &actor).await?,
    ))
}

// ─── Trainer profiles ────────────────────────────────────────

async fn get_trainer_profile(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<TrainerProfile>> {
    Ok(Json(state.members.get_trainer_profile(&email).await?))
}

async fn get_profile_history(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<Vec<ProfileHistory>>> {
    Ok(Json(state.members.get_profile_history(&email).await?))
}

async fn update_trainer_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(fields): Json<ProfileFields>,
) -> Result<Json<TrainerProfile>> {
    Ok(Json(
        state.members.update_trainer_profile(&actor, fields).await?,
    ))
}

// ─── Body records ────────────────────────────────────────────

async fn get_body_profiles(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(email): Path<String>,
) -> Result<Json<Vec<BodyRecord>>> {
    Ok(Json(state.members.get_body_profiles(&email, &actor).await?))
}

async fn add_body_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(email): Path<String>,
    Json(record): Json<NewBodyRecord>,
) -> Result<(StatusCode, Json<BodyRecord>)> {
    let record = state
        .members
        .add_body_profile(&email, record, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
