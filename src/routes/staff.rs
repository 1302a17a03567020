// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trainer, manager and gym administration.
//!
//! Listing and trainer edits are open to managers. Manager promotion,
//! demotion and gym creation are site-admin only.

use crate::error::Result;
use crate::middleware::{require_manager, require_site_admin};
use crate::models::{Account, Actor, Gym, ManagerType, Role};
use crate::services::staff::{GymCreation, GymUpdate, ManagerChange, ManagerUpdate};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    let manager_routes = Router::new()
        .route("/api/trainers", get(get_trainers))
        .route("/api/trainers/{uid}", put(update_trainer_info).delete(delete_trainer))
        .route("/api/trainers/{uid}/role", put(update_trainer_role))
        .route("/api/trainers/{uid}/deleted", put(set_trainer_deleted))
        .route("/api/managers", get(get_managers))
        .route("/api/gyms/{id}", put(update_gym))
        .route_layer(middleware::from_fn(require_manager));

    let admin_routes = Router::new()
        .route("/api/managers/{uid}/assign", post(assign_manager))
        .route("/api/managers/{uid}", put(update_manager).delete(delete_manager))
        .route("/api/managers/{uid}/deleted", put(set_manager_deleted))
        .route("/api/managers/{uid}/demote", post(demote_manager))
        .route("/api/gyms/{id}/manager-candidates", get(get_manager_candidates))
        .route_layer(middleware::from_fn(require_site_admin));

    // Anyone signed in may list gyms; only site admins create them.
    let gyms = get(list_gyms)
        .merge(post(create_gym).route_layer(middleware::from_fn(require_site_admin)));

    Router::new()
        .route("/api/gyms", gyms)
        .merge(manager_routes)
        .merge(admin_routes)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaffQuery {
    gym_id: Option<String>,
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct DeletedFlagRequest {
    deleted: bool,
}

// ─── Trainers ────────────────────────────────────────────────

async fn get_trainers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Vec<Account>>> {
    Ok(Json(
        state
            .staff
            .get_trainers(query.gym_id.as_deref(), query.include_deleted, &actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainerInfoRequest {
    nickname: Option<String>,
    gym_id: Option<String>,
}

async fn update_trainer_info(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<TrainerInfoRequest>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .update_trainer_info_with_audit(&uid, request.nickname, request.gym_id, &actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct TrainerRoleRequest {
    role: Role,
    #[validate(range(max = 100))]
    lvl: u32,
    gym_id: Option<String>,
}

async fn update_trainer_role(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<TrainerRoleRequest>,
) -> Result<Json<Account>> {
    request.validate()?;
    Ok(Json(
        state
            .staff
            .update_trainer_role_with_audit(&uid, request.role, request.lvl, request.gym_id, &actor)
            .await?,
    ))
}

async fn set_trainer_deleted(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<DeletedFlagRequest>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .set_trainer_deleted_flag_with_audit(&uid, request.deleted, &actor)
            .await?,
    ))
}

async fn delete_trainer(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .delete_trainer_completely_with_audit(&uid, &actor)
            .await?,
    ))
}

// ─── Managers ────────────────────────────────────────────────

async fn get_managers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Vec<Account>>> {
    Ok(Json(
        state
            .staff
            .get_managers(query.gym_id.as_deref(), query.include_deleted, &actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AssignManagerRequest {
    #[validate(length(min = 1))]
    gym_id: String,
    manager_type: ManagerType,
}

async fn assign_manager(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<AssignManagerRequest>,
) -> Result<Json<ManagerChange>> {
    request.validate()?;
    Ok(Json(
        state
            .staff
            .assign_manager_from_trainer_with_audit(
                &uid,
                &request.gym_id,
                request.manager_type,
                &actor,
            )
            .await?,
    ))
}

async fn update_manager(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(updates): Json<ManagerUpdate>,
) -> Result<Json<ManagerChange>> {
    Ok(Json(
        state
            .staff
            .update_manager_info_with_audit(&uid, updates, &actor)
            .await?,
    ))
}

async fn set_manager_deleted(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
    Json(request): Json<DeletedFlagRequest>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .set_manager_deleted_flag_with_audit(&uid, request.deleted, &actor)
            .await?,
    ))
}

async fn delete_manager(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .delete_manager_completely_with_audit(&uid, &actor)
            .await?,
    ))
}

async fn demote_manager(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(uid): Path<String>,
) -> Result<Json<Account>> {
    Ok(Json(
        state
            .staff
            .demote_manager_to_trainer_with_audit(&uid, &actor)
            .await?,
    ))
}

// ─── Gyms ────────────────────────────────────────────────────

async fn list_gyms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Gym>>> {
    Ok(Json(state.staff.list_gyms().await?))
}

async fn get_manager_candidates(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Account>>> {
    Ok(Json(
        state.staff.get_manager_candidates(&id, &actor).await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateGymRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    location: Option<String>,
    #[validate(email)]
    manager_email: Option<String>,
}

async fn create_gym(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateGymRequest>,
) -> Result<(StatusCode, Json<GymCreation>)> {
    request.validate()?;
    let creation = state
        .staff
        .create_gym(&request.name, request.location, request.manager_email, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(creation)))
}

async fn update_gym(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(updates): Json<GymUpdate>,
) -> Result<Json<Gym>> {
    Ok(Json(state.staff.update_gym(&id, updates, &actor).await?))
}
