// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The signed-in user's own profile and access flags.

use crate::error::Result;
use crate::models::{Account, Actor, Role};
use crate::services::{AccessFlags, VerifiedIdentity};
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me).put(register_profile))
}

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub uid: String,
    pub email: String,
    pub nickname: Option<String>,
    pub role: Role,
    pub lvl: u32,
    pub gym_id: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub remaining_sessions: i64,
    pub expiration_date: Option<String>,
    pub trainer_email: Option<String>,
    /// False until `PUT /api/me` stores the profile
    pub registered: bool,
    pub access: AccessFlags,
}

fn me_response(account: Account, registered: bool) -> MeResponse {
    MeResponse {
        access: AccessFlags::for_actor(Some(&Actor::from(&account))),
        uid: account.uid,
        email: account.email,
        nickname: account.nickname,
        role: account.role,
        lvl: account.lvl,
        gym_id: account.gym_id,
        remaining_sessions: account.remaining_sessions,
        expiration_date: account.expiration_date,
        trainer_email: account.trainer_email,
        registered,
    }
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MeResponse>> {
    let stored = state.store.get_account(&actor.uid).await?;
    let registered = stored.is_some();
    let account = stored.unwrap_or_else(|| Account::default_member(&actor.uid, &actor.email));
    Ok(Json(me_response(account, registered)))
}

/// Store the default profile for a first-time user. Idempotent.
async fn register_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<Json<MeResponse>> {
    let (account, _created) = state
        .members
        .register_profile(&identity.uid, &identity.email)
        .await?;
    Ok(Json(me_response(account, true)))
}
