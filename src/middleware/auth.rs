// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication middleware and route guards.

use crate::error::AppError;
use crate::models::{Account, Actor};
use crate::services::{AccessFlags, VerifiedIdentity};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires a valid Firebase ID token.
///
/// Inserts the [`VerifiedIdentity`] and the resolved [`Actor`] as request
/// extensions. Users without an account document act as a default member.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state
        .verifier
        .verify(request.headers().get(header::AUTHORIZATION))
        .await?;

    let account = match state.store.get_account(&identity.uid).await? {
        Some(account) => account,
        None => Account::default_member(&identity.uid, &identity.email),
    };
    if !account.is_active() {
        return Err(AppError::Forbidden(format!(
            "account {} is deleted",
            account.uid
        )));
    }

    let actor = Actor::from(&account);
    request.extensions_mut().insert::<VerifiedIdentity>(identity);
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}

fn flags_of(request: &Request) -> AccessFlags {
    AccessFlags::for_actor(request.extensions().get::<Actor>())
}

/// Guard for manager-tier routes. Layer inside [`require_auth`].
pub async fn require_manager(request: Request, next: Next) -> Result<Response, AppError> {
    let flags = flags_of(&request);
    if !flags.is_authenticated {
        return Err(AppError::Unauthorized);
    }
    if !(flags.is_manager || flags.is_site_admin) {
        return Err(AppError::Forbidden("manager route".to_string()));
    }
    Ok(next.run(request).await)
}

/// Guard for site-admin routes. Layer inside [`require_auth`].
pub async fn require_site_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let flags = flags_of(&request);
    if !flags.is_authenticated {
        return Err(AppError::Unauthorized);
    }
    if !flags.is_site_admin {
        return Err(AppError::Forbidden("site admin route".to_string()));
    }
    Ok(next.run(request).await)
}

/// Guard for trainer-tier routes. Layer inside [`require_auth`].
pub async fn require_trainer(request: Request, next: Next) -> Result<Response, AppError> {
    let flags = flags_of(&request);
    if !flags.is_authenticated {
        return Err(AppError::Unauthorized);
    }
    if !(flags.is_trainer || flags.is_site_admin) {
        return Err(AppError::Forbidden("trainer route".to_string()));
    }
    Ok(next.run(request).await)
}
