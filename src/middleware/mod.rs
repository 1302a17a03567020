// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, route guards, security headers).

pub mod auth;
pub mod security;

pub use auth::{require_auth, require_manager, require_site_admin, require_trainer};
