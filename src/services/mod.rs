// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod audit;
pub mod firebase_auth;
pub mod ledger;
pub mod members;
pub mod schedule;
pub mod staff;

pub use access::{AccessControl, AccessFlags, AccessGrant};
pub use audit::AuditTrail;
pub use firebase_auth::{AuthError, FirebaseTokenVerifier, VerifiedIdentity};
pub use ledger::{CompletionReport, SessionLedger};
pub use members::MemberService;
pub use schedule::ScheduleService;
pub use staff::StaffService;
