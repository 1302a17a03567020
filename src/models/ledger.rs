// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only history records: session-credit ledger and admin audit log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerAction {
    /// One credit consumed by a completed session
    Deduct,
    /// Manual balance change by a trainer
    Adjust,
}

/// Session-credit balance change, stored in `ticketHistory/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionLedgerEntry {
    #[serde(default)]
    pub id: String,
    pub client_email: String,
    #[serde(default)]
    pub trainer_email: Option<String>,
    pub action: LedgerAction,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount_changed: i64,
    /// Balance after the change
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub remaining_sessions: i64,
    pub reason: String,
    pub created_at: String,
}

/// Privileged role/permission mutations recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UpdateTrainerRole,
    UpdateTrainerInfo,
    SetTrainerDeleted,
    DeleteTrainer,
    AssignManager,
    UpdateManager,
    SetManagerDeleted,
    DeleteManager,
    DemoteManager,
}

/// Audit record stored in `adminAuditLogs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    #[serde(default)]
    pub id: String,
    pub actor_email: String,
    pub action: AuditAction,
    #[serde(default)]
    pub target_uid: Option<String>,
    #[serde(default)]
    pub target_email: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: String,
}
