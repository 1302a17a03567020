// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session-credit ledger: session completion and manual balance changes.

use crate::db::{atomically, in_query_chunks, new_document_id, AtomicSection, GymStore};
use crate::error::AppError;
use crate::models::{
    Account, Actor, ClientInfo, EventStatus, EventType, LedgerAction, ScheduledEvent,
    SessionLedgerEntry, TargetType,
};
use crate::services::access::{is_site_admin, AccessControl};
use crate::time_utils::now_rfc3339;
use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Credit consumed from one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    pub uid: String,
    pub email: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub remaining_sessions: i64,
}

/// Outcome of a successful [`SessionLedger::complete_session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub event_id: String,
    pub completed_at: String,
    pub deducted: Vec<Deduction>,
    /// Emails of affected accounts that had no credits left
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn GymStore>,
    access: AccessControl,
}

fn authorize_completion(actor: &Actor, event: &ScheduledEvent) -> Result<(), AppError> {
    if is_site_admin(actor) || event.is_trainer(&actor.email) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} is not the trainer of event {}",
            actor.email, event.id
        )))
    }
}

fn dedup_preserving_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

impl SessionLedger {
    pub fn new(store: Arc<dyn GymStore>, access: AccessControl) -> Self {
        Self { store, access }
    }

    /// Emails whose credits a completed event consumes.
    async fn affected_emails(&self, event: &ScheduledEvent) -> Result<Vec<String>, AppError> {
        if event.event_type != EventType::Pt {
            return Ok(Vec::new());
        }
        let emails = match event.target_type {
            TargetType::Individual => event.client_email.iter().cloned().collect(),
            TargetType::Class => match &event.class_id {
                Some(class_id) => match self.store.get_class(class_id).await? {
                    Some(class) => class.trainee_emails,
                    None => {
                        tracing::warn!(event_id = %event.id, class_id, "Class of event not found");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            },
        };
        Ok(dedup_preserving_order(emails))
    }

    /// Map emails to account uids with concurrent chunked lookups.
    async fn resolve_uids(&self, emails: &[String]) -> Result<Vec<String>, AppError> {
        let lookups = in_query_chunks(emails).map(|chunk| self.store.find_accounts_by_emails(chunk));
        let accounts: Vec<Account> = try_join_all(lookups).await?.into_iter().flatten().collect();
        Ok(dedup_preserving_order(accounts.into_iter().map(|a| a.uid)))
    }

    /// Mark an event completed and deduct one credit from every affected
    /// account that has one, as a single atomic unit.
    pub async fn complete_session(
        &self,
        event_id: &str,
        signature_url: Option<String>,
        actor: &Actor,
    ) -> Result<CompletionReport, AppError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;
        authorize_completion(actor, &event)?;

        let emails = self.affected_emails(&event).await?;
        let uids = self.resolve_uids(&emails).await?;

        let (report, writes) = atomically!(self.store.as_ref(), |section| {
            complete_in_section(&mut section, event_id, signature_url.clone(), &uids, actor).await
        })?;

        tracing::info!(
            event_id,
            actor = %actor.email,
            deducted = report.deducted.len(),
            skipped = report.skipped.len(),
            writes,
            "Session completed"
        );
        Ok(report)
    }

    /// Set an account's balance and record the signed change.
    pub async fn update_client_sessions(
        &self,
        uid: &str,
        remaining: i64,
        expiration_date: Option<String>,
        actor: &Actor,
    ) -> Result<ClientInfo, AppError> {
        if remaining < 0 {
            return Err(AppError::Validation(
                "remainingSessions must not be negative".to_string(),
            ));
        }

        let ((account, delta), _) = atomically!(self.store.as_ref(), |section| {
            adjust_in_section(&mut section, uid, remaining, expiration_date.clone(), actor).await
        })?;

        tracing::info!(uid, actor = %actor.email, delta, remaining, "Client sessions updated");
        Ok(ClientInfo::from(account))
    }

    /// Ledger entries of `target_email`, newest first.
    pub async fn get_session_history(
        &self,
        target_email: &str,
        actor: &Actor,
    ) -> Result<Vec<SessionLedgerEntry>, AppError> {
        self.access.can_access_user_data(target_email, actor).await?;
        let mut entries = self.store.ledger_for_client(target_email).await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

/// Reads then writes of [`SessionLedger::update_client_sessions`].
async fn adjust_in_section(
    section: &mut AtomicSection<'_>,
    uid: &str,
    remaining: i64,
    expiration_date: Option<String>,
    actor: &Actor,
) -> Result<(Account, i64), AppError> {
    let mut account = section
        .get_account(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;

    if !is_site_admin(actor) && account.trainer_email.as_deref() != Some(actor.email.as_str()) {
        return Err(AppError::Forbidden(format!(
            "{} is not the assigned trainer of {}",
            actor.email, account.email
        )));
    }

    let now = now_rfc3339();
    let delta = remaining - account.remaining_sessions;
    account.remaining_sessions = remaining;
    if expiration_date.is_some() {
        account.expiration_date = expiration_date;
    }
    account.updated_at = Some(now.clone());
    section.put_account(&account)?;

    if delta != 0 {
        section.append_ledger_entry(&SessionLedgerEntry {
            id: new_document_id(),
            client_email: account.email.clone(),
            trainer_email: Some(actor.email.clone()),
            action: LedgerAction::Adjust,
            amount_changed: delta,
            remaining_sessions: remaining,
            reason: format!("Manual adjustment by {}", actor.email),
            created_at: now,
        })?;
    }
    Ok((account, delta))
}

/// Reads then writes of [`SessionLedger::complete_session`].
async fn complete_in_section(
    section: &mut AtomicSection<'_>,
    event_id: &str,
    signature_url: Option<String>,
    uids: &[String],
    actor: &Actor,
) -> Result<CompletionReport, AppError> {
    // Authoritative idempotence check: the snapshot seen by this section.
    let mut event = section
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;
    if event.is_completed() {
        return Err(AppError::AlreadyCompleted(event_id.to_string()));
    }
    authorize_completion(actor, &event)?;

    let mut accounts = Vec::with_capacity(uids.len());
    for uid in uids {
        match section.get_account(uid).await? {
            Some(account) => accounts.push(account),
            None => tracing::warn!(uid, event_id, "Affected account vanished before completion"),
        }
    }

    let now = now_rfc3339();
    event.status = EventStatus::Completed;
    event.signature_url = signature_url;
    event.completed_at = Some(now.clone());
    section.put_event(&event)?;

    let mut report = CompletionReport {
        event_id: event_id.to_string(),
        completed_at: now.clone(),
        deducted: Vec::new(),
        skipped: Vec::new(),
    };

    for mut account in accounts {
        if account.remaining_sessions <= 0 {
            report.skipped.push(account.email);
            continue;
        }
        account.remaining_sessions -= 1;
        account.updated_at = Some(now.clone());
        section.put_account(&account)?;
        section.append_ledger_entry(&SessionLedgerEntry {
            id: new_document_id(),
            client_email: account.email.clone(),
            trainer_email: event.trainer_email.clone(),
            action: LedgerAction::Deduct,
            amount_changed: -1,
            remaining_sessions: account.remaining_sessions,
            reason: format!("PT Session Completed: {}", event.title),
            created_at: now.clone(),
        })?;
        report.deducted.push(Deduction {
            uid: account.uid,
            email: account.email,
            remaining_sessions: account.remaining_sessions,
        });
    }

    Ok(report)
}
