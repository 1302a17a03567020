// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Members and their trainers: client lists, profiles, body records.

use crate::db::{atomically, new_document_id, AccountFilter, AtomicSection, GymStore};
use crate::error::AppError;
use crate::models::{
    Account, Actor, BodyRecord, ClientInfo, ProfileFields, ProfileHistory, TrainerProfile,
};
use crate::services::access::{is_site_admin, is_trainer_level, require_trainer, AccessControl};
use crate::time_utils::now_rfc3339;
use serde::Deserialize;
use std::sync::Arc;

/// Body measurement submitted by a client or their trainer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBodyRecord {
    pub date: String,
    pub weight: f64,
    pub body_fat: Option<f64>,
    pub muscle_mass: Option<f64>,
}

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn GymStore>,
    access: AccessControl,
}

async fn assign_trainer_in_section(
    section: &mut AtomicSection<'_>,
    uid: &str,
    trainer_email: &str,
) -> Result<Account, AppError> {
    let mut account = section
        .get_account(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;
    if is_trainer_level(&account) || is_site_admin(&account) {
        return Err(AppError::Validation(format!(
            "{} is staff and cannot be a client",
            account.email
        )));
    }
    account.trainer_email = Some(trainer_email.to_string());
    account.updated_at = Some(now_rfc3339());
    section.put_account(&account)?;
    Ok(account)
}

impl MemberService {
    pub fn new(store: Arc<dyn GymStore>, access: AccessControl) -> Self {
        Self { store, access }
    }

    /// Persist the default profile for a signed-in user without one.
    ///
    /// Returns the stored account and whether it was created now.
    pub async fn register_profile(&self, uid: &str, email: &str) -> Result<(Account, bool), AppError> {
        if let Some(existing) = self.store.get_account(uid).await? {
            return Ok((existing, false));
        }
        let mut account = Account::default_member(uid, email);
        account.updated_at = Some(now_rfc3339());
        self.store.upsert_account(&account).await?;
        tracing::info!(uid, email, "Profile registered");
        Ok((account, true))
    }

    // ─── Clients ─────────────────────────────────────────────────

    pub async fn get_clients_by_trainer(&self, actor: &Actor) -> Result<Vec<ClientInfo>, AppError> {
        require_trainer(actor)?;
        let mut clients: Vec<ClientInfo> = self
            .store
            .find_accounts(AccountFilter::AssignedTo {
                trainer_email: actor.email.clone(),
            })
            .await?
            .into_iter()
            .filter(Account::is_active)
            .map(ClientInfo::from)
            .collect();
        clients.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(clients)
    }

    /// Assign the account registered under `email` to the acting trainer.
    pub async fn add_client_by_email(&self, email: &str, actor: &Actor) -> Result<ClientInfo, AppError> {
        require_trainer(actor)?;
        let target = self
            .store
            .find_account_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {email}")))?;

        let (account, _) = atomically!(self.store.as_ref(), |section| {
            assign_trainer_in_section(&mut section, &target.uid, &actor.email).await
        })?;

        tracing::info!(client = email, trainer = %actor.email, "Client assigned");
        Ok(ClientInfo::from(account))
    }

    // ─── Trainer profiles ────────────────────────────────────────

    pub async fn get_trainer_profile(&self, email: &str) -> Result<TrainerProfile, AppError> {
        self.store
            .get_trainer_profile(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("trainer profile {email}")))
    }

    /// Merge `fields` into the actor's own profile and record the edit.
    pub async fn update_trainer_profile(
        &self,
        actor: &Actor,
        fields: ProfileFields,
    ) -> Result<TrainerProfile, AppError> {
        require_trainer(actor)?;
        let mut profile = match self.store.get_trainer_profile(&actor.email).await? {
            Some(profile) => profile,
            None => TrainerProfile {
                uid: Some(actor.uid.clone()),
                email: actor.email.clone(),
                nickname: actor.email.split('@').next().unwrap_or_default().to_string(),
                bio: None,
                specialties: Vec::new(),
                photo_url: None,
                updated_at: String::new(),
            },
        };

        let now = now_rfc3339();
        let before = fields.snapshot_of(&profile);
        fields.apply_to(&mut profile);
        profile.updated_at = now.clone();

        self.store.upsert_trainer_profile(&profile).await?;
        self.store
            .append_profile_history(&ProfileHistory {
                id: new_document_id(),
                trainer_email: actor.email.clone(),
                before,
                after: fields,
                updated_at: now,
            })
            .await?;

        tracing::info!(trainer = %actor.email, "Trainer profile updated");
        Ok(profile)
    }

    /// Profile edits, newest first.
    pub async fn get_profile_history(&self, email: &str) -> Result<Vec<ProfileHistory>, AppError> {
        let mut history = self.store.profile_history(email).await?;
        history.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(history)
    }

    // ─── Body records ────────────────────────────────────────────

    /// Measurements of `target_email`, oldest date first.
    pub async fn get_body_profiles(
        &self,
        target_email: &str,
        actor: &Actor,
    ) -> Result<Vec<BodyRecord>, AppError> {
        self.access.can_access_user_data(target_email, actor).await?;
        let mut records = self.store.body_records(target_email).await?;
        records.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(records)
    }

    pub async fn add_body_profile(
        &self,
        target_email: &str,
        record: NewBodyRecord,
        actor: &Actor,
    ) -> Result<BodyRecord, AppError> {
        self.access.can_access_user_data(target_email, actor).await?;
        if !(record.weight.is_finite() && record.weight > 0.0) {
            return Err(AppError::Validation("weight must be positive".to_string()));
        }
        let record = BodyRecord {
            id: new_document_id(),
            user_email: target_email.to_string(),
            date: record.date,
            weight: record.weight,
            body_fat: record.body_fat,
            muscle_mass: record.muscle_mass,
            created_at: now_rfc3339(),
        };
        self.store.add_body_record(&record).await?;
        tracing::info!(user = target_email, actor = %actor.email, "Body record added");
        Ok(record)
    }
}
