// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staff administration: trainers, managers and gyms.
//!
//! Every account mutation is a read-modify-write inside an atomic section.
//! Manager promotions keep at most one active PRIMARY manager per gym by
//! demoting the other primaries in the same section.
//!
//! Known hazard: two promotions of different accounts to PRIMARY of the same
//! gym that both scan before either commits can each see the old primary
//! only, and commit two primaries. Firestore aborts only on conflicts with
//! documents actually read, and neither scan read the other's target.

use crate::db::{atomically, new_document_id, AccountFilter, AtomicSection, GymStore};
use crate::error::AppError;
use crate::models::{
    Account, Actor, AuditAction, Gym, ManagerType, PermissionLevel, Role,
};
use crate::services::access::{
    is_active_primary_manager, is_site_admin, is_trainer_level, require_gym_authority,
    require_manager, require_site_admin, require_staff_authority,
};
use crate::services::audit::{metadata, AuditTrail};
use crate::time_utils::now_rfc3339;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Changes applied by [`StaffService::update_manager_info`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerUpdate {
    pub manager_type: Option<ManagerType>,
    pub gym_id: Option<String>,
    pub nickname: Option<String>,
}

/// Result of a manager promotion or update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerChange {
    pub account: Account,
    /// Uids demoted from PRIMARY to VICE
    pub demoted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct GymCreation {
    pub gym: Gym,
    pub manager_promoted: bool,
}

/// Changes applied by [`StaffService::update_gym`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub manager_email: Option<String>,
}

#[derive(Clone)]
pub struct StaffService {
    store: Arc<dyn GymStore>,
    audit: AuditTrail,
}

/// Demote every other active PRIMARY in `gym_accounts` to VICE.
fn demote_other_primaries(
    section: &mut AtomicSection<'_>,
    gym_accounts: Vec<Account>,
    keep_uid: &str,
    now: &str,
) -> Result<Vec<String>, AppError> {
    let mut demoted = Vec::new();
    for mut other in gym_accounts {
        if other.uid == keep_uid || !is_active_primary_manager(&other) {
            continue;
        }
        other.manager_type = Some(ManagerType::Vice);
        other.updated_at = Some(now.to_string());
        section.put_account(&other)?;
        tracing::info!(uid = %other.uid, email = %other.email, "Demoted PRIMARY manager to VICE");
        demoted.push(other.uid);
    }
    Ok(demoted)
}

/// Load an account in a section, checking it can become or stay a manager.
async fn load_manager_candidate(
    section: &mut AtomicSection<'_>,
    uid: &str,
) -> Result<Account, AppError> {
    let account = section
        .get_account(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;
    if !is_trainer_level(&account) {
        return Err(AppError::NotTrainerLevel(account.email));
    }
    Ok(account)
}

async fn assign_in_section(
    section: &mut AtomicSection<'_>,
    uid: &str,
    gym_id: &str,
    manager_type: ManagerType,
) -> Result<ManagerChange, AppError> {
    let mut account = load_manager_candidate(section, uid).await?;
    if !account.is_active() {
        return Err(AppError::DeletedAccount(account.email));
    }

    let gym_accounts = match manager_type {
        ManagerType::Primary => section.accounts_in_gym(gym_id).await?,
        ManagerType::Vice => Vec::new(),
    };

    let now = now_rfc3339();
    let demoted = demote_other_primaries(section, gym_accounts, uid, &now)?;

    account.role = Role::Manager;
    account.lvl = PermissionLevel::Manager.lvl();
    account.gym_id = Some(gym_id.to_string());
    account.manager_type = Some(manager_type);
    account.deleted_flag = false;
    account.deleted_at = None;
    account.updated_at = Some(now);
    section.put_account(&account)?;

    Ok(ManagerChange { account, demoted })
}

async fn update_manager_in_section(
    section: &mut AtomicSection<'_>,
    uid: &str,
    updates: ManagerUpdate,
) -> Result<ManagerChange, AppError> {
    let mut account = load_manager_candidate(section, uid).await?;
    if account.role != Role::Manager {
        return Err(AppError::Validation(format!(
            "{} is not a manager",
            account.email
        )));
    }
    if !account.is_active() {
        return Err(AppError::DeletedAccount(account.email));
    }

    let gym_id = updates
        .gym_id
        .or_else(|| account.gym_id.clone())
        .filter(|g| !g.trim().is_empty())
        .ok_or_else(|| AppError::Validation("gymId is required for a manager".to_string()))?;
    let manager_type = updates
        .manager_type
        .or(account.manager_type)
        .unwrap_or(ManagerType::Vice);

    let gym_accounts = match manager_type {
        ManagerType::Primary => section.accounts_in_gym(&gym_id).await?,
        ManagerType::Vice => Vec::new(),
    };

    let now = now_rfc3339();
    let demoted = demote_other_primaries(section, gym_accounts, uid, &now)?;

    account.gym_id = Some(gym_id);
    account.manager_type = Some(manager_type);
    if let Some(nickname) = updates.nickname {
        account.nickname = Some(nickname);
    }
    account.updated_at = Some(now);
    section.put_account(&account)?;

    Ok(ManagerChange { account, demoted })
}

/// Make `account` a manager of `gym_id` without lowering a higher tier.
fn promote_to_gym_manager(account: &mut Account, gym_id: &str, now: &str) {
    if account.role != Role::SiteAdmin {
        account.role = Role::Manager;
    }
    account.lvl = account.lvl.max(PermissionLevel::Manager.lvl());
    account.gym_id = Some(gym_id.to_string());
    account.updated_at = Some(now.to_string());
}

async fn create_gym_in_section(
    section: &mut AtomicSection<'_>,
    gym: &Gym,
    manager_uid: Option<&str>,
) -> Result<bool, AppError> {
    let manager = match manager_uid {
        Some(uid) => section.get_account(uid).await?,
        None => None,
    };

    section.put_gym(gym)?;

    let Some(mut manager) = manager else {
        return Ok(false);
    };
    promote_to_gym_manager(&mut manager, &gym.id, &gym.created_at);
    section.put_account(&manager)?;
    Ok(true)
}

async fn update_gym_in_section(
    section: &mut AtomicSection<'_>,
    gym_id: &str,
    updates: GymUpdate,
    new_manager_uid: Option<&str>,
) -> Result<Gym, AppError> {
    let mut gym = section
        .get_gym(gym_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("gym {gym_id}")))?;
    let manager = match new_manager_uid {
        Some(uid) => section.get_account(uid).await?,
        None => None,
    };

    if let Some(name) = updates.name {
        gym.name = name;
    }
    if let Some(location) = updates.location {
        gym.location = Some(location);
    }
    if let Some(email) = updates.manager_email {
        gym.manager_email = Some(email);
    }
    section.put_gym(&gym)?;

    if let Some(mut manager) = manager {
        promote_to_gym_manager(&mut manager, &gym.id, &now_rfc3339());
        section.put_account(&manager)?;
    }
    Ok(gym)
}

impl StaffService {
    pub fn new(store: Arc<dyn GymStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    /// Read-modify-write one account in an atomic section.
    ///
    /// The actor's authority over the account is checked against the
    /// snapshot read in the section. `mutate` runs once per attempt.
    async fn mutate_account<F>(
        &self,
        uid: &str,
        actor: &Actor,
        mutate: F,
    ) -> Result<(Account, Account), AppError>
    where
        F: Fn(&mut Account) -> Result<(), AppError> + Send + Sync,
    {
        let (accounts, _) = atomically!(self.store.as_ref(), |section| {
            async {
                let before = section
                    .get_account(uid)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;
                require_staff_authority(actor, &before)?;
                let mut after = before.clone();
                mutate(&mut after)?;
                after.updated_at = Some(now_rfc3339());
                section.put_account(&after)?;
                Ok::<_, AppError>((before, after))
            }
            .await
        })?;
        Ok(accounts)
    }

    // ─── Managers ────────────────────────────────────────────────

    /// Promote a trainer-level account to manager of `gym_id`.
    pub async fn assign_manager_from_trainer(
        &self,
        uid: &str,
        gym_id: &str,
        manager_type: ManagerType,
        actor: &Actor,
    ) -> Result<ManagerChange, AppError> {
        require_site_admin(actor)?;
        if gym_id.trim().is_empty() {
            return Err(AppError::Validation("gymId is required".to_string()));
        }

        let (change, writes) = atomically!(self.store.as_ref(), |section| {
            assign_in_section(&mut section, uid, gym_id, manager_type).await
        })?;

        tracing::info!(
            uid,
            gym_id,
            manager_type = ?manager_type,
            demoted = change.demoted.len(),
            writes,
            actor = %actor.email,
            "Manager assigned"
        );
        Ok(change)
    }

    pub async fn assign_manager_from_trainer_with_audit(
        &self,
        uid: &str,
        gym_id: &str,
        manager_type: ManagerType,
        actor: &Actor,
    ) -> Result<ManagerChange, AppError> {
        let change = self
            .assign_manager_from_trainer(uid, gym_id, manager_type, actor)
            .await?;
        self.audit
            .record(
                actor,
                AuditAction::AssignManager,
                Some(&change.account),
                metadata([
                    ("gymId", gym_id.to_string()),
                    ("managerType", format!("{manager_type:?}").to_uppercase()),
                    ("demoted", change.demoted.join(",")),
                ]),
            )
            .await;
        Ok(change)
    }

    /// Change an existing manager's type, gym or nickname.
    pub async fn update_manager_info(
        &self,
        uid: &str,
        updates: ManagerUpdate,
        actor: &Actor,
    ) -> Result<ManagerChange, AppError> {
        require_site_admin(actor)?;

        let (change, writes) = atomically!(self.store.as_ref(), |section| {
            update_manager_in_section(&mut section, uid, updates.clone()).await
        })?;

        tracing::info!(
            uid,
            demoted = change.demoted.len(),
            writes,
            actor = %actor.email,
            "Manager updated"
        );
        Ok(change)
    }

    pub async fn update_manager_info_with_audit(
        &self,
        uid: &str,
        updates: ManagerUpdate,
        actor: &Actor,
    ) -> Result<ManagerChange, AppError> {
        let change = self.update_manager_info(uid, updates, actor).await?;
        self.audit
            .record(
                actor,
                AuditAction::UpdateManager,
                Some(&change.account),
                metadata([
                    ("gymId", change.account.gym_id.clone().unwrap_or_default()),
                    (
                        "managerType",
                        change
                            .account
                            .manager_type
                            .map(|t| format!("{t:?}").to_uppercase())
                            .unwrap_or_default(),
                    ),
                    ("demoted", change.demoted.join(",")),
                ]),
            )
            .await;
        Ok(change)
    }

    pub async fn set_manager_deleted_flag(
        &self,
        uid: &str,
        deleted: bool,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        require_site_admin(actor)?;
        let (_, account) = self
            .mutate_account(uid, actor, |a| {
                set_deleted(a, deleted);
                Ok(())
            })
            .await?;
        tracing::info!(uid, deleted, actor = %actor.email, "Manager deleted flag set");
        Ok(account)
    }

    pub async fn set_manager_deleted_flag_with_audit(
        &self,
        uid: &str,
        deleted: bool,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.set_manager_deleted_flag(uid, deleted, actor).await?;
        self.audit
            .record(
                actor,
                AuditAction::SetManagerDeleted,
                Some(&account),
                metadata([("deleted", deleted.to_string())]),
            )
            .await;
        Ok(account)
    }

    pub async fn delete_manager_completely(&self, uid: &str, actor: &Actor) -> Result<Account, AppError> {
        require_site_admin(actor)?;
        self.delete_account(uid, actor).await
    }

    pub async fn delete_manager_completely_with_audit(
        &self,
        uid: &str,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.delete_manager_completely(uid, actor).await?;
        self.audit
            .record(actor, AuditAction::DeleteManager, Some(&account), metadata([]))
            .await;
        Ok(account)
    }

    /// Back to TRAINER at lvl 10, manager type cleared.
    pub async fn demote_manager_to_trainer(&self, uid: &str, actor: &Actor) -> Result<Account, AppError> {
        require_site_admin(actor)?;
        let (_, account) = self
            .mutate_account(uid, actor, |a| {
                if a.role != Role::Manager {
                    return Err(AppError::Validation(format!("{} is not a manager", a.email)));
                }
                a.role = Role::Trainer;
                a.lvl = PermissionLevel::Trainer.lvl();
                a.manager_type = None;
                Ok(())
            })
            .await?;
        tracing::info!(uid, actor = %actor.email, "Manager demoted to trainer");
        Ok(account)
    }

    pub async fn demote_manager_to_trainer_with_audit(
        &self,
        uid: &str,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.demote_manager_to_trainer(uid, actor).await?;
        self.audit
            .record(actor, AuditAction::DemoteManager, Some(&account), metadata([]))
            .await;
        Ok(account)
    }

    pub async fn get_managers(
        &self,
        gym_id: Option<&str>,
        include_deleted: bool,
        actor: &Actor,
    ) -> Result<Vec<Account>, AppError> {
        require_manager(actor)?;
        self.staff_with_role(Role::Manager, gym_id, include_deleted)
            .await
    }

    /// Active trainer-level accounts of a gym, managers included, that could be
    /// promoted or moved to PRIMARY.
    pub async fn get_manager_candidates(
        &self,
        gym_id: &str,
        actor: &Actor,
    ) -> Result<Vec<Account>, AppError> {
        require_site_admin(actor)?;
        let accounts = self
            .store
            .find_accounts(AccountFilter::InGym(gym_id.to_string()))
            .await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.is_active() && is_trainer_level(a))
            .collect())
    }

    // ─── Trainers ────────────────────────────────────────────────

    pub async fn get_trainers(
        &self,
        gym_id: Option<&str>,
        include_deleted: bool,
        actor: &Actor,
    ) -> Result<Vec<Account>, AppError> {
        require_manager(actor)?;
        self.staff_with_role(Role::Trainer, gym_id, include_deleted)
            .await
    }

    /// Set role and tier. Granting manager or site-admin rights needs a site admin.
    pub async fn update_trainer_role(
        &self,
        uid: &str,
        role: Role,
        lvl: u32,
        gym_id: Option<String>,
        actor: &Actor,
    ) -> Result<(Account, Account), AppError> {
        require_manager(actor)?;
        if matches!(role, Role::Manager | Role::SiteAdmin)
            || PermissionLevel::from_lvl(lvl) >= PermissionLevel::Manager
        {
            require_site_admin(actor)?;
        }
        if let Some(gym_id) = &gym_id {
            require_gym_authority(actor, gym_id)?;
        }

        let accounts = self
            .mutate_account(uid, actor, |a| {
                a.role = role;
                a.lvl = lvl;
                if gym_id.is_some() {
                    a.gym_id = gym_id.clone();
                }
                if role != Role::Manager {
                    a.manager_type = None;
                }
                Ok(())
            })
            .await?;
        tracing::info!(uid, role = ?role, lvl, actor = %actor.email, "Trainer role updated");
        Ok(accounts)
    }

    pub async fn update_trainer_role_with_audit(
        &self,
        uid: &str,
        role: Role,
        lvl: u32,
        gym_id: Option<String>,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let (before, after) = self
            .update_trainer_role(uid, role, lvl, gym_id, actor)
            .await?;
        self.audit
            .record(
                actor,
                AuditAction::UpdateTrainerRole,
                Some(&after),
                metadata([
                    ("fromRole", format!("{:?}", before.role).to_uppercase()),
                    ("toRole", format!("{:?}", after.role).to_uppercase()),
                    ("fromLvl", before.lvl.to_string()),
                    ("toLvl", after.lvl.to_string()),
                ]),
            )
            .await;
        Ok(after)
    }

    pub async fn update_trainer_info(
        &self,
        uid: &str,
        nickname: Option<String>,
        gym_id: Option<String>,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        require_manager(actor)?;
        if let Some(gym_id) = &gym_id {
            require_gym_authority(actor, gym_id)?;
        }
        let (_, account) = self
            .mutate_account(uid, actor, |a| {
                if nickname.is_some() {
                    a.nickname = nickname.clone();
                }
                if gym_id.is_some() {
                    a.gym_id = gym_id.clone();
                }
                Ok(())
            })
            .await?;
        tracing::info!(uid, actor = %actor.email, "Trainer info updated");
        Ok(account)
    }

    pub async fn update_trainer_info_with_audit(
        &self,
        uid: &str,
        nickname: Option<String>,
        gym_id: Option<String>,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let gym = gym_id.clone().unwrap_or_default();
        let account = self.update_trainer_info(uid, nickname, gym_id, actor).await?;
        self.audit
            .record(
                actor,
                AuditAction::UpdateTrainerInfo,
                Some(&account),
                metadata([("gymId", gym)]),
            )
            .await;
        Ok(account)
    }

    pub async fn set_trainer_deleted_flag(
        &self,
        uid: &str,
        deleted: bool,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        require_manager(actor)?;
        let (_, account) = self
            .mutate_account(uid, actor, |a| {
                set_deleted(a, deleted);
                Ok(())
            })
            .await?;
        tracing::info!(uid, deleted, actor = %actor.email, "Trainer deleted flag set");
        Ok(account)
    }

    pub async fn set_trainer_deleted_flag_with_audit(
        &self,
        uid: &str,
        deleted: bool,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.set_trainer_deleted_flag(uid, deleted, actor).await?;
        self.audit
            .record(
                actor,
                AuditAction::SetTrainerDeleted,
                Some(&account),
                metadata([("deleted", deleted.to_string())]),
            )
            .await;
        Ok(account)
    }

    pub async fn delete_trainer_completely(&self, uid: &str, actor: &Actor) -> Result<Account, AppError> {
        require_manager(actor)?;
        self.delete_account(uid, actor).await
    }

    pub async fn delete_trainer_completely_with_audit(
        &self,
        uid: &str,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.delete_trainer_completely(uid, actor).await?;
        self.audit
            .record(actor, AuditAction::DeleteTrainer, Some(&account), metadata([]))
            .await;
        Ok(account)
    }

    // ─── Gyms ────────────────────────────────────────────────────

    pub async fn list_gyms(&self) -> Result<Vec<Gym>, AppError> {
        let mut gyms = self.store.list_gyms().await?;
        gyms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(gyms)
    }

    /// Create a gym and promote its named manager in one atomic section.
    pub async fn create_gym(
        &self,
        name: &str,
        location: Option<String>,
        manager_email: Option<String>,
        actor: &Actor,
    ) -> Result<GymCreation, AppError> {
        require_site_admin(actor)?;
        if name.trim().is_empty() {
            return Err(AppError::Validation("gym name is required".to_string()));
        }

        let manager_uid = match &manager_email {
            Some(email) => self
                .store
                .find_account_by_email(email)
                .await?
                .map(|a| a.uid),
            None => None,
        };

        let gym = Gym {
            id: new_document_id(),
            name: name.trim().to_string(),
            location,
            manager_email: manager_email.clone(),
            created_at: now_rfc3339(),
        };

        let (manager_promoted, writes) = atomically!(self.store.as_ref(), |section| {
            create_gym_in_section(&mut section, &gym, manager_uid.as_deref()).await
        })?;

        if manager_email.is_some() && !manager_promoted {
            tracing::warn!(
                gym_id = %gym.id,
                manager_email = manager_email.as_deref().unwrap_or_default(),
                "Gym manager has no account; not promoted"
            );
        }
        tracing::info!(gym_id = %gym.id, manager_promoted, writes, actor = %actor.email, "Gym created");

        Ok(GymCreation {
            gym,
            manager_promoted,
        })
    }

    /// Site admins may edit any gym; managers only their own and not its manager.
    pub async fn update_gym(
        &self,
        gym_id: &str,
        updates: GymUpdate,
        actor: &Actor,
    ) -> Result<Gym, AppError> {
        let own_gym = actor.permission_level() >= PermissionLevel::Manager
            && actor.gym_id.as_deref() == Some(gym_id);
        if !is_site_admin(actor) {
            if !own_gym {
                return Err(AppError::Forbidden(format!(
                    "{} may not edit gym {}",
                    actor.email, gym_id
                )));
            }
            if updates.manager_email.is_some() {
                return Err(AppError::Forbidden(
                    "only a site admin may change a gym's manager".to_string(),
                ));
            }
        }

        let new_manager_uid = match &updates.manager_email {
            Some(email) => self
                .store
                .find_account_by_email(email)
                .await?
                .map(|a| a.uid),
            None => None,
        };

        let (gym, _) = atomically!(self.store.as_ref(), |section| {
            update_gym_in_section(&mut section, gym_id, updates.clone(), new_manager_uid.as_deref())
                .await
        })?;

        tracing::info!(gym_id, actor = %actor.email, "Gym updated");
        Ok(gym)
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn staff_with_role(
        &self,
        role: Role,
        gym_id: Option<&str>,
        include_deleted: bool,
    ) -> Result<Vec<Account>, AppError> {
        let accounts = self.store.find_accounts(AccountFilter::WithRole(role)).await?;
        let mut accounts: Vec<Account> = accounts
            .into_iter()
            .filter(|a| include_deleted || a.is_active())
            .filter(|a| gym_id.map_or(true, |g| a.gym_id.as_deref() == Some(g)))
            .collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    async fn delete_account(&self, uid: &str, actor: &Actor) -> Result<Account, AppError> {
        let account = self
            .store
            .get_account(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;
        require_staff_authority(actor, &account)?;
        self.store.delete_account(uid).await?;
        tracing::info!(uid, email = %account.email, actor = %actor.email, "Account deleted");
        Ok(account)
    }
}

fn set_deleted(account: &mut Account, deleted: bool) {
    account.deleted_flag = deleted;
    account.deleted_at = deleted.then(now_rfc3339);
}
