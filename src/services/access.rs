// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access control evaluator.
//!
//! The predicates here are the only place privilege rules are spelled out.
//! Every other module asks these functions instead of comparing `lvl` or
//! `role` itself. Nothing is cached: each decision reads the store afresh.

use crate::db::GymStore;
use crate::error::AppError;
use crate::models::{Account, Actor, ManagerType, PermissionLevel, Privileged, Role};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// `lvl >= 100` or the SITE_ADMIN role.
pub fn is_site_admin<P: Privileged + ?Sized>(subject: &P) -> bool {
    PermissionLevel::from_lvl(subject.lvl()) >= PermissionLevel::SiteAdmin
        || subject.role() == Role::SiteAdmin
}

/// TRAINER or MANAGER role, or `lvl >= 10`.
pub fn is_trainer_level<P: Privileged + ?Sized>(subject: &P) -> bool {
    matches!(subject.role(), Role::Trainer | Role::Manager)
        || PermissionLevel::from_lvl(subject.lvl()) >= PermissionLevel::Trainer
}

/// `lvl >= 20`. Site admins qualify.
pub fn is_manager_level<P: Privileged + ?Sized>(subject: &P) -> bool {
    PermissionLevel::from_lvl(subject.lvl()) >= PermissionLevel::Manager || is_site_admin(subject)
}

pub fn is_active_primary_manager(account: &Account) -> bool {
    account.role == Role::Manager
        && account.manager_type == Some(ManagerType::Primary)
        && account.is_active()
}

/// Why an access check succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    SelfAccess,
    SiteAdmin,
    AssignedTrainer,
    ClassOwner,
    ClassMember,
}

/// Coarse flags used to gate routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AccessFlags {
    pub is_authenticated: bool,
    pub is_site_admin: bool,
    pub is_manager: bool,
    pub is_trainer: bool,
    pub is_member: bool,
    pub is_observer: bool,
}

impl AccessFlags {
    pub fn for_actor(actor: Option<&Actor>) -> Self {
        let Some(actor) = actor else {
            return Self::default();
        };
        let level = actor.permission_level();
        Self {
            is_authenticated: true,
            is_site_admin: is_site_admin(actor),
            is_manager: is_manager_level(actor),
            is_trainer: is_trainer_level(actor),
            is_member: level >= PermissionLevel::Member || actor.remaining_sessions > 0,
            is_observer: level >= PermissionLevel::Observer,
        }
    }
}

/// Lookup-backed authorization checks.
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn GymStore>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn GymStore>) -> Self {
        Self { store }
    }

    /// May `actor` read or write data belonging to `target_email`?
    pub async fn can_access_user_data(
        &self,
        target_email: &str,
        actor: &Actor,
    ) -> Result<AccessGrant, AppError> {
        if actor.email == target_email {
            return Ok(AccessGrant::SelfAccess);
        }
        if is_site_admin(actor) {
            return Ok(AccessGrant::SiteAdmin);
        }
        if actor.permission_level() < PermissionLevel::Trainer {
            tracing::debug!(actor = %actor.email, user = target_email, "Below trainer tier");
            return Err(AppError::Forbidden(format!(
                "{} may not access data of {}",
                actor.email, target_email
            )));
        }

        let target = self
            .store
            .find_account_by_email(target_email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {target_email}")))?;

        if target.trainer_email.as_deref() == Some(actor.email.as_str()) {
            Ok(AccessGrant::AssignedTrainer)
        } else {
            Err(AppError::Forbidden(format!(
                "{} is not the assigned trainer of {}",
                actor.email, target_email
            )))
        }
    }

    /// May `actor` read the roster and schedule of `class_id`?
    pub async fn can_access_class_data(
        &self,
        class_id: &str,
        actor: &Actor,
    ) -> Result<AccessGrant, AppError> {
        if is_site_admin(actor) {
            return Ok(AccessGrant::SiteAdmin);
        }

        let class = self
            .store
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;

        if class.trainer_email == actor.email {
            Ok(AccessGrant::ClassOwner)
        } else if class.has_trainee(&actor.email) {
            Ok(AccessGrant::ClassMember)
        } else {
            Err(AppError::Forbidden(format!(
                "{} is neither owner nor trainee of class {}",
                actor.email, class_id
            )))
        }
    }
}

/// Fail with `Forbidden` unless `actor` is manager-level.
pub fn require_manager(actor: &Actor) -> Result<(), AppError> {
    if is_manager_level(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} is not manager-level",
            actor.email
        )))
    }
}

/// Fail with `Forbidden` unless `actor` is a site admin.
pub fn require_site_admin(actor: &Actor) -> Result<(), AppError> {
    if is_site_admin(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} is not a site admin", actor.email)))
    }
}

/// Fail with `Forbidden` unless `actor` may change `target`'s staff record.
///
/// Site admins may change any account. Other managers are limited to accounts
/// of their own gym that rank below them and hold neither the MANAGER nor the
/// SITE_ADMIN role.
pub fn require_staff_authority(actor: &Actor, target: &Account) -> Result<(), AppError> {
    if is_site_admin(actor) {
        return Ok(());
    }
    require_manager(actor)?;
    if matches!(target.role, Role::Manager | Role::SiteAdmin)
        || is_site_admin(target)
        || target.permission_level() >= actor.permission_level()
    {
        return Err(AppError::Forbidden(format!(
            "{} may not change {}",
            actor.email, target.email
        )));
    }
    if actor.gym_id.is_none() || target.gym_id != actor.gym_id {
        return Err(AppError::Forbidden(format!(
            "{} is not in {}'s gym",
            target.email, actor.email
        )));
    }
    Ok(())
}

/// Fail with `Forbidden` unless `actor` may place an account in `gym_id`.
pub fn require_gym_authority(actor: &Actor, gym_id: &str) -> Result<(), AppError> {
    if is_site_admin(actor) || actor.gym_id.as_deref() == Some(gym_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} may not assign staff to gym {}",
            actor.email, gym_id
        )))
    }
}

/// Fail with `Forbidden` unless `actor` is trainer-level.
pub fn require_trainer(actor: &Actor) -> Result<(), AppError> {
    if is_trainer_level(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} is not trainer-level",
            actor.email
        )))
    }
}
