// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account model, roles and privilege tiers.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Stored role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Member,
    Trainer,
    Manager,
    SiteAdmin,
}

/// Exclusivity tag for managers of a gym.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagerType {
    Primary,
    Vice,
}

/// Coarse privilege tier derived from the numeric `lvl`.
///
/// Ordered: a higher tier includes everything a lower tier may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    Unranked,
    Observer,
    Member,
    Trainer,
    Manager,
    SiteAdmin,
}

impl PermissionLevel {
    /// Tier for a stored `lvl` value.
    pub fn from_lvl(lvl: u32) -> Self {
        match lvl {
            100.. => PermissionLevel::SiteAdmin,
            20.. => PermissionLevel::Manager,
            10.. => PermissionLevel::Trainer,
            5.. => PermissionLevel::Member,
            1.. => PermissionLevel::Observer,
            0 => PermissionLevel::Unranked,
        }
    }

    /// Minimum `lvl` for this tier; written when an account is promoted.
    pub fn lvl(self) -> u32 {
        match self {
            PermissionLevel::Unranked => 0,
            PermissionLevel::Observer => 1,
            PermissionLevel::Member => 5,
            PermissionLevel::Trainer => 10,
            PermissionLevel::Manager => 20,
            PermissionLevel::SiteAdmin => 100,
        }
    }
}

fn default_lvl() -> u32 {
    PermissionLevel::Observer.lvl()
}

/// Account document stored in `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Auth provider uid (also used as document ID)
    #[serde(default)]
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_lvl")]
    pub lvl: u32,
    #[serde(default)]
    pub gym_id: Option<String>,
    #[serde(default)]
    pub manager_type: Option<ManagerType>,
    /// Purchased session credits left
    #[serde(default)]
    pub remaining_sessions: i64,
    #[serde(default)]
    pub expiration_date: Option<String>,
    /// Soft-delete marker
    #[serde(default)]
    pub deleted_flag: bool,
    #[serde(default)]
    pub deleted_at: Option<String>,
    /// Assigned trainer (for members)
    #[serde(default)]
    pub trainer_email: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Account {
    /// Minimal profile used when the auth provider knows a user we have no
    /// document for yet.
    pub fn default_member(uid: &str, email: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            nickname: email.split('@').next().map(str::to_string),
            role: Role::Member,
            lvl: PermissionLevel::Observer.lvl(),
            gym_id: None,
            manager_type: None,
            remaining_sessions: 0,
            expiration_date: None,
            deleted_flag: false,
            deleted_at: None,
            trainer_email: None,
            updated_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.deleted_flag
    }

    pub fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::from_lvl(self.lvl)
    }
}

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub uid: String,
    pub email: String,
    pub lvl: u32,
    pub role: Role,
    pub gym_id: Option<String>,
    pub remaining_sessions: i64,
}

impl Actor {
    pub fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::from_lvl(self.lvl)
    }
}

impl From<&Account> for Actor {
    fn from(account: &Account) -> Self {
        Self {
            uid: account.uid.clone(),
            email: account.email.clone(),
            lvl: account.lvl,
            role: account.role,
            gym_id: account.gym_id.clone(),
            remaining_sessions: account.remaining_sessions,
        }
    }
}

/// Anything carrying a role and a numeric tier.
pub trait Privileged {
    fn lvl(&self) -> u32;
    fn role(&self) -> Role;
}

impl Privileged for Account {
    fn lvl(&self) -> u32 {
        self.lvl
    }
    fn role(&self) -> Role {
        self.role
    }
}

impl Privileged for Actor {
    fn lvl(&self) -> u32 {
        self.lvl
    }
    fn role(&self) -> Role {
        self.role
    }
}

/// Client summary returned to trainers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub uid: String,
    pub email: String,
    pub nickname: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub remaining_sessions: i64,
    pub expiration_date: Option<String>,
}

impl From<Account> for ClientInfo {
    fn from(account: Account) -> Self {
        Self {
            uid: account.uid,
            email: account.email,
            nickname: account.nickname,
            remaining_sessions: account.remaining_sessions,
            expiration_date: account.expiration_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_level_thresholds() {
        assert_eq!(PermissionLevel::from_lvl(0), PermissionLevel::Unranked);
        assert_eq!(PermissionLevel::from_lvl(1), PermissionLevel::Observer);
        assert_eq!(PermissionLevel::from_lvl(4), PermissionLevel::Observer);
        assert_eq!(PermissionLevel::from_lvl(5), PermissionLevel::Member);
        assert_eq!(PermissionLevel::from_lvl(10), PermissionLevel::Trainer);
        assert_eq!(PermissionLevel::from_lvl(19), PermissionLevel::Trainer);
        assert_eq!(PermissionLevel::from_lvl(20), PermissionLevel::Manager);
        assert_eq!(PermissionLevel::from_lvl(100), PermissionLevel::SiteAdmin);
        assert_eq!(PermissionLevel::from_lvl(250), PermissionLevel::SiteAdmin);
    }

    #[test]
    fn test_level_round_trips_through_lvl() {
        for level in [
            PermissionLevel::Observer,
            PermissionLevel::Member,
            PermissionLevel::Trainer,
            PermissionLevel::Manager,
            PermissionLevel::SiteAdmin,
        ] {
            assert_eq!(PermissionLevel::from_lvl(level.lvl()), level);
        }
    }

    #[test]
    fn test_account_deserializes_stored_camel_case() {
        let raw = serde_json::json!({
            "uid": "u1",
            "email": "kim@gym.test",
            "role": "MANAGER",
            "lvl": 20,
            "gymId": "g1",
            "managerType": "PRIMARY",
            "remainingSessions": 4,
            "deletedFlag": false
        });

        let account: Account = serde_json::from_value(raw).unwrap();
        assert_eq!(account.role, Role::Manager);
        assert_eq!(account.manager_type, Some(ManagerType::Primary));
        assert_eq!(account.gym_id.as_deref(), Some("g1"));
        assert_eq!(account.remaining_sessions, 4);
    }

    #[test]
    fn test_missing_fields_default_to_observer_member() {
        let raw = serde_json::json!({ "uid": "u2", "email": "new@gym.test" });
        let account: Account = serde_json::from_value(raw).unwrap();
        assert_eq!(account.role, Role::Member);
        assert_eq!(account.lvl, 1);
        assert!(account.is_active());
    }

    #[test]
    fn test_default_member_nickname_from_email() {
        let account = Account::default_member("u3", "lee.coach@gym.test");
        assert_eq!(account.nickname.as_deref(), Some("lee.coach"));
        assert_eq!(account.permission_level(), PermissionLevel::Observer);
    }
}
