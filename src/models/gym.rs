// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gym and class models.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Gym document stored in `gyms/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Gym {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub manager_email: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Training class stored in `classes/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct GymClass {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Owning trainer
    pub trainer_email: String,
    /// Roster; membership grants read access to the class schedule
    #[serde(default)]
    pub trainee_emails: Vec<String>,
    #[serde(default)]
    pub gym_id: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl GymClass {
    pub fn has_trainee(&self, email: &str) -> bool {
        self.trainee_emails.iter().any(|e| e == email)
    }

    /// Add a trainee. Returns `false` if already on the roster.
    pub fn add_trainee(&mut self, email: &str) -> bool {
        if self.has_trainee(email) {
            return false;
        }
        self.trainee_emails.push(email.to_string());
        true
    }

    /// Remove a trainee. Returns `false` if not on the roster.
    pub fn remove_trainee(&mut self, email: &str) -> bool {
        let before = self.trainee_emails.len();
        self.trainee_emails.retain(|e| e != email);
        self.trainee_emails.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class() -> GymClass {
        GymClass {
            id: "c1".to_string(),
            name: "Morning Strength".to_string(),
            trainer_email: "coach@gym.test".to_string(),
            trainee_emails: vec!["a@gym.test".to_string()],
            gym_id: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_roster_add_is_idempotent() {
        let mut c = class();
        assert!(c.add_trainee("b@gym.test"));
        assert!(!c.add_trainee("b@gym.test"));
        assert_eq!(c.trainee_emails.len(), 2);
    }

    #[test]
    fn test_roster_remove_missing_is_noop() {
        let mut c = class();
        assert!(!c.remove_trainee("nobody@gym.test"));
        assert!(c.remove_trainee("a@gym.test"));
        assert!(c.trainee_emails.is_empty());
    }
}
