//! Trainer profiles (with edit history) and member body records.

use serde::{Deserialize, Serialize};

/// Public trainer profile stored in `trainerProfiles/{email}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerProfile {
    #[serde(default)]
    pub uid: Option<String>,
    /// Document ID
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub updated_at: String,
}

/// Editable subset of a trainer profile. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl ProfileFields {
    /// Current values of the fields `self` touches.
    pub fn snapshot_of(&self, profile: &TrainerProfile) -> ProfileFields {
        ProfileFields {
            nickname: self.nickname.as_ref().map(|_| profile.nickname.clone()),
            bio: self.bio.as_ref().and(profile.bio.clone()),
            specialties: self
                .specialties
                .as_ref()
                .map(|_| profile.specialties.clone()),
            photo_url: self.photo_url.as_ref().and(profile.photo_url.clone()),
        }
    }

    /// Merge into `profile` (set fields only).
    pub fn apply_to(&self, profile: &mut TrainerProfile) {
        if let Some(nickname) = &self.nickname {
            profile.nickname = nickname.clone();
        }
        if let Some(bio) = &self.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(specialties) = &self.specialties {
            profile.specialties = specialties.clone();
        }
        if let Some(photo_url) = &self.photo_url {
            profile.photo_url = Some(photo_url.clone());
        }
    }
}

/// One profile edit, stored in `profileHistory/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileHistory {
    #[serde(default)]
    pub id: String,
    pub trainer_email: String,
    pub before: ProfileFields,
    pub after: ProfileFields,
    pub updated_at: String,
}

/// Body measurement stored in `bodyProfiles/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyRecord {
    #[serde(default)]
    pub id: String,
    pub user_email: String,
    /// Measurement date (YYYY-MM-DD)
    pub date: String,
    pub weight: f64,
    #[serde(default)]
    pub body_fat: Option<f64>,
    #[serde(default)]
    pub muscle_mass: Option<f64>,
    #[serde(default)]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TrainerProfile {
        TrainerProfile {
            uid: Some("t1".to_string()),
            email: "coach@gym.test".to_string(),
            nickname: "Coach".to_string(),
            bio: Some("Powerlifting".to_string()),
            specialties: vec!["strength".to_string()],
            photo_url: None,
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_snapshot_only_covers_edited_fields() {
        let edit = ProfileFields {
            bio: Some("Olympic lifting".to_string()),
            ..Default::default()
        };

        let before = edit.snapshot_of(&profile());
        assert_eq!(before.bio.as_deref(), Some("Powerlifting"));
        assert!(before.nickname.is_none());
        assert!(before.specialties.is_none());
    }

    #[test]
    fn test_apply_merges_set_fields() {
        let mut p = profile();
        ProfileFields {
            nickname: Some("Coach Kim".to_string()),
            specialties: Some(vec![]),
            ..Default::default()
        }
        .apply_to(&mut p);

        assert_eq!(p.nickname, "Coach Kim");
        assert!(p.specialties.is_empty());
        assert_eq!(p.bio.as_deref(), Some("Powerlifting"));
    }
}
