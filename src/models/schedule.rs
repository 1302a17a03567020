// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled events (PT sessions, class sessions, personal entries).

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Trainer-led session; consumes a credit on completion
    Pt,
    /// Personal entry; never consumes credits
    Personal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    #[default]
    Individual,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// COMPLETED admits no further transition.
    pub fn is_terminal(self) -> bool {
        self == EventStatus::Completed
    }
}

/// One exercise performed during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExerciseRecord {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Event document stored in `schedules/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEvent {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub target_type: TargetType,
    #[serde(default)]
    pub status: EventStatus,
    /// Trainee for INDIVIDUAL events
    #[serde(default)]
    pub client_email: Option<String>,
    /// Author of a personal entry
    #[serde(default)]
    pub user_email: Option<String>,
    /// Class for CLASS events
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub trainer_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub signature_url: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub records: Vec<ExerciseRecord>,
    #[serde(default)]
    pub created_at: String,
}

impl ScheduledEvent {
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_trainer(&self, email: &str) -> bool {
        self.trainer_email.as_deref() == Some(email)
    }
}

/// Per-trainee copy of a class session's exercise records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutLog {
    #[serde(default)]
    pub id: String,
    pub user_email: String,
    pub class_id: String,
    pub schedule_id: String,
    pub title: String,
    pub date: String,
    pub records: Vec<ExerciseRecord>,
    pub source: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_legacy_document() {
        // Older documents predate targetType/status and carry no id field.
        let raw = serde_json::json!({
            "title": "Leg day",
            "date": "2026-02-10",
            "time": "18:00",
            "type": "PT",
            "clientEmail": "member@gym.test",
            "trainerEmail": "coach@gym.test"
        });

        let event: ScheduledEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, EventType::Pt);
        assert_eq!(event.target_type, TargetType::Individual);
        assert_eq!(event.status, EventStatus::Pending);
        assert!(event.records.is_empty());
        assert!(event.is_trainer("coach@gym.test"));
        assert!(event.id.is_empty());
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(EventStatus::Completed.is_terminal());
        assert!(!EventStatus::Cancelled.is_terminal());
        assert!(!EventStatus::Approved.is_terminal());
    }
}
