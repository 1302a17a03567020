// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schedules, classes and class workout logs.

use crate::db::{
    atomically, in_query_chunks, new_document_id, AtomicSection, ClassFilter, EventFilter, GymStore,
};
use crate::error::AppError;
use crate::models::{
    Actor, EventStatus, EventType, ExerciseRecord, GymClass, ScheduledEvent, TargetType,
    WorkoutLog,
};
use crate::services::access::{is_site_admin, is_trainer_level, require_trainer, AccessControl};
use crate::time_utils::now_rfc3339;
use futures_util::future::try_join_all;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

/// Source tag of workout logs fanned out from a class session.
pub const CLASS_BULK_SOURCE: &str = "CLASS_BULK";

/// Fields of a new event. Status always starts as PENDING.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// YYYY-MM-DD
    #[validate(length(equal = 10))]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub target_type: TargetType,
    pub client_email: Option<String>,
    pub class_id: Option<String>,
    pub trainer_email: Option<String>,
    pub notes: Option<String>,
    pub media_url: Option<String>,
    #[serde(default)]
    pub records: Vec<ExerciseRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<EventStatus>,
    pub notes: Option<String>,
    pub media_url: Option<String>,
    pub records: Option<Vec<ExerciseRecord>>,
}

#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn GymStore>,
    access: AccessControl,
}

/// Concatenate event lists, keeping the first event seen for each id.
pub fn merge_unique(lists: impl IntoIterator<Item = Vec<ScheduledEvent>>) -> Vec<ScheduledEvent> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

fn require_class_owner(class: &GymClass, actor: &Actor) -> Result<(), AppError> {
    if is_site_admin(actor) || class.trainer_email == actor.email {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} does not own class {}",
            actor.email, class.id
        )))
    }
}

async fn update_event_in_section(
    section: &mut AtomicSection<'_>,
    event_id: &str,
    updates: EventUpdate,
    actor: &Actor,
) -> Result<ScheduledEvent, AppError> {
    let mut event = section
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;

    let is_author = event.user_email.as_deref() == Some(actor.email.as_str());
    if !(is_site_admin(actor) || event.is_trainer(&actor.email) || is_author) {
        return Err(AppError::Forbidden(format!(
            "{} may not edit event {}",
            actor.email, event_id
        )));
    }
    if event.is_completed() {
        return Err(AppError::AlreadyCompleted(event_id.to_string()));
    }

    if let Some(title) = updates.title {
        event.title = title;
    }
    if let Some(date) = updates.date {
        event.date = date;
    }
    if let Some(time) = updates.time {
        event.time = time;
    }
    if let Some(status) = updates.status {
        event.status = status;
    }
    if let Some(notes) = updates.notes {
        event.notes = Some(notes);
    }
    if let Some(media_url) = updates.media_url {
        event.media_url = Some(media_url);
    }
    if let Some(records) = updates.records {
        event.records = records;
    }
    section.put_event(&event)?;
    Ok(event)
}

/// Apply a roster change; writes nothing if the roster is unchanged.
async fn edit_roster_in_section(
    section: &mut AtomicSection<'_>,
    class_id: &str,
    trainee_email: &str,
    add: bool,
    actor: &Actor,
) -> Result<GymClass, AppError> {
    let mut class = section
        .get_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
    require_class_owner(&class, actor)?;

    let changed = if add {
        class.add_trainee(trainee_email)
    } else {
        class.remove_trainee(trainee_email)
    };
    if changed {
        section.put_class(&class)?;
    }
    Ok(class)
}

impl ScheduleService {
    pub fn new(store: Arc<dyn GymStore>, access: AccessControl) -> Self {
        Self { store, access }
    }

    // ─── Schedules ───────────────────────────────────────────────

    /// Every event visible on `target_email`'s calendar, without duplicates.
    pub async fn get_schedules(
        &self,
        target_email: &str,
        actor: &Actor,
    ) -> Result<Vec<ScheduledEvent>, AppError> {
        self.access.can_access_user_data(target_email, actor).await?;

        let as_client = self
            .store
            .find_events(EventFilter::IndividualForClient(target_email.to_string()));
        let authored = self
            .store
            .find_events(EventFilter::IndividualAuthoredBy(target_email.to_string()));
        let classes = self
            .store
            .find_classes(ClassFilter::WithTrainee(target_email.to_string()));
        let (as_client, authored, classes) =
            futures_util::try_join!(as_client, authored, classes)?;

        let class_ids: Vec<String> = classes.into_iter().map(|c| c.id).collect();
        let class_events = try_join_all(
            in_query_chunks(&class_ids)
                .map(|chunk| self.store.find_events(EventFilter::ForClasses(chunk.to_vec()))),
        )
        .await?;

        let mut events = merge_unique(
            [as_client, authored]
                .into_iter()
                .chain(class_events),
        );
        events.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));

        tracing::debug!(user = target_email, count = events.len(), "Schedules loaded");
        Ok(events)
    }

    pub async fn get_schedules_by_class(
        &self,
        class_id: &str,
        actor: &Actor,
    ) -> Result<Vec<ScheduledEvent>, AppError> {
        self.access.can_access_class_data(class_id, actor).await?;
        let mut events = self
            .store
            .find_events(EventFilter::ForClasses(vec![class_id.to_string()]))
            .await?;
        events.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
        Ok(events)
    }

    pub async fn add_schedule(
        &self,
        new_event: NewEvent,
        actor: &Actor,
    ) -> Result<ScheduledEvent, AppError> {
        let mut event = ScheduledEvent {
            id: new_document_id(),
            title: new_event.title,
            date: new_event.date,
            time: new_event.time,
            event_type: new_event.event_type,
            target_type: new_event.target_type,
            status: EventStatus::Pending,
            client_email: None,
            user_email: None,
            class_id: None,
            trainer_email: None,
            notes: new_event.notes,
            media_url: new_event.media_url,
            signature_url: None,
            completed_at: None,
            records: new_event.records,
            created_at: now_rfc3339(),
        };

        match (event.event_type, event.target_type) {
            (EventType::Personal, _) => {
                event.target_type = TargetType::Individual;
                event.user_email = Some(actor.email.clone());
            }
            (EventType::Pt, TargetType::Class) => {
                let class_id = new_event
                    .class_id
                    .ok_or_else(|| AppError::Validation("classId is required".to_string()))?;
                let class = self
                    .store
                    .get_class(&class_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
                require_class_owner(&class, actor)?;
                event.class_id = Some(class.id);
                event.trainer_email = Some(class.trainer_email);
            }
            (EventType::Pt, TargetType::Individual) if is_trainer_level(actor) => {
                event.client_email = Some(new_event.client_email.ok_or_else(|| {
                    AppError::Validation("clientEmail is required".to_string())
                })?);
                event.trainer_email = Some(
                    new_event
                        .trainer_email
                        .unwrap_or_else(|| actor.email.clone()),
                );
            }
            (EventType::Pt, TargetType::Individual) => {
                if new_event
                    .client_email
                    .as_deref()
                    .is_some_and(|c| c != actor.email)
                {
                    return Err(AppError::Forbidden(format!(
                        "{} may only book sessions for themself",
                        actor.email
                    )));
                }
                event.client_email = Some(actor.email.clone());
                event.trainer_email = Some(new_event.trainer_email.ok_or_else(|| {
                    AppError::Validation("trainerEmail is required".to_string())
                })?);
            }
        }

        self.store.upsert_event(&event).await?;
        tracing::info!(
            event_id = %event.id,
            event_type = ?event.event_type,
            target_type = ?event.target_type,
            actor = %actor.email,
            "Schedule added"
        );
        Ok(event)
    }

    /// Edit a non-completed event. Completion goes through the session ledger.
    pub async fn update_schedule(
        &self,
        event_id: &str,
        updates: EventUpdate,
        actor: &Actor,
    ) -> Result<ScheduledEvent, AppError> {
        if updates.status == Some(EventStatus::Completed) {
            return Err(AppError::Validation(
                "use session completion to mark an event COMPLETED".to_string(),
            ));
        }

        let (event, _) = atomically!(self.store.as_ref(), |section| {
            update_event_in_section(&mut section, event_id, updates.clone(), actor).await
        })?;

        tracing::info!(event_id, status = ?event.status, actor = %actor.email, "Schedule updated");
        Ok(event)
    }

    // ─── Classes ─────────────────────────────────────────────────

    pub async fn create_class(&self, name: &str, actor: &Actor) -> Result<GymClass, AppError> {
        require_trainer(actor)?;
        if name.trim().is_empty() {
            return Err(AppError::Validation("class name is required".to_string()));
        }
        let class = GymClass {
            id: new_document_id(),
            name: name.trim().to_string(),
            trainer_email: actor.email.clone(),
            trainee_emails: Vec::new(),
            gym_id: actor.gym_id.clone(),
            created_at: now_rfc3339(),
        };
        self.store.upsert_class(&class).await?;
        tracing::info!(class_id = %class.id, trainer = %actor.email, "Class created");
        Ok(class)
    }

    pub async fn get_classes_by_trainer(
        &self,
        trainer_email: &str,
        actor: &Actor,
    ) -> Result<Vec<GymClass>, AppError> {
        if actor.email != trainer_email && !is_site_admin(actor) {
            return Err(AppError::Forbidden(format!(
                "{} may not list classes of {}",
                actor.email, trainer_email
            )));
        }
        let mut classes = self
            .store
            .find_classes(ClassFilter::OwnedBy(trainer_email.to_string()))
            .await?;
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(classes)
    }

    pub async fn add_trainee_to_class(
        &self,
        class_id: &str,
        trainee_email: &str,
        actor: &Actor,
    ) -> Result<GymClass, AppError> {
        self.edit_roster(class_id, trainee_email, true, actor).await
    }

    pub async fn remove_trainee_from_class(
        &self,
        class_id: &str,
        trainee_email: &str,
        actor: &Actor,
    ) -> Result<GymClass, AppError> {
        self.edit_roster(class_id, trainee_email, false, actor).await
    }

    async fn edit_roster(
        &self,
        class_id: &str,
        trainee_email: &str,
        add: bool,
        actor: &Actor,
    ) -> Result<GymClass, AppError> {
        let (class, writes) = atomically!(self.store.as_ref(), |section| {
            edit_roster_in_section(&mut section, class_id, trainee_email, add, actor).await
        })?;
        tracing::info!(class_id, trainee = trainee_email, add, writes, "Class roster edited");
        Ok(class)
    }

    /// Copy a class session's records into every trainee's workout log.
    ///
    /// Returns the number of logs written. Any failed write fails the call.
    pub async fn append_class_workout_log(
        &self,
        event_id: &str,
        records: Vec<ExerciseRecord>,
        actor: &Actor,
    ) -> Result<usize, AppError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;
        let class_id = match (event.target_type, &event.class_id) {
            (TargetType::Class, Some(class_id)) => class_id.clone(),
            _ => {
                return Err(AppError::Validation(format!(
                    "event {event_id} is not a class session"
                )))
            }
        };
        let class = self
            .store
            .get_class(&class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
        if !event.is_trainer(&actor.email) {
            require_class_owner(&class, actor)?;
        }

        let now = now_rfc3339();
        let logs: Vec<WorkoutLog> = class
            .trainee_emails
            .iter()
            .map(|email| WorkoutLog {
                id: new_document_id(),
                user_email: email.clone(),
                class_id: class_id.clone(),
                schedule_id: event.id.clone(),
                title: event.title.clone(),
                date: event.date.clone(),
                records: records.clone(),
                source: CLASS_BULK_SOURCE.to_string(),
                created_at: now.clone(),
            })
            .collect();

        try_join_all(logs.iter().map(|log| self.store.append_workout_log(log))).await?;

        tracing::info!(event_id, class_id, count = logs.len(), "Class workout logs written");
        Ok(logs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, title: &str) -> ScheduledEvent {
        serde_json::from_value(serde_json::json!({
            "id": id, "title": title, "date": "2026-04-01", "type": "PT"
        }))
        .unwrap()
    }

    #[test]
    fn test_merge_unique_first_occurrence_wins() {
        let merged = merge_unique([
            vec![event("e1", "client copy"), event("e2", "two")],
            vec![event("e1", "authored copy")],
            vec![event("e3", "class"), event("e2", "class copy")],
        ]);
        let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
        assert_eq!(merged[0].title, "client copy");
        assert_eq!(merged[1].title, "two");
    }
}
