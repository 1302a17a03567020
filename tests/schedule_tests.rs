// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schedules, classes and workout logs.

use gym_ledger::db::{GymStore, MemoryStore};
use gym_ledger::error::AppError;
use gym_ledger::models::{EventStatus, EventType, ExerciseRecord, TargetType};
use gym_ledger::services::schedule::{EventUpdate, NewEvent, CLASS_BULK_SOURCE};

mod common;
use common::{actor_of, class, class_pt, individual_pt, member, seed, trainer};

const COACH: &str = "coach@gym.test";
const KIM: &str = "kim@gym.test";

fn new_event(event_type: EventType, target_type: TargetType) -> NewEvent {
    NewEvent {
        title: "Session".to_string(),
        date: "2026-05-04".to_string(),
        time: "07:30".to_string(),
        event_type,
        target_type,
        client_email: None,
        class_id: None,
        trainer_email: None,
        notes: None,
        media_url: None,
        records: Vec::new(),
    }
}

#[tokio::test]
async fn test_schedule_view_merges_without_duplicates() {
    let store = MemoryStore::new();
    let kim = member("m1", KIM, 5);

    // Booked for Kim and authored by Kim: matched by two queries.
    let mut both = individual_pt("e-both", COACH, KIM);
    both.user_email = Some(KIM.to_string());
    let mut later = individual_pt("e-later", COACH, KIM);
    later.date = "2026-03-09".to_string();

    seed(
        &store,
        &[kim.clone(), trainer("t1", COACH, None)],
        &[class("c1", COACH, &[KIM]), class("c2", COACH, &[])],
        &[
            both,
            later,
            class_pt("e-class", COACH, "c1"),
            class_pt("e-other-class", COACH, "c2"),
            individual_pt("e-someone", COACH, "someone@gym.test"),
        ],
    )
    .await;
    let state = common::test_state(&store);

    let events = state.schedules.get_schedules(KIM, &actor_of(&kim)).await.unwrap();
    let mut ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    ids.sort_unstable();
    assert_eq!(ids, vec!["e-both", "e-class", "e-later"]);
    assert_eq!(events.last().map(|e| e.id.as_str()), Some("e-later"));
}

#[tokio::test]
async fn test_member_cannot_read_other_schedule() {
    let store = MemoryStore::new();
    let kim = member("m1", KIM, 5);
    seed(&store, &[kim.clone(), member("m2", "lee@gym.test", 1)], &[], &[]).await;
    let state = common::test_state(&store);

    let result = state
        .schedules
        .get_schedules("lee@gym.test", &actor_of(&kim))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_member_books_pt_for_self_only() {
    let store = MemoryStore::new();
    let kim = member("m1", KIM, 5);
    seed(&store, &[kim.clone()], &[], &[]).await;
    let state = common::test_state(&store);
    let actor = actor_of(&kim);

    let mut request = new_event(EventType::Pt, TargetType::Individual);
    request.trainer_email = Some(COACH.to_string());
    let event = state.schedules.add_schedule(request, &actor).await.unwrap();
    assert_eq!(event.client_email.as_deref(), Some(KIM));
    assert_eq!(event.trainer_email.as_deref(), Some(COACH));
    assert_eq!(event.status, EventStatus::Pending);

    let mut for_other = new_event(EventType::Pt, TargetType::Individual);
    for_other.trainer_email = Some(COACH.to_string());
    for_other.client_email = Some("lee@gym.test".to_string());
    let result = state.schedules.add_schedule(for_other, &actor).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let no_trainer = new_event(EventType::Pt, TargetType::Individual);
    let result = state.schedules.add_schedule(no_trainer, &actor).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_class_session_requires_owner() {
    let store = MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    let other = trainer("t2", "other@gym.test", None);
    seed(&store, &[coach.clone(), other.clone()], &[class("c1", COACH, &[KIM])], &[]).await;
    let state = common::test_state(&store);

    let mut request = new_event(EventType::Pt, TargetType::Class);
    request.class_id = Some("c1".to_string());
    let result = state.schedules.add_schedule(request.clone(), &actor_of(&other)).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let event = state
        .schedules
        .add_schedule(request, &actor_of(&coach))
        .await
        .unwrap();
    assert_eq!(event.class_id.as_deref(), Some("c1"));
    assert_eq!(event.trainer_email.as_deref(), Some(COACH));
}

#[tokio::test]
async fn test_completed_event_is_immutable() {
    let store = MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    let mut done = individual_pt("e1", COACH, KIM);
    done.status = EventStatus::Completed;
    seed(&store, &[coach.clone()], &[], &[done, individual_pt("e2", COACH, KIM)]).await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    let edit = state
        .schedules
        .update_schedule(
            "e1",
            EventUpdate {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
            &actor,
        )
        .await;
    assert!(matches!(edit, Err(AppError::AlreadyCompleted(_))));

    let shortcut = state
        .schedules
        .update_schedule(
            "e2",
            EventUpdate {
                status: Some(EventStatus::Completed),
                ..Default::default()
            },
            &actor,
        )
        .await;
    assert!(matches!(shortcut, Err(AppError::Validation(_))));

    let approved = state
        .schedules
        .update_schedule(
            "e2",
            EventUpdate {
                status: Some(EventStatus::Approved),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, EventStatus::Approved);
}

#[tokio::test]
async fn test_roster_edits_are_idempotent() {
    let store = MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(&store, &[coach.clone()], &[class("c1", COACH, &[])], &[]).await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    state.schedules.add_trainee_to_class("c1", KIM, &actor).await.unwrap();
    let writes = store.write_count().await;
    let class = state.schedules.add_trainee_to_class("c1", KIM, &actor).await.unwrap();
    assert_eq!(class.trainee_emails, vec![KIM.to_string()]);
    assert_eq!(store.write_count().await, writes);

    let class = state
        .schedules
        .remove_trainee_from_class("c1", KIM, &actor)
        .await
        .unwrap();
    assert!(class.trainee_emails.is_empty());
    assert!(store.get_class("c1").await.unwrap().unwrap().trainee_emails.is_empty());
}

#[tokio::test]
async fn test_class_member_reads_class_schedule() {
    let store = MemoryStore::new();
    let kim = member("m1", KIM, 1);
    let lee = member("m2", "lee@gym.test", 1);
    seed(
        &store,
        &[kim.clone(), lee.clone()],
        &[class("c1", COACH, &[KIM])],
        &[class_pt("e1", COACH, "c1")],
    )
    .await;
    let state = common::test_state(&store);

    let events = state
        .schedules
        .get_schedules_by_class("c1", &actor_of(&kim))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);

    let outsider = state
        .schedules
        .get_schedules_by_class("c1", &actor_of(&lee))
        .await;
    assert!(matches!(outsider, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_class_workout_log_fans_out() {
    let store = MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone()],
        &[class("c1", COACH, &["a@gym.test", "b@gym.test"])],
        &[class_pt("e1", COACH, "c1"), individual_pt("e2", COACH, KIM)],
    )
    .await;
    let state = common::test_state(&store);
    let records = vec![ExerciseRecord {
        name: "Squat".to_string(),
        sets: 5,
        reps: 5,
        weight: Some(80.0),
    }];

    let written = state
        .schedules
        .append_class_workout_log("e1", records.clone(), &actor_of(&coach))
        .await
        .unwrap();
    assert_eq!(written, 2);

    let logs = store.workout_logs().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.source == CLASS_BULK_SOURCE && l.schedule_id == "e1"));
    assert!(logs.iter().all(|l| l.records == records));

    let not_class = state
        .schedules
        .append_class_workout_log("e2", records, &actor_of(&coach))
        .await;
    assert!(matches!(not_class, Err(AppError::Validation(_))));
}
