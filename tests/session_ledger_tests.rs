// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session completion and balance adjustment against the memory store.

use gym_ledger::db::GymStore;
use gym_ledger::error::AppError;
use gym_ledger::models::{EventStatus, EventType, LedgerAction};

mod common;
use common::{actor_of, class, class_pt, individual_pt, member, seed, site_admin, trainer};

const COACH: &str = "coach@gym.test";

#[tokio::test]
async fn test_individual_completion_deducts_one_credit() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    let state = common::test_state(&store);

    let report = state
        .ledger
        .complete_session("e1", Some("https://sig.test/e1.png".to_string()), &actor_of(&coach))
        .await
        .unwrap();

    assert_eq!(report.deducted.len(), 1);
    assert_eq!(report.deducted[0].remaining_sessions, 2);
    assert!(report.skipped.is_empty());

    let kim = store.get_account("m1").await.unwrap().unwrap();
    assert_eq!(kim.remaining_sessions, 2);

    let event = store.get_event("e1").await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Completed);
    assert_eq!(event.signature_url.as_deref(), Some("https://sig.test/e1.png"));
    assert_eq!(event.completed_at.as_deref(), Some(report.completed_at.as_str()));

    let ledger = store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].client_email, "kim@gym.test");
    assert_eq!(ledger[0].action, LedgerAction::Deduct);
    assert_eq!(ledger[0].amount_changed, -1);
    assert_eq!(ledger[0].remaining_sessions, 2);
    assert_eq!(ledger[0].reason, "PT Session Completed: Leg day");
}

#[tokio::test]
async fn test_class_completion_skips_empty_balances() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[
            coach.clone(),
            member("a", "a@gym.test", 0),
            member("b", "b@gym.test", 1),
        ],
        &[class("c1", COACH, &["a@gym.test", "b@gym.test"])],
        &[class_pt("e1", COACH, "c1")],
    )
    .await;
    let state = common::test_state(&store);

    let report = state
        .ledger
        .complete_session("e1", None, &actor_of(&coach))
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["a@gym.test".to_string()]);
    assert_eq!(report.deducted.len(), 1);
    assert_eq!(report.deducted[0].email, "b@gym.test");

    assert_eq!(store.get_account("a").await.unwrap().unwrap().remaining_sessions, 0);
    assert_eq!(store.get_account("b").await.unwrap().unwrap().remaining_sessions, 0);

    let ledger = store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].client_email, "b@gym.test");
}

#[tokio::test]
async fn test_personal_entry_completes_without_deduction() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    let mut event = individual_pt("e1", COACH, "kim@gym.test");
    event.event_type = EventType::Personal;
    seed(&store, &[coach.clone(), member("m1", "kim@gym.test", 3)], &[], &[event]).await;
    let state = common::test_state(&store);

    let report = state
        .ledger
        .complete_session("e1", None, &actor_of(&coach))
        .await
        .unwrap();

    assert!(report.deducted.is_empty());
    assert_eq!(store.get_account("m1").await.unwrap().unwrap().remaining_sessions, 3);
    assert!(store.ledger_entries().await.is_empty());
    assert!(store.get_event("e1").await.unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn test_second_completion_is_rejected_without_writes() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    state.ledger.complete_session("e1", None, &actor).await.unwrap();
    let writes = store.write_count().await;

    let second = state.ledger.complete_session("e1", None, &actor).await;
    assert!(matches!(second, Err(AppError::AlreadyCompleted(_))));
    assert_eq!(store.write_count().await, writes);
    assert_eq!(store.get_account("m1").await.unwrap().unwrap().remaining_sessions, 2);
    assert_eq!(store.ledger_entries().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_completions_deduct_once() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    let (first, second) = tokio::join!(
        state.ledger.complete_session("e1", None, &actor),
        state.ledger.complete_session("e1", None, &actor),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        matches!(first, Err(AppError::AlreadyCompleted(_)))
            || matches!(second, Err(AppError::AlreadyCompleted(_)))
    );
    assert_eq!(store.get_account("m1").await.unwrap().unwrap().remaining_sessions, 2);
    assert_eq!(store.ledger_entries().await.len(), 1);
}

#[tokio::test]
async fn test_contended_loser_sees_already_completed() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    store.contend_next_commits(1).await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    let (first, second) = tokio::join!(
        state.ledger.complete_session("e1", None, &actor),
        state.ledger.complete_session("e1", None, &actor),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        matches!(first, Err(AppError::AlreadyCompleted(_)))
            || matches!(second, Err(AppError::AlreadyCompleted(_)))
    );
    assert_eq!(store.ledger_entries().await.len(), 1);
}

#[tokio::test]
async fn test_contended_completion_is_retried() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    store.contend_next_commits(2).await;
    let state = common::test_state(&store);

    let report = state
        .ledger
        .complete_session("e1", None, &actor_of(&coach))
        .await
        .unwrap();

    assert_eq!(report.deducted.len(), 1);
    assert_eq!(store.get_account("m1").await.unwrap().unwrap().remaining_sessions, 2);
    assert_eq!(store.ledger_entries().await.len(), 1);
}

#[tokio::test]
async fn test_class_without_trainees_completes_without_deduction() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(
        &store,
        &[coach.clone(), member("m1", "kim@gym.test", 3)],
        &[class("c1", COACH, &[])],
        &[class_pt("e1", COACH, "c1"), class_pt("e2", COACH, "gone")],
    )
    .await;
    let state = common::test_state(&store);
    let actor = actor_of(&coach);

    for event_id in ["e1", "e2"] {
        let report = state
            .ledger
            .complete_session(event_id, None, &actor)
            .await
            .unwrap();
        assert!(report.deducted.is_empty());
        assert!(report.skipped.is_empty());
        let event = store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
    }

    assert!(store.ledger_entries().await.is_empty());
    assert_eq!(store.get_account("m1").await.unwrap().unwrap().remaining_sessions, 3);
}

#[tokio::test]
async fn test_other_trainer_may_not_complete() {
    let store = gym_ledger::db::MemoryStore::new();
    let other = trainer("t2", "other@gym.test", None);
    seed(
        &store,
        &[other.clone(), member("m1", "kim@gym.test", 3)],
        &[],
        &[individual_pt("e1", COACH, "kim@gym.test")],
    )
    .await;
    let state = common::test_state(&store);

    let result = state
        .ledger
        .complete_session("e1", None, &actor_of(&other))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(!store.get_event("e1").await.unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn test_missing_event_is_not_found() {
    let store = gym_ledger::db::MemoryStore::new();
    let admin = site_admin("root", "root@gym.test");
    let state = common::test_state(&store);

    let result = state
        .ledger
        .complete_session("nope", None, &actor_of(&admin))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_manual_adjustment_records_signed_delta() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    let mut kim = member("m1", "kim@gym.test", 2);
    kim.trainer_email = Some(COACH.to_string());
    seed(&store, &[coach.clone(), kim], &[], &[]).await;
    let state = common::test_state(&store);

    let info = state
        .ledger
        .update_client_sessions("m1", 10, Some("2026-12-31".to_string()), &actor_of(&coach))
        .await
        .unwrap();
    assert_eq!(info.remaining_sessions, 10);
    assert_eq!(info.expiration_date.as_deref(), Some("2026-12-31"));

    let ledger = store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].action, LedgerAction::Adjust);
    assert_eq!(ledger[0].amount_changed, 8);
    assert_eq!(ledger[0].reason, format!("Manual adjustment by {COACH}"));

    let negative = state
        .ledger
        .update_client_sessions("m1", -1, None, &actor_of(&coach))
        .await;
    assert!(matches!(negative, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_unassigned_trainer_may_not_adjust() {
    let store = gym_ledger::db::MemoryStore::new();
    let coach = trainer("t1", COACH, None);
    seed(&store, &[coach.clone(), member("m1", "kim@gym.test", 2)], &[], &[]).await;
    let state = common::test_state(&store);

    let result = state
        .ledger
        .update_client_sessions("m1", 5, None, &actor_of(&coach))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(store.ledger_entries().await.is_empty());
}
