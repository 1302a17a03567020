// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use gym_ledger::config::Config;
use gym_ledger::db::{FirestoreDb, GymStore, MemoryStore};
use gym_ledger::models::{
    Account, Actor, EventStatus, EventType, GymClass, ManagerType, PermissionLevel, Role,
    ScheduledEvent, TargetType,
};
use gym_ledger::routes::create_router;
use gym_ledger::services::FirebaseTokenVerifier;
use gym_ledger::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// HS256 secret accepted by the test verifier.
pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const TEST_KID: &str = "test-kid";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Verifier that trusts tokens signed with [`TEST_SECRET`].
#[allow(dead_code)]
pub fn test_verifier(config: &Config) -> Arc<FirebaseTokenVerifier> {
    Arc::new(
        FirebaseTokenVerifier::new_with_static_key(
            config,
            TEST_KID,
            Algorithm::HS256,
            DecodingKey::from_secret(TEST_SECRET),
        )
        .expect("static verifier"),
    )
}

/// Create a test app over a fresh memory store.
/// Returns the router, the shared state and the store for seeding.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryStore) {
    let config = Config::test_default();
    let store = MemoryStore::new();
    let verifier = test_verifier(&config);
    let state = Arc::new(AppState::new(config, Arc::new(store.clone()), verifier));
    (create_router(state.clone()), state, store)
}

/// Services wired onto `store`, without the router.
#[allow(dead_code)]
pub fn test_state(store: &MemoryStore) -> Arc<AppState> {
    let config = Config::test_default();
    let verifier = test_verifier(&config);
    Arc::new(AppState::new(config, Arc::new(store.clone()), verifier))
}

/// `Authorization` header value for a Firebase-style ID token.
#[allow(dead_code)]
pub fn bearer_token(uid: &str, email: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        iss: &'a str,
        aud: &'a str,
        sub: &'a str,
        email: &'a str,
        exp: u64,
        iat: u64,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        iss: "https://securetoken.google.com/test-project",
        aud: "test-project",
        sub: uid,
        email,
        exp: now + 3600,
        iat: now,
    };
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    let jwt = encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap();
    format!("Bearer {jwt}")
}

// ─── Fixtures ────────────────────────────────────────────────

#[allow(dead_code)]
pub fn member(uid: &str, email: &str, remaining: i64) -> Account {
    let mut account = Account::default_member(uid, email);
    account.lvl = PermissionLevel::Member.lvl();
    account.remaining_sessions = remaining;
    account
}

#[allow(dead_code)]
pub fn trainer(uid: &str, email: &str, gym_id: Option<&str>) -> Account {
    let mut account = Account::default_member(uid, email);
    account.role = Role::Trainer;
    account.lvl = PermissionLevel::Trainer.lvl();
    account.gym_id = gym_id.map(str::to_string);
    account
}

#[allow(dead_code)]
pub fn manager(uid: &str, email: &str, gym_id: &str, manager_type: ManagerType) -> Account {
    let mut account = trainer(uid, email, Some(gym_id));
    account.role = Role::Manager;
    account.lvl = PermissionLevel::Manager.lvl();
    account.manager_type = Some(manager_type);
    account
}

#[allow(dead_code)]
pub fn site_admin(uid: &str, email: &str) -> Account {
    let mut account = Account::default_member(uid, email);
    account.role = Role::SiteAdmin;
    account.lvl = PermissionLevel::SiteAdmin.lvl();
    account
}

#[allow(dead_code)]
pub fn actor_of(account: &Account) -> Actor {
    Actor::from(account)
}

/// Pending PT session for one client.
#[allow(dead_code)]
pub fn individual_pt(id: &str, trainer_email: &str, client_email: &str) -> ScheduledEvent {
    ScheduledEvent {
        id: id.to_string(),
        title: "Leg day".to_string(),
        date: "2026-03-02".to_string(),
        time: "18:00".to_string(),
        event_type: EventType::Pt,
        target_type: TargetType::Individual,
        status: EventStatus::Pending,
        client_email: Some(client_email.to_string()),
        user_email: Some(trainer_email.to_string()),
        class_id: None,
        trainer_email: Some(trainer_email.to_string()),
        notes: None,
        media_url: None,
        signature_url: None,
        completed_at: None,
        records: Vec::new(),
        created_at: "2026-03-01T09:00:00Z".to_string(),
    }
}

/// Pending PT session for a whole class.
#[allow(dead_code)]
pub fn class_pt(id: &str, trainer_email: &str, class_id: &str) -> ScheduledEvent {
    ScheduledEvent {
        target_type: TargetType::Class,
        client_email: None,
        class_id: Some(class_id.to_string()),
        title: "Circuit".to_string(),
        ..individual_pt(id, trainer_email, "")
    }
}

#[allow(dead_code)]
pub fn class(id: &str, trainer_email: &str, trainees: &[&str]) -> GymClass {
    GymClass {
        id: id.to_string(),
        name: format!("Class {id}"),
        trainer_email: trainer_email.to_string(),
        trainee_emails: trainees.iter().map(|e| e.to_string()).collect(),
        gym_id: None,
        created_at: "2026-03-01T09:00:00Z".to_string(),
    }
}

/// Seed accounts, classes and events through plain point writes.
#[allow(dead_code)]
pub async fn seed(
    store: &MemoryStore,
    accounts: &[Account],
    classes: &[GymClass],
    events: &[ScheduledEvent],
) {
    for account in accounts {
        store.upsert_account(account).await.unwrap();
    }
    for class in classes {
        store.upsert_class(class).await.unwrap();
    }
    for event in events {
        store.upsert_event(event).await.unwrap();
    }
}
