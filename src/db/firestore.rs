// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`GymStore`].
//!
//! Queries are single-field so no composite indexes are needed. Atomic
//! sections map onto Firestore transactions: reads go through a client
//! bound to the transaction ID, writes are added to the transaction and
//! sent on commit.

use crate::db::{collections, AccountFilter, ClassFilter, EventFilter, GymStore, StoreTransaction};
use crate::error::AppError;
use crate::models::{
    Account, AuditLogEntry, BodyRecord, Document, Gym, GymClass, ProfileHistory, ScheduledEvent,
    SessionLedgerEntry, TrainerProfile, WorkoutLog,
};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn upstream(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Upstream(format!("{context}: {e}"))
}

/// Like [`upstream`], but an ABORTED (or otherwise retryable) transaction
/// becomes [`AppError::Contention`] so the section is run again.
fn transaction_error(context: &str, e: FirestoreError) -> AppError {
    match &e {
        FirestoreError::DatabaseError(db_err) if db_err.retry_possible => {
            AppError::Contention(format!("{context}: {e}"))
        }
        _ => upstream(context, e),
    }
}

/// A document body plus the ID the firestore crate reads from its name.
#[derive(Deserialize)]
struct Stored<T> {
    #[serde(rename = "_firestore_id", default)]
    document_id: Option<String>,
    #[serde(flatten)]
    body: T,
}

impl<T: Document> Stored<T> {
    fn into_document(self) -> T {
        let mut body = self.body;
        if let Some(id) = self.document_id {
            body.fill_document_id(id);
        }
        body
    }
}

fn documents<T: Document>(stored: Vec<Stored<T>>) -> Vec<T> {
    stored.into_iter().map(Stored::into_document).collect()
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| upstream("Failed to connect to Firestore", e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJvd25lciJ9."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| upstream("Failed to connect to Firestore Emulator", e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Offline client for tests. Every operation fails with an upstream error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Upstream("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic helpers ─────────────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: Document + DeserializeOwned + Send,
    {
        let stored: Option<Stored<T>> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| upstream(collection, e))?;
        Ok(stored.map(Stored::into_document))
    }

    async fn put_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _written: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| upstream(collection, e))?;
        Ok(())
    }

    async fn query_eq<T>(
        &self,
        collection: &str,
        field: &'static str,
        value: String,
    ) -> Result<Vec<T>, AppError>
    where
        T: Document + DeserializeOwned + Send,
    {
        let stored: Vec<Stored<T>> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| upstream(collection, e))?;
        Ok(documents(stored))
    }
}

#[async_trait]
impl GymStore for FirestoreDb {
    // ─── Accounts ────────────────────────────────────────────────

    async fn get_account(&self, uid: &str) -> Result<Option<Account>, AppError> {
        self.get_doc(collections::USERS, uid).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let mut found: Vec<Account> = self
            .query_eq(collections::USERS, "email", email.to_string())
            .await?;
        if found.len() > 1 {
            tracing::warn!(email, count = found.len(), "Multiple accounts share an email");
        }
        Ok(found.pop())
    }

    async fn find_accounts_by_emails(&self, emails: &[String]) -> Result<Vec<Account>, AppError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        let emails = emails.to_vec();
        let stored: Vec<Stored<Account>> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").is_in(emails.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| upstream(collections::USERS, e))?;
        Ok(documents(stored))
    }

    async fn find_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, AppError> {
        match filter {
            AccountFilter::InGym(gym_id) => {
                self.query_eq(collections::USERS, "gymId", gym_id).await
            }
            AccountFilter::WithRole(role) => {
                let role = serde_json::to_value(role)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                self.query_eq(collections::USERS, "role", role).await
            }
            AccountFilter::AssignedTo { trainer_email } => {
                self.query_eq(collections::USERS, "trainerEmail", trainer_email)
                    .await
            }
        }
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), AppError> {
        self.put_doc(collections::USERS, &account.uid, account).await
    }

    async fn delete_account(&self, uid: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| upstream(collections::USERS, e))?;
        Ok(())
    }

    // ─── Gyms & Classes ──────────────────────────────────────────

    async fn list_gyms(&self) -> Result<Vec<Gym>, AppError> {
        let stored: Vec<Stored<Gym>> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GYMS)
            .obj()
            .query()
            .await
            .map_err(|e| upstream(collections::GYMS, e))?;
        Ok(documents(stored))
    }

    async fn get_gym(&self, id: &str) -> Result<Option<Gym>, AppError> {
        self.get_doc(collections::GYMS, id).await
    }

    async fn get_class(&self, id: &str) -> Result<Option<GymClass>, AppError> {
        self.get_doc(collections::CLASSES, id).await
    }

    async fn find_classes(&self, filter: ClassFilter) -> Result<Vec<GymClass>, AppError> {
        match filter {
            ClassFilter::OwnedBy(email) => {
                self.query_eq(collections::CLASSES, "trainerEmail", email)
                    .await
            }
            ClassFilter::WithTrainee(email) => {
                let stored: Vec<Stored<GymClass>> = self
                    .get_client()?
                    .fluent()
                    .select()
                    .from(collections::CLASSES)
                    .filter(move |q| {
                        q.for_all([q.field("traineeEmails").array_contains(email.clone())])
                    })
                    .obj()
                    .query()
                    .await
                    .map_err(|e| upstream(collections::CLASSES, e))?;
                Ok(documents(stored))
            }
        }
    }

    async fn upsert_class(&self, class: &GymClass) -> Result<(), AppError> {
        self.put_doc(collections::CLASSES, &class.id, class).await
    }

    // ─── Schedules ───────────────────────────────────────────────

    async fn get_event(&self, id: &str) -> Result<Option<ScheduledEvent>, AppError> {
        self.get_doc(collections::SCHEDULES, id).await
    }

    async fn find_events(&self, filter: EventFilter) -> Result<Vec<ScheduledEvent>, AppError> {
        // Single-field queries; the target type is checked here.
        let (events, individual_only): (Vec<ScheduledEvent>, bool) = match filter {
            EventFilter::IndividualForClient(email) => (
                self.query_eq(collections::SCHEDULES, "clientEmail", email)
                    .await?,
                true,
            ),
            EventFilter::IndividualAuthoredBy(email) => (
                self.query_eq(collections::SCHEDULES, "userEmail", email)
                    .await?,
                true,
            ),
            EventFilter::ForClasses(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let stored: Vec<Stored<ScheduledEvent>> = self
                    .get_client()?
                    .fluent()
                    .select()
                    .from(collections::SCHEDULES)
                    .filter(move |q| q.for_all([q.field("classId").is_in(ids.clone())]))
                    .obj()
                    .query()
                    .await
                    .map_err(|e| upstream(collections::SCHEDULES, e))?;
                (documents(stored), false)
            }
        };

        Ok(if individual_only {
            events
                .into_iter()
                .filter(|e| e.target_type == crate::models::TargetType::Individual)
                .collect()
        } else {
            events
        })
    }

    async fn upsert_event(&self, event: &ScheduledEvent) -> Result<(), AppError> {
        self.put_doc(collections::SCHEDULES, &event.id, event).await
    }

    // ─── Append-only records ─────────────────────────────────────

    async fn ledger_for_client(
        &self,
        email: &str,
    ) -> Result<Vec<SessionLedgerEntry>, AppError> {
        self.query_eq(collections::TICKET_HISTORY, "clientEmail", email.to_string())
            .await
    }

    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        self.put_doc(collections::ADMIN_AUDIT_LOGS, &entry.id, entry)
            .await
    }

    async fn append_workout_log(&self, log: &WorkoutLog) -> Result<(), AppError> {
        self.put_doc(collections::WORKOUT_LOGS, &log.id, log).await
    }

    // ─── Profiles ────────────────────────────────────────────────

    async fn get_trainer_profile(&self, email: &str) -> Result<Option<TrainerProfile>, AppError> {
        self.get_doc(collections::TRAINER_PROFILES, email).await
    }

    async fn upsert_trainer_profile(&self, profile: &TrainerProfile) -> Result<(), AppError> {
        self.put_doc(collections::TRAINER_PROFILES, &profile.email, profile)
            .await
    }

    async fn append_profile_history(&self, entry: &ProfileHistory) -> Result<(), AppError> {
        self.put_doc(collections::PROFILE_HISTORY, &entry.id, entry)
            .await
    }

    async fn profile_history(
        &self,
        trainer_email: &str,
    ) -> Result<Vec<ProfileHistory>, AppError> {
        self.query_eq(
            collections::PROFILE_HISTORY,
            "trainerEmail",
            trainer_email.to_string(),
        )
        .await
    }

    async fn body_records(&self, user_email: &str) -> Result<Vec<BodyRecord>, AppError> {
        self.query_eq(collections::BODY_PROFILES, "userEmail", user_email.to_string())
            .await
    }

    async fn add_body_record(&self, record: &BodyRecord) -> Result<(), AppError> {
        self.put_doc(collections::BODY_PROFILES, &record.id, record)
            .await
    }

    // ─── Atomic sections ─────────────────────────────────────────

    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>, AppError> {
        let client = self.get_client()?;
        let tx = client
            .begin_transaction()
            .await
            .map_err(|e| transaction_error("Failed to begin transaction", e))?;

        // Reads through this client register for conflict detection.
        let reader = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(tx.transaction_id().clone()),
        );

        Ok(Box::new(FirestoreTransaction { client, reader, tx }))
    }
}

/// A Firestore transaction seen through [`StoreTransaction`].
struct FirestoreTransaction<'a> {
    client: &'a firestore::FirestoreDb,
    reader: firestore::FirestoreDb,
    tx: firestore::FirestoreTransaction<'a>,
}

impl FirestoreTransaction<'_> {
    async fn read<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: Document + DeserializeOwned + Send,
    {
        let stored: Option<Stored<T>> = self
            .reader
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| transaction_error("Failed to read in transaction", e))?;
        Ok(stored.map(Stored::into_document))
    }

    fn stage<T>(&mut self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        self.client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .add_to_transaction(&mut self.tx)
            .map_err(|e| upstream("Failed to add write to transaction", e))?;
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for FirestoreTransaction<'_> {
    async fn get_event(&mut self, id: &str) -> Result<Option<ScheduledEvent>, AppError> {
        self.read(collections::SCHEDULES, id).await
    }

    async fn get_account(&mut self, uid: &str) -> Result<Option<Account>, AppError> {
        self.read(collections::USERS, uid).await
    }

    async fn get_class(&mut self, id: &str) -> Result<Option<GymClass>, AppError> {
        self.read(collections::CLASSES, id).await
    }

    async fn get_gym(&mut self, id: &str) -> Result<Option<Gym>, AppError> {
        self.read(collections::GYMS, id).await
    }

    async fn accounts_in_gym(&mut self, gym_id: &str) -> Result<Vec<Account>, AppError> {
        let gym_id = gym_id.to_string();
        let stored: Vec<Stored<Account>> = self
            .reader
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("gymId").eq(gym_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| transaction_error("Failed to query in transaction", e))?;
        Ok(documents(stored))
    }

    fn put_event(&mut self, event: &ScheduledEvent) -> Result<(), AppError> {
        self.stage(collections::SCHEDULES, &event.id, event)
    }

    fn put_account(&mut self, account: &Account) -> Result<(), AppError> {
        self.stage(collections::USERS, &account.uid, account)
    }

    fn put_class(&mut self, class: &GymClass) -> Result<(), AppError> {
        self.stage(collections::CLASSES, &class.id, class)
    }

    fn put_gym(&mut self, gym: &Gym) -> Result<(), AppError> {
        self.stage(collections::GYMS, &gym.id, gym)
    }

    fn append_ledger_entry(&mut self, entry: &SessionLedgerEntry) -> Result<(), AppError> {
        self.stage(collections::TICKET_HISTORY, &entry.id, entry)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .map_err(|e| transaction_error("Transaction commit failed", e))?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "Transaction rollback failed");
        }
    }
}
