//! Database layer.
//!
//! Services talk to the document store through [`GymStore`]. Production uses
//! Firestore; tests and local development use the in-memory store.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    Account, AuditLogEntry, BodyRecord, Gym, GymClass, ProfileHistory, Role, ScheduledEvent,
    SessionLedgerEntry, TrainerProfile, WorkoutLog,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const GYMS: &str = "gyms";
    pub const CLASSES: &str = "classes";
    pub const SCHEDULES: &str = "schedules";
    /// Session-credit ledger
    pub const TICKET_HISTORY: &str = "ticketHistory";
    pub const ADMIN_AUDIT_LOGS: &str = "adminAuditLogs";
    pub const WORKOUT_LOGS: &str = "workoutLogs";
    /// Keyed by trainer email
    pub const TRAINER_PROFILES: &str = "trainerProfiles";
    pub const PROFILE_HISTORY: &str = "profileHistory";
    pub const BODY_PROFILES: &str = "bodyProfiles";
}

/// Maximum number of values in a single "value in set" query.
pub const IN_QUERY_LIMIT: usize = 10;

/// Fresh document ID for append-only records and new entities.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Single-field account queries (no composite indexes required).
#[derive(Debug, Clone, PartialEq)]
pub enum AccountFilter {
    InGym(String),
    WithRole(Role),
    AssignedTo { trainer_email: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassFilter {
    OwnedBy(String),
    WithTrainee(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventFilter {
    /// INDIVIDUAL events where the email is the client
    IndividualForClient(String),
    /// INDIVIDUAL events authored by the email
    IndividualAuthoredBy(String),
    /// Events of any of these classes (at most [`IN_QUERY_LIMIT`])
    ForClasses(Vec<String>),
}

/// Narrow interface to the document store.
///
/// Point writes here are single-document and unconditional. Anything that
/// conditions a write on a read goes through [`GymStore::begin`].
#[async_trait]
pub trait GymStore: Send + Sync {
    // ─── Accounts ────────────────────────────────────────────────
    async fn get_account(&self, uid: &str) -> Result<Option<Account>, AppError>;
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;
    /// One "value in set" lookup. Callers chunk to [`IN_QUERY_LIMIT`].
    async fn find_accounts_by_emails(&self, emails: &[String]) -> Result<Vec<Account>, AppError>;
    async fn find_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, AppError>;
    async fn upsert_account(&self, account: &Account) -> Result<(), AppError>;
    async fn delete_account(&self, uid: &str) -> Result<(), AppError>;

    // ─── Gyms & Classes ──────────────────────────────────────────
    async fn list_gyms(&self) -> Result<Vec<Gym>, AppError>;
    async fn get_gym(&self, id: &str) -> Result<Option<Gym>, AppError>;
    async fn get_class(&self, id: &str) -> Result<Option<GymClass>, AppError>;
    async fn find_classes(&self, filter: ClassFilter) -> Result<Vec<GymClass>, AppError>;
    async fn upsert_class(&self, class: &GymClass) -> Result<(), AppError>;

    // ─── Schedules ───────────────────────────────────────────────
    async fn get_event(&self, id: &str) -> Result<Option<ScheduledEvent>, AppError>;
    async fn find_events(&self, filter: EventFilter) -> Result<Vec<ScheduledEvent>, AppError>;
    async fn upsert_event(&self, event: &ScheduledEvent) -> Result<(), AppError>;

    // ─── Append-only records ─────────────────────────────────────
    async fn ledger_for_client(&self, email: &str)
        -> Result<Vec<SessionLedgerEntry>, AppError>;
    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError>;
    async fn append_workout_log(&self, log: &WorkoutLog) -> Result<(), AppError>;

    // ─── Profiles ────────────────────────────────────────────────
    async fn get_trainer_profile(&self, email: &str) -> Result<Option<TrainerProfile>, AppError>;
    async fn upsert_trainer_profile(&self, profile: &TrainerProfile) -> Result<(), AppError>;
    async fn append_profile_history(&self, entry: &ProfileHistory) -> Result<(), AppError>;
    async fn profile_history(&self, trainer_email: &str)
        -> Result<Vec<ProfileHistory>, AppError>;
    async fn body_records(&self, user_email: &str) -> Result<Vec<BodyRecord>, AppError>;
    async fn add_body_record(&self, record: &BodyRecord) -> Result<(), AppError>;

    // ─── Atomic sections ─────────────────────────────────────────
    /// Open a transaction. Reads through it register for conflict
    /// detection; writes are staged until commit.
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>, AppError>;
}

/// Backend half of an atomic section. Use through [`AtomicSection`].
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_event(&mut self, id: &str) -> Result<Option<ScheduledEvent>, AppError>;
    async fn get_account(&mut self, uid: &str) -> Result<Option<Account>, AppError>;
    async fn get_class(&mut self, id: &str) -> Result<Option<GymClass>, AppError>;
    async fn get_gym(&mut self, id: &str) -> Result<Option<Gym>, AppError>;
    /// Non-indexed scan of a gym's accounts.
    async fn accounts_in_gym(&mut self, gym_id: &str) -> Result<Vec<Account>, AppError>;

    fn put_event(&mut self, event: &ScheduledEvent) -> Result<(), AppError>;
    fn put_account(&mut self, account: &Account) -> Result<(), AppError>;
    fn put_class(&mut self, class: &GymClass) -> Result<(), AppError>;
    fn put_gym(&mut self, gym: &Gym) -> Result<(), AppError>;
    fn append_ledger_entry(&mut self, entry: &SessionLedgerEntry) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
    async fn rollback(self: Box<Self>);
}

/// An open atomic section with reads-before-writes enforced.
///
/// Every read must happen before the first staged write; a read after a write
/// is rejected without touching the store.
pub struct AtomicSection<'a> {
    tx: Box<dyn StoreTransaction + 'a>,
    staged_writes: usize,
}

impl<'a> AtomicSection<'a> {
    pub async fn begin(store: &'a dyn GymStore) -> Result<Self, AppError> {
        Ok(Self {
            tx: store.begin().await?,
            staged_writes: 0,
        })
    }

    fn ensure_read_phase(&self) -> Result<(), AppError> {
        if self.staged_writes > 0 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "read issued after {} staged write(s) in atomic section",
                self.staged_writes
            )));
        }
        Ok(())
    }

    pub async fn get_event(&mut self, id: &str) -> Result<Option<ScheduledEvent>, AppError> {
        self.ensure_read_phase()?;
        self.tx.get_event(id).await
    }

    pub async fn get_account(&mut self, uid: &str) -> Result<Option<Account>, AppError> {
        self.ensure_read_phase()?;
        self.tx.get_account(uid).await
    }

    pub async fn get_class(&mut self, id: &str) -> Result<Option<GymClass>, AppError> {
        self.ensure_read_phase()?;
        self.tx.get_class(id).await
    }

    pub async fn get_gym(&mut self, id: &str) -> Result<Option<Gym>, AppError> {
        self.ensure_read_phase()?;
        self.tx.get_gym(id).await
    }

    pub async fn accounts_in_gym(&mut self, gym_id: &str) -> Result<Vec<Account>, AppError> {
        self.ensure_read_phase()?;
        self.tx.accounts_in_gym(gym_id).await
    }

    pub fn put_event(&mut self, event: &ScheduledEvent) -> Result<(), AppError> {
        self.staged_writes += 1;
        self.tx.put_event(event)
    }

    pub fn put_account(&mut self, account: &Account) -> Result<(), AppError> {
        self.staged_writes += 1;
        self.tx.put_account(account)
    }

    pub fn put_class(&mut self, class: &GymClass) -> Result<(), AppError> {
        self.staged_writes += 1;
        self.tx.put_class(class)
    }

    pub fn put_gym(&mut self, gym: &Gym) -> Result<(), AppError> {
        self.staged_writes += 1;
        self.tx.put_gym(gym)
    }

    pub fn append_ledger_entry(&mut self, entry: &SessionLedgerEntry) -> Result<(), AppError> {
        self.staged_writes += 1;
        self.tx.append_ledger_entry(entry)
    }

    /// Commit all staged writes. Returns the number of writes committed.
    pub async fn commit(self) -> Result<usize, AppError> {
        let count = self.staged_writes;
        self.tx.commit().await?;
        Ok(count)
    }

    /// Abandon the section; nothing staged is applied.
    pub async fn abort(self) {
        self.tx.rollback().await;
    }

    /// Commit when `result` is `Ok`, abort otherwise. Returns the value and
    /// the number of writes committed.
    pub async fn commit_if_ok<T>(self, result: Result<T, AppError>) -> Result<(T, usize), AppError> {
        match result {
            Ok(value) => {
                let writes = self.commit().await?;
                Ok((value, writes))
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    precondition = e.is_precondition_failure(),
                    "Atomic section aborted"
                );
                self.abort().await;
                Err(e)
            }
        }
    }
}

/// Attempts at an atomic section before contention is reported to the caller.
pub const MAX_SECTION_ATTEMPTS: u32 = 5;

/// Run `$body` in a fresh atomic section bound to `$section`, then commit on
/// `Ok` and abort on `Err` as [`AtomicSection::commit_if_ok`] does.
///
/// When the store aborts the section for contention, the whole section is run
/// again from its first read, up to [`MAX_SECTION_ATTEMPTS`] times. `$body` is
/// evaluated once per attempt.
macro_rules! atomically {
    ($store:expr, |$section:ident| $body:expr) => {{
        let mut attempt: u32 = 1;
        loop {
            let outcome = match $crate::db::AtomicSection::begin($store).await {
                Ok(mut $section) => {
                    let result = $body;
                    $section.commit_if_ok(result).await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Err(e) if e.is_retryable() && attempt < $crate::db::MAX_SECTION_ATTEMPTS => {
                    tracing::debug!(attempt, error = %e, "Atomic section contended, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(
                        20 * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                outcome => break outcome,
            }
        }
    }};
}
pub(crate) use atomically;

/// Split values into chunks accepted by a "value in set" query.
pub fn in_query_chunks(values: &[String]) -> impl Iterator<Item = &[String]> {
    values.chunks(IN_QUERY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_query_chunks_respect_limit() {
        let values: Vec<String> = (0..23).map(|i| format!("user{i}@gym.test")).collect();
        let sizes: Vec<usize> = in_query_chunks(&values).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(new_document_id(), new_document_id());
    }
}
