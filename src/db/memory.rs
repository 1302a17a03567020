//! In-process document store.
//!
//! Backs tests and `STORE_BACKEND=memory` local runs. Atomic sections hold
//! the store lock from `begin` to commit/rollback, so they are serializable.

use crate::db::{AccountFilter, ClassFilter, EventFilter, GymStore, StoreTransaction};
use crate::error::AppError;
use crate::models::{
    Account, AuditLogEntry, BodyRecord, Gym, GymClass, ProfileHistory, ScheduledEvent,
    SessionLedgerEntry, TargetType, TrainerProfile, WorkoutLog,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    accounts: BTreeMap<String, Account>,
    gyms: BTreeMap<String, Gym>,
    classes: BTreeMap<String, GymClass>,
    events: BTreeMap<String, ScheduledEvent>,
    ledger: Vec<SessionLedgerEntry>,
    audit_log: Vec<AuditLogEntry>,
    workout_logs: Vec<WorkoutLog>,
    trainer_profiles: HashMap<String, TrainerProfile>,
    profile_history: Vec<ProfileHistory>,
    body_records: Vec<BodyRecord>,
    /// Documents written (point writes plus committed transaction writes)
    writes: usize,
    /// Commits still to be rejected as contended
    contended_commits: usize,
}

/// In-memory [`GymStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_audit_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent audit-log writes fail with an upstream error.
    pub fn set_fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Reject the next `n` section commits as if another transaction won.
    pub async fn contend_next_commits(&self, n: usize) {
        self.state.lock().await.contended_commits = n;
    }

    /// Total documents written so far.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Every ledger entry, in append order.
    pub async fn ledger_entries(&self) -> Vec<SessionLedgerEntry> {
        self.state.lock().await.ledger.clone()
    }

    /// Every audit entry, in append order.
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state.lock().await.audit_log.clone()
    }

    pub async fn workout_logs(&self) -> Vec<WorkoutLog> {
        self.state.lock().await.workout_logs.clone()
    }

    /// Insert or replace a gym outside of any atomic section.
    pub async fn insert_gym(&self, gym: Gym) {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.gyms.insert(gym.id.clone(), gym);
    }
}

fn account_matches(account: &Account, filter: &AccountFilter) -> bool {
    match filter {
        AccountFilter::InGym(gym_id) => account.gym_id.as_deref() == Some(gym_id.as_str()),
        AccountFilter::WithRole(role) => account.role == *role,
        AccountFilter::AssignedTo { trainer_email } => {
            account.trainer_email.as_deref() == Some(trainer_email.as_str())
        }
    }
}

fn event_matches(event: &ScheduledEvent, filter: &EventFilter) -> bool {
    match filter {
        EventFilter::IndividualForClient(email) => {
            event.target_type == TargetType::Individual
                && event.client_email.as_deref() == Some(email.as_str())
        }
        EventFilter::IndividualAuthoredBy(email) => {
            event.target_type == TargetType::Individual
                && event.user_email.as_deref() == Some(email.as_str())
        }
        EventFilter::ForClasses(ids) => event
            .class_id
            .as_ref()
            .is_some_and(|id| ids.contains(id)),
    }
}

#[async_trait]
impl GymStore for MemoryStore {
    async fn get_account(&self, uid: &str) -> Result<Option<Account>, AppError> {
        Ok(self.state.lock().await.accounts.get(uid).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_accounts_by_emails(&self, emails: &[String]) -> Result<Vec<Account>, AppError> {
        if emails.len() > crate::db::IN_QUERY_LIMIT {
            return Err(AppError::Validation(format!(
                "'in' query accepts at most {} values, got {}",
                crate::db::IN_QUERY_LIMIT,
                emails.len()
            )));
        }
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .filter(|a| emails.contains(&a.email))
            .cloned()
            .collect())
    }

    async fn find_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .filter(|a| account_matches(a, &filter))
            .cloned()
            .collect())
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.accounts.insert(account.uid.clone(), account.clone());
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.accounts.remove(uid);
        Ok(())
    }

    async fn list_gyms(&self) -> Result<Vec<Gym>, AppError> {
        Ok(self.state.lock().await.gyms.values().cloned().collect())
    }

    async fn get_gym(&self, id: &str) -> Result<Option<Gym>, AppError> {
        Ok(self.state.lock().await.gyms.get(id).cloned())
    }

    async fn get_class(&self, id: &str) -> Result<Option<GymClass>, AppError> {
        Ok(self.state.lock().await.classes.get(id).cloned())
    }

    async fn find_classes(&self, filter: ClassFilter) -> Result<Vec<GymClass>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .classes
            .values()
            .filter(|c| match &filter {
                ClassFilter::OwnedBy(email) => &c.trainer_email == email,
                ClassFilter::WithTrainee(email) => c.has_trainee(email),
            })
            .cloned()
            .collect())
    }

    async fn upsert_class(&self, class: &GymClass) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.classes.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Option<ScheduledEvent>, AppError> {
        Ok(self.state.lock().await.events.get(id).cloned())
    }

    async fn find_events(&self, filter: EventFilter) -> Result<Vec<ScheduledEvent>, AppError> {
        if let EventFilter::ForClasses(ids) = &filter {
            if ids.len() > crate::db::IN_QUERY_LIMIT {
                return Err(AppError::Validation(format!(
                    "'in' query accepts at most {} values, got {}",
                    crate::db::IN_QUERY_LIMIT,
                    ids.len()
                )));
            }
        }
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .filter(|e| event_matches(e, &filter))
            .cloned()
            .collect())
    }

    async fn upsert_event(&self, event: &ScheduledEvent) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn ledger_for_client(
        &self,
        email: &str,
    ) -> Result<Vec<SessionLedgerEntry>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.client_email == email)
            .cloned()
            .collect())
    }

    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(AppError::Upstream(
                "audit log collection unavailable".to_string(),
            ));
        }
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.audit_log.push(entry.clone());
        Ok(())
    }

    async fn append_workout_log(&self, log: &WorkoutLog) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.workout_logs.push(log.clone());
        Ok(())
    }

    async fn get_trainer_profile(&self, email: &str) -> Result<Option<TrainerProfile>, AppError> {
        Ok(self.state.lock().await.trainer_profiles.get(email).cloned())
    }

    async fn upsert_trainer_profile(&self, profile: &TrainerProfile) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state
            .trainer_profiles
            .insert(profile.email.clone(), profile.clone());
        Ok(())
    }

    async fn append_profile_history(&self, entry: &ProfileHistory) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.profile_history.push(entry.clone());
        Ok(())
    }

    async fn profile_history(
        &self,
        trainer_email: &str,
    ) -> Result<Vec<ProfileHistory>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .profile_history
            .iter()
            .filter(|h| h.trainer_email == trainer_email)
            .cloned()
            .collect())
    }

    async fn body_records(&self, user_email: &str) -> Result<Vec<BodyRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .body_records
            .iter()
            .filter(|r| r.user_email == user_email)
            .cloned()
            .collect())
    }

    async fn add_body_record(&self, record: &BodyRecord) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.body_records.push(record.clone());
        Ok(())
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>, AppError> {
        Ok(Box::new(MemoryTransaction {
            state: self.state.lock().await,
            staged: Vec::new(),
        }))
    }
}

enum StagedWrite {
    Event(ScheduledEvent),
    Account(Account),
    Class(GymClass),
    Gym(Gym),
    Ledger(SessionLedgerEntry),
}

/// Holds the store lock for the whole section; staged writes apply on commit.
struct MemoryTransaction<'a> {
    state: MutexGuard<'a, MemoryState>,
    staged: Vec<StagedWrite>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction<'_> {
    async fn get_event(&mut self, id: &str) -> Result<Option<ScheduledEvent>, AppError> {
        Ok(self.state.events.get(id).cloned())
    }

    async fn get_account(&mut self, uid: &str) -> Result<Option<Account>, AppError> {
        Ok(self.state.accounts.get(uid).cloned())
    }

    async fn get_class(&mut self, id: &str) -> Result<Option<GymClass>, AppError> {
        Ok(self.state.classes.get(id).cloned())
    }

    async fn get_gym(&mut self, id: &str) -> Result<Option<Gym>, AppError> {
        Ok(self.state.gyms.get(id).cloned())
    }

    async fn accounts_in_gym(&mut self, gym_id: &str) -> Result<Vec<Account>, AppError> {
        let filter = AccountFilter::InGym(gym_id.to_string());
        Ok(self
            .state
            .accounts
            .values()
            .filter(|a| account_matches(a, &filter))
            .cloned()
            .collect())
    }

    fn put_event(&mut self, event: &ScheduledEvent) -> Result<(), AppError> {
        self.staged.push(StagedWrite::Event(event.clone()));
        Ok(())
    }

    fn put_account(&mut self, account: &Account) -> Result<(), AppError> {
        self.staged.push(StagedWrite::Account(account.clone()));
        Ok(())
    }

    fn put_class(&mut self, class: &GymClass) -> Result<(), AppError> {
        self.staged.push(StagedWrite::Class(class.clone()));
        Ok(())
    }

    fn put_gym(&mut self, gym: &Gym) -> Result<(), AppError> {
        self.staged.push(StagedWrite::Gym(gym.clone()));
        Ok(())
    }

    fn append_ledger_entry(&mut self, entry: &SessionLedgerEntry) -> Result<(), AppError> {
        self.staged.push(StagedWrite::Ledger(entry.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTransaction { mut state, staged } = *self;
        if state.contended_commits > 0 {
            state.contended_commits -= 1;
            return Err(AppError::Contention(format!(
                "{} staged write(s) discarded",
                staged.len()
            )));
        }
        state.writes += staged.len();
        for write in staged {
            match write {
                StagedWrite::Event(e) => {
                    state.events.insert(e.id.clone(), e);
                }
                StagedWrite::Account(a) => {
                    state.accounts.insert(a.uid.clone(), a);
                }
                StagedWrite::Class(c) => {
                    state.classes.insert(c.id.clone(), c);
                }
                StagedWrite::Gym(g) => {
                    state.gyms.insert(g.id.clone(), g);
                }
                StagedWrite::Ledger(entry) => state.ledger.push(entry),
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        tracing::debug!(
            discarded = self.staged.len(),
            "Atomic section rolled back"
        );
    }
}
