// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod gym;
pub mod ledger;
pub mod profile;
pub mod schedule;

pub use account::{Account, Actor, ClientInfo, ManagerType, PermissionLevel, Privileged, Role};
pub use gym::{Gym, GymClass};
pub use ledger::{AuditAction, AuditLogEntry, LedgerAction, SessionLedgerEntry};
pub use profile::{BodyRecord, ProfileFields, ProfileHistory, TrainerProfile};
pub use schedule::{
    EventStatus, EventType, ExerciseRecord, ScheduledEvent, TargetType, WorkoutLog,
};

/// A record stored as one document and keyed by its document ID.
///
/// Documents written by other clients may leave the key out of their body.
/// Readers then take it from the document name.
pub trait Document {
    /// Set the key from the document ID unless the body already carried one.
    fn fill_document_id(&mut self, id: String);
}

macro_rules! keyed_by {
    ($($ty:ty => $field:ident),+ $(,)?) => {
        $(
            impl Document for $ty {
                fn fill_document_id(&mut self, id: String) {
                    if self.$field.is_empty() {
                        self.$field = id;
                    }
                }
            }
        )+
    };
}

keyed_by! {
    Account => uid,
    Gym => id,
    GymClass => id,
    ScheduledEvent => id,
    WorkoutLog => id,
    SessionLedgerEntry => id,
    AuditLogEntry => id,
    TrainerProfile => email,
    ProfileHistory => id,
    BodyRecord => id,
}
