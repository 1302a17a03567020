//! Best-effort audit trail for privileged mutations.

use crate::db::{new_document_id, GymStore};
use crate::models::{Account, Actor, AuditAction, AuditLogEntry};
use crate::time_utils::now_rfc3339;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Appends audit entries after a mutation has committed.
///
/// A failed append is logged and swallowed: the committed mutation stands.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn GymStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn GymStore>) -> Self {
        Self { store }
    }

    /// Record `action` against `target`. Returns whether the entry was stored.
    pub async fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        target: Option<&Account>,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        let entry = AuditLogEntry {
            id: new_document_id(),
            actor_email: actor.email.clone(),
            action,
            target_uid: target.map(|t| t.uid.clone()),
            target_email: target.map(|t| t.email.clone()),
            metadata,
            created_at: now_rfc3339(),
        };

        match self.store.append_audit_log(&entry).await {
            Ok(()) => {
                tracing::info!(
                    actor = %entry.actor_email,
                    action = ?action,
                    target_uid = entry.target_uid.as_deref().unwrap_or("-"),
                    "Audit entry recorded"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    actor = %entry.actor_email,
                    action = ?action,
                    "Audit log write failed; mutation kept"
                );
                false
            }
        }
    }
}

/// Build audit metadata from key/value pairs.
pub fn metadata<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
