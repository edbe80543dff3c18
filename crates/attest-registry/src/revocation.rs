use std::sync::Mutex;

use attest_core::RevocationEntry;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Result of a revocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "entry", rename_all = "camelCase")]
pub enum RevokeOutcome {
    Revoked(RevocationEntry),
    /// The credential was revoked earlier; the original entry is returned.
    AlreadyRevoked(RevocationEntry),
}

impl RevokeOutcome {
    /// The entry now on record.
    pub fn entry(&self) -> &RevocationEntry {
        match self {
            Self::Revoked(entry) | Self::AlreadyRevoked(entry) => entry,
        }
    }

    /// True if this call did the revoking.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Revoked(_))
    }
}

/// Append-only revocation log. An entry, once written, is never replaced.
#[derive(Debug, Default)]
pub struct RevocationLog {
    by_id: DashMap<String, RevocationEntry>,
    ordered: Mutex<Vec<RevocationEntry>>,
}

impl RevocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a revocation. The first reason wins; later calls get the existing entry.
    pub fn revoke(&self, credential_id: &str, reason: &str, at: DateTime<Utc>) -> RevokeOutcome {
        match self.by_id.entry(credential_id.to_string()) {
            Entry::Occupied(existing) => RevokeOutcome::AlreadyRevoked(existing.get().clone()),
            Entry::Vacant(slot) => {
                let entry = RevocationEntry {
                    credential_id: credential_id.to_string(),
                    revoked_at: at,
                    reason: reason.to_string(),
                };
                // Appended while the slot is held so the log order matches insertion.
                self.ordered
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(entry.clone());
                slot.insert(entry.clone());
                RevokeOutcome::Revoked(entry)
            }
        }
    }

    pub fn get(&self, credential_id: &str) -> Option<RevocationEntry> {
        self.by_id.get(credential_id).map(|e| e.clone())
    }

    pub fn is_revoked(&self, credential_id: &str) -> bool {
        self.by_id.contains_key(credential_id)
    }

    /// Every entry in revocation order.
    pub fn entries(&self) -> Vec<RevocationEntry> {
        self.ordered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
