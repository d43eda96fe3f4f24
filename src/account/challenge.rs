//! Short-lived server-side state for the two-phase parts of the flow.
//!
//! Both MFA challenges (first factor passed, second pending) and pending
//! enrollments (secret generated, possession unproven) are explicit values
//! keyed by an opaque id with their own expiry, handed back and forth
//! between the flow controller and its caller. Expired entries are swept on
//! insert and refused on read.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A handle that has passed the password check and owes a TOTP code.
#[derive(Clone, Debug)]
pub struct MfaChallenge {
    pub account_id: Uuid,
    pub username: String,
}

/// An enrollment secret held until the user proves possession with one
/// valid code. Not yet committed to the account.
#[derive(Clone, Debug)]
pub struct PendingEnrollment {
    pub account_id: Uuid,
    pub secret_base32: String,
}

struct Entry<T> {
    value: T,
    created_at: Instant,
}

/// Mutex-guarded map of expiring values keyed by opaque ids.
pub struct ExpiringStore<T> {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, Entry<T>>>,
}

pub type ChallengeStore = ExpiringStore<MfaChallenge>;
pub type EnrollmentStore = ExpiringStore<PendingEnrollment>;

impl<T: Clone> ExpiringStore<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a value under a fresh opaque id, sweeping expired entries.
    pub async fn insert(&self, value: T) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries.insert(
            id,
            Entry {
                value,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Read a live value without consuming it. A challenge survives failed
    /// code submissions; only success or abandonment removes it.
    pub async fn get(&self, id: Uuid) -> Option<T> {
        let entries = self.entries.lock().await;
        entries
            .get(&id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Remove an entry on completion or abandonment. Removing an unknown or
    /// already-expired id is a no-op.
    pub async fn remove(&self, id: Uuid) {
        let mut entries = self.entries.lock().await;
        entries.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(name: &str) -> MfaChallenge {
        MfaChallenge {
            account_id: Uuid::new_v4(),
            username: name.to_string(),
        }
    }

    #[tokio::test]
    async fn get_does_not_consume() {
        let store = ChallengeStore::new(Duration::from_secs(60));
        let id = store.insert(challenge("alice")).await;
        assert_eq!(store.get(id).await.map(|c| c.username).as_deref(), Some("alice"));
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn remove_clears_the_entry() {
        let store = ChallengeStore::new(Duration::from_secs(60));
        let id = store.insert(challenge("alice")).await;
        store.remove(id).await;
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_refused() {
        let store = ChallengeStore::new(Duration::ZERO);
        let id = store.insert(challenge("alice")).await;
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = ChallengeStore::new(Duration::from_secs(60));
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }
}
