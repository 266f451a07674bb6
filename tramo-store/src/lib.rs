//! # Tramo Store
//!
//! `tramo-store` holds the ephemeral credentials that link the stages of a
//! multi-step authentication flow: the short-lived tokens handed from one
//! stage to the next, plus the context a later stage needs for display (the
//! pending email, the security question text).
//!
//! Records are tagged variants rather than loose string keys: each flow owns
//! exactly one record shape, and a stage can only ever read the record its
//! predecessor wrote. Entries live for one flow traversal; terminal success,
//! explicit cancellation and logout all clear them.

#![warn(missing_docs)]

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Error reported by a credential store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing storage failed.
    #[error("credential storage failed: {0}")]
    Backend(String),
}

/// Discriminant identifying one flow's pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKey {
    /// Login awaiting its second factor.
    LoginPending,
    /// Registration awaiting email verification.
    RegistrationPending,
    /// Recovery awaiting its emailed code.
    RecoveryPending,
    /// Recovery awaiting the security answer.
    SecurityPending,
    /// Recovery cleared for the password change.
    ResetReady,
}

/// One flow's pending state, token and context together.
///
/// A record is written by the stage that completes, read by the stage that
/// follows, and cleared when that stage advances. Tokens are single-purpose:
/// every hop swaps the record for a narrower one, so no token outlives the
/// stage it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum FlowRecord {
    /// Password accepted, 2FA outstanding.
    LoginPending {
        /// Token scoping the 2FA verification.
        temp_token: String,
    },
    /// Account created, email code outstanding.
    RegistrationPending {
        /// Email the verification code was sent to.
        email: String,
    },
    /// Recovery opened, emailed code outstanding.
    RecoveryPending {
        /// Token scoping the recovery-code verification.
        temp_token: String,
        /// Email under recovery, for display.
        email: String,
    },
    /// Recovery opened on the security-question path, answer outstanding.
    SecurityPending {
        /// Token scoping the answer verification.
        temp_token: String,
        /// Email under recovery, for display.
        email: String,
        /// Question text, for display only. The answer is checked remotely.
        question: String,
    },
    /// Code or link verified, password change outstanding.
    ResetReady {
        /// Token scoping the password change.
        reset_token: String,
    },
}

impl FlowRecord {
    /// The key this record is stored under.
    pub fn key(&self) -> FlowKey {
        match self {
            FlowRecord::LoginPending { .. } => FlowKey::LoginPending,
            FlowRecord::RegistrationPending { .. } => FlowKey::RegistrationPending,
            FlowRecord::RecoveryPending { .. } => FlowKey::RecoveryPending,
            FlowRecord::SecurityPending { .. } => FlowKey::SecurityPending,
            FlowRecord::ResetReady { .. } => FlowKey::ResetReady,
        }
    }
}

/// Scoped key-value persistence for in-flight flow credentials.
///
/// Implementations are expected to survive a page-reload equivalent within
/// one flow traversal, nothing longer. The in-memory [`MemoryStore`] is the
/// default; a browser-storage or file-backed implementation plugs in behind
/// the same trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store `record` under its key, replacing any previous record there.
    async fn put(&self, record: FlowRecord) -> Result<(), StoreError>;

    /// Fetch the record under `key`, if any.
    async fn get(&self, key: FlowKey) -> Result<Option<FlowRecord>, StoreError>;

    /// Remove the record under `key`. Removing an absent key is not an error.
    async fn clear(&self, key: FlowKey) -> Result<(), StoreError>;

    /// Remove every flow record. Called on logout and terminal successes so
    /// no stale token can leak into an unrelated later flow.
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<FlowKey, FlowRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put(&self, record: FlowRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.key(), record);
        Ok(())
    }

    async fn get(&self, key: FlowKey) -> Result<Option<FlowRecord>, StoreError> {
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn clear(&self, key: FlowKey) -> Result<(), StoreError> {
        self.records.write().await.remove(&key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = MemoryStore::new();
        store
            .put(FlowRecord::LoginPending {
                temp_token: "T1".into(),
            })
            .await
            .unwrap();

        let got = store.get(FlowKey::LoginPending).await.unwrap();
        assert_eq!(
            got,
            Some(FlowRecord::LoginPending {
                temp_token: "T1".into()
            })
        );

        store.clear(FlowKey::LoginPending).await.unwrap();
        assert_eq!(store.get(FlowKey::LoginPending).await.unwrap(), None);
        // clearing again is a no-op
        store.clear(FlowKey::LoginPending).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_previous_record() {
        let store = MemoryStore::new();
        store
            .put(FlowRecord::RecoveryPending {
                temp_token: "old".into(),
                email: "a@b.com".into(),
            })
            .await
            .unwrap();
        store
            .put(FlowRecord::RecoveryPending {
                temp_token: "new".into(),
                email: "a@b.com".into(),
            })
            .await
            .unwrap();

        match store.get(FlowKey::RecoveryPending).await.unwrap() {
            Some(FlowRecord::RecoveryPending { temp_token, .. }) => {
                assert_eq!(temp_token, "new");
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clear_all_removes_every_flow() {
        let store = MemoryStore::new();
        store
            .put(FlowRecord::LoginPending {
                temp_token: "T1".into(),
            })
            .await
            .unwrap();
        store
            .put(FlowRecord::ResetReady {
                reset_token: "R1".into(),
            })
            .await
            .unwrap();

        store.clear_all().await.unwrap();
        assert_eq!(store.get(FlowKey::LoginPending).await.unwrap(), None);
        assert_eq!(store.get(FlowKey::ResetReady).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_do_not_collide() {
        let store = MemoryStore::new();
        store
            .put(FlowRecord::SecurityPending {
                temp_token: "S1".into(),
                email: "a@b.com".into(),
                question: "first pet?".into(),
            })
            .await
            .unwrap();

        // Another flow's key sees nothing.
        assert_eq!(store.get(FlowKey::RecoveryPending).await.unwrap(), None);
        assert!(store.get(FlowKey::SecurityPending).await.unwrap().is_some());
    }

    #[test]
    fn test_record_is_tagged_by_flow() {
        let json = serde_json::to_string(&FlowRecord::ResetReady {
            reset_token: "R1".into(),
        })
        .unwrap();
        assert!(json.contains(r#""flow":"reset_ready""#));
    }
}
