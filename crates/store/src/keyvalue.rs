//! TTL-capable keystore with an atomic set-if-absent primitive.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

/// Outcome of a [`TtlStore::put_if_absent`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was absent (or expired) and the value was written.
    Inserted,
    /// A live value already exists under the key.
    Exists(Value),
}

impl PutOutcome {
    /// Returns true if the value was written by this call.
    pub fn inserted(&self) -> bool {
        matches!(self, PutOutcome::Inserted)
    }
}

/// Shared key-value store with per-key expiry.
///
/// Entries self-expire; an expired key behaves exactly like an absent
/// one and is reclaimed by the next write. No cleanup process is
/// required.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Writes `value` under `key` only if no live value exists, in a
    /// single atomic check-and-set. When two callers race on an
    /// absent key, exactly one observes [`PutOutcome::Inserted`]; the
    /// other sees [`PutOutcome::Exists`] with the written value.
    async fn put_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<PutOutcome>;

    /// Unconditionally writes `value` under `key` with a fresh expiry.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Reads the live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Removes `key`. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Converts a TTL into an absolute expiry timestamp.
pub(crate) fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
