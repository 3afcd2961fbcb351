//! The idempotency guard.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use store::{PutOutcome, TtlStore};

use crate::fingerprint::fingerprint;

/// Outcome of an atomic check-and-store on an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// First sighting; the key is now reserved.
    New,
    /// The key was already recorded; carries the stored value.
    Duplicate(Value),
    /// The backing store could not be reached. Callers fail open:
    /// they proceed without dedupe rather than refusing the request.
    Unavailable,
}

/// Result of running an operation through
/// [`IdempotencyGuard::execute_idempotent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution<T> {
    /// The operation ran in this call.
    Fresh(T),
    /// A previous call already ran the operation; this is its stored
    /// result.
    Cached(T),
    /// The key is reserved but no result is stored yet; another
    /// caller is mid-flight. The operation was not run.
    InFlight,
}

impl<T> Execution<T> {
    /// Returns true if the result came from the store rather than
    /// from running the operation.
    pub fn from_cache(&self) -> bool {
        matches!(self, Execution::Cached(_))
    }

    /// Returns the result value, if the operation ran or was cached.
    pub fn value(&self) -> Option<&T> {
        match self {
            Execution::Fresh(value) | Execution::Cached(value) => Some(value),
            Execution::InFlight => None,
        }
    }
}

/// Makes an arbitrary operation at-most-once per logical key within a
/// bounded time window.
///
/// The whole correctness contract rests on the backing store's
/// [`TtlStore::put_if_absent`] being a single atomic check-and-set:
/// of two callers racing on an absent key, exactly one observes
/// "absent" and writes, and the other observes the write.
#[derive(Clone)]
pub struct IdempotencyGuard<K: TtlStore> {
    store: K,
}

impl<K: TtlStore> IdempotencyGuard<K> {
    /// Creates a guard over the given keystore.
    pub fn new(store: K) -> Self {
        Self { store }
    }

    /// Computes the key for an operation and its parameters.
    pub fn key(operation: &str, params: &Value) -> String {
        fingerprint(operation, params)
    }

    /// Atomically records `value` under `key` unless a live record
    /// already exists.
    pub async fn check_and_store(&self, key: &str, value: Value, ttl: Duration) -> GuardOutcome {
        match self.store.put_if_absent(key, value, ttl).await {
            Ok(PutOutcome::Inserted) => {
                metrics::counter!("idempotency_miss_total").increment(1);
                GuardOutcome::New
            }
            Ok(PutOutcome::Exists(stored)) => {
                metrics::counter!("idempotency_hit_total").increment(1);
                GuardOutcome::Duplicate(stored)
            }
            Err(err) => {
                metrics::counter!("idempotency_fail_open_total").increment(1);
                tracing::warn!(key, error = %err, "idempotency store unreachable, failing open");
                GuardOutcome::Unavailable
            }
        }
    }

    /// Runs `operation` at most once for the given parameters.
    ///
    /// A duplicate invocation returns the stored result as
    /// [`Execution::Cached`] without running `f`. The result is
    /// stored only when `f` succeeds; a failing attempt releases the
    /// reservation so the caller may retry. When the keystore is
    /// unreachable, `f` runs without dedupe (fail open).
    pub async fn execute_idempotent<T, E, F, Fut>(
        &self,
        operation: &str,
        params: &Value,
        ttl: Duration,
        f: F,
    ) -> Result<Execution<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = fingerprint(operation, params);

        match self
            .check_and_store(&key, json!({ "status": "pending" }), ttl)
            .await
        {
            GuardOutcome::Duplicate(stored) => {
                if stored.get("status").and_then(Value::as_str) == Some("completed")
                    && let Some(result) = stored.get("result")
                    && let Ok(value) = serde_json::from_value::<T>(result.clone())
                {
                    return Ok(Execution::Cached(value));
                }
                // Reserved but not completed: do not run the
                // operation a second time.
                Ok(Execution::InFlight)
            }
            GuardOutcome::Unavailable => {
                let value = f().await?;
                Ok(Execution::Fresh(value))
            }
            GuardOutcome::New => match f().await {
                Ok(value) => {
                    match serde_json::to_value(&value) {
                        Ok(result) => {
                            let envelope = json!({ "status": "completed", "result": result });
                            if let Err(err) = self.store.put(&key, envelope, ttl).await {
                                tracing::warn!(key, error = %err, "failed to store idempotent result");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(key, error = %err, "idempotent result not serializable");
                        }
                    }
                    Ok(Execution::Fresh(value))
                }
                Err(err) => {
                    if let Err(remove_err) = self.store.remove(&key).await {
                        tracing::warn!(key, error = %remove_err, "failed to release reservation");
                    }
                    Err(err)
                }
            },
        }
    }

    /// Overwrites the record under `key`, refreshing its expiry.
    ///
    /// Used to confirm a reservation with its final outcome.
    pub async fn confirm(&self, key: &str, value: Value, ttl: Duration) {
        if let Err(err) = self.store.put(key, value, ttl).await {
            tracing::warn!(key, error = %err, "failed to confirm idempotency key");
        }
    }

    /// Forcibly removes a key, making the operation runnable again.
    pub async fn invalidate(&self, key: &str) {
        if let Err(err) = self.store.remove(key).await {
            tracing::warn!(key, error = %err, "failed to invalidate idempotency key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use store::{MemoryStore, StoreError};

    const TTL: Duration = Duration::from_secs(60);

    macro_rules! counted {
        ($calls:expr) => {{
            let calls = $calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, StoreError>(42)
            }
        }};
    }

    #[tokio::test]
    async fn repeated_execution_runs_the_operation_once() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));
        let params = json!({"order": "o-1", "amount": 100});

        let first = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();
        let second = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.from_cache());
        assert!(second.from_cache());
        assert_eq!(first.value(), Some(&42));
        assert_eq!(second.value(), Some(&42));
    }

    #[tokio::test]
    async fn parameter_order_does_not_defeat_dedupe() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));

        guard
            .execute_idempotent(
                "settle",
                &json!({"a": 1, "b": 2}),
                TTL,
                counted!(calls),
            )
            .await
            .unwrap();
        let second = guard
            .execute_idempotent(
                "settle",
                &json!({"b": 2, "a": 1}),
                TTL,
                counted!(calls),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(second.from_cache());
    }

    #[tokio::test]
    async fn failed_attempts_remain_retryable() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));
        let params = json!({"order": "o-2"});

        let failing = {
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, StoreError>(StoreError::Unavailable("downstream".to_string()))
            }
        };
        let result = guard
            .execute_idempotent("settle", &params, TTL, failing)
            .await;
        assert!(result.is_err());

        // The failure released the reservation; a retry runs the
        // operation again and succeeds.
        let retry = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!retry.from_cache());
        assert_eq!(retry.value(), Some(&42));
    }

    #[tokio::test]
    async fn pending_reservation_is_not_rerun() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));
        let params = json!({"order": "o-3"});

        let key = IdempotencyGuard::<MemoryStore>::key("settle", &params);
        let outcome = guard
            .check_and_store(&key, json!({"status": "pending"}), TTL)
            .await;
        assert_eq!(outcome, GuardOutcome::New);

        let result = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();
        assert!(matches!(result, Execution::<u32>::InFlight));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        let store = MemoryStore::new();
        store.set_keystore_unavailable(true).await;
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));
        let params = json!({"order": "o-4"});

        let first = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();
        let second = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();

        // No dedupe while degraded, but every call still succeeds.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!first.from_cache());
        assert!(!second.from_cache());
    }

    #[tokio::test]
    async fn invalidate_reopens_the_key() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);
        let calls = Arc::new(AtomicU32::new(0));
        let params = json!({"order": "o-5"});

        guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();
        guard
            .invalidate(&IdempotencyGuard::<MemoryStore>::key("settle", &params))
            .await;
        let rerun = guard
            .execute_idempotent("settle", &params, TTL, counted!(calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!rerun.from_cache());
    }

    #[tokio::test]
    async fn check_and_store_reports_duplicates_with_the_stored_value() {
        let store = MemoryStore::new();
        let guard = IdempotencyGuard::new(store);

        let first = guard
            .check_and_store("evt", json!({"seq": 1}), TTL)
            .await;
        assert_eq!(first, GuardOutcome::New);

        let second = guard
            .check_and_store("evt", json!({"seq": 2}), TTL)
            .await;
        assert_eq!(second, GuardOutcome::Duplicate(json!({"seq": 1})));
    }
}
