//! At-most-once execution over the TTL keystore.
//!
//! An operation is identified by a deterministic fingerprint of its
//! name and parameters. The guard reserves the fingerprint with a
//! single atomic set-if-absent, so a repeated invocation — a webhook
//! redelivery, a double-submitted checkout — observes the reservation
//! and is answered from the stored result instead of re-running.
//!
//! When the backing store is unreachable the guard fails open:
//! keeping checkout and settlement available outweighs perfect dedupe
//! for the duration of an outage.

pub mod fingerprint;
pub mod guard;

pub use fingerprint::fingerprint;
pub use guard::{Execution, GuardOutcome, IdempotencyGuard};
