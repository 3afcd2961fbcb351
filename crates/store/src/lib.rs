//! Storage layer for the checkout platform.
//!
//! Exposes four narrow persistence traits — the inventory ledger, the
//! order store, the cart store, and a TTL keystore — with an in-memory
//! implementation for tests and single-node runs and a PostgreSQL
//! implementation for production. Stock non-negativity and the
//! conditional decrement are enforced by the storage layer itself,
//! never by application-side read-then-write sequences.

pub mod carts;
pub mod error;
pub mod inventory;
pub mod keyvalue;
pub mod memory;
pub mod orders;
pub mod postgres;

pub use carts::CartStore;
pub use error::{Result, StoreError};
pub use inventory::InventoryLedger;
pub use keyvalue::{PutOutcome, TtlStore};
pub use memory::MemoryStore;
pub use orders::OrderStore;
pub use postgres::PostgresStore;
