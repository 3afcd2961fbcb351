//! Order placement.
//!
//! The [`PlacementCoordinator`] turns a cart into a durable order:
//! it validates line items against the catalog, reserves stock through
//! the inventory ledger's conditional decrement, persists the order,
//! and clears the cart. Any reservation or persistence failure
//! compensates every already-reserved line in exact reverse order, so
//! a partial placement is never observable.

pub mod catalog;
pub mod coordinator;
pub mod error;

pub use catalog::{CatalogProduct, CatalogService, InMemoryCatalog};
pub use coordinator::PlacementCoordinator;
pub use error::{CheckoutError, Result};
