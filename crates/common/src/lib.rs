//! Shared types used across the checkout platform crates.

pub mod types;

pub use types::{Money, OrderId, ProductId, UserId};
