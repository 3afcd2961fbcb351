//! Data model for order placement and payment settlement.
//!
//! Holds the order aggregate and its status state machine, the cart
//! line items that feed placement, and the inventory record whose
//! stock count the storage layer guards.

pub mod cart;
pub mod error;
pub mod inventory;
pub mod order;

pub use cart::CartItem;
pub use error::OrderError;
pub use inventory::InventoryRecord;
pub use order::{LineItem, NewOrder, Order, OrderStatus};
