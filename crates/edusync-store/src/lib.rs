//! EduSync Store - per-service persistence of Learning Units
//!
//! Provides:
//! - The `UnitStore` contract every reconciliation component consumes:
//!   get-by-id, get-by-id-and-version, compare-and-set mutation, soft-delete,
//!   active-name lookup, owner back-index
//! - `MemoryStore`, the in-process implementation used by tests and the demo
//! - `SqliteStore`, a durable implementation on an embedded SQLite database
//!
//! Version monotonicity is enforced here: every mutation goes through
//! compare-and-set keyed on the record's current version, and the store — not
//! the caller — performs the increment.

pub mod contract;
pub mod memory;
pub mod sqlite;

pub use contract::{UnitMutation, UnitStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
