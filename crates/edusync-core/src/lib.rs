//! EduSync Core - domain model and pure reconciliation logic
//!
//! This crate provides the pieces of the reconciliation protocol that are
//! pure functions over local state:
//! - `LearningUnit` model with its four variants and back-reference accessors
//! - Version gate deciding whether an inbound event applies to local state
//! - Relationship differ computing added/removed/unchanged member sets
//! - The `SyncError` taxonomy with per-variant delivery dispositions
//!
//! Everything that does I/O (stores, transports, handlers) lives in the
//! sibling crates and consumes these types.

pub mod diff;
pub mod errors;
pub mod gate;
pub mod model;

pub use diff::{diff, diff_opt, RelationshipDiff};
pub use errors::{Disposition, Result, SyncError};
pub use gate::{admit, Admission};
pub use model::{LearningUnit, MemberLinks, OwnerLinks, OwnerSlot, UnitBody};
