//! Core types shared across EduSync crates
//!
//! This crate provides the foundational wire-level and identity types used by
//! every other crate in the workspace:
//!
//! - **Identity**: `UnitId`, the normalized opaque identifier for a Learning Unit
//! - **Classification**: `UnitKind` and `UnitStatus`
//! - **Event surface**: `Subject`, `EventAction`, `EventPayload`, `EventEnvelope`

pub mod envelope;
pub mod id;
pub mod subject;

pub use envelope::{EventEnvelope, EventPayload};
pub use id::UnitId;
pub use subject::{EventAction, Subject, UnitKind, UnitStatus};
