//! Service assembly for the four Learning Unit microservices.
//!
//! Each service is a [`UnitService`] bound to one [`UnitKind`]: skills,
//! courses, books and programming languages. Construction takes the store
//! and transport as trait objects, so tests and the demo binary run the whole
//! mesh in-process while a deployment would bind real infrastructure.
//!
//! [`UnitKind`]: edusync_core_types::UnitKind

pub mod service;

pub use service::{UnitDraft, UnitService};
