//! EduSync Transport - durable publish/subscribe with at-least-once delivery
//!
//! Provides:
//! - The `EventTransport` / `EventHandler` contracts the engine consumes
//! - `MemoryBroker`, an in-process broker implementing the semantics the
//!   protocol needs: durable per-subject queue groups, stream splitting
//!   across group replicas, manual acknowledgment driven by handler results,
//!   and ack-wait redelivery of unacknowledged messages
//!
//! Ordering across messages is deliberately **not** guaranteed; per-id
//! sequencing is reconstructed by the version gate downstream.

pub mod contract;
pub mod memory;

pub use contract::{EventHandler, EventTransport};
pub use memory::MemoryBroker;
