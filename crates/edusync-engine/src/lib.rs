//! Reconciliation engine for cross-service Learning Unit replicas.
//!
//! Services never call each other; they converge by consuming one another's
//! versioned events. This crate provides the two handler roles a service
//! wires onto its subscriptions:
//!
//! - [`OwnerReplicaHandler`]: run by member services (skills, languages) to
//!   mirror Course/Book state, diff membership snapshots and cascade
//!   back-reference updates onto the members it owns.
//! - [`MemberReplicaHandler`]: run by owner services (courses, books) to
//!   mirror Skill/Language state and prune deleted members out of the units
//!   it owns.
//!
//! Both are generic over the (owner, member) pairing, so the four services
//! share one implementation of the protocol instead of four hand-rolled
//! copies.

pub mod cascade;
pub mod config;
pub mod member_replica;
pub mod owner_replica;
mod retry;

pub use cascade::CascadePublisher;
pub use config::ReconcileConfig;
pub use member_replica::MemberReplicaHandler;
pub use owner_replica::OwnerReplicaHandler;
