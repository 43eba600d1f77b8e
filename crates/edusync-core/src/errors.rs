use edusync_core_types::{UnitId, UnitKind};
use thiserror::Error;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// What the subscription loop should do with the delivery that produced an
/// error.
///
/// Processing is fully asynchronous, so no error is surfaced to an external
/// caller; the only decision left at the handler boundary is whether the
/// message is finished (acknowledge) or should come back (redeliver after the
/// broker's ack-wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge the delivery; the event is a no-op or can never succeed.
    Ack,
    /// Leave the delivery unacknowledged; the broker retries after ack-wait.
    Redeliver,
}

/// Canonical error taxonomy for the reconciliation path.
///
/// Each variant maps to exactly one [`Disposition`]: terminal conditions
/// (stale replays, malformed payloads) acknowledge so they cannot poison the
/// subscription; transient conditions (gaps, CAS conflicts, store failures)
/// redeliver so the at-least-once contract retries them.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Event's target version is at or behind local state; replaying it would
    /// regress the record. Acknowledged as a no-op.
    #[error("stale event for unit {unit_id}: local version {local_version}, event version {event_version}")]
    StaleEvent {
        unit_id: UnitId,
        local_version: u64,
        event_version: u64,
    },

    /// A predecessor event has not arrived yet. Left unacknowledged so the
    /// broker redelivers once the gap has filled.
    #[error("version gap for unit {unit_id}: local version {local_version:?}, event version {event_version}")]
    GapEvent {
        unit_id: UnitId,
        local_version: Option<u64>,
        event_version: u64,
    },

    /// Compare-and-set lost a race on the record's version. Retryable.
    #[error("compare-and-set conflict on unit {unit_id}: expected version {expected_version}")]
    StoreConflict {
        unit_id: UnitId,
        expected_version: u64,
    },

    /// Transient store I/O failure. Retryable.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Payload is missing fields the protocol requires. Acknowledged so a
    /// malformed message cannot loop forever (there is no dead-letter queue).
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// No record for the referenced id.
    #[error("unit not found: {unit_id}")]
    UnitNotFound { unit_id: UnitId },

    /// The record exists but is tombstoned.
    #[error("unit was deleted: {unit_id}")]
    UnitDeleted { unit_id: UnitId },

    /// A record with this id already exists.
    #[error("unit already exists: {unit_id}")]
    DuplicateUnit { unit_id: UnitId },

    /// Name collides with an active unit of the same kind.
    #[error("{kind} name already in use: {name}")]
    DuplicateName { kind: UnitKind, name: String },

    /// Operation does not apply to this unit's variant (e.g. setting a
    /// back-reference on an owner kind).
    #[error("operation not valid for {kind} unit {unit_id}")]
    WrongVariant { kind: UnitKind, unit_id: UnitId },

    /// Outbound publish or subscription plumbing failed. Retryable.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// Payload could not be decoded.
    #[error("serialization failure: {reason}")]
    Serialization { reason: String },

    /// Persistent store rejected or corrupted a write. Retryable.
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },
}

impl SyncError {
    /// The delivery disposition for this error at the handler boundary.
    pub fn disposition(&self) -> Disposition {
        match self {
            SyncError::StaleEvent { .. }
            | SyncError::InvariantViolation { .. }
            | SyncError::UnitDeleted { .. }
            | SyncError::DuplicateUnit { .. }
            | SyncError::DuplicateName { .. }
            | SyncError::WrongVariant { .. }
            | SyncError::Serialization { .. } => Disposition::Ack,

            SyncError::GapEvent { .. }
            | SyncError::StoreConflict { .. }
            | SyncError::StoreUnavailable { .. }
            | SyncError::UnitNotFound { .. }
            | SyncError::Transport { .. }
            | SyncError::Persistence { .. } => Disposition::Redeliver,
        }
    }

    /// Shorthand for transient-vs-terminal checks in retry loops.
    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Redeliver
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization {
            reason: err.to_string(),
        }
    }
}
