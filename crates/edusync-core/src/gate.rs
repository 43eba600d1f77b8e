//! Version gate: decides whether an inbound event applies to local state.
//!
//! The transport guarantees at-least-once delivery but no ordering, so per-id
//! sequencing is reconstructed here by pure version comparison. The gate has
//! no side effects; handlers act on its verdict.

use edusync_core_types::EventAction;

use crate::model::LearningUnit;

/// Verdict for one (local record, inbound event) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The event is the immediate successor of local state: apply it.
    Apply,
    /// The event is at or behind local state: acknowledge without mutation.
    Stale,
    /// A predecessor event is missing: leave unacknowledged for redelivery.
    Gap,
}

/// Gate an inbound event against the (possibly absent) local record.
///
/// - `Created` is admitted on first sighting of the id; a redelivered Created
///   is `Stale`, which makes creation idempotent.
/// - `Updated(v)` is admitted only onto a record currently at `v - 1`.
/// - `Deleted(v)` carries the version the record had when deletion was
///   requested, so it is admitted only onto an active record at exactly `v`.
pub fn admit(local: Option<&LearningUnit>, action: EventAction, event_version: u64) -> Admission {
    match action {
        EventAction::Created => match local {
            None => Admission::Apply,
            Some(_) => Admission::Stale,
        },
        EventAction::Updated => match local {
            None => Admission::Gap,
            Some(unit) if unit.version + 1 == event_version => Admission::Apply,
            Some(unit) if unit.version >= event_version => Admission::Stale,
            Some(_) => Admission::Gap,
        },
        EventAction::Deleted => match local {
            None => Admission::Gap,
            Some(unit) if !unit.is_active() => Admission::Stale,
            Some(unit) if unit.version == event_version => Admission::Apply,
            Some(unit) if unit.version > event_version => Admission::Stale,
            Some(_) => Admission::Gap,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LearningUnit;
    use edusync_core_types::{UnitId, UnitKind, UnitStatus};

    fn unit_at(version: u64) -> LearningUnit {
        let mut unit = LearningUnit::new(UnitKind::Skill, UnitId::from_raw("s1"), "Recursion");
        unit.version = version;
        unit
    }

    #[test]
    fn test_created_admitted_on_first_sighting() {
        assert_eq!(admit(None, EventAction::Created, 1), Admission::Apply);
    }

    #[test]
    fn test_created_redelivery_is_stale() {
        let unit = unit_at(1);
        assert_eq!(
            admit(Some(&unit), EventAction::Created, 1),
            Admission::Stale
        );
    }

    #[test]
    fn test_updated_requires_immediate_predecessor() {
        let unit = unit_at(2);
        assert_eq!(admit(Some(&unit), EventAction::Updated, 3), Admission::Apply);
        assert_eq!(admit(Some(&unit), EventAction::Updated, 2), Admission::Stale);
        assert_eq!(admit(Some(&unit), EventAction::Updated, 1), Admission::Stale);
        assert_eq!(admit(Some(&unit), EventAction::Updated, 4), Admission::Gap);
        assert_eq!(admit(Some(&unit), EventAction::Updated, 9), Admission::Gap);
    }

    #[test]
    fn test_updated_without_local_record_is_gap() {
        assert_eq!(admit(None, EventAction::Updated, 2), Admission::Gap);
    }

    #[test]
    fn test_update_gating_holds_for_all_versions() {
        // Monotonic gating: an Updated(v) applies only at local v-1, v > 1.
        for v in 2..64u64 {
            for local in 1..64u64 {
                let unit = unit_at(local);
                let verdict = admit(Some(&unit), EventAction::Updated, v);
                if local + 1 == v {
                    assert_eq!(verdict, Admission::Apply);
                } else {
                    assert_ne!(verdict, Admission::Apply);
                }
            }
        }
    }

    #[test]
    fn test_deleted_matches_deletion_time_version() {
        let unit = unit_at(3);
        assert_eq!(admit(Some(&unit), EventAction::Deleted, 3), Admission::Apply);
        assert_eq!(admit(Some(&unit), EventAction::Deleted, 2), Admission::Stale);
        assert_eq!(admit(Some(&unit), EventAction::Deleted, 4), Admission::Gap);
        assert_eq!(admit(None, EventAction::Deleted, 3), Admission::Gap);
    }

    #[test]
    fn test_deleted_on_tombstone_is_stale() {
        let mut unit = unit_at(4);
        unit.status = UnitStatus::Inactive;
        assert_eq!(admit(Some(&unit), EventAction::Deleted, 4), Admission::Stale);
    }
}
