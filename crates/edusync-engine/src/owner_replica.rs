//! Owner-replica handler: a member service's view of Course/Book events.
//!
//! One instance reconciles one (owner slot, member kind) pair — for example
//! the skills service runs one instance for `course:*` and one for `book:*`.
//! Each admitted owner event is turned into a membership diff between the
//! locally replicated member set and the event's full snapshot, and the diff
//! is cascaded onto the affected member records before the owner replica
//! itself is written. The replica write is the commit marker: if the cascade
//! fails partway, the event stays unacknowledged and the redelivered batch
//! recomputes the same diff.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use edusync_core::diff::diff;
use edusync_core::errors::{Result, SyncError};
use edusync_core::gate::{admit, Admission};
use edusync_core::model::{LearningUnit, OwnerSlot};
use edusync_core_types::{EventAction, EventEnvelope, EventPayload, UnitId, UnitKind};
use edusync_store::UnitStore;
use edusync_transport::{EventHandler, EventTransport};

use crate::cascade::CascadePublisher;
use crate::config::ReconcileConfig;

pub struct OwnerReplicaHandler {
    slot: OwnerSlot,
    member_kind: UnitKind,
    store: Arc<dyn UnitStore>,
    cascade: CascadePublisher,
}

impl OwnerReplicaHandler {
    pub fn new(
        slot: OwnerSlot,
        member_kind: UnitKind,
        store: Arc<dyn UnitStore>,
        transport: Arc<dyn EventTransport>,
        config: ReconcileConfig,
    ) -> Self {
        debug_assert!(!member_kind.is_owner());
        let cascade = CascadePublisher::new(Arc::clone(&store), transport, config);
        Self {
            slot,
            member_kind,
            store,
            cascade,
        }
    }

    /// The member set of `self.member_kind` carried by the event snapshot.
    /// Absent means empty, never "unchanged".
    fn payload_members(&self, payload: &EventPayload) -> BTreeSet<UnitId> {
        match self.member_kind {
            UnitKind::Skill => payload.skill_ids.clone().unwrap_or_default(),
            UnitKind::ProgrammingLanguage => payload.language_ids.clone().unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    async fn on_created(&self, payload: &EventPayload) -> Result<()> {
        let replica = LearningUnit::from_payload(self.slot.kind(), payload)?;
        let members = self.payload_members(payload);

        // Cascade before the insert: the replica's existence is what marks
        // the event applied, so a half-finished cascade is re-run on
        // redelivery instead of being acked away.
        self.cascade
            .apply(self.slot, &payload.id, &diff(&BTreeSet::new(), &members))
            .await?;

        match self.store.insert(replica).await {
            Ok(()) => {
                info!(owner_id = %payload.id, kind = %self.slot.kind(), "owner replica created");
                Ok(())
            }
            // A concurrent replica of this service got there first.
            Err(SyncError::DuplicateUnit { .. }) => {
                debug!(owner_id = %payload.id, "owner replica already present");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn on_updated(&self, prev: &LearningUnit, payload: &EventPayload) -> Result<()> {
        let old_members = prev.member_set(self.member_kind)?.clone();
        let new_members = self.payload_members(payload);

        self.cascade
            .apply(self.slot, &payload.id, &diff(&old_members, &new_members))
            .await?;

        self.store
            .compare_and_set(&payload.id, prev.version, &|unit| {
                unit.apply_replica_payload(payload);
                Ok(())
            })
            .await?;
        debug!(owner_id = %payload.id, version = payload.version, "owner replica updated");
        Ok(())
    }

    async fn on_deleted(&self, prev: &LearningUnit, payload: &EventPayload) -> Result<()> {
        let old_members = prev.member_set(self.member_kind)?.clone();

        self.cascade
            .apply(self.slot, &payload.id, &diff(&old_members, &BTreeSet::new()))
            .await?;

        self.store.soft_delete(&payload.id, payload.version).await?;
        info!(owner_id = %payload.id, kind = %self.slot.kind(), "owner replica tombstoned");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for OwnerReplicaHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        let subject = envelope.subject;
        let payload = envelope.data;
        let local = self.store.get_by_id(&payload.id).await?;

        match admit(local.as_ref(), subject.action(), payload.version) {
            Admission::Stale => {
                debug!(subject = %subject, unit_id = %payload.id, "stale owner event ignored");
                return Ok(());
            }
            Admission::Gap => {
                return Err(SyncError::GapEvent {
                    unit_id: payload.id.clone(),
                    local_version: local.as_ref().map(|unit| unit.version),
                    event_version: payload.version,
                });
            }
            Admission::Apply => {}
        }

        match (subject.action(), local) {
            (EventAction::Created, _) => self.on_created(&payload).await,
            (EventAction::Updated, Some(prev)) => self.on_updated(&prev, &payload).await,
            (EventAction::Deleted, Some(prev)) => self.on_deleted(&prev, &payload).await,
            (action, None) => Err(SyncError::InvariantViolation {
                reason: format!("{action:?} event admitted without a local record"),
            }),
        }
    }
}
