//! Member-replica handler: an owner service's view of Skill/Language events.
//!
//! One instance reconciles one (member kind, owner kind) pair — for example
//! the courses service runs one instance for `skill:*` and one for
//! `programminglanguage:*`. Created and Updated events maintain the local
//! member replica. A Deleted event additionally prunes the member out of
//! every owned unit still referencing it, republishing each pruned owner so
//! the rest of the system converges on the shrunken set. The replica
//! tombstone is written last: while the prunes are incomplete the event stays
//! unacknowledged and a redelivery picks up where the last attempt stopped.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use edusync_core::errors::{Result, SyncError};
use edusync_core::gate::{admit, Admission};
use edusync_core::model::LearningUnit;
use edusync_core_types::{EventAction, EventEnvelope, EventPayload, UnitId, UnitKind};
use edusync_store::UnitStore;
use edusync_transport::{EventHandler, EventTransport};

use crate::config::ReconcileConfig;
use crate::retry::mutate_confirm_publish;

pub struct MemberReplicaHandler {
    member_kind: UnitKind,
    owner_kind: UnitKind,
    store: Arc<dyn UnitStore>,
    transport: Arc<dyn EventTransport>,
    config: ReconcileConfig,
}

impl MemberReplicaHandler {
    pub fn new(
        member_kind: UnitKind,
        owner_kind: UnitKind,
        store: Arc<dyn UnitStore>,
        transport: Arc<dyn EventTransport>,
        config: ReconcileConfig,
    ) -> Self {
        debug_assert!(!member_kind.is_owner() && owner_kind.is_owner());
        Self {
            member_kind,
            owner_kind,
            store,
            transport,
            config,
        }
    }

    async fn on_created(&self, payload: &EventPayload) -> Result<()> {
        let replica = LearningUnit::from_payload(self.member_kind, payload)?;
        match self.store.insert(replica).await {
            Ok(()) => {
                info!(member_id = %payload.id, kind = %self.member_kind, "member replica created");
                Ok(())
            }
            Err(SyncError::DuplicateUnit { .. }) => {
                debug!(member_id = %payload.id, "member replica already present");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn on_updated(&self, prev: &LearningUnit, payload: &EventPayload) -> Result<()> {
        self.store
            .compare_and_set(&payload.id, prev.version, &|unit| {
                unit.apply_replica_payload(payload);
                Ok(())
            })
            .await?;
        debug!(member_id = %payload.id, version = payload.version, "member replica updated");
        Ok(())
    }

    async fn on_deleted(&self, payload: &EventPayload) -> Result<()> {
        let owners = self
            .store
            .find_owners_referencing(self.owner_kind, &payload.id)
            .await?;
        let prunes = owners
            .iter()
            .map(|owner| self.prune_owner(&owner.id, &payload.id));
        try_join_all(prunes).await?;

        // Tombstone last: it is the gate's evidence the event was applied.
        self.store.soft_delete(&payload.id, payload.version).await?;
        info!(
            member_id = %payload.id,
            kind = %self.member_kind,
            pruned_owners = owners.len(),
            "member replica tombstoned"
        );
        Ok(())
    }

    /// Drop `member` from one owned unit and republish the owner. A member
    /// already absent from the set (a redelivered prune) is a no-op.
    async fn prune_owner(&self, owner_id: &UnitId, member: &UnitId) -> Result<()> {
        mutate_confirm_publish(
            &self.store,
            &self.transport,
            &self.config,
            owner_id,
            &|unit| Ok(unit.member_set_mut(self.member_kind)?.remove(member)),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for MemberReplicaHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        let subject = envelope.subject;
        let payload = envelope.data;
        let local = self.store.get_by_id(&payload.id).await?;

        match admit(local.as_ref(), subject.action(), payload.version) {
            Admission::Stale => {
                debug!(subject = %subject, unit_id = %payload.id, "stale member event ignored");
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
            (EventAction::Deleted, Some(_)) => self.on_deleted(&payload).await,
            (action, None) => Err(SyncError::InvariantViolation {
                reason: format!("{action:?} event admitted without a local record"),
            }),
        }
    }
}
