//! Relationship cascade: fan a membership diff out to the affected members.
//!
//! When an owner replica's member set changes, every added member must start
//! pointing its back-reference at the owner and every removed member must
//! stop. Each member write is an independent versioned update that publishes
//! the member's own `updated` event, so downstream replicas of the member
//! converge through the normal version gate.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use edusync_core::diff::RelationshipDiff;
use edusync_core::errors::Result;
use edusync_core::model::OwnerSlot;
use edusync_core_types::UnitId;
use edusync_store::UnitStore;
use edusync_transport::EventTransport;

use crate::config::ReconcileConfig;
use crate::retry::mutate_confirm_publish;

/// Applies membership diffs to member back-references.
///
/// The whole batch runs concurrently and must succeed before the inbound
/// owner event is acknowledged; a partial failure leaves the event
/// unacknowledged and the redelivered batch recomputes the same diff, where
/// already-retargeted members probe as no-ops.
pub struct CascadePublisher {
    store: Arc<dyn UnitStore>,
    transport: Arc<dyn EventTransport>,
    config: ReconcileConfig,
}

impl CascadePublisher {
    pub fn new(
        store: Arc<dyn UnitStore>,
        transport: Arc<dyn EventTransport>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Retarget every member named by `diff`: removed members get the `slot`
    /// back-reference cleared, added members get it pointed at `owner_id`.
    /// Unchanged members are never touched.
    pub async fn apply(
        &self,
        slot: OwnerSlot,
        owner_id: &UnitId,
        diff: &RelationshipDiff,
    ) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            owner_id = %owner_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "cascading membership diff"
        );
        let writes = diff
            .removed
            .iter()
            .map(|member| self.retarget(slot, member, None))
            .chain(
                diff.added
                    .iter()
                    .map(|member| self.retarget(slot, member, Some(owner_id.clone()))),
            );
        try_join_all(writes).await?;
        Ok(())
    }

    async fn retarget(
        &self,
        slot: OwnerSlot,
        member: &UnitId,
        target: Option<UnitId>,
    ) -> Result<()> {
        mutate_confirm_publish(&self.store, &self.transport, &self.config, member, &|unit| {
            if unit.back_ref(slot)? == target.as_ref() {
                return Ok(false);
            }
            unit.set_back_ref(slot, target.clone())?;
            Ok(true)
        })
        .await?;
        Ok(())
    }
}
