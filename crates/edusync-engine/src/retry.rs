//! Retried, confirmed, published unit mutation.
//!
//! Every side effect the engine performs on a neighboring record follows the
//! same shape: read the current record, skip tombstones, mutate under
//! compare-and-set, confirm the new version landed, publish the record's
//! `updated` event. Conflicts are retried with backoff up to the configured
//! budget; anything past the budget is handed back to the transport.

use std::sync::Arc;

use tracing::{debug, trace};

use edusync_core::errors::{Result, SyncError};
use edusync_core::model::LearningUnit;
use edusync_core_types::{EventAction, EventEnvelope, UnitId};
use edusync_store::UnitStore;
use edusync_transport::EventTransport;

use crate::config::ReconcileConfig;

/// Mutation that reports whether it changed anything. Returning `false` means
/// the record is already in the target state and no write or event is needed,
/// which is what makes redelivered cascades idempotent.
pub(crate) type CheckedMutation<'a> = &'a (dyn Fn(&mut LearningUnit) -> Result<bool> + Send + Sync);

/// Apply `mutate` to the active record `id`, confirm the bumped version, and
/// publish the record's full snapshot as an `updated` event.
///
/// Returns the confirmed record, or `None` when the write was skipped: the
/// record is tombstoned, or `mutate` reported the target state already holds.
/// A missing record is an error — with at-least-once delivery the record's
/// `created` event may simply not have been processed yet, so the caller's
/// event is redelivered rather than dropped.
pub(crate) async fn mutate_confirm_publish(
    store: &Arc<dyn UnitStore>,
    transport: &Arc<dyn EventTransport>,
    config: &ReconcileConfig,
    id: &UnitId,
    mutate: CheckedMutation<'_>,
) -> Result<Option<LearningUnit>> {
    let mut attempt: u32 = 0;
    loop {
        let current = store
            .get_by_id(id)
            .await?
            .ok_or_else(|| SyncError::UnitNotFound {
                unit_id: id.clone(),
            })?;
        if !current.is_active() {
            trace!(unit_id = %id, "skipping tombstoned unit");
            return Ok(None);
        }

        // Probe on a copy first: an already-applied mutation must not bump
        // the version or emit a spurious event.
        let mut probe = current.clone();
        if !mutate(&mut probe)? {
            trace!(unit_id = %id, "unit already in target state");
            return Ok(None);
        }

        let expected = current.version;
        match store
            .compare_and_set(id, expected, &|unit| mutate(unit).map(|_| ()))
            .await
        {
            Ok(_) => {
                let confirmed = store
                    .get_by_id_and_version(id, expected + 1)
                    .await?
                    .ok_or_else(|| SyncError::Persistence {
                        reason: format!("unit {id} missing at version {} after write", expected + 1),
                    })?;
                transport
                    .publish(EventEnvelope::new(
                        confirmed.kind().subject(EventAction::Updated),
                        confirmed.payload(),
                    ))
                    .await?;
                return Ok(Some(confirmed));
            }
            Err(err @ SyncError::StoreConflict { .. }) => {
                if attempt >= config.cas_retry_budget {
                    debug!(unit_id = %id, attempts = attempt, "retry budget exhausted");
                    return Err(err);
                }
                attempt += 1;
                tokio::time::sleep(config.cas_retry_backoff * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}
