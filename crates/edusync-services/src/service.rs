//! Per-variant service assembly.
//!
//! One [`UnitService`] instance is one microservice: it owns the units of its
//! kind (the local write paths live here) and subscribes the reconciliation
//! handlers that keep its foreign replicas converged. Services share no state
//! and never call each other; everything crosses the event transport.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use edusync_core::errors::{Result, SyncError};
use edusync_core::model::{LearningUnit, OwnerSlot, UnitBody};
use edusync_core_types::{EventAction, EventEnvelope, EventPayload, UnitId, UnitKind};
use edusync_engine::{MemberReplicaHandler, OwnerReplicaHandler, ReconcileConfig};
use edusync_store::UnitStore;
use edusync_transport::EventTransport;

const ACTIONS: [EventAction; 3] = [
    EventAction::Created,
    EventAction::Updated,
    EventAction::Deleted,
];

/// Durable queue group name for a service's subscriptions; horizontally
/// scaled replicas of one service share the group and split the stream.
fn queue_group(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::Skill => "skills-service",
        UnitKind::Course => "courses-service",
        UnitKind::Book => "books-service",
        UnitKind::ProgrammingLanguage => "languages-service",
    }
}

/// Draft of a new unit for the create write path. Variant-specific fields
/// that do not apply to the service's kind are ignored.
#[derive(Debug, Clone, Default)]
pub struct UnitDraft {
    pub name: String,
    pub course_url: Option<String>,
    pub book_author: Option<String>,
    pub skill_ids: BTreeSet<UnitId>,
    pub language_ids: BTreeSet<UnitId>,
}

impl UnitDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One Learning Unit microservice: local writes plus replica subscriptions.
pub struct UnitService {
    kind: UnitKind,
    store: Arc<dyn UnitStore>,
    transport: Arc<dyn EventTransport>,
    config: ReconcileConfig,
}

impl UnitService {
    pub fn new(
        kind: UnitKind,
        store: Arc<dyn UnitStore>,
        transport: Arc<dyn EventTransport>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            kind,
            store,
            transport,
            config,
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Subscribe this service's reconciliation handlers.
    ///
    /// Member services (skills, languages) consume the owner subjects and run
    /// the membership cascade; owner services (courses, books) consume the
    /// member subjects and prune deleted members. All subscriptions are
    /// durable under the service's queue group.
    pub async fn start(&self) -> Result<()> {
        if self.kind.is_owner() {
            for member_kind in [UnitKind::Skill, UnitKind::ProgrammingLanguage] {
                let handler = Arc::new(MemberReplicaHandler::new(
                    member_kind,
                    self.kind,
                    Arc::clone(&self.store),
                    Arc::clone(&self.transport),
                    self.config,
                ));
                for action in ACTIONS {
                    self.transport
                        .subscribe(
                            member_kind.subject(action),
                            queue_group(self.kind),
                            handler.clone(),
                        )
                        .await?;
                }
            }
        } else {
            for slot in [OwnerSlot::Course, OwnerSlot::Book] {
                let handler = Arc::new(OwnerReplicaHandler::new(
                    slot,
                    self.kind,
                    Arc::clone(&self.store),
                    Arc::clone(&self.transport),
                    self.config,
                ));
                for action in ACTIONS {
                    self.transport
                        .subscribe(
                            slot.kind().subject(action),
                            queue_group(self.kind),
                            handler.clone(),
                        )
                        .await?;
                }
            }
        }
        info!(kind = %self.kind, queue_group = queue_group(self.kind), "service started");
        Ok(())
    }

    /// Create a unit this service owns and publish its `created` event.
    /// Names must be unique among the active units of the kind.
    pub async fn create(&self, draft: UnitDraft) -> Result<LearningUnit> {
        if let Some(existing) = self.store.find_by_name(self.kind, &draft.name).await? {
            debug!(unit_id = %existing.id, name = %draft.name, "create rejected: name in use");
            return Err(SyncError::DuplicateName {
                kind: self.kind,
                name: draft.name,
            });
        }

        let mut unit = LearningUnit::new(self.kind, UnitId::generate(), draft.name);
        match &mut unit.body {
            UnitBody::Course { links, course_url } => {
                links.skill_ids = draft.skill_ids;
                links.language_ids = draft.language_ids;
                *course_url = draft.course_url;
            }
            UnitBody::Book { links, book_author } => {
                links.skill_ids = draft.skill_ids;
                links.language_ids = draft.language_ids;
                *book_author = draft.book_author;
            }
            UnitBody::Skill { .. } | UnitBody::ProgrammingLanguage { .. } => {}
        }

        self.store.insert(unit.clone()).await?;
        self.publish(EventAction::Created, unit.payload()).await?;
        info!(kind = %self.kind, unit_id = %unit.id, name = %unit.name, "unit created");
        Ok(unit)
    }

    /// Rename an owned unit. Same active-name uniqueness rule as `create`.
    pub async fn rename(&self, id: &UnitId, new_name: &str) -> Result<LearningUnit> {
        if let Some(existing) = self.store.find_by_name(self.kind, new_name).await? {
            if existing.id != *id {
                return Err(SyncError::DuplicateName {
                    kind: self.kind,
                    name: new_name.to_string(),
                });
            }
        }
        let name = new_name.to_string();
        self.commit(id, &|unit| {
            unit.name = name.clone();
            Ok(())
        })
        .await
    }

    /// Replace one member set of an owned Course or Book; downstream, the
    /// member services diff the published snapshot and retarget the affected
    /// back-references.
    pub async fn replace_members(
        &self,
        id: &UnitId,
        member_kind: UnitKind,
        members: BTreeSet<UnitId>,
    ) -> Result<LearningUnit> {
        self.commit(id, &|unit| {
            *unit.member_set_mut(member_kind)? = members.clone();
            Ok(())
        })
        .await
    }

    /// Tombstone an owned unit and publish its `deleted` event carrying the
    /// version the record had when deletion was requested.
    pub async fn soft_delete(&self, id: &UnitId) -> Result<LearningUnit> {
        let mut attempt: u32 = 0;
        loop {
            let current = self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| SyncError::UnitNotFound {
                    unit_id: id.clone(),
                })?;
            if !current.is_active() {
                return Err(SyncError::UnitDeleted {
                    unit_id: id.clone(),
                });
            }
            let at_version = current.version;
            match self.store.soft_delete(id, at_version).await {
                Ok(tombstone) => {
                    self.publish(EventAction::Deleted, EventPayload::bare(id.clone(), at_version))
                        .await?;
                    info!(kind = %self.kind, unit_id = %id, version = at_version, "unit deleted");
                    return Ok(tombstone);
                }
                Err(err @ SyncError::StoreConflict { .. }) => {
                    if attempt >= self.config.cas_retry_budget {
                        return Err(err);
                    }
                    attempt += 1;
                    tokio::time::sleep(self.config.cas_retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get(&self, id: &UnitId) -> Result<Option<LearningUnit>> {
        self.store.get_by_id(id).await
    }

    /// All active units of this service's kind.
    pub async fn list(&self) -> Result<Vec<LearningUnit>> {
        self.store.list(self.kind).await
    }

    /// Read-modify-write on an owned active unit: compare-and-set with the
    /// configured retry budget, then publish the confirmed new version.
    async fn commit(
        &self,
        id: &UnitId,
        mutate: &(dyn Fn(&mut LearningUnit) -> Result<()> + Send + Sync),
    ) -> Result<LearningUnit> {
        let mut attempt: u32 = 0;
        loop {
            let current = self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| SyncError::UnitNotFound {
                    unit_id: id.clone(),
                })?;
            if !current.is_active() {
                return Err(SyncError::UnitDeleted {
                    unit_id: id.clone(),
                });
            }
            match self.store.compare_and_set(id, current.version, mutate).await {
                Ok(_) => {
                    let confirmed = self
                        .store
                        .get_by_id_and_version(id, current.version + 1)
                        .await?
                        .ok_or_else(|| SyncError::Persistence {
                            reason: format!(
                                "unit {id} missing at version {} after write",
                                current.version + 1
                            ),
                        })?;
                    self.publish(EventAction::Updated, confirmed.payload()).await?;
                    return Ok(confirmed);
                }
                Err(err @ SyncError::StoreConflict { .. }) => {
                    if attempt >= self.config.cas_retry_budget {
                        return Err(err);
                    }
                    attempt += 1;
                    tokio::time::sleep(self.config.cas_retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn publish(&self, action: EventAction, payload: EventPayload) -> Result<()> {
        self.transport
            .publish(EventEnvelope::new(self.kind.subject(action), payload))
            .await
    }
}
