//! In-memory `UnitStore` backed by a `HashMap` under an async `RwLock`.
//!
//! The implementation of record for tests and the in-process demo. CAS
//! atomicity comes from holding the write lock across the
//! check-mutate-bump sequence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use edusync_core::errors::{Result, SyncError};
use edusync_core::model::LearningUnit;
use edusync_core_types::{UnitId, UnitKind, UnitStatus};
use tokio::sync::RwLock;

use crate::contract::{UnitMutation, UnitStore};

/// In-memory store; cheap to clone, clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    units: Arc<RwLock<HashMap<UnitId, LearningUnit>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitStore for MemoryStore {
    async fn insert(&self, unit: LearningUnit) -> Result<()> {
        let mut units = self.units.write().await;
        if units.contains_key(&unit.id) {
            return Err(SyncError::DuplicateUnit {
                unit_id: unit.id.clone(),
            });
        }
        units.insert(unit.id.clone(), unit);
        Ok(())
    }

    async fn get_by_id(&self, id: &UnitId) -> Result<Option<LearningUnit>> {
        Ok(self.units.read().await.get(id).cloned())
    }

    async fn get_by_id_and_version(
        &self,
        id: &UnitId,
        version: u64,
    ) -> Result<Option<LearningUnit>> {
        Ok(self
            .units
            .read()
            .await
            .get(id)
            .filter(|unit| unit.version == version)
            .cloned())
    }

    async fn compare_and_set(
        &self,
        id: &UnitId,
        expected_version: u64,
        mutate: UnitMutation<'_>,
    ) -> Result<LearningUnit> {
        let mut units = self.units.write().await;
        let unit = units.get_mut(id).ok_or_else(|| SyncError::UnitNotFound {
            unit_id: id.clone(),
        })?;
        if unit.version != expected_version {
            return Err(SyncError::StoreConflict {
                unit_id: id.clone(),
                expected_version,
            });
        }
        // Mutate a copy so a failed mutation cannot leave a torn record.
        let mut next = unit.clone();
        mutate(&mut next)?;
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *unit = next.clone();
        Ok(next)
    }

    async fn soft_delete(&self, id: &UnitId, expected_version: u64) -> Result<LearningUnit> {
        let mut units = self.units.write().await;
        let unit = units.get_mut(id).ok_or_else(|| SyncError::UnitNotFound {
            unit_id: id.clone(),
        })?;
        if unit.version != expected_version {
            return Err(SyncError::StoreConflict {
                unit_id: id.clone(),
                expected_version,
            });
        }
        unit.status = UnitStatus::Inactive;
        unit.version = expected_version + 1;
        unit.updated_at = Utc::now();
        Ok(unit.clone())
    }

    async fn find_by_name(&self, kind: UnitKind, name: &str) -> Result<Option<LearningUnit>> {
        Ok(self
            .units
            .read()
            .await
            .values()
            .find(|unit| unit.kind() == kind && unit.is_active() && unit.name == name)
            .cloned())
    }

    async fn find_owners_referencing(
        &self,
        owner_kind: UnitKind,
        member: &UnitId,
    ) -> Result<Vec<LearningUnit>> {
        Ok(self
            .units
            .read()
            .await
            .values()
            .filter(|unit| {
                unit.kind() == owner_kind
                    && unit.is_active()
                    && unit
                        .owner_links()
                        .map(|links| {
                            links.skill_ids.contains(member) || links.language_ids.contains(member)
                        })
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list(&self, kind: UnitKind) -> Result<Vec<LearningUnit>> {
        let mut units: Vec<LearningUnit> = self
            .units
            .read()
            .await
            .values()
            .filter(|unit| unit.kind() == kind && unit.is_active())
            .cloned()
            .collect();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }
}
