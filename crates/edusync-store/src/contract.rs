use async_trait::async_trait;
use edusync_core::errors::Result;
use edusync_core::model::LearningUnit;
use edusync_core_types::{UnitId, UnitKind};

/// In-place mutation applied to a record inside a compare-and-set.
///
/// The closure runs while the store holds the record exclusively; it must not
/// touch `version`, `status`, `created_at` or `updated_at` — those are the
/// store's to manage.
pub type UnitMutation<'a> = &'a (dyn Fn(&mut LearningUnit) -> Result<()> + Send + Sync);

/// Per-service store of Learning Units: the units the service owns plus the
/// read-through replicas it synchronizes from foreign events.
///
/// All mutations are optimistic: `compare_and_set` and `soft_delete` succeed
/// only when the caller's expected version matches the stored one, and bump
/// the version by exactly 1 on success. A mismatch surfaces as
/// `SyncError::StoreConflict`, which is retryable — never silent success.
#[async_trait]
pub trait UnitStore: Send + Sync {
    /// First sighting of an id. Fails with `DuplicateUnit` if the id exists
    /// (active or tombstoned).
    async fn insert(&self, unit: LearningUnit) -> Result<()>;

    /// Fetch a record by id, tombstones included.
    async fn get_by_id(&self, id: &UnitId) -> Result<Option<LearningUnit>>;

    /// Fetch a record only if it sits at exactly `version`. Used to confirm a
    /// just-written version before publishing its event.
    async fn get_by_id_and_version(&self, id: &UnitId, version: u64)
        -> Result<Option<LearningUnit>>;

    /// Apply `mutate` to the record if it currently sits at
    /// `expected_version`; on success the stored version becomes
    /// `expected_version + 1`. Returns the updated record.
    async fn compare_and_set(
        &self,
        id: &UnitId,
        expected_version: u64,
        mutate: UnitMutation<'_>,
    ) -> Result<LearningUnit>;

    /// Flip the record to inactive if it currently sits at `expected_version`;
    /// the tombstone keeps the record resolvable for stale in-flight events.
    /// On success the stored version becomes `expected_version + 1`.
    async fn soft_delete(&self, id: &UnitId, expected_version: u64) -> Result<LearningUnit>;

    /// Find an **active** unit of `kind` by exact name. Name uniqueness holds
    /// among active units only; tombstoned names are reusable.
    async fn find_by_name(&self, kind: UnitKind, name: &str) -> Result<Option<LearningUnit>>;

    /// Active owner units of `owner_kind` whose member set contains `member`.
    /// Back-index used when a deleted member must be pruned out of its owners.
    async fn find_owners_referencing(
        &self,
        owner_kind: UnitKind,
        member: &UnitId,
    ) -> Result<Vec<LearningUnit>>;

    /// All active units of `kind`.
    async fn list(&self, kind: UnitKind) -> Result<Vec<LearningUnit>>;
}
