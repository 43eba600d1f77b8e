// Contract tests exercised against both store implementations.
// Every behavior the reconciliation path depends on is covered here:
// duplicate-insert rejection, version-guarded CAS, soft-delete tombstones,
// active-only name lookup, and the owner back-index.

use std::sync::Arc;

use edusync_core::errors::SyncError;
use edusync_core::model::{LearningUnit, OwnerSlot};
use edusync_core_types::{UnitId, UnitKind};
use edusync_store::{MemoryStore, SqliteStore, UnitStore};

fn uid(s: &str) -> UnitId {
    UnitId::from_raw(s)
}

fn skill(id: &str, name: &str) -> LearningUnit {
    LearningUnit::new(UnitKind::Skill, uid(id), name)
}

fn course_with_skills(id: &str, name: &str, skills: &[&str]) -> LearningUnit {
    let mut course = LearningUnit::new(UnitKind::Course, uid(id), name);
    course
        .member_set_mut(UnitKind::Skill)
        .unwrap()
        .extend(skills.iter().map(UnitId::from_raw));
    course
}

fn stores() -> Vec<(&'static str, Arc<dyn UnitStore>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new())),
        ("sqlite", Arc::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

#[tokio::test]
async fn test_insert_then_get_round_trips() {
    for (label, store) in stores() {
        let unit = skill("s1", "Recursion");
        store.insert(unit.clone()).await.unwrap();

        let fetched = store.get_by_id(&uid("s1")).await.unwrap().unwrap();
        assert_eq!(fetched, unit, "{label}");
    }
}

#[tokio::test]
async fn test_duplicate_insert_rejected() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();
        let err = store.insert(skill("s1", "Recursion")).await.unwrap_err();
        assert!(matches!(err, SyncError::DuplicateUnit { .. }), "{label}");
    }
}

#[tokio::test]
async fn test_get_by_id_and_version_filters() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();
        assert!(
            store
                .get_by_id_and_version(&uid("s1"), 1)
                .await
                .unwrap()
                .is_some(),
            "{label}"
        );
        assert!(
            store
                .get_by_id_and_version(&uid("s1"), 2)
                .await
                .unwrap()
                .is_none(),
            "{label}"
        );
    }
}

#[tokio::test]
async fn test_compare_and_set_bumps_version() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();

        let updated = store
            .compare_and_set(&uid("s1"), 1, &|unit| {
                unit.set_back_ref(OwnerSlot::Course, Some(uid("c1")))
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 2, "{label}");
        assert_eq!(
            updated.back_ref(OwnerSlot::Course).unwrap(),
            Some(&uid("c1")),
            "{label}"
        );

        // Confirmation read sees the new version.
        assert!(
            store
                .get_by_id_and_version(&uid("s1"), 2)
                .await
                .unwrap()
                .is_some(),
            "{label}"
        );
    }
}

#[tokio::test]
async fn test_compare_and_set_conflict_on_wrong_version() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();

        let err = store
            .compare_and_set(&uid("s1"), 5, &|_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StoreConflict { .. }), "{label}");

        // Conflict left the record untouched.
        let unit = store.get_by_id(&uid("s1")).await.unwrap().unwrap();
        assert_eq!(unit.version, 1, "{label}");
    }
}

#[tokio::test]
async fn test_compare_and_set_missing_unit() {
    for (label, store) in stores() {
        let err = store
            .compare_and_set(&uid("ghost"), 1, &|_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnitNotFound { .. }), "{label}");
    }
}

#[tokio::test]
async fn test_soft_delete_leaves_tombstone() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();

        let deleted = store.soft_delete(&uid("s1"), 1).await.unwrap();
        assert!(!deleted.is_active(), "{label}");
        assert_eq!(deleted.version, 2, "{label}");

        // Tombstone remains resolvable by id for version gating.
        assert!(store.get_by_id(&uid("s1")).await.unwrap().is_some(), "{label}");
        // But vanishes from the active surfaces.
        assert!(store.list(UnitKind::Skill).await.unwrap().is_empty(), "{label}");
        assert!(
            store
                .find_by_name(UnitKind::Skill, "Recursion")
                .await
                .unwrap()
                .is_none(),
            "{label}"
        );
    }
}

#[tokio::test]
async fn test_soft_delete_conflict_on_wrong_version() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();
        let err = store.soft_delete(&uid("s1"), 3).await.unwrap_err();
        assert!(matches!(err, SyncError::StoreConflict { .. }), "{label}");
    }
}

#[tokio::test]
async fn test_find_by_name_scopes_kind_and_status() {
    for (label, store) in stores() {
        store.insert(skill("s1", "Recursion")).await.unwrap();
        store
            .insert(LearningUnit::new(
                UnitKind::Course,
                uid("c1"),
                "Recursion", // same name, different kind
            ))
            .await
            .unwrap();

        let found = store
            .find_by_name(UnitKind::Skill, "Recursion")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, uid("s1"), "{label}");

        // Tombstoned names are reusable.
        store.soft_delete(&uid("s1"), 1).await.unwrap();
        assert!(
            store
                .find_by_name(UnitKind::Skill, "Recursion")
                .await
                .unwrap()
                .is_none(),
            "{label}"
        );
    }
}

#[tokio::test]
async fn test_find_owners_referencing() {
    for (label, store) in stores() {
        store
            .insert(course_with_skills("c1", "CS101", &["s1", "s2"]))
            .await
            .unwrap();
        store
            .insert(course_with_skills("c2", "CS102", &["s2"]))
            .await
            .unwrap();
        store
            .insert(course_with_skills("c3", "CS103", &[]))
            .await
            .unwrap();

        let owners = store
            .find_owners_referencing(UnitKind::Course, &uid("s2"))
            .await
            .unwrap();
        let mut ids: Vec<&str> = owners.iter().map(|o| o.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["c1", "c2"], "{label}");

        // Tombstoned owners drop out of the index.
        store.soft_delete(&uid("c1"), 1).await.unwrap();
        let owners = store
            .find_owners_referencing(UnitKind::Course, &uid("s2"))
            .await
            .unwrap();
        assert_eq!(owners.len(), 1, "{label}");
        assert_eq!(owners[0].id, uid("c2"), "{label}");
    }
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("units.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert(skill("s1", "Recursion")).await.unwrap();
        store
            .compare_and_set(&uid("s1"), 1, &|unit| {
                unit.set_back_ref(OwnerSlot::Book, Some(uid("b1")))
            })
            .await
            .unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let unit = store.get_by_id(&uid("s1")).await.unwrap().unwrap();
    assert_eq!(unit.version, 2);
    assert_eq!(unit.back_ref(OwnerSlot::Book).unwrap(), Some(&uid("b1")));
}
