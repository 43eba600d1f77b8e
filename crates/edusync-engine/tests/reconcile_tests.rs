// End-to-end reconciliation over the in-process broker and store: membership
// cascades, version-gated convergence under reordering and redelivery, and
// member-deletion pruning.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use edusync_core::model::{LearningUnit, OwnerSlot};
use edusync_core_types::{
    EventAction, EventEnvelope, EventPayload, UnitId, UnitKind, UnitStatus,
};
use edusync_engine::{MemberReplicaHandler, OwnerReplicaHandler, ReconcileConfig};
use edusync_store::{MemoryStore, UnitStore};
use edusync_transport::{EventTransport, MemoryBroker};

fn uid(s: &str) -> UnitId {
    UnitId::from_raw(s)
}

fn broker() -> MemoryBroker {
    MemoryBroker::with_ack_wait(Duration::from_millis(10))
}

/// Wire a skills-service replica: consumes `course:*` and maintains the
/// course slot on the skills it stores.
async fn skills_service(broker: &MemoryBroker) -> Arc<dyn UnitStore> {
    let store: Arc<dyn UnitStore> = Arc::new(MemoryStore::new());
    let transport: Arc<dyn EventTransport> = Arc::new(broker.clone());
    let handler = Arc::new(OwnerReplicaHandler::new(
        OwnerSlot::Course,
        UnitKind::Skill,
        Arc::clone(&store),
        transport,
        ReconcileConfig::default(),
    ));
    for action in [
        EventAction::Created,
        EventAction::Updated,
        EventAction::Deleted,
    ] {
        broker
            .subscribe(
                UnitKind::Course.subject(action),
                "skills-service",
                handler.clone(),
            )
            .await
            .unwrap();
    }
    store
}

/// Wire a courses-service replica: consumes `skill:*`, maintains skill
/// replicas and prunes deleted skills out of owned courses.
async fn courses_service(broker: &MemoryBroker) -> Arc<dyn UnitStore> {
    let store: Arc<dyn UnitStore> = Arc::new(MemoryStore::new());
    let transport: Arc<dyn EventTransport> = Arc::new(broker.clone());
    let handler = Arc::new(MemberReplicaHandler::new(
        UnitKind::Skill,
        UnitKind::Course,
        Arc::clone(&store),
        transport,
        ReconcileConfig::default(),
    ));
    for action in [
        EventAction::Created,
        EventAction::Updated,
        EventAction::Deleted,
    ] {
        broker
            .subscribe(
                UnitKind::Skill.subject(action),
                "courses-service",
                handler.clone(),
            )
            .await
            .unwrap();
    }
    store
}

async fn seed_skill(store: &Arc<dyn UnitStore>, id: &str) {
    store
        .insert(LearningUnit::new(UnitKind::Skill, uid(id), id.to_string()))
        .await
        .unwrap();
}

fn course_event(action: EventAction, id: &str, version: u64, skills: &[&str]) -> EventEnvelope {
    let mut payload = EventPayload::bare(uid(id), version);
    payload.name = Some("CS101".to_string());
    payload.skill_ids = Some(skills.iter().copied().map(uid).collect::<BTreeSet<_>>());
    EventEnvelope::new(UnitKind::Course.subject(action), payload)
}

/// Poll until the unit exists and satisfies `check`.
async fn wait_for_unit(
    store: &Arc<dyn UnitStore>,
    id: &UnitId,
    mut check: impl FnMut(&LearningUnit) -> bool,
) -> LearningUnit {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(unit) = store.get_by_id(id).await.unwrap() {
            if check(&unit) {
                return unit;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "unit {id} did not reach the expected state"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_course_created_claims_its_skills() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    seed_skill(&skills, "s1").await;
    seed_skill(&skills, "s2").await;

    broker
        .publish(course_event(EventAction::Created, "c1", 1, &["s1", "s2"]))
        .await
        .unwrap();

    let replica = wait_for_unit(&skills, &uid("c1"), |u| u.version == 1).await;
    assert_eq!(
        replica.member_set(UnitKind::Skill).unwrap(),
        &["s1", "s2"].into_iter().map(uid).collect::<BTreeSet<_>>()
    );
    for id in ["s1", "s2"] {
        let skill = wait_for_unit(&skills, &uid(id), |u| u.version == 2).await;
        assert_eq!(
            skill.back_ref(OwnerSlot::Course).unwrap(),
            Some(&uid("c1"))
        );
    }
    // One updated event per claimed skill, each carrying the new owner.
    let published = broker.published(UnitKind::Skill.subject(EventAction::Updated));
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|e| e.data.course == Some(uid("c1"))));
}

#[tokio::test]
async fn test_course_update_retargets_membership() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    for id in ["s1", "s2", "s3"] {
        seed_skill(&skills, id).await;
    }

    broker
        .publish(course_event(EventAction::Created, "c1", 1, &["s1", "s2"]))
        .await
        .unwrap();
    wait_for_unit(&skills, &uid("s2"), |u| u.version == 2).await;

    broker
        .publish(course_event(EventAction::Updated, "c1", 2, &["s2", "s3"]))
        .await
        .unwrap();

    // Removed member released, added member claimed.
    let s1 = wait_for_unit(&skills, &uid("s1"), |u| u.version == 3).await;
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), None);
    let s3 = wait_for_unit(&skills, &uid("s3"), |u| u.version == 2).await;
    assert_eq!(s3.back_ref(OwnerSlot::Course).unwrap(), Some(&uid("c1")));

    // Unchanged member untouched: no extra version bump, no extra event.
    let replica = wait_for_unit(&skills, &uid("c1"), |u| u.version == 2).await;
    assert!(replica.is_active());
    let s2 = wait_for_unit(&skills, &uid("s2"), |u| u.version == 2).await;
    assert_eq!(s2.back_ref(OwnerSlot::Course).unwrap(), Some(&uid("c1")));
    let s2_updates: Vec<_> = broker
        .published(UnitKind::Skill.subject(EventAction::Updated))
        .into_iter()
        .filter(|e| e.data.id == uid("s2"))
        .collect();
    assert_eq!(s2_updates.len(), 1);
}

#[tokio::test]
async fn test_out_of_order_updates_converge_through_redelivery() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    seed_skill(&skills, "s1").await;

    broker
        .publish(course_event(EventAction::Created, "c1", 1, &[]))
        .await
        .unwrap();
    // Version 3 lands before version 2: it gaps and is redelivered until the
    // predecessor has been applied.
    broker
        .publish(course_event(EventAction::Updated, "c1", 3, &["s1"]))
        .await
        .unwrap();
    broker
        .publish(course_event(EventAction::Updated, "c1", 2, &[]))
        .await
        .unwrap();

    let replica = wait_for_unit(&skills, &uid("c1"), |u| u.version == 3).await;
    assert_eq!(
        replica.member_set(UnitKind::Skill).unwrap(),
        &std::iter::once(uid("s1")).collect::<BTreeSet<_>>()
    );
    let s1 = wait_for_unit(&skills, &uid("s1"), |u| u.version == 2).await;
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), Some(&uid("c1")));
}

#[tokio::test]
async fn test_duplicate_deliveries_apply_once() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    seed_skill(&skills, "s1").await;

    for _ in 0..2 {
        broker
            .publish(course_event(EventAction::Created, "c1", 1, &["s1"]))
            .await
            .unwrap();
    }
    for _ in 0..2 {
        broker
            .publish(course_event(EventAction::Updated, "c1", 2, &["s1"]))
            .await
            .unwrap();
    }

    let replica = wait_for_unit(&skills, &uid("c1"), |u| u.version == 2).await;
    assert!(replica.is_active());
    // The skill was claimed exactly once across all four deliveries.
    let s1 = wait_for_unit(&skills, &uid("s1"), |u| u.version == 2).await;
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), Some(&uid("c1")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(skills.get_by_id(&uid("s1")).await.unwrap().unwrap().version, 2);
}

#[tokio::test]
async fn test_cascade_skips_tombstoned_members() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    seed_skill(&skills, "s1").await;
    skills.soft_delete(&uid("s1"), 1).await.unwrap();

    broker
        .publish(course_event(EventAction::Created, "c1", 1, &["s1"]))
        .await
        .unwrap();

    wait_for_unit(&skills, &uid("c1"), |u| u.version == 1).await;
    let s1 = skills.get_by_id(&uid("s1")).await.unwrap().unwrap();
    assert_eq!(s1.status, UnitStatus::Inactive);
    assert_eq!(s1.version, 2);
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), None);
    assert!(broker
        .published(UnitKind::Skill.subject(EventAction::Updated))
        .is_empty());
}

#[tokio::test]
async fn test_course_deletion_releases_members() {
    let broker = broker();
    let skills = skills_service(&broker).await;
    seed_skill(&skills, "s1").await;

    broker
        .publish(course_event(EventAction::Created, "c1", 1, &["s1"]))
        .await
        .unwrap();
    wait_for_unit(&skills, &uid("s1"), |u| u.version == 2).await;

    // Deleted events carry the version at deletion time.
    broker
        .publish(course_event(EventAction::Deleted, "c1", 1, &[]))
        .await
        .unwrap();

    let replica = wait_for_unit(&skills, &uid("c1"), |u| u.version == 2).await;
    assert_eq!(replica.status, UnitStatus::Inactive);
    let s1 = wait_for_unit(&skills, &uid("s1"), |u| u.version == 3).await;
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), None);
}

#[tokio::test]
async fn test_owner_event_waits_for_member_replica() {
    let broker = broker();
    let skills = skills_service(&broker).await;

    // The course references a skill this service has never seen, so the
    // cascade cannot complete and the event is redelivered instead of acked.
    broker
        .publish(course_event(EventAction::Created, "c1", 1, &["s1"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(skills.get_by_id(&uid("c1")).await.unwrap().is_none());

    seed_skill(&skills, "s1").await;
    wait_for_unit(&skills, &uid("c1"), |u| u.version == 1).await;
    let s1 = wait_for_unit(&skills, &uid("s1"), |u| u.version == 2).await;
    assert_eq!(s1.back_ref(OwnerSlot::Course).unwrap(), Some(&uid("c1")));
}

#[tokio::test]
async fn test_deleted_member_pruned_from_owning_units() {
    let broker = broker();
    let courses = courses_service(&broker).await;

    // Owned course referencing two replicated skills.
    let mut course = LearningUnit::new(UnitKind::Course, uid("c1"), "CS101");
    course
        .member_set_mut(UnitKind::Skill)
        .unwrap()
        .extend([uid("s1"), uid("s2")]);
    courses.insert(course).await.unwrap();
    seed_skill(&courses, "s1").await;
    seed_skill(&courses, "s2").await;

    let mut payload = EventPayload::bare(uid("s1"), 1);
    payload.name = Some("s1".to_string());
    broker
        .publish(EventEnvelope::new(
            UnitKind::Skill.subject(EventAction::Deleted),
            payload,
        ))
        .await
        .unwrap();

    let course = wait_for_unit(&courses, &uid("c1"), |u| u.version == 2).await;
    assert_eq!(
        course.member_set(UnitKind::Skill).unwrap(),
        &std::iter::once(uid("s2")).collect::<BTreeSet<_>>()
    );
    let s1 = wait_for_unit(&courses, &uid("s1"), |u| !u.is_active()).await;
    assert_eq!(s1.version, 2);

    // The shrunken course was republished for downstream replicas.
    let published = broker.published(UnitKind::Course.subject(EventAction::Updated));
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].data.version, 2);
    assert_eq!(
        published[0].data.skill_ids,
        Some(std::iter::once(uid("s2")).collect::<BTreeSet<_>>())
    );
}

#[tokio::test]
async fn test_member_replica_updates_are_version_gated() {
    let broker = broker();
    let courses = courses_service(&broker).await;

    let mut created = EventPayload::bare(uid("s1"), 1);
    created.name = Some("Recursion".to_string());
    broker
        .publish(EventEnvelope::new(
            UnitKind::Skill.subject(EventAction::Created),
            created,
        ))
        .await
        .unwrap();
    wait_for_unit(&courses, &uid("s1"), |u| u.version == 1).await;

    let mut renamed = EventPayload::bare(uid("s1"), 2);
    renamed.name = Some("Tail Recursion".to_string());
    let rename_event =
        EventEnvelope::new(UnitKind::Skill.subject(EventAction::Updated), renamed);
    broker.publish(rename_event.clone()).await.unwrap();
    let replica = wait_for_unit(&courses, &uid("s1"), |u| u.version == 2).await;
    assert_eq!(replica.name, "Tail Recursion");

    // A replayed update is stale: acknowledged without effect.
    broker.publish(rename_event).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(courses.get_by_id(&uid("s1")).await.unwrap().unwrap().version, 2);
}
