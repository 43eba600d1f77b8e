//! Runs the four services against the in-process broker and walks one unit
//! lifecycle end to end: create, link, retarget, delete, prune.
//!
//! Environment:
//! - `EDUSYNC_ACK_WAIT_MS`: redelivery window in milliseconds (default 5000)
//! - `EDUSYNC_LOG_JSON`: set to `1` for JSON log output

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use edusync_core::errors::Result;
use edusync_core::model::LearningUnit;
use edusync_core_types::{UnitId, UnitKind};
use edusync_engine::ReconcileConfig;
use edusync_services::{UnitDraft, UnitService};
use edusync_store::{MemoryStore, UnitStore};
use edusync_transport::MemoryBroker;

fn ack_wait_from_env() -> Duration {
    std::env::var("EDUSYNC_ACK_WAIT_MS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

fn log_profile_from_env() -> edusync_logging::Profile {
    match std::env::var("EDUSYNC_LOG_JSON").as_deref() {
        Ok("1") => edusync_logging::Profile::Production,
        _ => edusync_logging::Profile::Development,
    }
}

async fn boot(kind: UnitKind, broker: &MemoryBroker) -> Result<UnitService> {
    let store: Arc<dyn UnitStore> = Arc::new(MemoryStore::new());
    let service = UnitService::new(
        kind,
        store,
        Arc::new(broker.clone()),
        ReconcileConfig::default(),
    );
    service.start().await?;
    Ok(service)
}

/// Poll a service until `check` passes for the unit, or give up.
async fn converge(
    service: &UnitService,
    id: &UnitId,
    what: &str,
    check: impl Fn(&LearningUnit) -> bool,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        if let Some(unit) = service.get(id).await? {
            if check(&unit) {
                info!(
                    kind = %service.kind(),
                    unit_id = %id,
                    version = unit.version,
                    "{what} converged"
                );
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            info!(kind = %service.kind(), unit_id = %id, "{what} did NOT converge in time");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    edusync_logging::init(log_profile_from_env());

    let broker = MemoryBroker::with_ack_wait(ack_wait_from_env());
    let skills = boot(UnitKind::Skill, &broker).await?;
    let languages = boot(UnitKind::ProgrammingLanguage, &broker).await?;
    let courses = boot(UnitKind::Course, &broker).await?;
    let books = boot(UnitKind::Book, &broker).await?;

    // Create the member units each service owns.
    let recursion = skills.create(UnitDraft::named("Recursion")).await?;
    let closures = skills.create(UnitDraft::named("Closures")).await?;
    let rust = languages.create(UnitDraft::named("Rust")).await?;

    // A course listing one skill and one language; the member services pick
    // up course:created and point the members back at it.
    let mut draft = UnitDraft::named("CS101");
    draft.course_url = Some("https://example.edu/cs101".to_string());
    draft.skill_ids = std::iter::once(recursion.id.clone()).collect();
    draft.language_ids = std::iter::once(rust.id.clone()).collect();
    let cs101 = courses.create(draft).await?;

    converge(&skills, &recursion.id, "skill claimed by course", |u| {
        u.version == 2
    })
    .await?;
    converge(&languages, &rust.id, "language claimed by course", |u| {
        u.version == 2
    })
    .await?;

    // Retarget the course from Recursion to Closures.
    courses
        .replace_members(
            &cs101.id,
            UnitKind::Skill,
            std::iter::once(closures.id.clone()).collect::<BTreeSet<_>>(),
        )
        .await?;
    converge(&skills, &recursion.id, "removed skill released", |u| {
        u.version == 3
    })
    .await?;
    converge(&skills, &closures.id, "added skill claimed", |u| {
        u.version == 2
    })
    .await?;

    // A book claims the language too; book and course slots are independent.
    let mut draft = UnitDraft::named("The Rust Book");
    draft.book_author = Some("Klabnik & Nichols".to_string());
    draft.language_ids = std::iter::once(rust.id.clone()).collect();
    let book = books.create(draft).await?;
    converge(&languages, &rust.id, "language claimed by book", |u| {
        u.version == 3
    })
    .await?;

    // Deleting the language prunes it out of both owners, and the shrunken
    // owner snapshots propagate back to every replica.
    languages.soft_delete(&rust.id).await?;
    converge(&courses, &cs101.id, "course pruned deleted language", |u| {
        u.member_set(UnitKind::ProgrammingLanguage)
            .map(BTreeSet::is_empty)
            .unwrap_or(false)
    })
    .await?;
    converge(&books, &book.id, "book pruned deleted language", |u| {
        u.member_set(UnitKind::ProgrammingLanguage)
            .map(BTreeSet::is_empty)
            .unwrap_or(false)
    })
    .await?;

    info!("demo scenario complete");
    Ok(())
}
