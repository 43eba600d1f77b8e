use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::UnitId;
use crate::subject::{Subject, UnitStatus};

/// Wire payload shared by all twelve subjects.
///
/// `id` and `version` are mandatory on every event. The remaining fields are
/// optional and variant-dependent: owner kinds (Course, Book) carry the
/// relationship sets, member kinds (Skill, ProgrammingLanguage) carry single
/// back-references. Deleted events carry the version the record had when the
/// deletion was requested, not the post-flip version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub id: UnitId,
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UnitStatus>,

    /// Skill members of an owner unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_ids: Option<BTreeSet<UnitId>>,

    /// ProgrammingLanguage members of an owner unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_ids: Option<BTreeSet<UnitId>>,

    /// Course currently claiming a member unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<UnitId>,

    /// Book currently claiming a member unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<UnitId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_author: Option<String>,
}

impl EventPayload {
    /// Minimal payload: just identity and version. Callers fill in the
    /// variant-specific fields they publish.
    pub fn bare(id: UnitId, version: u64) -> Self {
        Self {
            id,
            version,
            name: None,
            status: None,
            skill_ids: None,
            language_ids: None,
            course: None,
            book: None,
            course_url: None,
            book_author: None,
        }
    }
}

/// One event as it travels through the transport: subject plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub subject: Subject,
    pub data: EventPayload,
}

impl EventEnvelope {
    pub fn new(subject: Subject, data: EventPayload) -> Self {
        Self { subject, data }
    }
}
