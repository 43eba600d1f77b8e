use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use edusync_core_types::{EventPayload, UnitId, UnitKind, UnitStatus};

use crate::errors::{Result, SyncError};

/// Which owner-side slot a back-reference lives in.
///
/// Member units (Skill, ProgrammingLanguage) carry at most one back-reference
/// per owner kind: one `course` slot and one `book` slot. The reconciliation
/// engine is instantiated once per (slot, member kind) pair instead of four
/// copy-pasted handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerSlot {
    Course,
    Book,
}

impl OwnerSlot {
    /// The owner kind occupying this slot.
    pub fn kind(self) -> UnitKind {
        match self {
            OwnerSlot::Course => UnitKind::Course,
            OwnerSlot::Book => UnitKind::Book,
        }
    }
}

/// Back-references held by a member unit (Skill, ProgrammingLanguage).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<UnitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<UnitId>,
}

/// Relationship sets held by an owner unit (Course, Book).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerLinks {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skill_ids: BTreeSet<UnitId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub language_ids: BTreeSet<UnitId>,
}

impl OwnerLinks {
    /// The member set for one member kind.
    pub fn member_set(&self, member_kind: UnitKind) -> Option<&BTreeSet<UnitId>> {
        match member_kind {
            UnitKind::Skill => Some(&self.skill_ids),
            UnitKind::ProgrammingLanguage => Some(&self.language_ids),
            _ => None,
        }
    }

    fn member_set_mut(&mut self, member_kind: UnitKind) -> Option<&mut BTreeSet<UnitId>> {
        match member_kind {
            UnitKind::Skill => Some(&mut self.skill_ids),
            UnitKind::ProgrammingLanguage => Some(&mut self.language_ids),
            _ => None,
        }
    }
}

/// Variant-specific fields of a Learning Unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnitBody {
    Skill {
        #[serde(default)]
        links: MemberLinks,
    },
    ProgrammingLanguage {
        #[serde(default)]
        links: MemberLinks,
    },
    Course {
        #[serde(default)]
        links: OwnerLinks,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        course_url: Option<String>,
    },
    Book {
        #[serde(default)]
        links: OwnerLinks,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_author: Option<String>,
    },
}

impl UnitBody {
    /// Empty body for the given kind.
    pub fn empty(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Skill => UnitBody::Skill {
                links: MemberLinks::default(),
            },
            UnitKind::ProgrammingLanguage => UnitBody::ProgrammingLanguage {
                links: MemberLinks::default(),
            },
            UnitKind::Course => UnitBody::Course {
                links: OwnerLinks::default(),
                course_url: None,
            },
            UnitKind::Book => UnitBody::Book {
                links: OwnerLinks::default(),
                book_author: None,
            },
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            UnitBody::Skill { .. } => UnitKind::Skill,
            UnitBody::ProgrammingLanguage { .. } => UnitKind::ProgrammingLanguage,
            UnitBody::Course { .. } => UnitKind::Course,
            UnitBody::Book { .. } => UnitKind::Book,
        }
    }
}

/// A Learning Unit record: Skill, Course, Book or ProgrammingLanguage.
///
/// Each record is exclusively owned (written) by its declaring service; other
/// services hold read-through replicas synchronized via events. `version`
/// starts at 1 and moves by exactly 1 on every successful mutation; the store
/// enforces this through compare-and-set. Deletion flips `status` and keeps
/// the record as a tombstone for version-gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningUnit {
    pub id: UnitId,
    pub name: String,
    pub version: u64,
    pub status: UnitStatus,
    #[serde(flatten)]
    pub body: UnitBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningUnit {
    /// Create a fresh unit at version 1 with an empty body.
    pub fn new(kind: UnitKind, id: UnitId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            version: 1,
            status: UnitStatus::Active,
            body: UnitBody::empty(kind),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.body.kind()
    }

    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    /// Build a local replica from a Created event payload.
    ///
    /// # Errors
    /// `InvariantViolation` if the payload lacks the fields a Created event
    /// must carry (currently: `name`).
    pub fn from_payload(kind: UnitKind, payload: &EventPayload) -> Result<Self> {
        let name = payload
            .name
            .clone()
            .ok_or_else(|| SyncError::InvariantViolation {
                reason: format!("created event for {} {} carries no name", kind, payload.id),
            })?;
        let mut unit = Self::new(kind, payload.id.clone(), name);
        unit.version = payload.version;
        if let Some(status) = payload.status {
            unit.status = status;
        }
        unit.apply_replica_payload(payload);
        Ok(unit)
    }

    /// Overwrite the replica-synchronized fields from an event payload.
    ///
    /// Absent relationship collections mean "empty", absent back-references
    /// mean "cleared" — publishers always emit full snapshots, so an omitted
    /// field is an empty one, not an unchanged one. Version and status are
    /// managed by the store and the delete path, never here.
    pub fn apply_replica_payload(&mut self, payload: &EventPayload) {
        if let Some(name) = &payload.name {
            self.name = name.clone();
        }
        match &mut self.body {
            UnitBody::Skill { links } | UnitBody::ProgrammingLanguage { links } => {
                links.course = payload.course.clone();
                links.book = payload.book.clone();
            }
            UnitBody::Course { links, course_url } => {
                links.skill_ids = payload.skill_ids.clone().unwrap_or_default();
                links.language_ids = payload.language_ids.clone().unwrap_or_default();
                *course_url = payload.course_url.clone();
            }
            UnitBody::Book { links, book_author } => {
                links.skill_ids = payload.skill_ids.clone().unwrap_or_default();
                links.language_ids = payload.language_ids.clone().unwrap_or_default();
                *book_author = payload.book_author.clone();
            }
        }
    }

    /// Full-snapshot payload for publishing this unit's current state.
    pub fn payload(&self) -> EventPayload {
        let mut payload = EventPayload::bare(self.id.clone(), self.version);
        payload.name = Some(self.name.clone());
        payload.status = Some(self.status);
        match &self.body {
            UnitBody::Skill { links } | UnitBody::ProgrammingLanguage { links } => {
                payload.course = links.course.clone();
                payload.book = links.book.clone();
            }
            UnitBody::Course { links, course_url } => {
                payload.skill_ids = Some(links.skill_ids.clone());
                payload.language_ids = Some(links.language_ids.clone());
                payload.course_url = course_url.clone();
            }
            UnitBody::Book { links, book_author } => {
                payload.skill_ids = Some(links.skill_ids.clone());
                payload.language_ids = Some(links.language_ids.clone());
                payload.book_author = book_author.clone();
            }
        }
        payload
    }

    /// Owner-side relationship links, if this is an owner unit.
    pub fn owner_links(&self) -> Option<&OwnerLinks> {
        match &self.body {
            UnitBody::Course { links, .. } | UnitBody::Book { links, .. } => Some(links),
            _ => None,
        }
    }

    /// The member set of one member kind on an owner unit.
    ///
    /// # Errors
    /// `WrongVariant` if this unit is not an owner or `member_kind` is not a
    /// member kind.
    pub fn member_set(&self, member_kind: UnitKind) -> Result<&BTreeSet<UnitId>> {
        self.owner_links()
            .and_then(|links| links.member_set(member_kind))
            .ok_or_else(|| SyncError::WrongVariant {
                kind: self.kind(),
                unit_id: self.id.clone(),
            })
    }

    /// Mutable access to one member set on an owner unit.
    pub fn member_set_mut(&mut self, member_kind: UnitKind) -> Result<&mut BTreeSet<UnitId>> {
        let kind = self.kind();
        let id = self.id.clone();
        match &mut self.body {
            UnitBody::Course { links, .. } | UnitBody::Book { links, .. } => {
                links.member_set_mut(member_kind)
            }
            _ => None,
        }
        .ok_or(SyncError::WrongVariant { kind, unit_id: id })
    }

    /// Read a back-reference slot on a member unit.
    pub fn back_ref(&self, slot: OwnerSlot) -> Result<Option<&UnitId>> {
        match &self.body {
            UnitBody::Skill { links } | UnitBody::ProgrammingLanguage { links } => {
                Ok(match slot {
                    OwnerSlot::Course => links.course.as_ref(),
                    OwnerSlot::Book => links.book.as_ref(),
                })
            }
            _ => Err(SyncError::WrongVariant {
                kind: self.kind(),
                unit_id: self.id.clone(),
            }),
        }
    }

    /// Point a back-reference slot at a new owner (or clear it).
    pub fn set_back_ref(&mut self, slot: OwnerSlot, target: Option<UnitId>) -> Result<()> {
        let kind = self.kind();
        let id = self.id.clone();
        match &mut self.body {
            UnitBody::Skill { links } | UnitBody::ProgrammingLanguage { links } => {
                match slot {
                    OwnerSlot::Course => links.course = target,
                    OwnerSlot::Book => links.book = target,
                }
                Ok(())
            }
            _ => Err(SyncError::WrongVariant { kind, unit_id: id }),
        }
    }
}
