use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four Learning Unit variants, each owned by exactly one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Skill,
    Course,
    Book,
    ProgrammingLanguage,
}

impl UnitKind {
    /// Subject prefix for this kind, e.g. `"skill"` in `skill:created`.
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Skill => "skill",
            UnitKind::Course => "course",
            UnitKind::Book => "book",
            UnitKind::ProgrammingLanguage => "programminglanguage",
        }
    }

    /// Whether units of this kind carry relationship sets (`skill_ids`,
    /// `language_ids`) rather than single back-references.
    pub fn is_owner(self) -> bool {
        matches!(self, UnitKind::Course | UnitKind::Book)
    }

    /// Build the subject for one of this kind's lifecycle events.
    pub fn subject(self, action: EventAction) -> Subject {
        Subject { kind: self, action }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record activity state. Deletion is a status flip, never physical removal,
/// so stale in-flight events can still be version-checked against the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Active,
    Inactive,
}

/// Lifecycle action carried in a subject suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Created => "created",
            EventAction::Updated => "updated",
            EventAction::Deleted => "deleted",
        }
    }
}

/// A fully qualified event subject, `<entity>:<action>`.
///
/// Twelve subjects exist in total (four kinds, three actions). Subjects are
/// the unit of subscription: every consuming service subscribes to the
/// subjects of the foreign kinds it replicates, under its own durable queue
/// group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subject {
    kind: UnitKind,
    action: EventAction,
}

impl Subject {
    pub fn new(kind: UnitKind, action: EventAction) -> Self {
        Self { kind, action }
    }

    pub fn kind(self) -> UnitKind {
        self.kind
    }

    pub fn action(self) -> EventAction {
        self.action
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.action.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, action) = s
            .split_once(':')
            .ok_or_else(|| format!("subject missing ':' separator: {s}"))?;
        let kind = match kind {
            "skill" => UnitKind::Skill,
            "course" => UnitKind::Course,
            "book" => UnitKind::Book,
            "programminglanguage" => UnitKind::ProgrammingLanguage,
            other => return Err(format!("unknown entity type in subject: {other}")),
        };
        let action = match action {
            "created" => EventAction::Created,
            "updated" => EventAction::Updated,
            "deleted" => EventAction::Deleted,
            other => return Err(format!("unknown action in subject: {other}")),
        };
        Ok(Subject { kind, action })
    }
}

impl Serialize for Subject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
