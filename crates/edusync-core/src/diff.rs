//! Relationship differ: pure set algebra over member id collections.
//!
//! The original protocol enumerated the four (old empty/non-empty) x
//! (new empty/non-empty) combinations as separate code paths; they all
//! collapse into the same added/removed/unchanged computation, so that is
//! what lives here. Ids are compared in their canonical `UnitId` form
//! (normalized at the serialization boundary), so the same member arriving
//! in two representations can never show up as a removed+added pair.

use std::collections::BTreeSet;

use edusync_core_types::UnitId;

/// Outcome of diffing an owner's old and new member sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipDiff {
    /// Members present in new but not old: back-reference must be set.
    pub added: BTreeSet<UnitId>,
    /// Members present in old but not new: back-reference must be cleared.
    pub removed: BTreeSet<UnitId>,
    /// Members present in both: nothing to do.
    pub unchanged: BTreeSet<UnitId>,
}

impl RelationshipDiff {
    /// True when no back-reference work exists (added and removed both empty).
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute `added = new − old`, `removed = old − new`, `unchanged = old ∩ new`.
pub fn diff(old: &BTreeSet<UnitId>, new: &BTreeSet<UnitId>) -> RelationshipDiff {
    RelationshipDiff {
        added: new.difference(old).cloned().collect(),
        removed: old.difference(new).cloned().collect(),
        unchanged: old.intersection(new).cloned().collect(),
    }
}

/// Like [`diff`], treating an absent collection as the empty set.
pub fn diff_opt(old: Option<&BTreeSet<UnitId>>, new: Option<&BTreeSet<UnitId>>) -> RelationshipDiff {
    static EMPTY: BTreeSet<UnitId> = BTreeSet::new();
    diff(old.unwrap_or(&EMPTY), new.unwrap_or(&EMPTY))
}
