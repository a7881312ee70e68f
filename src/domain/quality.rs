use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;

/// Tracks which fields of a computed result were missing, estimated, or
/// simulated, plus free-text warnings surfaced to the caller.
///
/// A field name may appear in at most one of `missing` / `estimated` /
/// `simulated` — the `add_*` methods enforce this by removing the field
/// from the other two sets before inserting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DataQualityFlags {
    pub missing: BTreeSet<String>,
    pub estimated: BTreeSet<String>,
    pub simulated: BTreeSet<String>,
    pub notes: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

impl DataQualityFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_missing(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.estimated.remove(&field);
        self.simulated.remove(&field);
        self.missing.insert(field);
    }

    pub fn add_estimated(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.missing.remove(&field);
        self.simulated.remove(&field);
        self.estimated.insert(field);
    }

    pub fn add_simulated(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.missing.remove(&field);
        self.estimated.remove(&field);
        self.simulated.insert(field);
    }

    /// Original source additionally tracked a "calculated" tier (data
    /// derived from other fields rather than read directly). We fold that
    /// into a note rather than a fourth exclusive set, since nothing in
    /// this port branches on "calculated" vs "estimated" — see DESIGN.md.
    pub fn add_calculated(&mut self, field: impl Into<String>, note: impl Into<String>) {
        let field = field.into();
        self.notes.insert(field, note.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn note(&mut self, field: impl Into<String>, text: impl Into<String>) {
        self.notes.insert(field.into(), text.into());
    }

    pub fn has_issues(&self) -> bool {
        !self.missing.is_empty()
            || !self.estimated.is_empty()
            || !self.simulated.is_empty()
            || !self.warnings.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.missing.len() + self.estimated.len() + self.simulated.len() + self.warnings.len()
    }

    pub fn merge(&mut self, other: DataQualityFlags) {
        self.missing.extend(other.missing);
        self.estimated.extend(other.estimated);
        self.simulated.extend(other.simulated);
        self.notes.extend(other.notes);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_exclusive_across_tiers() {
        let mut q = DataQualityFlags::new();
        q.add_missing("rainfall");
        q.add_estimated("rainfall");
        assert!(!q.missing.contains("rainfall"));
        assert!(q.estimated.contains("rainfall"));
    }

    #[test]
    fn empty_flags_have_no_issues() {
        let q = DataQualityFlags::new();
        assert!(!q.has_issues());
        assert_eq!(q.issue_count(), 0);
    }

    #[test]
    fn warning_alone_counts_as_an_issue() {
        let mut q = DataQualityFlags::new();
        q.add_warning("OVERFLOW: Exceeds capacity by 30,000 m3");
        assert!(q.has_issues());
        assert_eq!(q.issue_count(), 1);
    }

    #[test]
    fn merge_combines_all_sets() {
        let mut a = DataQualityFlags::new();
        a.add_missing("x");
        let mut b = DataQualityFlags::new();
        b.add_estimated("y");
        b.add_warning("careful");
        a.merge(b);
        assert!(a.missing.contains("x"));
        assert!(a.estimated.contains("y"));
        assert_eq!(a.warnings.len(), 1);
    }
}
