use std::collections::BTreeSet;

/// Project keys to add and remove to go from the current membership to the desired one
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Keys of `desired` missing from `current`, in `desired` order
    pub added: Vec<String>,
    /// Keys of `current` missing from `desired`, in `current` order
    pub removed: Vec<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff(desired: &[String], current: &[String]) -> MembershipDiff {
    let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    let have: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    let added = desired
        .iter()
        .filter(|k| !k.is_empty() && !have.contains(k.as_str()) && seen.insert(k.as_str()))
        .cloned()
        .collect();
    let mut seen = BTreeSet::new();
    let removed = current
        .iter()
        .filter(|k| !k.is_empty() && !wanted.contains(k.as_str()) && seen.insert(k.as_str()))
        .cloned()
        .collect();
    MembershipDiff { added, removed }
}

/// Same keys, ignoring order and empty entries
pub fn same_members(a: &[String], b: &[String]) -> bool {
    let left: BTreeSet<&str> = a.iter().map(String::as_str).filter(|k| !k.is_empty()).collect();
    let right: BTreeSet<&str> = b.iter().map(String::as_str).filter(|k| !k.is_empty()).collect();
    left == right
}
