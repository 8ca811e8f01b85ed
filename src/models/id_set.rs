use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Outcome of flipping membership in an [`IdSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// A set of document ids stored as a JSON array.
///
/// Followers, following, likes and liked posts are all kept as `IdSet`s so a
/// repeated insert can never produce a duplicate entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdSet(BTreeSet<String>);

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: &str) -> bool {
        self.0.insert(id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }

    /// Removes `id` if present, inserts it otherwise.
    pub fn toggle(&mut self, id: &str) -> Toggle {
        if self.remove(id) {
            Toggle::Removed
        } else {
            self.insert(id);
            Toggle::Added
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for IdSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut set = IdSet::new();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn toggle_twice_restores_membership() {
        let mut set: IdSet = ["x"].into_iter().collect();
        assert_eq!(set.toggle("y"), Toggle::Added);
        assert!(set.contains("y"));
        assert_eq!(set.toggle("y"), Toggle::Removed);
        assert!(!set.contains("y"));
        assert!(set.contains("x"));
    }

    #[test]
    fn serializes_as_plain_array() {
        let set: IdSet = ["b", "a"].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!(["a", "b"]));

        let back: IdSet = serde_json::from_value(serde_json::json!(["a", "a", "c"])).unwrap();
        assert_eq!(back.len(), 2);
    }
}
