//! Keyed-collection diffing shared by every level of the course tree
//!
//! Nodes carry no stable identifier, so each level is correlated across
//! snapshots by a string key (a title or a file name). Indexes keep the
//! position of the first occurrence of a key and the value of the last one.

use indexmap::IndexMap;

use crate::core::{CourseFile, Item, Section};

/// A node that can be correlated across snapshots by key
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Section {
    fn key(&self) -> &str {
        &self.title
    }
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.title
    }
}

impl Keyed for CourseFile {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Key -> node mapping for one level of one snapshot
#[derive(Debug)]
pub struct KeyedIndex<'a, T> {
    entries: IndexMap<&'a str, &'a T>,
    collapsed: usize,
}

impl<'a, T: Keyed> KeyedIndex<'a, T> {
    pub fn build(items: &'a [T]) -> Self {
        let mut entries = IndexMap::with_capacity(items.len());
        let mut collapsed = 0;
        for item in items {
            if entries.insert(item.key(), item).is_some() {
                collapsed += 1;
            }
        }
        Self { entries, collapsed }
    }

    pub fn get(&self, key: &str) -> Option<&'a T> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of nodes hidden by a later node with the same key
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a T)> + '_ {
        self.entries.iter().map(|(key, item)| (*key, *item))
    }
}

/// Result of correlating two keyed collections
#[derive(Debug)]
pub struct KeyedDiff<'a, T> {
    /// Present only in the new collection, in new order
    pub added: Vec<&'a T>,
    /// Present only in the old collection, in old order
    pub removed: Vec<&'a T>,
    /// `(old, new)` pairs sharing a key, in new order
    pub common: Vec<(&'a T, &'a T)>,
    /// Duplicate keys collapsed across both sides
    pub collapsed: usize,
}

pub fn diff_keyed<'a, T: Keyed>(old: &'a [T], new: &'a [T]) -> KeyedDiff<'a, T> {
    let old_index = KeyedIndex::build(old);
    let new_index = KeyedIndex::build(new);

    let mut added = Vec::new();
    let mut common = Vec::new();
    for (key, new_item) in new_index.iter() {
        match old_index.get(key) {
            Some(old_item) => common.push((old_item, new_item)),
            None => added.push(new_item),
        }
    }

    let removed = old_index
        .iter()
        .filter(|(key, _)| !new_index.contains(key))
        .map(|(_, item)| item)
        .collect();

    KeyedDiff {
        added,
        removed,
        common,
        collapsed: old_index.collapsed() + new_index.collapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, url: &str) -> CourseFile {
        CourseFile {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_index_last_write_wins() {
        let files = vec![file("a.pdf", "v1"), file("b.pdf", "v1"), file("a.pdf", "v2")];
        let index = KeyedIndex::build(&files);

        assert_eq!(index.len(), 2);
        assert_eq!(index.collapsed(), 1);
        assert_eq!(index.get("a.pdf").unwrap().url, "v2");
        let keys: Vec<_> = index.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_diff_keyed_partitions() {
        let old = vec![file("a.pdf", ""), file("b.pdf", "")];
        let new = vec![file("c.pdf", ""), file("a.pdf", "")];
        let diff = diff_keyed(&old, &new);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "c.pdf");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].name, "b.pdf");
        assert_eq!(diff.common.len(), 1);
        assert_eq!(diff.common[0].0.name, "a.pdf");
        assert_eq!(diff.collapsed, 0);
    }
}
