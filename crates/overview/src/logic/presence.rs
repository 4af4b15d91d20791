//! Ordered union of named entities with a fixed slot per environment.
//!
//! Secret keys and folder names are both aggregated with this type. Each entry
//! carries one slot per environment column; an empty slot means the environment
//! was resolved and does not define the name.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry<T> {
    name: String,
    slots: Vec<Option<T>>,
}

impl<T> PresenceEntry<T> {
    fn new(name: String, width: usize) -> Self {
        Self {
            name,
            slots: std::iter::repeat_with(|| None).take(width).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self, column: usize) -> Option<&T> {
        self.slots.get(column).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    fn is_vacant(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUnion<T> {
    width: usize,
    entries: Vec<PresenceEntry<T>>,
    index: HashMap<String, usize>,
}

impl<T> PresenceUnion<T> {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build the union in one pass over `columns`.
    ///
    /// Names are ordered by first appearance, walking columns in the order given.
    /// Names listed in `seed` come first, in seed order, so a rebuild keeps the
    /// relative order of names that were already on screen. A name repeated within
    /// one column keeps its last value.
    pub fn build<C, R>(width: usize, seed: &[String], columns: C) -> Self
    where
        C: IntoIterator<Item = (usize, R)>,
        R: IntoIterator<Item = (String, T)>,
    {
        let mut union = Self::new(width);
        for (column, items) in columns {
            for (name, value) in items {
                union.insert(column, name, value);
            }
        }

        if !seed.is_empty() {
            let rank: HashMap<&str, usize> = seed
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i))
                .collect();
            // stable: unseeded names keep their first-seen order
            union
                .entries
                .sort_by_key(|entry| rank.get(entry.name.as_str()).copied().unwrap_or(usize::MAX));
            union.reindex();
        }

        union
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PresenceEntry<T>] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PresenceEntry<T>> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    pub fn is_present(&self, name: &str, column: usize) -> bool {
        self.get(name)
            .is_some_and(|entry| entry.slot(column).is_some())
    }

    pub fn count_present(&self, column: usize) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.slot(column).is_some())
            .count()
    }

    /// Fill `column` of `name`, appending a new entry if the name is unknown.
    /// Returns the value previously held in that slot.
    pub fn insert(&mut self, column: usize, name: String, value: T) -> Option<T> {
        debug_assert!(column < self.width, "column {column} out of range");
        let pos = match self.index.get(&name) {
            Some(&pos) => pos,
            None => {
                self.entries.push(PresenceEntry::new(name.clone(), self.width));
                let pos = self.entries.len() - 1;
                self.index.insert(name, pos);
                pos
            }
        };

        self.entries[pos]
            .slots
            .get_mut(column)
            .and_then(|slot| slot.replace(value))
    }

    /// Empty `column` of `name`. The entry is dropped once no column holds it.
    pub fn clear(&mut self, column: usize, name: &str) -> Option<T> {
        let pos = *self.index.get(name)?;
        let previous = self.entries[pos].slots.get_mut(column).and_then(Option::take);

        if self.entries[pos].is_vacant() {
            self.entries.remove(pos);
            self.reindex();
        }

        previous
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.name.clone(), pos))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        fn column(names: &[&str]) -> Vec<(String, u32)> {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u32))
                .collect()
        }

        fn names(union: &PresenceUnion<u32>) -> Vec<&str> {
            union.names().collect()
        }

        #[test]
        fn test_union_contains_every_name_once_in_first_seen_order() {
            let union = PresenceUnion::build(
                3,
                &[],
                vec![
                    (0, column(&["A", "B"])),
                    (1, column(&["A"])),
                    (2, column(&["C", "A", "B"])),
                ],
            );

            assert_eq!(names(&union), vec!["A", "B", "C"]);
            assert_eq!(union.count_present(0), 2);
            assert_eq!(union.count_present(1), 1);
            assert_eq!(union.count_present(2), 3);
        }

        #[test]
        fn test_seed_keeps_previous_relative_order() {
            let seed = vec!["B".to_string(), "A".to_string()];
            let union = PresenceUnion::build(
                2,
                &seed,
                vec![(0, column(&["C", "A"])), (1, column(&["B", "D"]))],
            );

            assert_eq!(names(&union), vec!["B", "A", "C", "D"]);
            assert!(union.is_present("B", 1));
            assert!(!union.is_present("B", 0));
        }

        #[test]
        fn test_clear_drops_entry_only_when_vacant() {
            let mut union =
                PresenceUnion::build(2, &[], vec![(0, column(&["A"])), (1, column(&["A", "B"]))]);

            assert_eq!(union.clear(0, "A"), Some(0));
            assert_eq!(names(&union), vec!["A", "B"]);

            assert_eq!(union.clear(1, "A"), Some(0));
            assert_eq!(names(&union), vec!["B"]);
            assert!(union.get("A").is_none());
            assert!(union.get("B").is_some());
        }

        #[test]
        fn test_insert_appends_new_name_and_replaces_existing_slot() {
            let mut union: PresenceUnion<u32> = PresenceUnion::new(2);
            assert_eq!(union.insert(1, "X".to_string(), 7), None);
            assert_eq!(union.insert(1, "X".to_string(), 8), Some(7));
            assert_eq!(union.len(), 1);

            let entry = union.get("X").unwrap();
            assert_eq!(entry.slot(0), None);
            assert_eq!(entry.slot(1), Some(&8));
        }

        #[test]
        fn test_clear_unknown_name_is_noop() {
            let mut union: PresenceUnion<u32> = PresenceUnion::new(1);
            assert_eq!(union.clear(0, "missing"), None);
            assert!(union.is_empty());
        }
    }
}
