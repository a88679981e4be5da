//! Keyed, ordered collection of entity rows.
//!
//! Rows keep their insertion order (the order the UI lists them in) while a
//! hash index maps each row's key to its position. For plain collections the
//! key is the row id; for natural-keyed collections it is the natural key,
//! which is what makes an upsert a single lookup instead of a scan.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use super::ids::timestamp_id;

/// A row that can live in a [`Table`].
pub trait Record: Clone {
    /// Uniqueness key within the table.
    type Key: Eq + Hash + Clone + fmt::Debug;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn key(&self) -> Self::Key;
}

#[derive(Clone)]
pub struct Table<T: Record> {
    rows: Vec<T>,
    index: HashMap<T::Key, usize>,
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a table from rows as they come. If legacy data holds two rows
    /// with the same key, both are kept and lookups resolve to the first.
    pub fn from_rows(rows: Vec<T>) -> Self {
        let mut table = Self {
            rows,
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row holding the given key.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.rows[pos])
    }

    /// Row with the given id.
    pub fn find(&self, id: &str) -> Option<&T> {
        self.rows.iter().find(|row| row.id() == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// A timestamp id that no row of the table holds yet.
    pub fn fresh_id(&self) -> String {
        loop {
            let id = timestamp_id();
            if !self.contains_id(&id) {
                return id;
            }
        }
    }

    /// Identifier set of the table, used for reference checks.
    pub fn ids(&self) -> HashSet<&str> {
        self.rows.iter().map(|row| row.id()).collect()
    }

    /// Inserts the row, or replaces the row holding the same key in place.
    /// Returns the replaced row.
    pub fn upsert(&mut self, row: T) -> Option<T> {
        let key = row.key();
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.rows[pos], row)),
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(row);
                None
            }
        }
    }

    /// Replaces the row with the same id. Returns the previous row, or `None`
    /// (and leaves the table untouched) when no row has that id.
    pub fn replace_by_id(&mut self, row: T) -> Option<T> {
        let pos = self.rows.iter().position(|r| r.id() == row.id())?;
        let old = std::mem::replace(&mut self.rows[pos], row);
        if old.key() != self.rows[pos].key() {
            self.rebuild_index();
        }
        Some(old)
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<T> {
        let pos = self.rows.iter().position(|r| r.id() == id)?;
        let removed = self.rows.remove(pos);
        self.rebuild_index();
        Some(removed)
    }

    /// Removes every row whose id is in `ids`. Returns how many went.
    pub fn remove_ids(&mut self, ids: &HashSet<String>) -> usize {
        self.retain(|row| !ids.contains(row.id()))
    }

    /// Keeps rows matching the predicate. Returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, row) in self.rows.iter().enumerate() {
            self.index.entry(row.key()).or_insert(pos);
        }
    }
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record + fmt::Debug> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows.iter()).finish()
    }
}

impl<T: Record + PartialEq> PartialEq for Table<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl<T: Record> FromIterator<T> for Table<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_rows(iter.into_iter().collect())
    }
}

impl<T: Record + Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl<'de, T: Record + Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A missing or null collection reads as empty.
        let rows = Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Mark {
        id: String,
        student: String,
        item: String,
        score: i32,
    }

    impl Record for Mark {
        type Key = (String, String);

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn key(&self) -> Self::Key {
            (self.student.clone(), self.item.clone())
        }
    }

    fn mark(id: &str, student: &str, item: &str, score: i32) -> Mark {
        Mark {
            id: id.into(),
            student: student.into(),
            item: item.into(),
            score,
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut table = Table::new();
        assert!(table.upsert(mark("a", "S1", "T1", 1)).is_none());
        let old = table.upsert(mark("a", "S1", "T1", 3));

        assert_eq!(old.map(|m| m.score), Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&("S1".into(), "T1".into())).map(|m| m.score), Some(3));
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut table: Table<Mark> = vec![
            mark("a", "S1", "T1", 1),
            mark("b", "S1", "T2", 2),
            mark("c", "S2", "T1", 3),
        ]
        .into_iter()
        .collect();

        table.remove_by_id("a");
        assert_eq!(table.get(&("S2".into(), "T1".into())).map(|m| m.id.as_str()), Some("c"));
        assert!(table.get(&("S1".into(), "T1".into())).is_none());

        table.upsert(mark("d", "S1", "T1", 2));
        assert_eq!(table.rows().last().map(|m| m.id.as_str()), Some("d"));
    }

    #[test]
    fn test_remove_ids() {
        let mut table: Table<Mark> = vec![
            mark("a", "S1", "T1", 1),
            mark("b", "S1", "T2", 2),
            mark("c", "S2", "T1", 3),
        ]
        .into_iter()
        .collect();

        let ids: HashSet<String> = ["a", "c", "zz"].iter().map(|s| s.to_string()).collect();
        assert_eq!(table.remove_ids(&ids), 2);
        assert_eq!(table.ids(), HashSet::from(["b"]));
    }

    #[test]
    fn test_fresh_id_skips_taken_ids() {
        let taken = timestamp_id().parse::<i64>().unwrap();
        let table: Table<Mark> = (1..=3)
            .map(|n| mark(&(taken + n).to_string(), "S1", &n.to_string(), 1))
            .collect();

        let id = table.fresh_id();
        assert!(!table.contains_id(&id));
        assert!(id.parse::<i64>().unwrap() > taken);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let table: Table<Mark> = vec![mark("a", "S1", "T1", 1)].into_iter().collect();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());

        let back: Table<Mark> = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);

        let from_null: Table<Mark> = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(from_null.is_empty());
    }
}
