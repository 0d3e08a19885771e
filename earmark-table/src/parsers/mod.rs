//! Record parsers
//!
//! Pure functions from file content to keyed raw records. Nothing here
//! types or validates field values; that is the normalizer's job.

pub mod database;
pub mod listing;
pub mod phraselist;

pub use database::{parse_database, parse_database_file};
pub use listing::listing_records;
pub use phraselist::{parse_phraselist, parse_phraselist_file, Phraselist};

use std::collections::HashMap;

/// Field name to raw text value for one source entry
pub type RawRecord = HashMap<String, String>;

/// Raw records keyed by their `key` field, in first-seen order
///
/// Re-inserting an existing key replaces the record in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    keys: Vec<String>,
    records: HashMap<String, RawRecord>,
    rejected: usize,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, record: RawRecord) -> Option<RawRecord> {
        let key = key.into();
        let previous = self.records.insert(key.clone(), record);
        if previous.is_none() {
            self.keys.push(key);
        }
        previous
    }

    pub fn get(&self, key: &str) -> Option<&RawRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Entries skipped by the parser as malformed
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub(crate) fn note_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawRecord)> {
        self.keys
            .iter()
            .filter_map(|key| self.records.get(key).map(|record| (key.as_str(), record)))
    }

    /// Move every record of `other` into this set, replacing collisions in
    /// place
    pub fn extend(&mut self, other: RecordSet) {
        let RecordSet {
            keys,
            mut records,
            rejected,
        } = other;
        for key in keys {
            if let Some(record) = records.remove(&key) {
                self.insert(key, record);
            }
        }
        self.rejected += rejected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut set = RecordSet::new();
        set.insert("a", record(&[("filename", "a.wav")]));
        set.insert("b", record(&[("filename", "b.wav")]));
        set.insert("a", record(&[("filename", "a2.wav")]));

        let order: Vec<_> = set.iter().map(|(k, r)| (k, r["filename"].as_str())).collect();
        assert_eq!(order, vec![("a", "a2.wav"), ("b", "b.wav")]);
        assert_eq!(set.len(), 2);
    }
}
