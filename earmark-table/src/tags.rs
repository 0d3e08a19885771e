//! In-memory skip/flag annotations
//!
//! The table joins these onto rows by `original` path; persistence lives in
//! the review runtime.

use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Annotation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Skip,
    Flag,
}

impl TagType {
    pub const ALL: [TagType; 2] = [TagType::Skip, TagType::Flag];

    pub fn as_str(self) -> &'static str {
        match self {
            TagType::Skip => "skip",
            TagType::Flag => "flag",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagType {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(TagType::Skip),
            "flag" => Ok(TagType::Flag),
            other => Err(TableError::UnknownTagType(other.to_string())),
        }
    }
}

/// User-supplied part of a tag action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFields {
    pub reason: String,
    pub comment: String,
}

impl TagFields {
    pub fn new(reason: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            comment: comment.into(),
        }
    }
}

/// One stored annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub tag_type: TagType,
    pub audio_file: String,
    pub reason: String,
    pub tagger: String,
    pub comment: String,
    /// Unix seconds
    pub timestamp: i64,
}

impl TagEntry {
    pub fn new(
        audio_file: impl Into<String>,
        tag_type: TagType,
        fields: &TagFields,
        tagger: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            tag_type,
            audio_file: audio_file.into(),
            reason: fields.reason.clone(),
            tagger: tagger.into(),
            comment: fields.comment.clone(),
            timestamp,
        }
    }
}

/// Annotations keyed by path, then tag type
///
/// Tag types for one path are independent: removing `flag` leaves `skip`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagStore {
    entries: HashMap<String, BTreeMap<TagType, TagEntry>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `(entry.audio_file, entry.tag_type)`
    pub fn insert(&mut self, entry: TagEntry) -> Option<TagEntry> {
        self.entries
            .entry(entry.audio_file.clone())
            .or_default()
            .insert(entry.tag_type, entry)
    }

    pub fn remove(&mut self, path: &str, tag_type: TagType) -> Option<TagEntry> {
        let tags = self.entries.get_mut(path)?;
        let removed = tags.remove(&tag_type);
        if tags.is_empty() {
            self.entries.remove(path);
        }
        removed
    }

    pub fn get(&self, path: &str, tag_type: TagType) -> Option<&TagEntry> {
        self.entries.get(path)?.get(&tag_type)
    }

    pub fn has(&self, path: &str, tag_type: TagType) -> bool {
        self.get(path, tag_type).is_some()
    }

    /// All tags recorded for `path`, ordered skip before flag
    pub fn entries_for(&self, path: &str) -> impl Iterator<Item = &TagEntry> {
        self.entries.get(path).into_iter().flat_map(|tags| tags.values())
    }

    /// Number of `(path, tag type)` entries
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every entry of `other` into this store, replacing collisions
    pub fn extend(&mut self, other: TagStore) {
        for (path, tags) in other.entries {
            self.entries.entry(path).or_default().extend(tags);
        }
    }
}
