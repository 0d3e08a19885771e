//! Backing table model
//!
//! Owns the canonical rows, the filter matrix, the tag store joined onto the
//! rows, and the incremental materialization cursor. Only the query engine
//! reorders rows or rewrites the filter matrix.

use crate::column::Column;
use crate::error::{Result, TableError};
use crate::filter::FilterMatrix;
use crate::parsers::{Phraselist, RawRecord, RecordSet};
use crate::paths;
use crate::row::{CellValue, Row};
use crate::tags::{TagEntry, TagStore, TagType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of rows exposed per materialization request
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Identity of one table instance; regenerated on every wholesale load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TableId(Uuid);

impl TableId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to one record of one table instance
///
/// Identifies the record by its `order` stamp, so it keeps pointing at the
/// same record across sorts. It stops resolving once the table is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef {
    table: TableId,
    order: i64,
}

impl RowRef {
    pub fn table(&self) -> TableId {
        self.table
    }

    /// `order` stamp of the referenced record
    pub fn order(&self) -> i64 {
        self.order
    }
}

/// Result of merging a phraselist into the table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhraselistMerge {
    /// Existing rows whose empty transcription was filled
    pub updated: Vec<usize>,
    /// Rows appended for phraselist paths with no matching row
    pub appended: Range<usize>,
}

#[derive(Debug)]
pub struct TableModel {
    id: TableId,
    rows: Vec<Row>,
    filter: FilterMatrix,
    source_data: RecordSet,
    tags: TagStore,
    next_order: i64,
    cursor: usize,
    exposed: Vec<usize>,
    /// `order` stamp to current position
    positions: HashMap<i64, usize>,
}

impl Default for TableModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TableModel {
    pub fn new() -> Self {
        Self {
            id: TableId::new(),
            rows: Vec::new(),
            filter: FilterMatrix::new(0),
            source_data: RecordSet::new(),
            tags: TagStore::new(),
            next_order: 0,
            cursor: 0,
            exposed: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn filter(&self) -> &FilterMatrix {
        &self.filter
    }

    pub(crate) fn filter_mut(&mut self) -> &mut FilterMatrix {
        &mut self.filter
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn source_data(&self) -> &RecordSet {
        &self.source_data
    }

    /// Replace the table wholesale
    ///
    /// A new table id is issued, so every previously derived [`RowRef`]
    /// stops resolving. The filter matrix becomes all-true
    /// and materialization restarts from zero. Tags already in the store are
    /// joined onto the new rows.
    pub fn load_table(&mut self, rows: Vec<Row>, source: RecordSet) {
        let start = Instant::now();
        self.id = TableId::new();
        self.rows = rows;
        self.positions.clear();
        self.stamp_order(0);
        self.source_data = source;
        self.filter = FilterMatrix::new(self.rows.len());
        self.restart_materialization();
        self.recompute_tags();
        info!(
            table = %self.id,
            rows = self.rows.len(),
            "Loaded table in {:.3} seconds",
            start.elapsed().as_secs_f64()
        );
    }

    /// Extend the table, keeping existing rows, filter state and cursor
    ///
    /// Returns the positions of the new rows.
    pub fn append_rows(&mut self, rows: Vec<Row>, source: RecordSet) -> Range<usize> {
        let first = self.rows.len();
        let count = rows.len();
        self.rows.extend(rows);
        self.stamp_order(first);
        self.source_data.extend(source);
        self.filter.grow(count);
        for index in first..self.rows.len() {
            self.apply_tags_to(index);
        }
        debug!(table = %self.id, first, count, "Appended rows");
        first..self.rows.len()
    }

    fn stamp_order(&mut self, from: usize) {
        for (index, row) in self.rows.iter_mut().enumerate().skip(from) {
            row.order = self.next_order;
            self.positions.insert(row.order, index);
            self.next_order += 1;
        }
    }

    /// Handle for the row currently at `index`
    pub fn row_ref(&self, index: usize) -> Result<RowRef> {
        if index >= self.rows.len() {
            return Err(TableError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.handle(index))
    }

    fn handle(&self, index: usize) -> RowRef {
        RowRef {
            table: self.id,
            order: self.rows[index].order,
        }
    }

    /// Current position of the referenced record
    pub fn position(&self, row_ref: &RowRef) -> Result<usize> {
        if row_ref.table != self.id {
            return Err(TableError::ForeignRowRef);
        }
        self.positions
            .get(&row_ref.order)
            .copied()
            .ok_or(TableError::StaleRowRef)
    }

    /// Current field values of the referenced row
    pub fn current_selection(&self, row_ref: &RowRef) -> Result<&Row> {
        let index = self.position(row_ref)?;
        Ok(&self.rows[index])
    }

    /// Raw source fields the referenced row was normalized from, if any
    pub fn current_source_data(&self, row_ref: &RowRef) -> Result<Option<&RawRecord>> {
        let index = self.position(row_ref)?;
        Ok(self.source_data.get(&self.rows[index].key))
    }

    /// Reorder rows so that new position `i` holds the row previously at
    /// `order[i]`
    ///
    /// Row references follow their record: `order` is unique per table
    /// instance and the position index is rebuilt here.
    pub(crate) fn reorder(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.rows.len());

        let mut previous: Vec<Option<Row>> = std::mem::take(&mut self.rows)
            .into_iter()
            .map(Some)
            .collect();
        self.rows = order
            .iter()
            .filter_map(|&old| previous.get_mut(old).and_then(Option::take))
            .collect();
        self.filter.permute(order);
        self.positions = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.order, index))
            .collect();
    }

    // --- materialization ---

    /// Forget exposed rows and rescan from the first row
    pub fn restart_materialization(&mut self) {
        self.cursor = 0;
        self.exposed.clear();
    }

    /// Expose up to `requested` more rows that pass the filter
    ///
    /// Scans forward from where the previous call stopped. Returns the number
    /// of rows newly exposed; 0 once nothing past the cursor matches.
    pub fn materialize_more(&mut self, requested: usize) -> usize {
        let mut added = 0;
        while added < requested && self.cursor < self.rows.len() {
            if self.filter.is_visible(self.cursor) {
                self.exposed.push(self.cursor);
                added += 1;
            }
            self.cursor += 1;
        }
        added
    }

    pub fn has_more_to_materialize(&self) -> bool {
        (self.cursor..self.rows.len()).any(|row| self.filter.is_visible(row))
    }

    /// Backing positions exposed so far, in exposure order
    pub fn materialized(&self) -> &[usize] {
        &self.exposed
    }

    pub fn materialized_rows(&self) -> impl Iterator<Item = (RowRef, &Row)> {
        self.exposed
            .iter()
            .map(move |&index| (self.handle(index), &self.rows[index]))
    }

    // --- tag synchronization ---

    fn apply_tags_to(&mut self, index: usize) -> bool {
        let row = &mut self.rows[index];
        let skip = self.tags.has(&row.original, TagType::Skip);
        let flag = self.tags.has(&row.original, TagType::Flag);
        let changed = row.skip != skip || row.flag != flag;
        row.skip = skip;
        row.flag = flag;
        changed
    }

    fn recompute_tags(&mut self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&index| self.apply_tags_to(index))
            .collect()
    }

    /// Replace the tag store and recompute every row's skip/flag
    ///
    /// Returns positions whose values changed.
    pub fn load_tags(&mut self, tags: TagStore) -> Vec<usize> {
        self.tags = tags;
        self.recompute_tags()
    }

    /// Merge loaded entries into the tag store, recomputing every row
    pub fn merge_tags(&mut self, tags: TagStore) -> Vec<usize> {
        self.tags.extend(tags);
        self.recompute_tags()
    }

    /// Recompute skip/flag for exactly the rows whose `original` is `path`
    pub fn sync_tags_for(&mut self, path: &str) -> Vec<RowRef> {
        let matching: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.original == path)
            .map(|(i, _)| i)
            .collect();
        for &index in &matching {
            self.apply_tags_to(index);
        }
        matching.into_iter().map(|index| self.handle(index)).collect()
    }

    /// Record persisted tag entries and resync the affected rows
    pub fn record_tags(&mut self, entries: Vec<TagEntry>) -> Vec<RowRef> {
        let mut paths = Vec::new();
        for entry in entries {
            if !paths.contains(&entry.audio_file) {
                paths.push(entry.audio_file.clone());
            }
            self.tags.insert(entry);
        }
        paths.iter().flat_map(|path| self.sync_tags_for(path)).collect()
    }

    /// Drop persisted-removed tags and resync the affected rows
    pub fn forget_tags(&mut self, paths: &[String], tag_type: TagType) -> Vec<RowRef> {
        for path in paths {
            self.tags.remove(path, tag_type);
        }
        paths.iter().flat_map(|path| self.sync_tags_for(path)).collect()
    }

    // --- phraselist ---

    /// Outer-join a phraselist on `filepath`
    ///
    /// Rows with an empty (or `nan`) transcription take the phraselist's;
    /// phraselist paths with no row are appended as new rows.
    pub fn merge_phraselist(&mut self, phraselist: &Phraselist) -> PhraselistMerge {
        let mut updated = Vec::new();
        let mut matched = HashSet::new();

        for (index, row) in self.rows.iter_mut().enumerate() {
            if let Some(transcription) = phraselist.get(&row.filepath) {
                matched.insert(row.filepath.clone());
                if row.transcription.is_empty() || row.transcription == "nan" {
                    row.transcription = transcription.to_string();
                    updated.push(index);
                }
            }
        }

        let new_rows: Vec<Row> = phraselist
            .iter()
            .filter(|(path, _)| !matched.contains(*path))
            .map(|(path, transcription)| Row {
                filename: paths::file_name(path).to_string(),
                filepath: path.to_string(),
                original: path.to_string(),
                key: path.to_string(),
                transcription: transcription.to_string(),
                is_relative: paths::is_relative(path),
                ..Row::default()
            })
            .collect();
        let appended = self.append_rows(new_rows, RecordSet::new());

        let any_transcriptions = self.rows.iter().any(|row| {
            !row.transcription.is_empty() && row.transcription != "nan"
        });
        if !any_transcriptions {
            warn!("No transcriptions added during merge");
        }

        PhraselistMerge { updated, appended }
    }

    /// Column values for one column, in backing order
    pub fn column_values(&self, column: Column) -> impl Iterator<Item = CellValue<'_>> {
        self.rows.iter().map(move |row| row.get(column))
    }
}
