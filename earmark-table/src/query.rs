//! Sort/filter/regex layer over the backing table
//!
//! Criteria overwrite only the filter-matrix columns they name; every other
//! column keeps whatever an earlier call left there. After any change the
//! materialization cursor restarts and one page is exposed again.

use crate::column::Column;
use crate::error::{Result, TableError};
use crate::filter::{Criterion, FilterMatrix};
use crate::line_query::LineQuery;
use crate::model::{TableModel, DEFAULT_PAGE_SIZE};
use crate::row::{CellValue, Row};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, info};

/// One sort key; `ascending == false` sorts descending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: Column,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Owns the backing table and applies declarative queries to it
#[derive(Debug)]
pub struct QueryEngine {
    model: TableModel,
    sort_keys: Vec<SortKey>,
    filters: Vec<(Column, Criterion)>,
    regexes: Vec<(Column, String)>,
    page_size: usize,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(TableModel::new())
    }
}

impl QueryEngine {
    pub fn new(model: TableModel) -> Self {
        Self {
            model,
            sort_keys: vec![SortKey::asc(Column::Order)],
            filters: Vec::new(),
            regexes: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn model(&self) -> &TableModel {
        &self.model
    }

    /// Mutable access for loads, appends and tag synchronization
    pub fn model_mut(&mut self) -> &mut TableModel {
        &mut self.model
    }

    /// Sort keys in effect, including the trailing `order` tie-break
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort_keys
    }

    /// Comparison criteria applied since the last reset
    pub fn filters(&self) -> &[(Column, Criterion)] {
        &self.filters
    }

    /// Regex criteria applied since the last reset
    pub fn regexes(&self) -> &[(Column, String)] {
        &self.regexes
    }

    fn invalidate(&mut self) {
        self.model.restart_materialization();
        self.model.materialize_more(self.page_size);
    }

    /// Stable multi-key sort
    ///
    /// `order` ascending is appended as the final key when absent. Rows move
    /// together with their filter-matrix row; row references follow their
    /// record to its new position.
    pub fn sort_by(&mut self, keys: &[SortKey]) {
        let start = Instant::now();
        let mut keys = keys.to_vec();
        if !keys.iter().any(|key| key.column == Column::Order) {
            keys.push(SortKey::asc(Column::Order));
        }

        let rows = self.model.rows();
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], &keys));
        self.model.reorder(&order);

        let names: Vec<&str> = keys.iter().map(|key| key.column.name()).collect();
        info!(
            "Sort operation on {} column(s) and {} rows took {:.3} seconds to complete",
            names.join(", "),
            self.model.len(),
            start.elapsed().as_secs_f64()
        );
        self.sort_keys = keys;
        self.invalidate();
    }

    /// Overwrite the filter-matrix column of each named column with the
    /// result of its comparison
    ///
    /// Cells compare numerically; text that does not parse as a number is
    /// NaN. Empty criteria leave the matrix untouched.
    pub fn filter_by(&mut self, criteria: &[(Column, Criterion)]) {
        if criteria.is_empty() {
            return;
        }
        for &(column, criterion) in criteria {
            info!("Filtering {} by {} {}", column, criterion.op, criterion.value);
            let values: Vec<bool> = self
                .model
                .column_values(column)
                .map(|cell| criterion.matches(cell.as_f64()))
                .collect();
            self.model.filter_mut().set_column(column, values);
            upsert(&mut self.filters, column, criterion);
        }
        self.invalidate();
    }

    /// Case-insensitive regex containment per named column
    ///
    /// Columns are processed in schema order. A pattern that fails to compile
    /// returns `RegexSyntax`; columns processed before it keep their new
    /// filter values, the failing column and those after it are untouched.
    pub fn regex_by(&mut self, criteria: &[(Column, String)]) -> Result<()> {
        if criteria.is_empty() {
            return Ok(());
        }
        let mut outcome = Ok(());
        for column in Column::ALL {
            let Some((_, pattern)) = criteria.iter().rev().find(|(c, _)| *c == column) else {
                continue;
            };
            let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => regex,
                Err(err) => {
                    outcome = Err(TableError::RegexSyntax {
                        pattern: pattern.clone(),
                        message: err.to_string(),
                    });
                    break;
                }
            };
            let values: Vec<bool> = self
                .model
                .column_values(column)
                .map(|cell| match cell {
                    CellValue::Text(text) => regex.is_match(text),
                    other => regex.is_match(&other.to_string()),
                })
                .collect();
            debug!(
                "Filtering {} by regex match of {} with {} matches",
                column,
                pattern,
                values.iter().filter(|&&v| v).count()
            );
            self.model.filter_mut().set_column(column, values);
            upsert(&mut self.regexes, column, pattern.clone());
        }
        self.invalidate();
        outcome
    }

    /// Clear every criterion and return to default order
    pub fn reset(&mut self) {
        debug!("Resetting query state");
        let rows = self.model.len();
        *self.model.filter_mut() = FilterMatrix::new(rows);
        self.filters.clear();
        self.regexes.clear();
        self.sort_by(&[]);
    }

    /// Sort, then filter, then regex, as parsed from a line query
    pub fn apply(&mut self, query: &LineQuery) -> Result<()> {
        self.sort_by(query.sort_keys());
        self.filter_by(query.filters());
        self.regex_by(query.regexes())
    }

    /// Number of rows currently passing the filter
    pub fn visible_count(&self) -> usize {
        self.model.filter().visible_count()
    }
}

fn upsert<T>(entries: &mut Vec<(Column, T)>, column: Column, value: T) {
    match entries.iter_mut().find(|(c, _)| *c == column) {
        Some(entry) => entry.1 = value,
        None => entries.push((column, value)),
    }
}

fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = compare_cells(a.get(key.column), b.get(key.column), key.ascending);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// NaN sorts last in both directions
fn compare_cells(a: CellValue<'_>, b: CellValue<'_>, ascending: bool) -> Ordering {
    if let (CellValue::Float(x), CellValue::Float(y)) = (a, b) {
        match (x.is_nan(), y.is_nan()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
    }
    let ordering = a.total_cmp(&b);
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompareOp;
    use crate::parsers::RecordSet;

    fn engine(snrs: &[f64]) -> QueryEngine {
        let rows = snrs
            .iter()
            .enumerate()
            .map(|(i, &snr)| Row {
                key: format!("k{i}"),
                filename: format!("f{i}.wav"),
                snr,
                ..Row::default()
            })
            .collect();
        let mut model = TableModel::new();
        model.load_table(rows, RecordSet::new());
        QueryEngine::new(model)
    }

    #[test]
    fn test_default_tie_break_appended() {
        let mut engine = engine(&[1.0, 2.0]);
        engine.sort_by(&[SortKey::desc(Column::Snr)]);
        assert_eq!(
            engine.sort_keys(),
            &[SortKey::desc(Column::Snr), SortKey::asc(Column::Order)]
        );
        assert_eq!(engine.model().rows()[0].key, "k1");
    }

    #[test]
    fn test_nan_sorts_last_both_directions() {
        let rows = [f64::NAN, 1.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &word_score)| Row {
                key: format!("k{i}"),
                word_score,
                ..Row::default()
            })
            .collect();
        let mut model = TableModel::new();
        model.load_table(rows, RecordSet::new());
        let mut engine = QueryEngine::new(model);

        engine.sort_by(&[SortKey::asc(Column::WordScore)]);
        assert_eq!(engine.model().rows()[2].key, "k0");
        engine.sort_by(&[SortKey::desc(Column::WordScore)]);
        assert_eq!(engine.model().rows()[2].key, "k0");
        assert_eq!(engine.model().rows()[0].key, "k2");
    }

    #[test]
    fn test_filter_overwrites_only_named_column() {
        let mut engine = engine(&[1.0, 5.0, 10.0]);
        engine.filter_by(&[(Column::Snr, Criterion::new(CompareOp::Gt, 2.0))]);
        engine
            .regex_by(&[(Column::Filename, "f[01]".to_string())])
            .unwrap();
        assert_eq!(engine.visible_count(), 1);
        assert_eq!(engine.model().filter().column(Column::Snr), vec![false, true, true]);
    }

    #[test]
    fn test_filter_restarts_materialization() {
        let mut engine = engine(&[1.0, 5.0, 10.0]).with_page_size(1);
        engine.model_mut().materialize_more(3);
        engine.filter_by(&[(Column::Snr, Criterion::new(CompareOp::Ge, 5.0))]);
        assert_eq!(engine.model().materialized(), &[1]);
    }

    #[test]
    fn test_regex_is_case_insensitive_on_numbers_too() {
        let mut engine = engine(&[1.5, 22.0]);
        engine
            .regex_by(&[(Column::Filename, "F1".to_string()), (Column::Snr, "^22".to_string())])
            .unwrap();
        assert_eq!(engine.model().filter().column(Column::Filename), vec![false, true]);
        assert_eq!(engine.model().filter().column(Column::Snr), vec![false, true]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut engine = engine(&[3.0, 1.0]);
        engine.sort_by(&[SortKey::asc(Column::Snr)]);
        engine.filter_by(&[(Column::Snr, Criterion::new(CompareOp::Lt, 2.0))]);
        engine.reset();
        assert_eq!(engine.visible_count(), 2);
        assert!(engine.filters().is_empty());
        assert_eq!(engine.model().rows()[0].key, "k0");
    }
}
