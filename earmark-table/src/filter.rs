//! Comparison criteria and the per-cell filter matrix

use crate::column::Column;
use crate::error::TableError;
use std::fmt;
use std::str::FromStr;

/// Supported comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ne,
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Evaluate `lhs <op> rhs`
    ///
    /// NaN on either side satisfies `!=` and nothing else.
    pub fn evaluate(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Ne => lhs != rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Ne => "!=",
            CompareOp::Eq => "==",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

impl FromStr for CompareOp {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "!=" => Ok(CompareOp::Ne),
            "==" => Ok(CompareOp::Eq),
            ">" => Ok(CompareOp::Gt),
            ">=" | "=>" => Ok(CompareOp::Ge),
            "<" => Ok(CompareOp::Lt),
            "<=" | "=<" => Ok(CompareOp::Le),
            other => Err(TableError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(operator, value)` comparison against a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criterion {
    pub op: CompareOp,
    pub value: f64,
}

impl Criterion {
    pub fn new(op: CompareOp, value: f64) -> Self {
        Self { op, value }
    }

    pub fn matches(&self, cell: f64) -> bool {
        self.op.evaluate(cell, self.value)
    }
}

/// Row-major boolean grid, one column per schema column
///
/// A row is visible iff every cell in it is true. The grid always holds at
/// least one row so its shape stays valid for an empty table.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatrix {
    rows: usize,
    cells: Vec<bool>,
}

impl FilterMatrix {
    /// All-true matrix for a table of `rows` rows
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            cells: vec![true; rows.max(1) * Column::COUNT],
        }
    }

    /// Logical row count (may be 0)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Physical shape `(rows, columns)`, never smaller than 1×1
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.max(1), Column::COUNT)
    }

    pub fn get(&self, row: usize, column: Column) -> bool {
        self.cells
            .get(row * Column::COUNT + column.index())
            .copied()
            .unwrap_or(false)
    }

    /// Conjunction across the row; rows past the end are not visible
    pub fn is_visible(&self, row: usize) -> bool {
        if row >= self.rows {
            return false;
        }
        let start = row * Column::COUNT;
        self.cells[start..start + Column::COUNT].iter().all(|&cell| cell)
    }

    /// Column slice, one value per logical row
    pub fn column(&self, column: Column) -> Vec<bool> {
        (0..self.rows).map(|row| self.get(row, column)).collect()
    }

    /// Overwrite one column wholesale; other columns keep their state
    pub fn set_column<I>(&mut self, column: Column, values: I)
    where
        I: IntoIterator<Item = bool>,
    {
        for (row, value) in values.into_iter().take(self.rows).enumerate() {
            self.cells[row * Column::COUNT + column.index()] = value;
        }
    }

    /// Extend by `extra` all-true rows
    pub fn grow(&mut self, extra: usize) {
        if extra == 0 {
            return;
        }
        let new_rows = self.rows + extra;
        self.cells.truncate(self.rows * Column::COUNT);
        self.cells.resize(new_rows * Column::COUNT, true);
        self.rows = new_rows;
    }

    /// Reorder rows so that new row `i` is old row `order[i]`
    ///
    /// `order` must be a permutation of `0..rows`.
    pub fn permute(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.rows);
        let mut cells = Vec::with_capacity(self.cells.len());
        for &old in order {
            let start = old * Column::COUNT;
            cells.extend_from_slice(&self.cells[start..start + Column::COUNT]);
        }
        if cells.is_empty() {
            cells = vec![true; Column::COUNT];
        }
        self.cells = cells;
    }

    /// Number of visible rows
    pub fn visible_count(&self) -> usize {
        (0..self.rows).filter(|&row| self.is_visible(row)).count()
    }
}
