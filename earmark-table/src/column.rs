//! Canonical column schema

use crate::error::TableError;
use std::fmt;
use std::str::FromStr;

/// Storage kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

/// One column of the canonical row schema
///
/// Declaration order is schema order: filter matrix columns and regex
/// application follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Order,
    CombinedScore,
    Score,
    AggScore,
    Snr,
    Filename,
    Filepath,
    Original,
    Key,
    Speaker,
    Skip,
    Flag,
    Transcription,
    Phones,
    Words,
    IsRelative,
    Orthography,
    Net,
    Nota,
    Transcriber,
    PhoneScore,
    WordScore,
}

impl Column {
    /// Number of columns in the schema
    pub const COUNT: usize = 22;

    /// All columns in schema order
    pub const ALL: [Column; Column::COUNT] = [
        Column::Order,
        Column::CombinedScore,
        Column::Score,
        Column::AggScore,
        Column::Snr,
        Column::Filename,
        Column::Filepath,
        Column::Original,
        Column::Key,
        Column::Speaker,
        Column::Skip,
        Column::Flag,
        Column::Transcription,
        Column::Phones,
        Column::Words,
        Column::IsRelative,
        Column::Orthography,
        Column::Net,
        Column::Nota,
        Column::Transcriber,
        Column::PhoneScore,
        Column::WordScore,
    ];

    /// Position in the schema (filter matrix column index)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in queries and raw records
    pub fn name(self) -> &'static str {
        match self {
            Column::Order => "order",
            Column::CombinedScore => "combinedscore",
            Column::Score => "score",
            Column::AggScore => "aggscore",
            Column::Snr => "snr",
            Column::Filename => "filename",
            Column::Filepath => "filepath",
            Column::Original => "original",
            Column::Key => "key",
            Column::Speaker => "speaker",
            Column::Skip => "skip",
            Column::Flag => "flag",
            Column::Transcription => "transcription",
            Column::Phones => "phones",
            Column::Words => "words",
            Column::IsRelative => "is_relative",
            Column::Orthography => "orthography",
            Column::Net => "net",
            Column::Nota => "nota",
            Column::Transcriber => "transcriber",
            Column::PhoneScore => "phoneScore",
            Column::WordScore => "wordScore",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Order => ColumnKind::Int,
            Column::CombinedScore
            | Column::Score
            | Column::AggScore
            | Column::Snr
            | Column::PhoneScore
            | Column::WordScore => ColumnKind::Float,
            Column::Skip | Column::Flag | Column::IsRelative | Column::Nota => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }

    /// Columns the line-query grammar treats as truthy/falsy flags
    pub fn is_flag(self) -> bool {
        matches!(self, Column::Skip | Column::Flag | Column::Nota)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| TableError::UnknownColumn(s.to_string()))
    }
}
