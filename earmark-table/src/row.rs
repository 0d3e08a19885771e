//! Canonical row and typed cell access

use crate::column::Column;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// One entry per audio file (or pending virtual entry)
///
/// `skip` and `flag` are never read from a source file; they are always
/// recomputed from the tag store by the owning table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub order: i64,
    pub filename: String,
    pub filepath: String,
    pub original: String,
    pub key: String,
    pub speaker: String,
    pub transcription: String,
    pub orthography: String,
    pub phones: String,
    pub words: String,
    pub transcriber: String,
    pub net: String,
    pub score: f64,
    pub combinedscore: f64,
    pub snr: f64,
    #[serde(rename = "phoneScore")]
    pub phone_score: f64,
    #[serde(rename = "wordScore")]
    pub word_score: f64,
    pub aggscore: f64,
    pub skip: bool,
    pub flag: bool,
    pub nota: bool,
    pub is_relative: bool,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            order: 0,
            filename: String::new(),
            filepath: String::new(),
            original: String::new(),
            key: String::new(),
            speaker: String::new(),
            transcription: String::new(),
            orthography: String::new(),
            phones: String::new(),
            words: String::new(),
            transcriber: String::new(),
            net: String::new(),
            score: f64::NEG_INFINITY,
            combinedscore: f64::NEG_INFINITY,
            snr: 0.0,
            phone_score: f64::NAN,
            word_score: f64::NAN,
            aggscore: f64::NEG_INFINITY,
            skip: false,
            flag: false,
            nota: false,
            is_relative: false,
        }
    }
}

/// Borrowed, typed view of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
}

impl CellValue<'_> {
    /// Numeric view used by comparison filters
    ///
    /// Booleans compare as 0/1; text that does not parse as a number is NaN,
    /// which fails every comparison except `!=`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            CellValue::Int(v) => v as f64,
            CellValue::Float(v) => v,
            CellValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }

    /// Total order within one column
    pub fn total_cmp(&self, other: &CellValue<'_>) -> Ordering {
        match (self, other) {
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl Row {
    /// Typed cell for `column`
    pub fn get(&self, column: Column) -> CellValue<'_> {
        match column {
            Column::Order => CellValue::Int(self.order),
            Column::CombinedScore => CellValue::Float(self.combinedscore),
            Column::Score => CellValue::Float(self.score),
            Column::AggScore => CellValue::Float(self.aggscore),
            Column::Snr => CellValue::Float(self.snr),
            Column::Filename => CellValue::Text(&self.filename),
            Column::Filepath => CellValue::Text(&self.filepath),
            Column::Original => CellValue::Text(&self.original),
            Column::Key => CellValue::Text(&self.key),
            Column::Speaker => CellValue::Text(&self.speaker),
            Column::Skip => CellValue::Bool(self.skip),
            Column::Flag => CellValue::Bool(self.flag),
            Column::Transcription => CellValue::Text(&self.transcription),
            Column::Phones => CellValue::Text(&self.phones),
            Column::Words => CellValue::Text(&self.words),
            Column::IsRelative => CellValue::Bool(self.is_relative),
            Column::Orthography => CellValue::Text(&self.orthography),
            Column::Net => CellValue::Text(&self.net),
            Column::Nota => CellValue::Bool(self.nota),
            Column::Transcriber => CellValue::Text(&self.transcriber),
            Column::PhoneScore => CellValue::Float(self.phone_score),
            Column::WordScore => CellValue::Float(self.word_score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scores_sort_last_descending() {
        let row = Row::default();
        assert_eq!(row.score, f64::NEG_INFINITY);
        assert_eq!(row.combinedscore, f64::NEG_INFINITY);
        assert_eq!(row.snr, 0.0);
        assert!(!row.skip && !row.flag);
    }

    #[test]
    fn test_text_cells_compare_numerically_when_parsable() {
        assert_eq!(CellValue::Text("2.5").as_f64(), 2.5);
        assert!(CellValue::Text("abc").as_f64().is_nan());
        assert_eq!(CellValue::Bool(true).as_f64(), 1.0);
    }

    #[test]
    fn test_float_total_order_puts_negative_infinity_first() {
        let low = CellValue::Float(f64::NEG_INFINITY);
        let high = CellValue::Float(-3.0);
        assert_eq!(low.total_cmp(&high), Ordering::Less);
    }

    #[test]
    fn test_get_matches_fields() {
        let row = Row {
            order: 7,
            filename: "a.wav".to_string(),
            skip: true,
            ..Row::default()
        };
        assert_eq!(row.get(Column::Order), CellValue::Int(7));
        assert_eq!(row.get(Column::Filename), CellValue::Text("a.wav"));
        assert_eq!(row.get(Column::Skip), CellValue::Bool(true));
    }
}
