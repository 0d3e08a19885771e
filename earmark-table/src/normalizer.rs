//! Raw records to canonical rows
//!
//! Every step is applied per row; a value that cannot be coerced falls back
//! to its column default instead of failing the batch.

use crate::alignment;
use crate::parsers::{RawRecord, RecordSet};
use crate::paths::{self, PathNormalizer};
use crate::row::Row;

const NOTA_SUFFIX: &str = "->__NOTA";

/// Converts raw records from any source into [`Row`]s
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    paths: PathNormalizer,
}

impl Normalizer {
    pub fn new(paths: PathNormalizer) -> Self {
        Self { paths }
    }

    pub fn path_normalizer(&self) -> &PathNormalizer {
        &self.paths
    }

    /// Normalize a whole record set, preserving its order
    ///
    /// `normalize_paths` is set for freshly parsed database content and
    /// never for appended local files.
    pub fn normalize(&self, records: &RecordSet, normalize_paths: bool) -> Vec<Row> {
        records
            .iter()
            .map(|(_, record)| self.normalize_record(record, normalize_paths))
            .collect()
    }

    pub fn normalize_record(&self, record: &RawRecord, normalize_paths: bool) -> Row {
        let text = |name: &str| record.get(name).cloned().unwrap_or_default();

        // filename -> filepath, then a fresh base name
        let filepath = text("filename");
        let filename = paths::file_name(&filepath).to_string();

        let snr = parse_snr(record.get("snr").map(String::as_str));
        let score = parse_score(record.get("score").map(String::as_str));
        let combinedscore = parse_score(record.get("combinedscore").map(String::as_str));

        let key = text("key");
        let nota = key.ends_with(NOTA_SUFFIX);
        let is_relative = record
            .get("is_relative")
            .map_or(false, |v| v.starts_with("True"));

        let phones = text("phones");
        let words = text("words");
        let phone_score = alignment::field_score(&phones);
        let word_score = alignment::field_score(&words);

        let mut row = Row {
            order: record
                .get("order")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            filename,
            filepath,
            original: text("original"),
            key,
            speaker: text("speaker"),
            transcription: text("transcription"),
            orthography: text("orthography"),
            phones,
            words,
            transcriber: text("transcriber"),
            net: text("net"),
            score,
            combinedscore,
            snr,
            phone_score: phone_score.unwrap_or(f64::NAN),
            word_score: word_score.unwrap_or(f64::NAN),
            aggscore: alignment::aggregate_score(word_score, phone_score),
            skip: false,
            flag: false,
            nota,
            is_relative,
        };

        if normalize_paths {
            if !row.is_relative {
                row.filepath = self.paths.normalize(&row.filepath);
                if !row.net.is_empty() {
                    row.net = self.paths.normalize(&row.net);
                }
            }
            if !row.original.is_empty() {
                row.original = self.paths.normalize(&row.original);
            }
        }

        if row.original.is_empty() {
            row.original = row.filepath.clone();
        }
        row
    }
}

/// `snr` text such as `"12.5db"`; absent, infinite or unparsable is 0
fn parse_snr(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let value = raw.split_once("db").map_or(raw, |(head, _)| head).trim();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Absent or unparsable scores are negative infinity so they sort last
fn parse_score(raw: Option<&str>) -> f64 {
    match raw.map(|v| v.trim().parse::<f64>()) {
        Some(Ok(v)) if !v.is_nan() => v,
        _ => f64::NEG_INFINITY,
    }
}
