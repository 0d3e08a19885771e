//! Compact `key:value` query grammar
//!
//! ```text
//! snr:>10 speaker:^f0 score:desc skip:no
//! ```
//!
//! `asc`/`desc` make the key a sort key. Otherwise flag columns take a
//! truthy/falsy word, numeric columns an operator and number, and text
//! columns a regex. Bad tokens are dropped with a warning; the rest of the
//! line still applies.

use crate::column::{Column, ColumnKind};
use crate::filter::{CompareOp, Criterion};
use crate::query::SortKey;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(!?[<=>]{1,2})(\d*(\.\d+)?)$").expect("Invalid regex"));

const TRUTHY: [&str; 8] = ["1", "on", "yes", "y", "true", "t", "tr", "tru"];

/// Parsed line query, ready for [`QueryEngine::apply`](crate::QueryEngine::apply)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineQuery {
    sort_keys: Vec<SortKey>,
    filters: Vec<(Column, Criterion)>,
    regexes: Vec<(Column, String)>,
    warnings: Vec<String>,
}

impl LineQuery {
    pub fn parse(input: &str) -> Self {
        info!("Received parse string {}", input);
        let mut query = LineQuery::default();

        // a repeated key keeps its first position and takes the last value
        let mut operations: Vec<(Column, &str)> = Vec::new();
        for token in input.split_whitespace() {
            let (key, value) = token.split_once(':').unwrap_or((token, ""));
            let column = match key.parse::<Column>() {
                Ok(column) => column,
                Err(_) => {
                    query.warn(format!("Parser doesn't see key: \"{}\"", key));
                    continue;
                }
            };
            match operations.iter_mut().find(|(c, _)| *c == column) {
                Some(op) => op.1 = value,
                None => operations.push((column, value)),
            }
        }
        debug!("Parsed commands: {:?}", operations);

        for (column, value) in operations {
            let lowered = value.to_lowercase();
            if lowered == "asc" || lowered == "desc" {
                query.sort_keys.push(SortKey {
                    column,
                    ascending: lowered == "asc",
                });
            } else if column.is_flag() {
                let target = if TRUTHY.contains(&lowered.as_str()) { 1.0 } else { 0.0 };
                query
                    .filters
                    .push((column, Criterion::new(CompareOp::Eq, target)));
            } else if column.kind() != ColumnKind::Text {
                if let Some(criterion) = query.numeric_criterion(value) {
                    query.filters.push((column, criterion));
                }
            } else if value.is_empty() {
                query.warn(format!("Received empty string for regex match on {}", column));
            } else {
                query.regexes.push((column, value.to_string()));
            }
        }

        if !query.sort_keys.iter().any(|key| key.column == Column::Order) {
            query.sort_keys.push(SortKey::asc(Column::Order));
        }
        query
    }

    fn numeric_criterion(&mut self, value: &str) -> Option<Criterion> {
        let Some(caps) = NUMERIC_RE.captures(value) else {
            self.warn(format!("Unable to numerically parse {}", value));
            return None;
        };
        let op = match caps[1].parse::<CompareOp>() {
            Ok(op) => op,
            Err(_) => {
                self.warn(format!(
                    "Did not recognize operation {} in {} expression",
                    &caps[1], value
                ));
                return None;
            }
        };
        match caps[2].parse::<f64>() {
            Ok(number) if !caps[2].is_empty() => Some(Criterion::new(op, number)),
            _ => {
                self.warn(format!(
                    "Did not recognize value \"{}\" in {} expression",
                    &caps[2], value
                ));
                None
            }
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Sort keys, always ending with (or containing) `order`
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort_keys
    }

    pub fn filters(&self) -> &[(Column, Criterion)] {
        &self.filters
    }

    pub fn regexes(&self) -> &[(Column, String)] {
        &self.regexes
    }

    /// Tokens that were dropped, one message each
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_tokens() {
        let query = LineQuery::parse("score:DESC speaker:asc");
        assert_eq!(
            query.sort_keys(),
            &[
                SortKey::desc(Column::Score),
                SortKey::asc(Column::Speaker),
                SortKey::asc(Column::Order)
            ]
        );
        assert!(query.is_clean());
    }

    #[test]
    fn test_explicit_order_not_duplicated() {
        let query = LineQuery::parse("order:desc");
        assert_eq!(query.sort_keys(), &[SortKey::desc(Column::Order)]);
    }

    #[test]
    fn test_flag_values() {
        let query = LineQuery::parse("skip:Yes flag:nope nota:TRU");
        assert_eq!(
            query.filters(),
            &[
                (Column::Skip, Criterion::new(CompareOp::Eq, 1.0)),
                (Column::Flag, Criterion::new(CompareOp::Eq, 0.0)),
                (Column::Nota, Criterion::new(CompareOp::Eq, 1.0)),
            ]
        );
    }

    #[test]
    fn test_numeric_values() {
        let query = LineQuery::parse("snr:>=10 score:=<-1 combinedscore:!=.5 aggscore:=>2");
        // "-1" does not match the grammar
        assert_eq!(
            query.filters(),
            &[
                (Column::Snr, Criterion::new(CompareOp::Ge, 10.0)),
                (Column::CombinedScore, Criterion::new(CompareOp::Ne, 0.5)),
                (Column::AggScore, Criterion::new(CompareOp::Ge, 2.0)),
            ]
        );
        assert_eq!(query.warnings().len(), 1);
    }

    #[test]
    fn test_malformed_numeric_tokens_dropped() {
        for input in ["snr:>>5", "snr:>", "snr:5", "snr:!5", "snr:>5x"] {
            let query = LineQuery::parse(input);
            assert!(query.filters().is_empty(), "{input} should be dropped");
            assert_eq!(query.warnings().len(), 1, "{input} should warn once");
        }
    }

    #[test]
    fn test_text_columns_are_regexes() {
        let query = LineQuery::parse("filename:b transcription: speaker:^F");
        assert_eq!(
            query.regexes(),
            &[
                (Column::Filename, "b".to_string()),
                (Column::Speaker, "^F".to_string())
            ]
        );
        assert_eq!(query.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_keys_skipped() {
        let query = LineQuery::parse("bogus:1 filename:a");
        assert_eq!(query.regexes().len(), 1);
        assert_eq!(query.warnings().len(), 1);
    }

    #[test]
    fn test_repeated_key_last_value_wins() {
        let query = LineQuery::parse("filename:a speaker:x filename:b");
        assert_eq!(
            query.regexes(),
            &[
                (Column::Filename, "b".to_string()),
                (Column::Speaker, "x".to_string())
            ]
        );
    }

    #[test]
    fn test_regex_value_may_contain_colon() {
        let query = LineQuery::parse("filepath:c:/data");
        assert_eq!(query.regexes(), &[(Column::Filepath, "c:/data".to_string())]);
    }
}
