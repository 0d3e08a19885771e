//! Legacy flat-file database parser
//!
//! ```text
//! # comment lines are only allowed before the first entry
//! Filename = spk01/a.wav
//! Key = spk01/a
//! Score = -3.2
//! .
//! ```
//!
//! Keys are case-insensitive (lowercased on read), values keep their case.
//! An entry is committed when its `.` terminator is reached.

use super::{RawRecord, RecordSet};
use crate::error::{Result, TableError};
use crate::paths::{self, PathResolver};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

const COMMENT: char = '#';
const TERMINATOR: &str = ".";
const SEPARATOR: &str = " = ";
const REQUIRED: [&str; 2] = ["filename", "key"];

/// Parse database `content`, resolving relative filenames against `parent`
///
/// `source` names the input in errors. Malformed entries are logged and
/// skipped; only input with no non-comment content is an error.
pub fn parse_database(source: &str, content: &str, parent: &str) -> Result<RecordSet> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end()))
        .skip_while(|(_, line)| line.starts_with(COMMENT))
        .peekable();

    if lines.peek().is_none() {
        return Err(TableError::EmptyInput(source.to_string()));
    }

    let mut records = RecordSet::new();
    let mut next_order: u64 = 0;
    let mut pending = PendingEntry::default();

    for (line_no, line) in lines {
        if line == TERMINATOR {
            if pending.is_empty() {
                continue;
            }
            match std::mem::take(&mut pending).finish() {
                Ok(mut record) => {
                    record.insert("order".to_string(), next_order.to_string());
                    next_order += 1;
                    let filename = record.get("filename").cloned().unwrap_or_default();
                    let relative = paths::is_relative(&filename);
                    record.insert(
                        "is_relative".to_string(),
                        if relative { "True" } else { "False" }.to_string(),
                    );
                    record.insert(
                        "filename".to_string(),
                        paths::resolve_relative(&filename, parent),
                    );
                    let key = record.get("key").cloned().unwrap_or_default();
                    records.insert(key, record);
                }
                Err(err) => {
                    warn!("{}: skipping database entry: {}", source, err);
                    records.note_rejected();
                }
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }
        pending.push(line_no, line);
    }

    if !pending.is_empty() {
        warn!(
            "{}: entry starting at line {} has no '{}' terminator, dropped",
            source, pending.first_line, TERMINATOR
        );
        records.note_rejected();
    }

    Ok(records)
}

/// Read and parse a database file
///
/// Relative filenames resolve against the file's parent directory, mapped to
/// the network namespace when the resolver can. Empty files log an error and
/// yield an empty set.
pub fn parse_database_file(path: &Path, resolver: &dyn PathResolver) -> Result<RecordSet> {
    let start = Instant::now();
    let content = std::fs::read_to_string(path)?;

    let local_parent = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = resolver
        .local_to_network(&local_parent)
        .unwrap_or_else(|| {
            warn!("No network path for {}, using local path", local_parent);
            local_parent.clone()
        });

    let source = path.display().to_string();
    let records = match parse_database(&source, &content, &parent) {
        Ok(records) => records,
        Err(TableError::EmptyInput(name)) => {
            error!("No contents in file {}", name);
            return Ok(RecordSet::new());
        }
        Err(err) => return Err(err),
    };

    info!(
        "Parsing took {:.3} seconds for {} entries ({} rejected)",
        start.elapsed().as_secs_f64(),
        records.len(),
        records.rejected()
    );
    Ok(records)
}

#[derive(Debug, Default)]
struct PendingEntry {
    first_line: usize,
    fields: RawRecord,
    malformed: Option<TableError>,
}

impl PendingEntry {
    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.malformed.is_none()
    }

    fn push(&mut self, line_no: usize, line: &str) {
        if self.is_empty() {
            self.first_line = line_no;
        }
        if self.malformed.is_some() {
            return;
        }
        match line.split_once(SEPARATOR) {
            Some((key, value)) => {
                self.fields.insert(key.to_lowercase(), value.to_string());
            }
            None => {
                self.malformed = Some(TableError::MalformedEntry {
                    line: line_no,
                    reason: format!("expected 'key{}value', got {:?}", SEPARATOR, line),
                });
            }
        }
    }

    fn finish(self) -> Result<RawRecord> {
        if let Some(err) = self.malformed {
            return Err(err);
        }
        if let Some(missing) = REQUIRED.iter().find(|k| !self.fields.contains_key(**k)) {
            return Err(TableError::MalformedEntry {
                line: self.first_line,
                reason: format!("missing '{}' field", missing),
            });
        }
        Ok(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::IdentityResolver;

    const SAMPLE: &str = "\
# generated by aligner
# second comment
Filename = spk01/a.wav
Key = spk01/a
Score = -3.25
.
FILENAME = //dat/corpora/b.wav
key = spk01/b
Words = {0 100 w1 -1.00}
.
";

    #[test]
    fn test_parses_entries_in_order() {
        let records = parse_database("sample", SAMPLE, "//dat/db").unwrap();
        assert_eq!(records.len(), 2);

        let a = records.get("spk01/a").unwrap();
        assert_eq!(a["filename"], "//dat/db/spk01/a.wav");
        assert_eq!(a["is_relative"], "True");
        assert_eq!(a["order"], "0");
        assert_eq!(a["score"], "-3.25");

        let b = records.get("spk01/b").unwrap();
        assert_eq!(b["filename"], "//dat/corpora/b.wav");
        assert_eq!(b["is_relative"], "False");
        assert_eq!(b["order"], "1");
    }

    #[test]
    fn test_value_keeps_case_and_extra_separators() {
        let content = "filename = A.WAV\nkey = K\ntranscription = x = y\n.\n";
        let records = parse_database("s", content, "").unwrap();
        let record = records.get("K").unwrap();
        assert_eq!(record["filename"], "A.WAV");
        assert_eq!(record["transcription"], "x = y");
    }

    #[test]
    fn test_entry_missing_key_is_skipped() {
        let content = "filename = a.wav\n.\nfilename = b.wav\nkey = b\n.\n";
        let records = parse_database("s", content, "").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.rejected(), 1);
        assert_eq!(records.get("b").unwrap()["order"], "0");
    }

    #[test]
    fn test_malformed_line_skips_only_its_entry() {
        let content = "filename = a.wav\nkey = a\nno separator here\n.\nfilename = b.wav\nkey = b\n.\n";
        let records = parse_database("s", content, "").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("b"));
        assert_eq!(records.rejected(), 1);
    }

    #[test]
    fn test_unterminated_trailing_entry_dropped() {
        let content = "filename = a.wav\nkey = a\n.\nfilename = b.wav\nkey = b\n";
        let records = parse_database("s", content, "").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.rejected(), 1);
    }

    #[test]
    fn test_comment_only_is_empty_input() {
        assert!(matches!(
            parse_database("only-comments", "# a\n# b\n", ""),
            Err(TableError::EmptyInput(name)) if name == "only-comments"
        ));
        assert!(matches!(parse_database("e", "", ""), Err(TableError::EmptyInput(_))));
    }

    #[test]
    fn test_duplicate_key_overwrites() {
        let content = "filename = a.wav\nkey = k\n.\nfilename = b.wav\nkey = k\n.\n";
        let records = parse_database("s", content, "").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("k").unwrap()["filename"], "b.wav");
    }

    #[test]
    fn test_file_wrapper_degrades_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        std::fs::write(&path, "").unwrap();
        let records = parse_database_file(&path, &IdentityResolver).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_file_wrapper_resolves_against_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.db");
        std::fs::write(&path, "filename = ./a.wav\nkey = a\n.\n").unwrap();
        let records = parse_database_file(&path, &IdentityResolver).unwrap();
        let expected = format!("{}/a.wav", dir.path().to_string_lossy());
        assert_eq!(records.get("a").unwrap()["filename"], expected);
    }
}
