//! Phraselist parser
//!
//! Data lines look like `<id> {{<transcription>} {<filename>}}`. Comment lines
//! and lines that do not match are skipped silently.

use crate::error::Result;
use crate::paths::PathNormalizer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

static PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.* \{\{(.*)\} \{(.*)\}\}$").expect("Invalid regex"));

/// Normalized filepath to transcription, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phraselist {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Phraselist {
    /// Later transcriptions for the same path replace earlier ones
    pub fn insert(&mut self, filepath: String, transcription: String) {
        match self.index.get(&filepath) {
            Some(&i) => self.entries[i].1 = transcription,
            None => {
                self.index.insert(filepath.clone(), self.entries.len());
                self.entries.push((filepath, transcription));
            }
        }
    }

    pub fn get(&self, filepath: &str) -> Option<&str> {
        self.index.get(filepath).map(|&i| self.entries[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn parse_phraselist(content: &str, normalizer: &PathNormalizer) -> Phraselist {
    let mut phraselist = Phraselist::default();
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        if let Some(caps) = PHRASE_RE.captures(line.trim_end_matches('\r')) {
            phraselist.insert(normalizer.normalize(&caps[2]), caps[1].to_string());
        }
    }
    phraselist
}

pub fn parse_phraselist_file(path: &Path, normalizer: &PathNormalizer) -> Result<Phraselist> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_phraselist(&content, normalizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_transcription_and_normalized_path() {
        let content = "\
# header
utt1 {{hello world} {/dat/corpora/a.wav}}
garbage line
utt2 {{second} {/smb/dat/corpora/b.wav}}
";
        let phraselist = parse_phraselist(content, &PathNormalizer::new("/smb/", "/home/me"));
        assert_eq!(phraselist.len(), 2);
        assert_eq!(phraselist.get("//dat/corpora/a.wav"), Some("hello world"));
        assert_eq!(phraselist.get("//dat/corpora/b.wav"), Some("second"));
    }

    #[test]
    fn test_commented_data_line_skipped() {
        let content = "#utt1 {{hidden} {/dat/a.wav}}\n";
        assert!(parse_phraselist(content, &PathNormalizer::default()).is_empty());
    }
}
