//! Alignment field scoring
//!
//! Alignment fields embed repeated `{start finish label score}` groups. Each
//! group contributes `score / (finish - start)`, or 0 for a zero-length
//! segment; the field score is the sum over its groups.

use once_cell::sync::Lazy;
use regex::Regex;

static GROUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(\d+) (\d+) (\S+) (-?\d+\.\d+?)\}").expect("Invalid regex")
});

/// One parsed `{start finish label score}` group
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: i64,
    pub finish: i64,
    pub label: String,
    pub score: f64,
}

impl Segment {
    /// Score per time unit; zero-length segments score 0
    pub fn normalized_score(&self) -> f64 {
        let duration = self.finish - self.start;
        if duration == 0 {
            0.0
        } else {
            self.score / duration as f64
        }
    }
}

/// Extract every well-formed group from `field`
///
/// Groups whose integers overflow are skipped.
pub fn segments(field: &str) -> Vec<Segment> {
    GROUP_RE
        .captures_iter(field)
        .filter_map(|caps| {
            Some(Segment {
                start: caps[1].parse().ok()?,
                finish: caps[2].parse().ok()?,
                label: caps[3].to_string(),
                score: caps[4].parse().ok()?,
            })
        })
        .collect()
}

/// Sum of normalized group scores, or `None` when the field has no groups
pub fn field_score(field: &str) -> Option<f64> {
    let segs = segments(field);
    if segs.is_empty() {
        None
    } else {
        Some(segs.iter().map(Segment::normalized_score).sum())
    }
}

/// `wordScore`, falling back to `phoneScore`, falling back to negative infinity
pub fn aggregate_score(word: Option<f64>, phone: Option<f64>) -> f64 {
    word.or(phone).unwrap_or(f64::NEG_INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_group_word_score() {
        let score = field_score("{0 100 w1 -1.00}{100 250 w2 -0.50}").unwrap();
        let expected = -0.01 - 0.50 / 150.0;
        assert!((score - expected).abs() < 1e-12);
        assert!((score - -0.013333).abs() < 1e-5);
    }

    #[test]
    fn test_zero_duration_scores_zero() {
        let segs = segments("{5 5 sil -3.0}");
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].label, "sil");
        assert_eq!(segs[0].normalized_score(), 0.0);
    }

    #[test]
    fn test_no_groups_is_none() {
        assert_eq!(field_score(""), None);
        assert_eq!(field_score("hello world"), None);
        // score must carry a decimal point
        assert_eq!(field_score("{0 10 a -1}"), None);
    }

    #[test]
    fn test_aggregate_prefers_word_then_phone() {
        assert_eq!(aggregate_score(Some(-1.0), Some(-2.0)), -1.0);
        assert_eq!(aggregate_score(None, Some(-2.0)), -2.0);
        assert_eq!(aggregate_score(None, None), f64::NEG_INFINITY);
    }
}
