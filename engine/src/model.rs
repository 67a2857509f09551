use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used wherever a snapshot carries no original URL.
pub const UNKNOWN_URL: &str = "<unknown url>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDescriptor {
    /// Archive timestamp token, e.g. `20150312084512`. Sorts chronologically.
    pub timestamp: String,
    pub original_url: Option<String>,
}

impl SnapshotDescriptor {
    pub fn new(timestamp: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self { timestamp: timestamp.into(), original_url: Some(original_url.into()) }
    }

    pub fn url_label(&self) -> &str { self.original_url.as_deref().unwrap_or(UNKNOWN_URL) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotContent {
    pub html: String,
    /// Byte length of the archived body.
    pub length: usize,
    pub snapshot_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopWordMatches {
    /// Total occurrences over all matched words.
    pub count: usize,
    pub found: Vec<WordCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub text_length: usize,
    pub meta_tags: BTreeMap<String, String>,
    pub stop_words: StopWordMatches,
    pub is_spam: bool,
    pub spam_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotError {
    pub timestamp: String,
    pub original_url: Option<String>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    NoSnapshots,
    Clean,
    Suspicious,
    Spam,
    Error,
}

impl DomainStatus {
    /// Classification of a domain with at least one analyzed snapshot.
    pub fn from_percentage(spam_percentage: f64) -> Self {
        if spam_percentage >= 50.0 {
            DomainStatus::Spam
        } else if spam_percentage > 0.0 {
            DomainStatus::Suspicious
        } else {
            DomainStatus::Clean
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::NoSnapshots => "no_snapshots",
            DomainStatus::Clean => "clean",
            DomainStatus::Suspicious => "suspicious",
            DomainStatus::Spam => "spam",
            DomainStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    pub domain: String,
    pub snapshots_checked: usize,
    pub successfully_analyzed: usize,
    pub failed_snapshots: usize,
    pub spam_snapshots: usize,
    pub spam_percentage: f64,
    pub avg_spam_score: f64,
    pub domain_spam_score: f64,
    pub spam_detected: bool,
    pub total_stop_words_found: usize,
    pub stop_words_found: Vec<WordCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_spam_date: Option<String>,
    pub status: DomainStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_errors: Option<Vec<SnapshotError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainResult {
    fn empty(domain: &str, status: DomainStatus) -> Self {
        Self {
            domain: domain.to_string(),
            snapshots_checked: 0,
            successfully_analyzed: 0,
            failed_snapshots: 0,
            spam_snapshots: 0,
            spam_percentage: 0.0,
            avg_spam_score: 0.0,
            domain_spam_score: 0.0,
            spam_detected: false,
            total_stop_words_found: 0,
            stop_words_found: Vec::new(),
            first_spam_date: None,
            status,
            snapshot_errors: None,
            error: None,
        }
    }

    /// The archive holds nothing for this domain.
    pub fn no_snapshots(domain: &str) -> Self { Self::empty(domain, DomainStatus::NoSnapshots) }

    /// Stand-in for a domain whose analysis could not run at all.
    pub fn failed(domain: &str, error: impl Into<String>) -> Self {
        let mut r = Self::empty(domain, DomainStatus::Error);
        r.error = Some(error.into());
        r
    }
}

/// Per-domain cumulative keyword counts over spam-flagged snapshots.
#[derive(Debug, Default)]
pub struct StopWordAccumulator {
    counts: IndexMap<String, usize>,
}

impl StopWordAccumulator {
    pub fn new() -> Self { Self::default() }

    pub fn merge(&mut self, found: &[WordCount]) {
        for wc in found {
            *self.counts.entry(wc.word.clone()).or_insert(0) += wc.count;
        }
    }

    pub fn distinct(&self) -> usize { self.counts.len() }

    /// Sorted by count descending; ties keep first-seen order.
    pub fn into_sorted(self) -> Vec<WordCount> {
        let mut words: Vec<WordCount> = self.counts.into_iter().map(|(word, count)| WordCount { word, count }).collect();
        words.sort_by(|a, b| b.count.cmp(&a.count));
        words
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(word: &str, count: usize) -> WordCount { WordCount { word: word.into(), count } }

    #[test]
    fn accumulator_sums_and_sorts() {
        let mut acc = StopWordAccumulator::new();
        acc.merge(&[wc("casino", 3)]);
        acc.merge(&[wc("casino", 2), wc("viagra", 1)]);
        assert_eq!(acc.distinct(), 2);
        assert_eq!(acc.into_sorted(), vec![wc("casino", 5), wc("viagra", 1)]);
    }

    #[test]
    fn accumulator_ties_keep_first_seen() {
        let mut acc = StopWordAccumulator::new();
        acc.merge(&[wc("loans", 2), wc("pills", 4), wc("casino", 2)]);
        let words: Vec<String> = acc.into_sorted().into_iter().map(|w| w.word).collect();
        assert_eq!(words, vec!["pills", "loans", "casino"]);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(DomainStatus::from_percentage(50.0), DomainStatus::Spam);
        assert_eq!(DomainStatus::from_percentage(49.99), DomainStatus::Suspicious);
        assert_eq!(DomainStatus::from_percentage(0.0), DomainStatus::Clean);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(100.0 / 3.0, 2), 33.33);
        assert_eq!(round_to(6.66666, 1), 6.7);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DomainResult::no_snapshots("dead.com")).unwrap();
        assert!(json.contains("\"status\":\"no_snapshots\""));
        assert!(json.contains("\"snapshotsChecked\":0"));
        assert!(!json.contains("snapshotErrors"));
    }
}
