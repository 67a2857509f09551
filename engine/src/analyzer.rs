use crate::error::{AnalysisError, SnapshotFailure};
use crate::model::{
    round_to, DocumentAnalysis, DomainResult, DomainStatus, SnapshotContent, SnapshotDescriptor, SnapshotError,
    StopWordAccumulator,
};
use crate::progress::{Progress, ProgressSink};
use crate::source::{DocumentScorer, SnapshotSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

/// Extracted text longer than this with zero matches gets a diagnostic line.
const SILENT_TEXT_THRESHOLD: usize = 100;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Pause between two snapshots of the same domain.
    pub snapshot_delay: Duration,
    /// Pause between two domains of a batch.
    pub domain_delay: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { snapshot_delay: Duration::from_millis(3000), domain_delay: Duration::from_millis(5000) }
    }
}

impl AnalyzerConfig {
    pub fn no_delay() -> Self { Self { snapshot_delay: Duration::ZERO, domain_delay: Duration::ZERO } }
}

/// True for any target that is not blank. Domain syntax is not validated.
pub fn can_handle(target: &str) -> bool { !target.trim().is_empty() }

/// Host of `target`, used so a domain never matches its own name.
pub fn exclusion_token(target: &str) -> String {
    let target = target.trim();
    let with_scheme = if target.contains("://") { target.to_string() } else { format!("https://{target}") };
    if let Some(host) = Url::parse(&with_scheme).ok().and_then(|u| u.host_str().map(str::to_string)) {
        if !host.is_empty() { return host; }
    }
    let rest = target.split_once("://").map(|(_, r)| r).unwrap_or(target);
    rest.split(['/', ':']).next().unwrap_or(rest).to_string()
}

async fn pause(delay: Duration) {
    if !delay.is_zero() { sleep(delay).await; }
}

/// Sequential spam-history analyzer over a snapshot archive.
///
/// Holds no state between calls; one value can serve any number of analyses.
#[derive(Clone)]
pub struct DomainAnalyzer {
    source: Arc<dyn SnapshotSource>,
    scorer: Arc<dyn DocumentScorer>,
    config: AnalyzerConfig,
}

impl DomainAnalyzer {
    pub fn new(source: Arc<dyn SnapshotSource>, scorer: Arc<dyn DocumentScorer>, config: AnalyzerConfig) -> Self {
        Self { source, scorer, config }
    }

    pub fn config(&self) -> &AnalyzerConfig { &self.config }

    /// Analyze one domain. Snapshot-level failures are recorded in the result;
    /// a listing failure is returned as an error.
    pub async fn analyze_domain(
        &self,
        target: &str,
        keywords: &[String],
        max_snapshots: usize,
        on_progress: Option<ProgressSink<'_>>,
    ) -> Result<DomainResult, AnalysisError> {
        let target = target.trim();
        if !can_handle(target) { return Err(AnalysisError::EmptyTarget); }
        if max_snapshots == 0 { return Err(AnalysisError::InvalidSnapshotLimit); }
        let progress = Progress::new(on_progress);
        let exclude = exclusion_token(target);

        info!(target_domain = target, max_snapshots, keywords = keywords.len(), "analyzing domain");
        progress.emit(&format!("Fetching up to {max_snapshots} snapshots for {target}..."));
        let snapshots = self
            .source
            .list_snapshots(target, max_snapshots)
            .await
            .map_err(|source| AnalysisError::SnapshotListing { target: target.to_string(), source })?;

        if snapshots.is_empty() {
            progress.emit(&format!("No snapshots found for {target}"));
            info!(target_domain = target, "no snapshots");
            return Ok(DomainResult::no_snapshots(target));
        }

        let total = snapshots.len();
        progress.emit(&format!("Found {total} snapshots for {target}"));

        let mut tally = Tally::default();
        for (i, snapshot) in snapshots.iter().enumerate() {
            let pos = i + 1;
            progress.emit(&format!("Checking snapshot {pos}/{total} ({})...", snapshot.timestamp));

            match self.check_snapshot(snapshot, keywords, &exclude, pos, total, progress).await {
                Ok(analysis) => {
                    progress.emit(&format!(
                        "Snapshot {pos}/{total}: {} keyword matches ({} distinct), spam={}, score={}",
                        analysis.stop_words.count,
                        analysis.stop_words.found.len(),
                        analysis.is_spam,
                        analysis.spam_score
                    ));
                    tally.record(snapshot, &analysis);
                }
                Err(failure) => {
                    warn!(target_domain = target, timestamp = %snapshot.timestamp, error = %failure, "snapshot failed");
                    progress.emit(&format!("Snapshot {pos}/{total} failed: {failure}"));
                    tally.errors.push(SnapshotError {
                        timestamp: snapshot.timestamp.clone(),
                        original_url: snapshot.original_url.clone(),
                        error: failure.to_string(),
                        stack: failure.stack(),
                    });
                }
            }

            if pos < total { pause(self.config.snapshot_delay).await; }
        }

        let result = tally.finish(target, total);
        info!(
            target_domain = target,
            status = %result.status,
            spam_snapshots = result.spam_snapshots,
            analyzed = result.successfully_analyzed,
            "domain analysis complete"
        );
        progress.emit(&format!(
            "Finished {target}: {} ({}/{} spam, {}%)",
            result.status, result.spam_snapshots, result.successfully_analyzed, result.spam_percentage
        ));
        Ok(result)
    }

    async fn check_snapshot(
        &self,
        snapshot: &SnapshotDescriptor,
        keywords: &[String],
        exclude: &str,
        pos: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> Result<DocumentAnalysis, SnapshotFailure> {
        let content: SnapshotContent =
            self.source.fetch_snapshot_content(snapshot).await.map_err(SnapshotFailure::Fetch)?;
        if content.html.is_empty() { return Err(SnapshotFailure::EmptyContent); }
        progress.emit(&format!("Snapshot {pos}/{total}: fetched {} bytes from {}", content.length, content.snapshot_url));

        let analysis =
            self.scorer.score_document(&content.html, keywords, exclude).map_err(SnapshotFailure::Scoring)?;
        if !keywords.is_empty() && analysis.stop_words.count == 0 && analysis.text_length > SILENT_TEXT_THRESHOLD {
            warn!(url = snapshot.url_label(), text_length = analysis.text_length, "no keyword matches");
            progress.emit(&format!(
                "Warning: no keywords matched in {} chars of text from {} (exclusion token '{exclude}')",
                analysis.text_length,
                snapshot.url_label()
            ));
        }
        Ok(analysis)
    }

    /// Analyze several domains in order, one result per non-blank target.
    /// A domain that fails outright becomes an `error` entry.
    pub async fn analyze_domains(
        &self,
        targets: &[String],
        keywords: &[String],
        max_snapshots: usize,
        on_progress: Option<ProgressSink<'_>>,
    ) -> Vec<DomainResult> {
        let targets: Vec<&str> = targets.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
        let total = targets.len();
        let mut results = Vec::with_capacity(total);

        for (i, target) in targets.iter().copied().enumerate() {
            let pos = i + 1;
            let prefixed = |msg: &str| {
                if let Some(sink) = on_progress { sink(&format!("[{pos}/{total}] {target}: {msg}")); }
            };
            let sink: ProgressSink<'_> = &prefixed;

            match self.analyze_domain(target, keywords, max_snapshots, Some(sink)).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(target_domain = target, error = %e, "domain analysis failed");
                    Progress::new(Some(sink)).emit(&format!("Error: {e}"));
                    results.push(DomainResult::failed(target, e.to_string()));
                }
            }

            if pos < total { pause(self.config.domain_delay).await; }
        }
        results
    }
}

#[derive(Default)]
struct Tally {
    analyzed: usize,
    spam: usize,
    total_score: f64,
    first_spam: Option<String>,
    words: StopWordAccumulator,
    errors: Vec<SnapshotError>,
}

impl Tally {
    fn record(&mut self, snapshot: &SnapshotDescriptor, analysis: &DocumentAnalysis) {
        self.analyzed += 1;
        if !analysis.is_spam { return; }
        self.spam += 1;
        self.total_score += analysis.spam_score;
        self.words.merge(&analysis.stop_words.found);
        if self.first_spam.is_none() { self.first_spam = Some(snapshot.timestamp.clone()); }
    }

    fn finish(self, domain: &str, checked: usize) -> DomainResult {
        let spam_percentage =
            if self.analyzed > 0 { round_to(100.0 * self.spam as f64 / self.analyzed as f64, 2) } else { 0.0 };
        let mean = if self.spam > 0 { self.total_score / self.spam as f64 } else { 0.0 };

        let (status, error) = if self.analyzed == 0 {
            (DomainStatus::Error, Some(format!("All {checked} snapshots failed to analyze")))
        } else {
            (DomainStatus::from_percentage(spam_percentage), None)
        };

        DomainResult {
            domain: domain.to_string(),
            snapshots_checked: checked,
            successfully_analyzed: self.analyzed,
            failed_snapshots: checked - self.analyzed,
            spam_snapshots: self.spam,
            spam_percentage,
            avg_spam_score: round_to(mean, 2),
            domain_spam_score: round_to(mean, 1),
            spam_detected: self.spam > 0,
            total_stop_words_found: self.words.distinct(),
            stop_words_found: self.words.into_sorted(),
            first_spam_date: self.first_spam,
            status,
            snapshot_errors: if self.errors.is_empty() { None } else { Some(self.errors) },
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_token_from_url() {
        assert_eq!(exclusion_token("https://sub.example.com/path"), "sub.example.com");
        assert_eq!(exclusion_token("example.com"), "example.com");
        assert_eq!(exclusion_token("  example.com/blog?p=1 "), "example.com");
        assert_eq!(exclusion_token("example.com:8080"), "example.com");
        assert_eq!(exclusion_token("http://Shop.Example.COM"), "shop.example.com");
    }

    #[test]
    fn exclusion_token_fallback_on_unparsable() {
        assert_eq!(exclusion_token("https://exa mple.com/x"), "exa mple.com");
    }

    #[test]
    fn can_handle_rejects_blank() {
        assert!(can_handle("anything at all"));
        assert!(!can_handle("   "));
        assert!(!can_handle(""));
    }

    #[test]
    fn default_delays() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.snapshot_delay, Duration::from_millis(3000));
        assert_eq!(cfg.domain_delay, Duration::from_millis(5000));
    }
}
