use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use engine::{
    AnalysisError, AnalyzerConfig, DocumentAnalysis, DocumentScorer, DomainAnalyzer, DomainResult, DomainStatus,
    SnapshotContent, SnapshotDescriptor, SnapshotSource, StopWordMatches, WordCount,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Serves canned snapshots per domain; html of `None` means the fetch fails.
#[derive(Default)]
struct FakeArchive {
    domains: HashMap<String, Vec<(SnapshotDescriptor, Option<String>)>>,
    broken: Vec<String>,
    fetches: Mutex<Vec<String>>,
    listings: Mutex<Vec<(String, usize)>>,
}

impl FakeArchive {
    fn with(mut self, domain: &str, pages: &[(&str, Option<&str>)]) -> Self {
        let snaps = pages
            .iter()
            .map(|(ts, html)| {
                (SnapshotDescriptor::new(*ts, format!("http://{domain}/")), (*html).map(|h| h.to_string()))
            })
            .collect();
        self.domains.insert(domain.to_string(), snaps);
        self
    }

    fn broken(mut self, domain: &str) -> Self {
        self.broken.push(domain.to_string());
        self
    }
}

#[async_trait]
impl SnapshotSource for FakeArchive {
    async fn list_snapshots(&self, target: &str, limit: usize) -> Result<Vec<SnapshotDescriptor>> {
        self.listings.lock().push((target.to_string(), limit));
        if self.broken.iter().any(|b| b == target) { bail!("archive unreachable"); }
        let snaps = self.domains.get(target).map(|v| v.iter().map(|(s, _)| s.clone()).take(limit).collect());
        Ok(snaps.unwrap_or_default())
    }

    async fn fetch_snapshot_content(&self, snapshot: &SnapshotDescriptor) -> Result<SnapshotContent> {
        self.fetches.lock().push(snapshot.timestamp.clone());
        let html = self
            .domains
            .values()
            .flatten()
            .find(|(s, _)| s == snapshot)
            .and_then(|(_, html)| html.clone())
            .ok_or_else(|| anyhow!("snapshot unavailable").context("HTTP 503"))?;
        Ok(SnapshotContent { length: html.len(), html, snapshot_url: format!("archive/{}", snapshot.timestamp) })
    }
}

/// Counts whitespace-separated keyword hits; any hit is spam, score = 2 per hit.
#[derive(Default)]
struct CountingScorer {
    excludes: Mutex<Vec<String>>,
}

impl DocumentScorer for CountingScorer {
    fn score_document(&self, html: &str, keywords: &[String], exclude_token: &str) -> Result<DocumentAnalysis> {
        self.excludes.lock().push(exclude_token.to_string());
        if html.contains("EXPLODE") { bail!("scorer blew up"); }
        let mut found = Vec::new();
        for kw in keywords {
            let count = html.split_whitespace().filter(|w| w == kw).count();
            if count > 0 { found.push(WordCount { word: kw.clone(), count }); }
        }
        let count: usize = found.iter().map(|w| w.count).sum();
        Ok(DocumentAnalysis {
            text_length: html.len(),
            is_spam: count > 0,
            spam_score: 2.0 * count as f64,
            stop_words: StopWordMatches { count, found },
            ..Default::default()
        })
    }
}

fn keywords(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

fn analyzer(archive: &Arc<FakeArchive>, scorer: &Arc<CountingScorer>, config: AnalyzerConfig) -> DomainAnalyzer {
    DomainAnalyzer::new(archive.clone(), scorer.clone(), config)
}

fn assert_counters(r: &DomainResult) {
    assert!(r.spam_snapshots <= r.successfully_analyzed);
    assert!(r.successfully_analyzed <= r.snapshots_checked);
    assert_eq!(r.failed_snapshots + r.successfully_analyzed, r.snapshots_checked);
}

#[tokio::test]
async fn one_spam_snapshot_out_of_two_is_suspicious() {
    let archive = Arc::new(FakeArchive::default().with(
        "spamsite.com",
        &[("20100101000000", Some("win at the casino casino today")), ("20120101000000", Some("a clean page"))],
    ));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("spamsite.com", &keywords(&["casino", "viagra"]), 10, None)
        .await
        .unwrap();

    assert_eq!(r.snapshots_checked, 2);
    assert_eq!(r.successfully_analyzed, 2);
    assert_eq!(r.spam_snapshots, 1);
    assert_eq!(r.spam_percentage, 50.0);
    assert_eq!(r.status, DomainStatus::Suspicious);
    assert!(r.spam_detected);
    assert_eq!(r.stop_words_found, vec![WordCount { word: "casino".into(), count: 2 }]);
    assert_eq!(r.total_stop_words_found, 1);
    assert_eq!(r.first_spam_date.as_deref(), Some("20100101000000"));
    assert_eq!(r.avg_spam_score, 4.0);
    assert_eq!(r.domain_spam_score, 4.0);
    assert!(r.snapshot_errors.is_none());
    assert_counters(&r);
}

#[tokio::test]
async fn empty_archive_short_circuits() {
    let archive = Arc::new(FakeArchive::default());
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::default())
        .analyze_domain("deaddomain.com", &keywords(&["casino"]), 5, None)
        .await
        .unwrap();

    assert_eq!(r, DomainResult::no_snapshots("deaddomain.com"));
    assert_eq!(r.status, DomainStatus::NoSnapshots);
    assert!(!r.spam_detected);
    assert_eq!(r.domain_spam_score, 0.0);
    assert!(archive.fetches.lock().is_empty());
    assert!(scorer.excludes.lock().is_empty());
}

#[tokio::test]
async fn all_fetches_failing_is_an_error_status() {
    let archive = Arc::new(FakeArchive::default().with("gone.com", &[("2001", None), ("2002", None), ("2003", None)]));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("gone.com", &keywords(&["casino"]), 3, None)
        .await
        .unwrap();

    assert_eq!(r.successfully_analyzed, 0);
    assert_eq!(r.failed_snapshots, 3);
    assert_eq!(r.status, DomainStatus::Error);
    assert_eq!(r.error.as_deref(), Some("All 3 snapshots failed to analyze"));
    let errors = r.snapshot_errors.as_ref().unwrap();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].timestamp, "2001");
    assert!(errors[0].error.contains("snapshot unavailable"));
    assert!(errors[0].stack.is_some());
    assert_counters(&r);
}

#[tokio::test]
async fn scoring_and_empty_content_failures_are_absorbed() {
    let archive = Arc::new(FakeArchive::default().with(
        "mixed.com",
        &[("2001", Some("EXPLODE")), ("2002", Some("")), ("2003", Some("casino"))],
    ));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("mixed.com", &keywords(&["casino"]), 3, None)
        .await
        .unwrap();

    assert_eq!(r.successfully_analyzed, 1);
    assert_eq!(r.failed_snapshots, 2);
    assert_eq!(r.status, DomainStatus::Spam);
    let errors = r.snapshot_errors.unwrap();
    assert!(errors[0].error.contains("scorer blew up"));
    assert_eq!(errors[1].error, "snapshot content was empty");
    assert!(errors[1].stack.is_none());
    assert!(r.error.is_none());
}

#[tokio::test]
async fn stop_words_merge_across_spam_snapshots() {
    let archive = Arc::new(FakeArchive::default().with(
        "pills.com",
        &[("2001", Some("casino casino casino")), ("2002", Some("casino viagra casino")), ("2003", Some("clean"))],
    ));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("pills.com", &keywords(&["casino", "viagra"]), 3, None)
        .await
        .unwrap();

    assert_eq!(
        r.stop_words_found,
        vec![WordCount { word: "casino".into(), count: 5 }, WordCount { word: "viagra".into(), count: 1 }]
    );
    assert_eq!(r.total_stop_words_found, 2);
    assert_eq!(r.spam_percentage, 66.67);
    assert_eq!(r.status, DomainStatus::Spam);
    // scores 6 and 6
    assert_eq!(r.avg_spam_score, 6.0);
}

#[tokio::test]
async fn averages_round_differently() {
    let archive = Arc::new(FakeArchive::default().with(
        "odd.com",
        &[("1", Some("casino")), ("2", Some("casino casino")), ("3", Some("casino casino casino casino"))],
    ));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("odd.com", &keywords(&["casino"]), 3, None)
        .await
        .unwrap();
    // (2 + 4 + 8) / 3 = 4.666..
    assert_eq!(r.avg_spam_score, 4.67);
    assert_eq!(r.domain_spam_score, 4.7);
    assert_eq!(r.spam_percentage, 100.0);
}

#[tokio::test]
async fn scorer_receives_host_as_exclusion_token() {
    let archive = Arc::new(FakeArchive::default().with("https://sub.example.com/path", &[("1", Some("hello"))]));
    let scorer = Arc::new(CountingScorer::default());
    analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("https://sub.example.com/path", &keywords(&["casino"]), 1, None)
        .await
        .unwrap();
    assert_eq!(*scorer.excludes.lock(), vec!["sub.example.com".to_string()]);
}

#[tokio::test]
async fn surrounding_whitespace_is_trimmed_from_target() {
    let archive = Arc::new(FakeArchive::default().with("spamsite.com", &[("2010", Some("casino casino"))]));
    let scorer = Arc::new(CountingScorer::default());
    let r = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("  spamsite.com \n", &keywords(&["casino"]), 2, None)
        .await
        .unwrap();

    assert_eq!(r.domain, "spamsite.com");
    assert_eq!(r.snapshots_checked, 1);
    assert_eq!(*archive.listings.lock(), vec![("spamsite.com".to_string(), 2)]);
    assert_eq!(*scorer.excludes.lock(), vec!["spamsite.com".to_string()]);
}

#[tokio::test]
async fn listing_failure_propagates_from_single_domain() {
    let archive = Arc::new(FakeArchive::default().broken("down.com"));
    let scorer = Arc::new(CountingScorer::default());
    let err = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domain("down.com", &keywords(&["casino"]), 3, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::SnapshotListing { ref target, .. } if target == "down.com"));
    assert!(err.to_string().contains("archive unreachable"));
}

#[tokio::test]
async fn rejects_blank_target_and_zero_limit() {
    let archive = Arc::new(FakeArchive::default());
    let scorer = Arc::new(CountingScorer::default());
    let a = analyzer(&archive, &scorer, AnalyzerConfig::no_delay());
    assert!(matches!(a.analyze_domain("  ", &[], 3, None).await, Err(AnalysisError::EmptyTarget)));
    assert!(matches!(a.analyze_domain("x.com", &[], 0, None).await, Err(AnalysisError::InvalidSnapshotLimit)));
    assert!(archive.listings.lock().is_empty());
}

#[tokio::test]
async fn batch_preserves_order_and_isolates_failures() {
    let archive = Arc::new(
        FakeArchive::default()
            .with("a.com", &[("1", Some("casino"))])
            .broken("b.com")
            .with("c.com", &[("1", Some("clean"))]),
    );
    let scorer = Arc::new(CountingScorer::default());
    let targets = keywords(&["a.com", "  ", "b.com", "", "c.com"]);
    let results = analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domains(&targets, &keywords(&["casino"]), 2, None)
        .await;

    let domains: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(domains, vec!["a.com", "b.com", "c.com"]);
    assert_eq!(results[0].status, DomainStatus::Spam);
    assert_eq!(results[1].status, DomainStatus::Error);
    assert!(results[1].error.as_deref().unwrap().contains("archive unreachable"));
    assert_eq!(results[2].status, DomainStatus::Clean);
    results.iter().for_each(assert_counters);
    assert_eq!(archive.listings.lock().len(), 3);
}

#[tokio::test]
async fn batch_progress_is_prefixed_and_ordered() {
    let archive = Arc::new(FakeArchive::default().with("a.com", &[("1", Some("casino"))]).broken("b.com"));
    let scorer = Arc::new(CountingScorer::default());
    let lines = Mutex::new(Vec::<String>::new());
    let sink = |msg: &str| lines.lock().push(msg.to_string());
    analyzer(&archive, &scorer, AnalyzerConfig::no_delay())
        .analyze_domains(&keywords(&["a.com", "b.com"]), &keywords(&["casino"]), 1, Some(&sink))
        .await;

    let lines = lines.into_inner();
    assert!(lines.iter().take_while(|l| l.starts_with("[1/2] a.com: ")).count() > 2);
    let checking = lines.iter().position(|l| l.contains("Checking snapshot 1/1")).unwrap();
    let scored = lines.iter().position(|l| l.contains("Snapshot 1/1: 1 keyword matches")).unwrap();
    assert!(checking < scored);
    assert!(lines.last().unwrap().starts_with("[2/2] b.com: Error:"));
}

#[tokio::test]
async fn warns_when_long_text_matches_nothing() {
    let page = "lorem ipsum ".repeat(20);
    let archive = Arc::new(FakeArchive::default().with("quiet.com", &[("1", Some(page.as_str()))]));
    let scorer = Arc::new(CountingScorer::default());
    let lines = Mutex::new(Vec::<String>::new());
    let sink = |msg: &str| lines.lock().push(msg.to_string());
    let a = analyzer(&archive, &scorer, AnalyzerConfig::no_delay());

    a.analyze_domain("quiet.com", &keywords(&["casino"]), 1, Some(&sink)).await.unwrap();
    assert!(lines.lock().iter().any(|l| l.starts_with("Warning: no keywords matched")));

    lines.lock().clear();
    a.analyze_domain("quiet.com", &[], 1, Some(&sink)).await.unwrap();
    assert!(!lines.lock().iter().any(|l| l.starts_with("Warning")));
}

#[tokio::test]
async fn snapshot_without_url_is_still_analyzed() {
    struct Anonymous;

    #[async_trait]
    impl SnapshotSource for Anonymous {
        async fn list_snapshots(&self, _target: &str, _limit: usize) -> Result<Vec<SnapshotDescriptor>> {
            let snap = SnapshotDescriptor { timestamp: "1999".into(), original_url: None };
            Ok(vec![snap.clone(), snap])
        }

        async fn fetch_snapshot_content(&self, _snapshot: &SnapshotDescriptor) -> Result<SnapshotContent> {
            Ok(SnapshotContent { html: "casino".into(), length: 6, snapshot_url: "archive/1999".into() })
        }
    }

    let a = DomainAnalyzer::new(Arc::new(Anonymous), Arc::new(CountingScorer::default()), AnalyzerConfig::no_delay());
    let r = a.analyze_domain("anon.com", &keywords(&["casino"]), 2, None).await.unwrap();
    // duplicate timestamps are not collapsed
    assert_eq!(r.snapshots_checked, 2);
    assert_eq!(r.spam_snapshots, 2);
}

#[tokio::test(start_paused = true)]
async fn pauses_only_between_snapshots() {
    let archive = Arc::new(FakeArchive::default().with("slow.com", &[("1", Some("a")), ("2", None), ("3", Some("c"))]));
    let scorer = Arc::new(CountingScorer::default());
    let a = analyzer(&archive, &scorer, AnalyzerConfig::default());

    let start = Instant::now();
    a.analyze_domain("slow.com", &keywords(&["casino"]), 3, None).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(6000));

    let start = Instant::now();
    a.analyze_domain("missing.com", &keywords(&["casino"]), 3, None).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn pauses_only_between_domains() {
    let archive = Arc::new(
        FakeArchive::default().with("one.com", &[("1", Some("a"))]).broken("two.com").with("three.com", &[]),
    );
    let scorer = Arc::new(CountingScorer::default());
    let a = analyzer(&archive, &scorer, AnalyzerConfig::default());

    let start = Instant::now();
    a.analyze_domains(&keywords(&["one.com"]), &[], 3, None).await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    let start = Instant::now();
    let results = a.analyze_domains(&keywords(&["one.com", "two.com", "three.com"]), &[], 3, None).await;
    assert_eq!(results.len(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(10_000));
}
