use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use engine::{SnapshotContent, SnapshotDescriptor, SnapshotSource};
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use std::num::NonZeroUsize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WaybackConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Rows requested per CDX page.
    pub page_size: usize,
    /// Stop paging once this many index rows are collected.
    pub max_index_rows: usize,
    pub max_body_bytes: usize,
    pub cache_content: bool,
    /// Captures kept in memory; least recently used are evicted first.
    pub cache_capacity: usize,
}

impl Default for WaybackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web.archive.org".into(),
            user_agent: "snapshot-spam-scanner/0.1 (+https://example.com/bot)".into(),
            timeout: Duration::from_secs(30),
            page_size: 500,
            max_index_rows: 2000,
            max_body_bytes: 5 * 1024 * 1024,
            cache_content: true,
            cache_capacity: 32,
        }
    }
}

/// Snapshot source backed by the Wayback Machine CDX index.
pub struct WaybackClient {
    client: Client,
    config: WaybackConfig,
    cache: Option<Mutex<LruCache<String, SnapshotContent>>>,
}

impl WaybackClient {
    pub fn new(config: WaybackConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;
        let cache = NonZeroUsize::new(config.cache_capacity)
            .filter(|_| config.cache_content)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        Ok(Self { client, config, cache })
    }

    /// Number of captures currently held in the content cache.
    pub fn cached_captures(&self) -> usize { self.cache.as_ref().map_or(0, |c| c.lock().len()) }

    fn base(&self) -> &str { self.config.base_url.trim_end_matches('/') }

    /// Raw-capture URL; the `id_` flag asks for the original bytes without the archive toolbar.
    pub fn snapshot_url(&self, timestamp: &str, original: &str) -> String {
        format!("{}/web/{}id_/{}", self.base(), timestamp, original)
    }

    /// Every index row for `target` (one per month at most), oldest first.
    pub async fn index(&self, target: &str) -> Result<Vec<SnapshotDescriptor>> {
        let url = format!("{}/cdx/search/cdx", self.base());
        let page_size = self.config.page_size.max(1).to_string();
        let mut rows = Vec::new();
        let mut resume_key: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![
                ("url", target),
                ("output", "json"),
                ("fl", "timestamp,original"),
                ("filter", "statuscode:200"),
                ("filter", "mimetype:text/html"),
                ("collapse", "timestamp:6"),
                ("limit", page_size.as_str()),
                ("showResumeKey", "true"),
            ];
            if let Some(key) = resume_key.as_deref() { query.push(("resumeKey", key)); }

            let resp = self.client.get(&url).query(&query).send().await.context("CDX request failed")?;
            let status = resp.status();
            if !status.is_success() { bail!("CDX index returned HTTP {status}"); }
            let body = resp.text().await.context("reading CDX response")?;

            let page = parse_cdx_page(&body)?;
            tracing::debug!(target_domain = target, rows = page.rows.len(), resumed = resume_key.is_some(), "CDX page");
            rows.extend(page.rows);

            match page.resume_key {
                Some(key) if rows.len() < self.config.max_index_rows => resume_key = Some(key),
                _ => break,
            }
        }
        rows.truncate(self.config.max_index_rows);
        Ok(rows)
    }
}

#[async_trait]
impl SnapshotSource for WaybackClient {
    async fn list_snapshots(&self, target: &str, limit: usize) -> Result<Vec<SnapshotDescriptor>> {
        let rows = self.index(target).await.with_context(|| format!("listing snapshots of {target}"))?;
        let total = rows.len();
        let picked = sample_evenly(rows, limit);
        tracing::info!(target_domain = target, indexed = total, picked = picked.len(), "listed snapshots");
        Ok(picked)
    }

    async fn fetch_snapshot_content(&self, snapshot: &SnapshotDescriptor) -> Result<SnapshotContent> {
        let Some(original) = snapshot.original_url.as_deref() else {
            bail!("snapshot {} has no original URL", snapshot.timestamp);
        };
        let url = self.snapshot_url(&snapshot.timestamp, original);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.lock().get(&url).cloned()) {
            return Ok(hit);
        }

        let resp = self.client.get(&url).send().await.with_context(|| format!("fetching {url}"))?;
        let status = resp.status();
        if !status.is_success() { bail!("archive returned HTTP {status} for {url}"); }
        let bytes = resp.bytes().await.with_context(|| format!("reading {url}"))?;
        if bytes.is_empty() { bail!("empty snapshot body from {url}"); }
        if bytes.len() > self.config.max_body_bytes {
            bail!("snapshot body of {} bytes exceeds limit of {}", bytes.len(), self.config.max_body_bytes);
        }

        let content = SnapshotContent {
            html: String::from_utf8_lossy(&bytes).to_string(),
            length: bytes.len(),
            snapshot_url: url.clone(),
        };
        if let Some(cache) = &self.cache { cache.lock().put(url, content.clone()); }
        Ok(content)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct CdxPage {
    pub rows: Vec<SnapshotDescriptor>,
    pub resume_key: Option<String>,
}

/// Parse one `output=json` CDX page: a header row, data rows, then optionally
/// an empty row followed by a one-element resume-key row.
pub fn parse_cdx_page(body: &str) -> Result<CdxPage> {
    if body.trim().is_empty() { return Ok(CdxPage::default()); }
    let table: Vec<Vec<String>> = serde_json::from_str(body).context("malformed CDX JSON")?;

    let mut page = CdxPage::default();
    let mut lines = table.into_iter();
    while let Some(row) = lines.next() {
        if row.is_empty() {
            page.resume_key = lines.next().and_then(|r| r.into_iter().next()).filter(|k| !k.is_empty());
            break;
        }
        if row.first().map(String::as_str) == Some("timestamp") { continue; }
        let mut cols = row.into_iter();
        let Some(timestamp) = cols.next() else { continue };
        let original_url = cols.next().filter(|u| !u.is_empty());
        page.rows.push(SnapshotDescriptor { timestamp, original_url });
    }
    Ok(page)
}

/// Pick `limit` rows spread across the whole history, first and last included, order kept.
pub fn sample_evenly<T>(rows: Vec<T>, limit: usize) -> Vec<T> {
    let n = rows.len();
    if limit == 0 { return Vec::new(); }
    if n <= limit { return rows; }
    if limit == 1 { return rows.into_iter().take(1).collect(); }

    let mut wanted: Vec<usize> =
        (0..limit).map(|i| ((i as f64) * (n - 1) as f64 / (limit - 1) as f64).round() as usize).collect();
    wanted.dedup();
    rows.into_iter().enumerate().filter(|(i, _)| wanted.binary_search(i).is_ok()).map(|(_, r)| r).collect()
}
