use crate::model::{DocumentAnalysis, SnapshotContent, SnapshotDescriptor};
use anyhow::Result;
use async_trait::async_trait;

/// Archive backend that lists and fetches historical captures.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Up to `limit` captures of `target`, earliest first. An empty list is not an error.
    async fn list_snapshots(&self, target: &str, limit: usize) -> Result<Vec<SnapshotDescriptor>>;

    async fn fetch_snapshot_content(&self, snapshot: &SnapshotDescriptor) -> Result<SnapshotContent>;
}

/// Scores one archived document against a keyword list.
pub trait DocumentScorer: Send + Sync {
    /// `exclude_token` is the analyzed domain's own host and never counts as a match.
    fn score_document(&self, html: &str, keywords: &[String], exclude_token: &str) -> Result<DocumentAnalysis>;
}
