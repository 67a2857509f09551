use thiserror::Error;

/// Failures that escape `analyze_domain`. Per-snapshot failures never do.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("target must not be blank")]
    EmptyTarget,

    #[error("max snapshots must be at least 1")]
    InvalidSnapshotLimit,

    #[error("failed to list snapshots for {target}: {source:#}")]
    SnapshotListing {
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Why a single snapshot produced no analysis.
#[derive(Debug, Error)]
pub(crate) enum SnapshotFailure {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("snapshot content was empty")]
    EmptyContent,

    #[error("analysis failed: {0:#}")]
    Scoring(anyhow::Error),
}

impl SnapshotFailure {
    /// Full cause chain, only when there is more than one link.
    pub(crate) fn stack(&self) -> Option<String> {
        match self {
            SnapshotFailure::Fetch(e) | SnapshotFailure::Scoring(e) if e.chain().count() > 1 => {
                Some(e.chain().map(|c| c.to_string()).collect::<Vec<_>>().join("\n  caused by: "))
            }
            _ => None,
        }
    }
}
