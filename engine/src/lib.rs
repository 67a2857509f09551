//! Domain spam-history analysis over archived snapshots.
//!
//! [`DomainAnalyzer`] walks a bounded set of captures for a domain, scores each
//! one with a [`DocumentScorer`] and folds the verdicts into a [`DomainResult`].
//! Work is strictly sequential with fixed pauses between requests.

pub mod analyzer;
pub mod error;
pub mod model;
pub mod progress;
pub mod source;

pub use analyzer::{can_handle, exclusion_token, AnalyzerConfig, DomainAnalyzer};
pub use error::AnalysisError;
pub use model::{
    DocumentAnalysis, DomainResult, DomainStatus, SnapshotContent, SnapshotDescriptor, SnapshotError,
    StopWordMatches, WordCount,
};
pub use progress::ProgressSink;
pub use source::{DocumentScorer, SnapshotSource};
