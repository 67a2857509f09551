//! Wayback Machine snapshot source and helpers for the `scanner` CLI.

pub mod targets;
pub mod wayback;

pub use targets::{load_keywords, load_targets, OutRecord};
pub use wayback::{parse_cdx_page, sample_evenly, CdxPage, WaybackClient, WaybackConfig};
