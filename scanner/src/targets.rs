use anyhow::{Context, Result};
use engine::DomainResult;
use scorer::{default_keywords, merge_keywords, parse_keyword_list};
use serde::Serialize;
use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// Targets from the command line followed by those in `file` (one per line, `#` comments).
pub fn load_targets(inline: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut targets: Vec<String> = inline.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
    if let Some(path) = file {
        let text = fs::read_to_string(path).with_context(|| format!("reading domains file {}", path.display()))?;
        for line in text.lines() {
            let s = line.split('#').next().unwrap_or("").trim();
            if !s.is_empty() { targets.push(s.to_string()); }
        }
    }
    Ok(targets)
}

/// Inline keywords, then the keyword file, then the built-in list when asked
/// for (or when nothing else was given).
pub fn load_keywords(inline: &[String], file: Option<&Path>, with_defaults: bool) -> Result<Vec<String>> {
    let mut lists: Vec<Vec<String>> = vec![inline.iter().flat_map(|k| parse_keyword_list(k)).collect()];
    if let Some(path) = file {
        let text = fs::read_to_string(path).with_context(|| format!("reading keywords file {}", path.display()))?;
        lists.push(parse_keyword_list(&text));
    }
    let given = lists.iter().any(|l| !l.is_empty());
    if with_defaults || !given { lists.push(default_keywords()); }
    Ok(merge_keywords(lists))
}

/// One JSONL line of scanner output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRecord<'a> {
    pub generated_at: String,
    pub result: &'a DomainResult,
}

impl<'a> OutRecord<'a> {
    pub fn new(result: &'a DomainResult) -> Self {
        let generated_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        Self { generated_at, result }
    }
}
