use crate::keywords::{merge_keywords, normalize_keyword};
use anyhow::{Context, Result};
use engine::{DocumentAnalysis, DocumentScorer, StopWordMatches, WordCount};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use scraper::{Html, Node, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref SPACE_RE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref META_SEL: Selector = Selector::parse("meta").expect("valid selector");
    static ref TITLE_SEL: Selector = Selector::parse("title").expect("valid selector");
}

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Total keyword occurrences at which a document counts as spam.
    pub min_occurrences: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self { Self { min_occurrences: 2 } }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDocument {
    /// Visible text, whitespace collapsed.
    pub text: String,
    pub meta_tags: BTreeMap<String, String>,
}

pub fn extract_document(html: &str) -> ExtractedDocument {
    let doc = Html::parse_document(html);

    let mut parts: Vec<&str> = Vec::new();
    for node in doc.root_element().descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .ancestors()
                .any(|a| matches!(a.value(), Node::Element(e) if HIDDEN_ELEMENTS.contains(&e.name())));
            if !hidden { parts.push(&**text); }
        }
    }
    let text = SPACE_RE.replace_all(&parts.join(" "), " ").trim().to_string();

    let mut meta_tags = BTreeMap::new();
    for meta in doc.select(&META_SEL) {
        let el = meta.value();
        let key = el.attr("name").or_else(|| el.attr("property"));
        if let (Some(key), Some(content)) = (key, el.attr("content")) {
            meta_tags.insert(key.trim().to_lowercase(), content.trim().to_string());
        }
    }
    if let Some(title) = doc.select(&TITLE_SEL).next() {
        let title = title.text().collect::<String>();
        let title = SPACE_RE.replace_all(title.trim(), " ");
        if !title.is_empty() { meta_tags.insert("title".to_string(), title.into_owned()); }
    }

    ExtractedDocument { text, meta_tags }
}

/// Blank out the site's own name so brand self-references never match.
fn strip_exclusion(text: &str, exclude_token: &str) -> String {
    let token = normalize_keyword(exclude_token);
    if token.is_empty() { return text.to_string(); }
    let mut out = text.replace(&token, " ");
    if let Some(bare) = token.strip_prefix("www.") {
        if !bare.is_empty() { out = out.replace(bare, " "); }
    }
    out
}

fn keyword_regex(keyword: &str) -> Result<Regex> {
    let is_word = |c: Option<char>| c.map_or(false, |c| c.is_alphanumeric() || c == '_');
    let lead = if is_word(keyword.chars().next()) { r"\b" } else { "" };
    let trail = if is_word(keyword.chars().last()) { r"\b" } else { "" };
    RegexBuilder::new(&format!("{lead}{}{trail}", regex::escape(keyword)))
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid keyword pattern: {keyword}"))
}

/// Keyword list compiled to match patterns, reusable across documents.
#[derive(Debug)]
pub struct KeywordPatterns {
    keywords: Vec<String>,
    patterns: Vec<(String, Regex)>,
}

impl KeywordPatterns {
    pub fn compile(keywords: &[String]) -> Result<Self> {
        let patterns = merge_keywords([keywords])
            .into_iter()
            .map(|keyword| keyword_regex(&keyword).map(|re| (keyword, re)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keywords: keywords.to_vec(), patterns })
    }

    pub fn len(&self) -> usize { self.patterns.len() }

    pub fn is_empty(&self) -> bool { self.patterns.is_empty() }

    fn compiled_from(&self, keywords: &[String]) -> bool { self.keywords == keywords }
}

/// Keyword-density spam scorer over the visible text of an HTML document.
///
/// The patterns for the most recent keyword list are kept, so a batch that
/// scores many snapshots against one list compiles it once.
#[derive(Debug, Default)]
pub struct HtmlSpamScorer {
    config: ScorerConfig,
    compiled: Mutex<Option<Arc<KeywordPatterns>>>,
}

impl HtmlSpamScorer {
    pub fn new(config: ScorerConfig) -> Self { Self { config, compiled: Mutex::new(None) } }

    fn patterns_for(&self, keywords: &[String]) -> Result<Arc<KeywordPatterns>> {
        let mut compiled = self.compiled.lock();
        if let Some(patterns) = compiled.as_ref().filter(|p| p.compiled_from(keywords)) {
            return Ok(patterns.clone());
        }
        let patterns = Arc::new(KeywordPatterns::compile(keywords)?);
        tracing::debug!(keywords = patterns.len(), "compiled keyword patterns");
        *compiled = Some(patterns.clone());
        Ok(patterns)
    }

    pub fn score(&self, html: &str, keywords: &[String], exclude_token: &str) -> Result<DocumentAnalysis> {
        let patterns = self.patterns_for(keywords)?;
        Ok(self.score_with(&patterns, html, exclude_token))
    }

    pub fn score_with(&self, patterns: &KeywordPatterns, html: &str, exclude_token: &str) -> DocumentAnalysis {
        let ExtractedDocument { text, meta_tags } = extract_document(html);
        let text_length = text.chars().count();
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let haystack = strip_exclusion(&normalized, exclude_token);
        let exclude = normalize_keyword(exclude_token);

        let mut found = Vec::new();
        for (keyword, re) in &patterns.patterns {
            if *keyword == exclude { continue; }
            let count = re.find_iter(&haystack).count();
            if count > 0 { found.push(WordCount { word: keyword.clone(), count }); }
        }
        found.sort_by(|a, b| b.count.cmp(&a.count));
        let count: usize = found.iter().map(|w| w.count).sum();

        let spam_score = if count == 0 {
            0.0
        } else {
            let words = WORD_RE.find_iter(&normalized).count().max(1);
            let density = 100.0 * count as f64 / words as f64;
            ((2.0 * found.len() as f64 + density).min(10.0) * 10.0).round() / 10.0
        };
        let is_spam = count > 0 && count >= self.config.min_occurrences;
        tracing::trace!(text_length, matches = count, is_spam, spam_score, "scored document");

        DocumentAnalysis { text_length, meta_tags, stop_words: StopWordMatches { count, found }, is_spam, spam_score }
    }
}

impl DocumentScorer for HtmlSpamScorer {
    fn score_document(&self, html: &str, keywords: &[String], exclude_token: &str) -> Result<DocumentAnalysis> {
        self.score(html, keywords, exclude_token)
    }
}
