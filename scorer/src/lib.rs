//! HTML keyword spam scoring and keyword list utilities.

pub mod document;
pub mod keywords;

pub use document::{extract_document, ExtractedDocument, HtmlSpamScorer, KeywordPatterns, ScorerConfig};
pub use keywords::{default_keywords, merge_keywords, parse_keyword_list, DEFAULT_SPAM_KEYWORDS};
