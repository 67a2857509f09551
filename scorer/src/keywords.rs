use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Built-in spam vocabulary, used when no list is given or merged on request.
pub const DEFAULT_SPAM_KEYWORDS: &[&str] = &[
    "casino", "poker", "roulette", "blackjack", "slots", "betting", "jackpot",
    "viagra", "cialis", "levitra", "pharmacy", "pills", "xanax", "tramadol",
    "payday loan", "loans", "debt relief", "credit repair",
    "replica watches", "cheap jerseys", "louis vuitton", "ugg boots",
    "porn", "xxx", "escort", "dating", "hookup",
    "forex", "binary options", "crypto giveaway", "bitcoin doubler",
    "weight loss", "diet pills", "essay writing",
];

/// Lowercased, NFKC-normalized, trimmed form used for matching.
pub fn normalize_keyword(word: &str) -> String { word.trim().nfkc().collect::<String>().to_lowercase() }

/// Parse a keyword file or inline list: one or more per line, comma separated, `#` starts a comment.
pub fn parse_keyword_list(text: &str) -> Vec<String> {
    let words = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split(','));
    merge_keywords([words])
}

/// Concatenate lists, dropping blanks and duplicates; first occurrence wins.
pub fn merge_keywords<L, W>(lists: impl IntoIterator<Item = L>) -> Vec<String>
where
    L: IntoIterator<Item = W>,
    W: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for word in lists.into_iter().flatten() {
        let word = normalize_keyword(word.as_ref());
        if word.is_empty() || !seen.insert(word.clone()) { continue; }
        merged.push(word);
    }
    merged
}

pub fn default_keywords() -> Vec<String> { merge_keywords([DEFAULT_SPAM_KEYWORDS]) }
