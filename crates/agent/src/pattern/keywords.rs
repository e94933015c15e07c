//! Goal keyword extraction.

/// Upper bound on keywords taken from one goal.
pub const MAX_KEYWORDS: usize = 10;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "do", "does", "for", "from", "get", "has", "have", "i", "if",
    "in", "into", "is", "it", "its", "me", "my", "need", "new", "of", "on", "or", "our",
    "please", "should", "so", "some", "that", "the", "their", "them", "then", "there", "these",
    "this", "those", "to", "up", "us", "want", "was", "we", "when", "whenever", "where",
    "which", "while", "will", "with", "would", "you", "your",
];

/// Light suffix stemming: `-ies` → `-y`, `-es` → ``, trailing `-s` unless `-ss`.
pub fn stem(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ies").filter(|b| !b.is_empty()) {
        return format!("{base}y");
    }
    if let Some(base) = word.strip_suffix("es").filter(|b| !b.is_empty()) {
        return base.to_string();
    }
    if !word.ends_with("ss") {
        if let Some(base) = word.strip_suffix('s').filter(|b| !b.is_empty()) {
            return base.to_string();
        }
    }
    word.to_string()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase, tokenize on whitespace, drop stop words, stem, dedupe, cap.
///
/// Leading and trailing punctuation is trimmed from each token so that
/// `"changes."` and `"changes"` yield the same keyword.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for raw in text.split_whitespace() {
        let token = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if token.is_empty() || is_stop_word(&token) {
            continue;
        }
        let stemmed = stem(&token);
        if !keywords.contains(&stemmed) {
            keywords.push(stemmed);
        }
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}
