use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "are", "was", "were", "been", "being", "have", "has", "had", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "shall", "can", "for",
    "with", "from", "into", "through", "during", "before", "after", "above", "below", "its",
    "this", "that", "these", "those", "what", "which", "who", "whom", "whose", "when", "where",
    "why", "how", "all", "each", "every", "both", "few", "more", "most", "other", "some", "such",
    "nor", "not", "only", "own", "same", "than", "too", "very", "just", "about", "any", "worth",
    "get", "getting", "you", "your",
];

/// Lowercased alphanumeric runs. Everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Scoring keywords of a query: tokens longer than two characters that are
/// not stop words, deduplicated in first-seen order.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Distinct tokens of a text, for set overlap.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}
