use std::collections::HashSet;

use crate::corpus::types::{CommentMatch, ThreadRecord};

use super::tokenize::token_set;

/// Comments (first `max_comments` only) that contain query keywords.
/// A comment id is reported once even if the export repeats it.
pub fn collect_comment_matches(
    thread: &ThreadRecord,
    keywords: &[String],
    max_comments: usize,
) -> Vec<CommentMatch> {
    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for comment in thread.comments.iter().take(max_comments) {
        if !seen.insert(comment.comment_id.as_str()) {
            continue;
        }
        let tokens = token_set(comment.text());
        let matched: Vec<String> = keywords
            .iter()
            .filter(|k| tokens.contains(k.as_str()))
            .cloned()
            .collect();
        if matched.is_empty() {
            continue;
        }
        matches.push(CommentMatch {
            comment_id: comment.comment_id.clone(),
            url: comment.url.clone(),
            matched_keywords: matched,
        });
    }

    matches
}

/// One-line human explanation attached to each evidence record.
pub fn build_why_selected(
    matched_keywords: &[String],
    topics: &[String],
    engagement: f64,
    score: f64,
    no_strong_match: bool,
) -> String {
    let mut parts = Vec::new();
    if no_strong_match {
        parts.push("No strong match; ranked by engagement".to_string());
    } else if !matched_keywords.is_empty() {
        let shown: Vec<&str> = matched_keywords.iter().take(5).map(String::as_str).collect();
        parts.push(format!("Matched keywords: {}", shown.join(", ")));
    }
    if !topics.is_empty() {
        parts.push(format!("Topic: {}", topics.join(", ")));
    }
    if engagement > 10.0 {
        parts.push(format!("High engagement ({:.0})", engagement));
    }
    parts.push(format!("Relevance score: {:.1}", score));
    parts.join("; ")
}
