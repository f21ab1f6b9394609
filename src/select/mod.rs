pub mod explain;
pub mod tokenize;

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::SelectorConfig;
use crate::corpus::types::{CommentMatch, EvidenceRecord, Metrics, Selection, ThreadRecord};
use crate::corpus::Corpus;
use crate::error::{Result, SelectError};
use crate::topics::{Topic, TopicIndex, TopicVocabulary};

/// A validated query: raw text, every token (for topic phrases) and the
/// scoring keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub tokens: Vec<String>,
    pub keywords: Vec<String>,
}

impl Query {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(SelectError::InvalidQuery);
        }
        Ok(Self {
            text: text.to_string(),
            tokens: tokenize::tokenize(text),
            keywords: tokenize::extract_keywords(text),
        })
    }
}

/// Result-size bound. Negative and zero are rejected.
pub fn validate_k(k: i64) -> Result<usize> {
    if k <= 0 {
        return Err(SelectError::InvalidArgument(format!(
            "k must be a positive integer, got {}",
            k
        )));
    }
    usize::try_from(k).map_err(|_| SelectError::InvalidArgument(format!("k too large: {}", k)))
}

/// Where candidates were drawn from.
#[derive(Debug, Clone, PartialEq)]
pub enum Pool {
    Topics(Vec<Topic>),
    /// No topic matched, or matched topics had no threads in this corpus.
    FullCorpus,
}

#[derive(Debug)]
pub struct SelectionOutcome {
    pub query: Query,
    pub matched_topics: Vec<Topic>,
    pub pool: Pool,
    pub candidates: usize,
    /// Every emitted record has zero lexical relevance.
    pub no_strong_match: bool,
    pub records: Vec<EvidenceRecord>,
}

struct Scored<'a> {
    thread: &'a ThreadRecord,
    lexical: f64,
    prior: f64,
    engagement: f64,
    matched_keywords: Vec<String>,
    matched_comments: Vec<CommentMatch>,
}

impl Scored<'_> {
    fn score(&self) -> f64 {
        self.lexical + self.prior
    }

    /// Lexical relevance descending, then the engagement prior descending,
    /// then thread_id ascending. The prior only orders threads whose lexical
    /// scores are equal, whatever the configured weights.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .lexical
            .total_cmp(&self.lexical)
            .then_with(|| other.prior.total_cmp(&self.prior))
            .then_with(|| self.thread.thread_id.cmp(&other.thread.thread_id))
    }
}

/// Ranks corpus threads for a query. Holds only shared references and the
/// run's immutable keyword table, so independent selectors can run side by
/// side over the same corpus.
pub struct EvidenceSelector<'a> {
    corpus: &'a Corpus,
    index: &'a TopicIndex,
    vocab: TopicVocabulary,
    config: &'a SelectorConfig,
}

impl<'a> EvidenceSelector<'a> {
    pub fn new(corpus: &'a Corpus, index: &'a TopicIndex, config: &'a SelectorConfig) -> Self {
        Self {
            corpus,
            index,
            vocab: index.vocabulary(),
            config,
        }
    }

    pub fn select(&self, query: &str, k: i64) -> Result<SelectionOutcome> {
        let query = Query::parse(query)?;
        let k = validate_k(k)?;
        self.config.validate()?;

        let matched_topics = self.vocab.match_query(&query.tokens);
        let (pool, pool_ids) = self.candidate_pool(&matched_topics);
        debug!(keywords = ?query.keywords, topics = ?matched_topics, pool = ?pool, "candidate pool");

        let mut scored: Vec<Scored<'_>> = self
            .corpus
            .threads()
            .iter()
            .filter(|t| pool_ids.as_ref().map_or(true, |ids| ids.contains(t.thread_id.as_str())))
            .map(|t| self.score_thread(t, &query.keywords))
            .collect();
        let candidates = scored.len();

        scored.sort_by(|a, b| a.cmp_rank(b));
        scored.truncate(k);

        // Zero lexical relevance everywhere: keep the engagement ordering but
        // say so, rather than returning an empty pack.
        let no_strong_match = !scored.is_empty() && scored.iter().all(|s| s.lexical == 0.0);
        if no_strong_match {
            warn!(query = %query.text, "no strong match; results ranked by engagement only");
        }

        let records: Vec<EvidenceRecord> = scored
            .into_iter()
            .enumerate()
            .map(|(i, s)| self.to_record(i + 1, s, &matched_topics, no_strong_match))
            .collect();

        info!(
            candidates,
            selected = records.len(),
            k,
            topics = matched_topics.len(),
            "selection complete"
        );

        Ok(SelectionOutcome {
            query,
            matched_topics,
            pool,
            candidates,
            no_strong_match,
            records,
        })
    }

    /// IDs of the threads to score, or `None` for the whole corpus.
    fn candidate_pool(&self, topics: &[Topic]) -> (Pool, Option<HashSet<&'a str>>) {
        if topics.is_empty() {
            return (Pool::FullCorpus, None);
        }

        let ids: HashSet<&'a str> = topics
            .iter()
            .flat_map(|t| self.index.thread_ids(*t))
            .map(String::as_str)
            .filter(|id| self.corpus.contains(id))
            .collect();

        if ids.is_empty() {
            warn!(
                topics = ?topics,
                "matched topics have no threads in this corpus; searching the full corpus"
            );
            return (Pool::FullCorpus, None);
        }
        (Pool::Topics(topics.to_vec()), Some(ids))
    }

    fn score_thread<'t>(&self, thread: &'t ThreadRecord, keywords: &[String]) -> Scored<'t> {
        let body = tokenize::token_set(thread.text());
        let matched_comments =
            explain::collect_comment_matches(thread, keywords, self.config.max_comments_scored);
        let in_comments: HashSet<&str> = matched_comments
            .iter()
            .flat_map(|c| c.matched_keywords.iter().map(String::as_str))
            .collect();

        let mut body_hits = 0usize;
        let mut comment_only_hits = 0usize;
        let mut matched_keywords = Vec::new();
        for kw in keywords {
            if body.contains(kw.as_str()) {
                body_hits += 1;
                matched_keywords.push(kw.clone());
            } else if in_comments.contains(kw.as_str()) {
                comment_only_hits += 1;
                matched_keywords.push(kw.clone());
            }
        }

        let lexical = self.config.body_weight * body_hits as f64
            + self.config.comment_weight * comment_only_hits as f64;
        let engagement = engagement(&thread.metrics, self.config);
        let prior = engagement_prior(engagement, self.config);

        Scored {
            thread,
            lexical,
            prior,
            engagement,
            matched_keywords,
            matched_comments,
        }
    }

    fn to_record(
        &self,
        rank: usize,
        scored: Scored<'_>,
        matched_topics: &[Topic],
        no_strong_match: bool,
    ) -> EvidenceRecord {
        let score = scored.score();
        let mut thread = scored.thread.clone();
        thread.fill_created_at_iso();

        let topics: Vec<String> = matched_topics
            .iter()
            .filter(|t| self.index.contains(**t, &thread.thread_id))
            .map(|t| t.as_str().to_string())
            .collect();

        let why_selected = explain::build_why_selected(
            &scored.matched_keywords,
            &topics,
            scored.engagement,
            score,
            no_strong_match,
        );

        EvidenceRecord {
            thread,
            evidence: Selection {
                rank,
                score,
                matched_keywords: scored.matched_keywords,
                topics,
                matched_comments: scored.matched_comments,
                why_selected,
            },
        }
    }
}

/// Weighted engagement count.
pub fn engagement(metrics: &Metrics, config: &SelectorConfig) -> f64 {
    metrics.reaction_count as f64 * config.reaction_weight
        + metrics.comment_count as f64 * config.comment_count_weight
        + metrics.share_count as f64 * config.share_weight
}

/// Saturating prior in `[0, engagement_weight)`.
pub fn engagement_prior(engagement: f64, config: &SelectorConfig) -> f64 {
    if engagement <= 0.0 {
        return 0.0;
    }
    config.engagement_weight * engagement / (engagement + config.engagement_half_saturation)
}

impl SelectionOutcome {
    pub fn topic_names(&self) -> Vec<&'static str> {
        self.matched_topics.iter().map(Topic::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn thread(id: &str, text: &str, reactions: u64) -> ThreadRecord {
        thread_with_comments(id, text, reactions, json!([]))
    }

    fn thread_with_comments(
        id: &str,
        text: &str,
        reactions: u64,
        comments: serde_json::Value,
    ) -> ThreadRecord {
        serde_json::from_value(json!({
            "thread_id": id,
            "url": format!("https://www.facebook.com/groups/uncaged/permalink/{}", id),
            "text_clean": text,
            "createdAt_iso": "2025-03-01T12:00:00Z",
            "metrics": {"reactionCount": reactions, "commentCount": 0, "shareCount": 0},
            "comments": comments,
        }))
        .unwrap()
    }

    fn scenario_corpus() -> Corpus {
        Corpus::from_records(vec![
            thread("T1", "cash pay pricing $150 eval", 10),
            thread("T2", "dry needling CEU course", 2),
            thread("T3", "pricing packages discount", 50),
        ])
    }

    fn pricing_index() -> TopicIndex {
        TopicIndex::parse(r#"{"pricing": ["T1", "T3"]}"#).unwrap()
    }

    fn distinct_ids(outcome: &SelectionOutcome) -> BTreeSet<&str> {
        outcome
            .records
            .iter()
            .map(|r| r.thread.thread_id.as_str())
            .collect()
    }

    fn ids(outcome: &SelectionOutcome) -> Vec<&str> {
        outcome
            .records
            .iter()
            .map(|r| r.thread.thread_id.as_str())
            .collect()
    }

    #[test]
    fn test_topic_pool_ranks_by_engagement_on_equal_overlap() {
        let corpus = scenario_corpus();
        let index = pricing_index();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("pricing", 2).unwrap();
        assert_eq!(ids(&outcome), vec!["T3", "T1"]);
        assert_eq!(outcome.pool, Pool::Topics(vec![Topic::Pricing]));
        assert_eq!(outcome.candidates, 2);
        assert!(!outcome.no_strong_match);
        assert_eq!(outcome.records[0].evidence.rank, 1);
        assert_eq!(outcome.records[0].evidence.topics, vec!["pricing"]);
        assert_eq!(outcome.records[0].evidence.matched_keywords, vec!["pricing"]);
    }

    #[test]
    fn test_unindexed_topics_fall_back_to_engagement_order() {
        let corpus = scenario_corpus();
        let index = pricing_index();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("gym partnership", 2).unwrap();
        assert_eq!(
            outcome.matched_topics,
            vec![Topic::EmbeddedInGym, Topic::ScalingHiring]
        );
        assert_eq!(outcome.pool, Pool::FullCorpus);
        assert_eq!(outcome.candidates, 3);
        assert!(outcome.no_strong_match);
        assert_eq!(ids(&outcome), vec!["T3", "T1"]);
        assert!(outcome.records[0]
            .evidence
            .why_selected
            .starts_with("No strong match"));
    }

    #[test]
    fn test_no_topic_match_scans_full_corpus() {
        let corpus = scenario_corpus();
        let index = pricing_index();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("needling", 5).unwrap();
        assert!(outcome.matched_topics.is_empty());
        assert_eq!(outcome.pool, Pool::FullCorpus);
        // lexical match outranks far higher engagement
        assert_eq!(ids(&outcome), vec!["T2", "T3", "T1"]);
        assert!(!outcome.no_strong_match);
    }

    #[test]
    fn test_missing_index_still_returns_results() {
        let corpus = scenario_corpus();
        let index = TopicIndex::default();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("pricing", 10).unwrap();
        assert_eq!(outcome.pool, Pool::FullCorpus);
        assert_eq!(ids(&outcome), vec!["T3", "T1", "T2"]);
    }

    #[test]
    fn test_empty_query_rejected() {
        let corpus = scenario_corpus();
        let index = pricing_index();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        for q in ["", "   ", "\t\n"] {
            assert!(matches!(
                selector.select(q, 5),
                Err(SelectError::InvalidQuery)
            ));
        }
    }

    #[test]
    fn test_non_positive_k_rejected() {
        let corpus = scenario_corpus();
        let index = pricing_index();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        for k in [0, -1, i64::MIN] {
            assert!(matches!(
                selector.select("pricing", k),
                Err(SelectError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_ties_break_on_thread_id() {
        let corpus = Corpus::from_records(vec![
            thread("b", "pricing", 5),
            thread("c", "pricing", 5),
            thread("a", "pricing", 5),
        ]);
        let index = TopicIndex::default();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("pricing", 3).unwrap();
        assert_eq!(ids(&outcome), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_comment_matches_attach_to_parent() {
        let t = thread_with_comments(
            "T9",
            "anyone have thoughts?",
            1,
            json!([
                {"comment_id": "c1", "url": "https://fb.com/c1", "text_clean": "Our eval is $200"},
                {"comment_id": "c2", "url": "https://fb.com/c2", "text_clean": "eval pricing varies"},
            ]),
        );
        let corpus = Corpus::from_records(vec![t, thread("T1", "unrelated", 100)]);
        let index = TopicIndex::default();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("eval pricing", 5).unwrap();
        assert_eq!(ids(&outcome), vec!["T9", "T1"]);
        let ev = &outcome.records[0].evidence;
        assert_eq!(ev.matched_keywords, vec!["eval", "pricing"]);
        assert_eq!(ev.matched_comments.len(), 2);
        assert_eq!(ev.matched_comments[0].comment_id, "c1");
        // two comment-only keywords at weight 1.0 each
        assert!(ev.score >= 2.0 && ev.score < 2.5);
    }

    #[test]
    fn test_body_hit_outweighs_comment_hit() {
        let in_comment = thread_with_comments(
            "A",
            "question",
            0,
            json!([{"comment_id": "c1", "url": "https://fb.com/c1", "text_clean": "stripe works"}]),
        );
        let corpus = Corpus::from_records(vec![in_comment, thread("B", "stripe setup", 0)]);
        let index = TopicIndex::default();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("stripe", 2).unwrap();
        assert_eq!(ids(&outcome), vec!["B", "A"]);
    }

    #[test]
    fn test_results_are_deterministic_and_faithful() {
        let records: Vec<ThreadRecord> = (0..200)
            .map(|i| {
                let text = match i % 4 {
                    0 => "cash pay pricing for the eval",
                    1 => "hiring a contractor",
                    2 => "pricing packages and memberships",
                    _ => "weekend thoughts",
                };
                thread(&format!("thread_{:03}", i), text, (i * 7 % 31) as u64)
            })
            .collect();
        let corpus = Corpus::from_records(records);
        let index = TopicIndex::parse(
            r#"{"pricing": ["thread_000", "thread_002", "thread_004", "thread_006", "ghost"]}"#,
        )
        .unwrap();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let first = selector.select("pricing for packages", 60).unwrap();
        let second = selector.select("pricing for packages", 60).unwrap();
        assert_eq!(first.records, second.records);

        // ghost is not in the corpus, so four candidates
        assert_eq!(first.records.len(), 4);
        assert_eq!(distinct_ids(&first).len(), first.records.len());
        for record in &first.records {
            let original = corpus
                .threads()
                .iter()
                .find(|t| t.thread_id == record.thread.thread_id)
                .unwrap();
            assert_eq!(record.thread.url, original.url);
        }

        let wide = selector.select("weekend", 60).unwrap();
        assert_eq!(wide.records.len(), 60);
        assert_eq!(distinct_ids(&wide).len(), 60);
    }

    #[test]
    fn test_engagement_never_beats_a_stronger_lexical_match() {
        // comment-only hit plus a huge prior would sum past a body hit
        let config = SelectorConfig {
            body_weight: 2.0,
            comment_weight: 1.5,
            engagement_weight: 1.0,
            ..Default::default()
        };
        let popular = thread_with_comments(
            "A",
            "question",
            10_000,
            json!([{"comment_id": "c1", "url": "https://fb.com/c1", "text_clean": "stripe works"}]),
        );
        let corpus = Corpus::from_records(vec![popular, thread("B", "stripe setup", 0)]);
        let index = TopicIndex::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("stripe", 2).unwrap();
        assert_eq!(ids(&outcome), vec!["B", "A"]);
        assert!(outcome.records[1].evidence.score > outcome.records[0].evidence.score);
    }

    #[test]
    fn test_zero_comment_weight_is_usable() {
        let config = SelectorConfig {
            comment_weight: 0.0,
            ..Default::default()
        };
        let corpus = scenario_corpus();
        let index = pricing_index();
        let selector = EvidenceSelector::new(&corpus, &index, &config);
        assert_eq!(ids(&selector.select("pricing", 2).unwrap()), vec!["T3", "T1"]);
    }

    #[test]
    fn test_stale_topic_ids_fall_back_to_full_corpus() {
        let corpus = scenario_corpus();
        let index = TopicIndex::parse(r#"{"pricing": ["ghost", "thread_gone"]}"#).unwrap();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("pricing", 5).unwrap();
        assert_eq!(outcome.matched_topics, vec![Topic::Pricing]);
        assert_eq!(outcome.pool, Pool::FullCorpus);
        assert_eq!(outcome.candidates, 3);
        assert_eq!(ids(&outcome), vec!["T3", "T1", "T2"]);
        assert!(outcome.records.iter().all(|r| r.evidence.topics.is_empty()));
    }

    #[test]
    fn test_prior_is_bounded_and_monotone() {
        let config = SelectorConfig::default();
        let low = engagement_prior(1.0, &config);
        let high = engagement_prior(1_000_000.0, &config);
        assert_eq!(engagement_prior(0.0, &config), 0.0);
        assert!(low > 0.0 && low < high);
        assert!(high < config.engagement_weight);
    }

    #[test]
    fn test_engagement_uses_configured_weights() {
        let metrics = Metrics {
            reaction_count: 10,
            comment_count: 4,
            share_count: 3,
        };
        let config = SelectorConfig {
            share_weight: 2.0,
            ..Default::default()
        };
        assert_eq!(engagement(&metrics, &config), 20.0);
    }

    #[test]
    fn test_selection_scales_linearly_with_corpus() {
        let records: Vec<ThreadRecord> = (0..20_000)
            .map(|i| thread(&format!("t{:05}", i), "pricing packages for the eval", i % 97))
            .collect();
        let corpus = Corpus::from_records(records);
        let index = TopicIndex::default();
        let config = SelectorConfig::default();
        let selector = EvidenceSelector::new(&corpus, &index, &config);

        let outcome = selector.select("pricing eval", 60).unwrap();
        assert_eq!(outcome.candidates, 20_000);
        assert_eq!(outcome.records.len(), 60);
        assert_eq!(outcome.records[0].thread.metrics.reaction_count, 96);
    }
}
