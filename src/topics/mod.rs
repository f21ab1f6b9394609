pub mod vocab;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::corpus::types::ThreadId;
use crate::error::SelectError;
pub use vocab::{Topic, TopicVocabulary};

/// Entry in the pack-builder shape of the index.
#[derive(Debug, Deserialize)]
struct PackTopicEntry {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    top_thread_ids: Vec<ThreadId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIndex {
    Pack {
        topics: HashMap<String, PackTopicEntry>,
    },
    Flat(HashMap<String, Vec<ThreadId>>),
}

/// Topic → pre-classified thread IDs, plus any keywords the index carries.
#[derive(Debug, Default, Clone)]
pub struct TopicIndex {
    threads: BTreeMap<Topic, BTreeSet<ThreadId>>,
    keywords: BTreeMap<Topic, Vec<String>>,
}

impl TopicIndex {
    /// Load the index. Any failure degrades to an empty index so selection
    /// falls back to the full corpus; the reason is logged and returned.
    pub async fn load_or_empty(path: &Path) -> (Self, Option<SelectError>) {
        match Self::load(path).await {
            Ok(index) => {
                if index.is_empty() {
                    warn!(path = %path.display(), "topic index lists no threads; every query searches the full corpus");
                }
                (index, None)
            }
            Err(e) => {
                warn!("{}; falling back to full-corpus search", e);
                (Self::default(), Some(e))
            }
        }
    }

    pub async fn load(path: &Path) -> Result<Self, SelectError> {
        let unavailable = |reason: String| SelectError::TopicIndexUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let index = Self::parse(&raw).map_err(|e| unavailable(e.to_string()))?;

        info!(
            path = %path.display(),
            topics = index.threads.len(),
            thread_refs = index.threads.values().map(BTreeSet::len).sum::<usize>(),
            "topic index loaded"
        );
        Ok(index)
    }

    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let mut index = Self::default();
        match serde_json::from_str::<RawIndex>(raw)? {
            RawIndex::Pack { topics } => {
                for (name, entry) in topics {
                    let Some(topic) = known_topic(&name) else {
                        continue;
                    };
                    index.insert(topic, entry.top_thread_ids);
                    if !entry.keywords.is_empty() {
                        index.keywords.insert(topic, entry.keywords);
                    }
                }
            }
            RawIndex::Flat(topics) => {
                for (name, ids) in topics {
                    if let Some(topic) = known_topic(&name) {
                        index.insert(topic, ids);
                    }
                }
            }
        }
        Ok(index)
    }

    fn insert(&mut self, topic: Topic, ids: Vec<ThreadId>) {
        self.threads.entry(topic).or_default().extend(ids);
    }

    pub fn thread_ids(&self, topic: Topic) -> impl Iterator<Item = &ThreadId> {
        self.threads.get(&topic).into_iter().flatten()
    }

    pub fn contains(&self, topic: Topic, thread_id: &str) -> bool {
        self.threads
            .get(&topic)
            .is_some_and(|ids| ids.contains(thread_id))
    }

    pub fn is_empty(&self) -> bool {
        self.threads.values().all(BTreeSet::is_empty)
    }

    /// Keyword table for this run: built-in vocabulary plus index keywords.
    pub fn vocabulary(&self) -> TopicVocabulary {
        TopicVocabulary::with_extra(
            self.keywords
                .iter()
                .map(|(topic, words)| (*topic, words.as_slice())),
        )
    }
}

fn known_topic(name: &str) -> Option<Topic> {
    match name.parse::<Topic>() {
        Ok(topic) => Some(topic),
        Err(e) => {
            warn!("topic index: {}, ignoring", e);
            None
        }
    }
}
