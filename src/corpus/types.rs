use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique thread identifier, e.g. "thread_123456789".
pub type ThreadId = String;

/// Engagement counters as exported by the scraper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub reaction_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub share_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub text_clean: Option<String>,
    #[serde(default)]
    pub text_raw: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Comment {
    pub fn text(&self) -> &str {
        pick_text(&[&self.text_clean, &self.text_raw, &self.text])
    }
}

const CREATED_AT_ISO: &str = "createdAt_iso";

/// The fields the selector reads. Anything else on the line is ignored here.
#[derive(Deserialize)]
struct ThreadFields {
    thread_id: ThreadId,
    url: String,
    #[serde(default)]
    text_clean: Option<String>,
    #[serde(default)]
    text_raw: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "createdAt_iso", default)]
    created_at_iso: Option<String>,
    #[serde(rename = "createdAt_ts", default)]
    created_at_ts: Option<i64>,
    #[serde(default)]
    metrics: Option<Metrics>,
    #[serde(default)]
    comments: Option<Vec<Comment>>,
}

/// One top-level post: a typed view for scoring over the untouched corpus
/// object, which is what gets serialized back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    pub url: String,
    pub text_clean: Option<String>,
    pub text_raw: Option<String>,
    pub text: Option<String>,
    pub created_at_iso: Option<String>,
    pub created_at_ts: Option<i64>,
    pub metrics: Metrics,
    pub comments: Vec<Comment>,
    raw: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ThreadRecord {
    type Error = serde_json::Error;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let fields: ThreadFields = serde_json::from_value(Value::Object(raw.clone()))?;
        Ok(Self {
            thread_id: fields.thread_id,
            url: fields.url,
            text_clean: fields.text_clean,
            text_raw: fields.text_raw,
            text: fields.text,
            created_at_iso: fields.created_at_iso,
            created_at_ts: fields.created_at_ts,
            metrics: fields.metrics.unwrap_or_default(),
            comments: fields.comments.unwrap_or_default(),
            raw,
        })
    }
}

impl From<ThreadRecord> for Map<String, Value> {
    fn from(thread: ThreadRecord) -> Self {
        thread.raw
    }
}

impl ThreadRecord {
    /// Clean body text, falling back to the raw text.
    pub fn text(&self) -> &str {
        pick_text(&[&self.text_clean, &self.text_raw, &self.text])
    }

    /// Creation time from the ISO field, else from the epoch seconds.
    /// A zero timestamp means "unknown" in the exports.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if let Some(iso) = self.created_at_iso.as_deref() {
            if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        self.created_at_ts
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Add `createdAt_iso` derived from `createdAt_ts` when the line has no
    /// such key. A key that is present, even as null, is left alone.
    pub fn fill_created_at_iso(&mut self) {
        if self.raw.contains_key(CREATED_AT_ISO) {
            return;
        }
        let Some(iso) = self
            .created_at_ts
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        else {
            return;
        };
        self.raw
            .insert(CREATED_AT_ISO.to_string(), Value::String(iso.clone()));
        self.created_at_iso = Some(iso);
    }
}

/// First non-empty candidate.
fn pick_text<'a>(candidates: &[&'a Option<String>]) -> &'a str {
    candidates
        .iter()
        .copied()
        .filter_map(Option::as_deref)
        .find(|t| !t.is_empty())
        .unwrap_or("")
}

/// A comment whose text contributed query keywords to its parent's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentMatch {
    pub comment_id: String,
    pub url: String,
    pub matched_keywords: Vec<String>,
}

/// Why and where a thread landed in the pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub rank: usize,
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_comments: Vec<CommentMatch>,
    pub why_selected: String,
}

/// One output line: the thread exactly as read, plus the selection details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRecord {
    #[serde(flatten)]
    pub thread: ThreadRecord,
    pub evidence: Selection,
}
