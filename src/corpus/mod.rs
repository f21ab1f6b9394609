pub mod types;

use std::collections::HashMap;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::error::{Result, SelectError};
use types::{ThreadId, ThreadRecord};

/// Read-only view of the thread corpus for one invocation.
#[derive(Debug, Default)]
pub struct Corpus {
    threads: Vec<ThreadRecord>,
    by_id: HashMap<ThreadId, usize>,
    stats: LoadStats,
}

/// Recoverable problems seen while reading the corpus.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadStats {
    pub lines_read: usize,
    pub malformed: usize,
    pub duplicates: usize,
}

impl LoadStats {
    pub fn skipped(&self) -> usize {
        self.malformed + self.duplicates
    }
}

impl Corpus {
    /// Stream a JSON Lines corpus once. Bad lines are skipped and counted;
    /// only an unreadable source is fatal.
    pub async fn load(path: &Path) -> Result<Self> {
        let unavailable = |source| SelectError::CorpusUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).await.map_err(unavailable)?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut corpus = Corpus::default();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await.map_err(unavailable)? == 0 {
                break;
            }
            line_no += 1;
            // Invalid UTF-8 is a bad record, not a bad source.
            match std::str::from_utf8(&buf) {
                Ok(line) => corpus.push_line(line_no, line),
                Err(_) => {
                    debug!(line = line_no, "invalid UTF-8, skipping");
                    corpus.stats.lines_read += 1;
                    corpus.stats.malformed += 1;
                }
            }
        }

        info!(
            path = %path.display(),
            threads = corpus.len(),
            lines = corpus.stats.lines_read,
            malformed = corpus.stats.malformed,
            duplicates = corpus.stats.duplicates,
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Build a corpus from in-memory records, applying the same duplicate rule.
    pub fn from_records(records: impl IntoIterator<Item = ThreadRecord>) -> Self {
        let mut corpus = Corpus::default();
        for record in records {
            corpus.stats.lines_read += 1;
            corpus.insert(record);
        }
        corpus
    }

    fn push_line(&mut self, line_no: usize, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.stats.lines_read += 1;

        match parse_line(line_no, line) {
            Ok(record) => self.insert(record),
            Err(e) => {
                debug!("{}", e);
                self.stats.malformed += 1;
            }
        }
    }

    fn insert(&mut self, record: ThreadRecord) {
        if self.by_id.contains_key(&record.thread_id) {
            debug!(thread_id = %record.thread_id, "duplicate thread_id, keeping first");
            self.stats.duplicates += 1;
            return;
        }
        self.by_id
            .insert(record.thread_id.clone(), self.threads.len());
        self.threads.push(record);
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.by_id.contains_key(thread_id)
    }

    pub fn threads(&self) -> &[ThreadRecord] {
        &self.threads
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<ThreadRecord> {
    let record: ThreadRecord =
        serde_json::from_str(line).map_err(|e| SelectError::MalformedRecord {
            line: line_no,
            reason: e.to_string(),
        })?;
    if record.thread_id.trim().is_empty() {
        return Err(SelectError::MalformedRecord {
            line: line_no,
            reason: "empty thread_id".to_string(),
        });
    }
    Ok(record)
}
