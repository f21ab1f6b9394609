use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::corpus::types::EvidenceRecord;
use crate::corpus::LoadStats;
use crate::error::{Result, SelectError};
use crate::select::{Pool, SelectionOutcome};

/// What landed on disk, re-read after the rename.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPack {
    pub path: PathBuf,
    pub bytes: u64,
    pub records: usize,
    /// blake3 hex digest of the file contents.
    pub digest: String,
}

/// One JSON object per line, newline-terminated.
pub fn encode(records: &[EvidenceRecord]) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Write the pack to a temporary sibling and rename it into place, so a
/// failure never leaves a truncated pack behind.
pub async fn write_pack(path: &Path, records: &[EvidenceRecord]) -> Result<WrittenPack> {
    let output_err = |source| SelectError::Output {
        path: path.to_path_buf(),
        source,
    };

    let bytes = encode(records)
        .map_err(|e| output_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(output_err)?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(output_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(output_err(e));
    }
    debug!(tmp = %tmp.display(), "pack renamed into place");

    // Verify what is actually on disk rather than what we meant to write.
    let on_disk = tokio::fs::read(path).await.map_err(output_err)?;
    let written = WrittenPack {
        path: path.to_path_buf(),
        bytes: on_disk.len() as u64,
        records: on_disk.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(),
        digest: blake3::hash(&on_disk).to_hex().to_string(),
    };

    info!(
        path = %written.path.display(),
        bytes = written.bytes,
        records = written.records,
        digest = %written.digest,
        "evidence pack written"
    );
    Ok(written)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "evidence_pack.jsonl".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Human-readable end-of-run report printed to stdout.
pub fn render_summary(
    outcome: &SelectionOutcome,
    stats: &LoadStats,
    index_warning: Option<&SelectError>,
    written: &WrittenPack,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", outcome.query.text);
    let _ = writeln!(out, "Keywords: {}", outcome.query.keywords.join(", "));

    let topics = outcome.topic_names();
    let pool = match &outcome.pool {
        Pool::Topics(_) => "topic threads",
        Pool::FullCorpus => "full corpus",
    };
    let _ = writeln!(
        out,
        "Matched topics: {} (searched {})",
        if topics.is_empty() {
            "none".to_string()
        } else {
            topics.join(", ")
        },
        pool
    );
    let _ = writeln!(
        out,
        "Threads: {} read, {} candidates, {} selected",
        stats.lines_read.saturating_sub(stats.skipped()),
        outcome.candidates,
        outcome.records.len()
    );

    if stats.malformed > 0 {
        let _ = writeln!(
            out,
            "{} lines skipped due to malformed input",
            stats.malformed
        );
    }
    if stats.duplicates > 0 {
        let _ = writeln!(out, "{} duplicate thread_id lines skipped", stats.duplicates);
    }
    if let Some(warning) = index_warning {
        let _ = writeln!(out, "Warning: {}", warning);
    }
    if outcome.no_strong_match {
        let _ = writeln!(out, "No strong match: results ranked by engagement only");
    }

    if !outcome.records.is_empty() {
        let _ = writeln!(out, "\nTop {} threads by relevance:", outcome.records.len().min(5));
        for record in outcome.records.iter().take(5) {
            let thread = &record.thread;
            let date = thread
                .created_at()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            let _ = writeln!(
                out,
                "  {}. [{}] score={:.1} {}",
                record.evidence.rank, thread.thread_id, record.evidence.score, date
            );
            let _ = writeln!(out, "     {}", thread.url);
            let _ = writeln!(out, "     {}", snippet(thread.text(), 100));
        }
    }

    let _ = writeln!(
        out,
        "\nOutput file: {} ({} bytes, {} records, blake3 {})",
        written.path.display(),
        written.bytes,
        written.records,
        &written.digest[..written.digest.len().min(16)]
    );
    out
}

/// First `max_chars` characters on one line, with an ellipsis when cut.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
