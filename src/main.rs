mod config;
mod corpus;
mod error;
mod pack;
mod select;
mod topics;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn, Level};

use config::{SelectorConfig, DEFAULT_K};
use corpus::Corpus;
use error::SelectError;
use select::{EvidenceSelector, Query};
use topics::TopicIndex;

/// Build an evidence pack: the top-k threads for a query, one JSON record per line.
#[derive(Parser, Debug)]
#[command(name = "build-evidence-pack", version, about, long_about = None)]
struct Cli {
    /// Thread corpus (JSON Lines)
    #[arg(long)]
    input: PathBuf,

    /// Topic index (JSON); a missing or unreadable index falls back to full-corpus search
    #[arg(long = "topic-index", alias = "topic_index")]
    topic_index: PathBuf,

    /// Free-text query
    #[arg(long, allow_hyphen_values = true)]
    query: String,

    /// Maximum number of threads in the pack
    #[arg(long, env = "EVIDENCE_K", default_value_t = DEFAULT_K as i64, allow_negative_numbers = true)]
    k: i64,

    /// Output path for the evidence pack (JSON Lines)
    #[arg(long)]
    out: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    // Load env
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(summary) => print!("{}", summary),
        Err(e) => {
            let code = e
                .downcast_ref::<SelectError>()
                .map_or(1, SelectError::exit_code);
            eprintln!("error: {:#}", e);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    // Reject bad arguments before touching any file.
    Query::parse(&cli.query)?;
    select::validate_k(cli.k)?;
    let config = SelectorConfig::from_env();
    config.validate()?;

    info!(
        query = %cli.query,
        input = %cli.input.display(),
        topic_index = %cli.topic_index.display(),
        out = %cli.out.display(),
        k = cli.k,
        "building evidence pack"
    );

    let corpus = Corpus::load(&cli.input).await?;
    if corpus.is_empty() {
        warn!(input = %cli.input.display(), "corpus has no usable threads");
    }
    let (index, index_warning) = TopicIndex::load_or_empty(&cli.topic_index).await;

    let selector = EvidenceSelector::new(&corpus, &index, &config);
    let outcome = selector
        .select(&cli.query, cli.k)
        .context("selection failed")?;

    if corpus.stats().malformed > 0 {
        warn!(
            skipped = corpus.stats().malformed,
            "{} lines skipped due to malformed input",
            corpus.stats().malformed
        );
    }

    let written = pack::write_pack(&cli.out, &outcome.records).await?;

    Ok(pack::render_summary(
        &outcome,
        corpus.stats(),
        index_warning.as_ref(),
        &written,
    ))
}
