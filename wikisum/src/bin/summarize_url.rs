//! One-shot summary of a single article, printed as JSON. Nothing is written to the
//! database.
//!
//! ```text
//! summarize_url https://en.wikipedia.org/wiki/Rust_(programming_language) --word-count 120
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use common::Config;
use wikisum::orchestrator::Pipeline;
use wikisum::reference::normalize;
use wikisum::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "summarize_url", about = "Summarize one Wikipedia article without caching")]
struct Args {
    /// Article URL
    url: String,

    /// Target summary length in words
    #[arg(long, default_value_t = 150)]
    word_count: i64,

    /// Config file merged over config.default.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_path = PathBuf::from("config.default.toml");
    let config = Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        args.config.as_deref(),
    )
    .await?;
    config.validate()?;

    // Logs go to stderr so stdout stays valid JSON
    init_tracing(args.log_level.as_deref(), "warn", &config.logging.format, std::io::stderr);

    let reference = normalize(&args.url).with_context(|| format!("invalid article URL: {}", args.url))?;
    let pipeline = Pipeline::from_config(&config)?;
    let word_count = pipeline.validate_word_count(args.word_count)?;

    let summary = pipeline.generate(&reference, word_count).await?;

    let output = json!({
        "url": summary.url,
        "requested_word_count": summary.requested_word_count,
        "actual_word_count": summary.actual_word_count(),
        "summary": summary.summary,
        "summary_origin": summary.summary_origin,
        "summary_translated": summary.summary_translated,
        "translation_origin": summary.translation_origin,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
