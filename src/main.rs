//! spm-probe: run texts through a tokenizer model via the SentencePiece C
//! bridge and report pieces, ids and decoded text.

mod config;
mod report;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use spm_bridge::client::SentencePieceProcessor;
use tracing::info;

use config::{Cli, OutputFormat};
use report::Report;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with_writer(io::stderr)
        .init();

    let texts = cli.texts()?;
    let processor = SentencePieceProcessor::open(&cli.model)
        .with_context(|| format!("failed to load model {}", cli.model.display()))?;
    info!(
        model = %cli.model.display(),
        vocab_size = processor.vocab_size(),
        texts = texts.len(),
        "Model loaded"
    );

    let report = Report::build(
        &processor,
        cli.model.display().to_string(),
        &texts,
        cli.dump_vocab,
    )?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        OutputFormat::Text => report.write_text(&mut out)?,
        OutputFormat::Json => report.write_json(&mut out)?,
    }
    out.flush()?;

    let failures = report.round_trip_failures();
    if failures > 0 {
        info!(failures, "Some texts did not decode back to their input");
    }
    Ok(())
}
