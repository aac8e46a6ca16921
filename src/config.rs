//! Command-line configuration for spm-probe.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

/// Texts probed when none are given: plain words, punctuation, digits, emoji,
/// repeated whitespace, newlines and CJK.
pub const DEFAULT_TEXTS: &[&str] = &[
    "Hello",
    "Hello world",
    "Hello world!",
    "Testing 123",
    "The quick brown fox",
    "🌍🌎🌏",
    "Mixed emoji 😀 text",
    "  spaces  ",
    "\n\nnewlines\n\n",
    "代码测试",
];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "spm-probe",
    version,
    about = "Encode, decode and inspect a tokenizer model through the SentencePiece C bridge"
)]
pub struct Cli {
    /// Path to a tokenizer.json or SentencePiece .model file, or a directory
    /// containing one.
    #[arg(short, long, env = "SPM_MODEL")]
    pub model: PathBuf,

    /// Text to probe. Repeat for several texts.
    #[arg(short, long = "text")]
    pub texts: Vec<String>,

    /// File with one text per line to probe.
    #[arg(long)]
    pub texts_file: Option<PathBuf>,

    /// List the first N vocabulary entries with their scores.
    #[arg(long, value_name = "N")]
    pub dump_vocab: Option<usize>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Texts given on the command line, then from `--texts-file`, falling back
    /// to [`DEFAULT_TEXTS`] when neither is present.
    pub fn texts(&self) -> Result<Vec<String>> {
        let mut texts = self.texts.clone();

        if let Some(path) = &self.texts_file {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read texts file {}", path.display()))?;
            texts.extend(contents.lines().map(str::to_string));
        }

        if texts.is_empty() && self.texts_file.is_none() {
            texts = DEFAULT_TEXTS.iter().map(|t| t.to_string()).collect();
        }
        Ok(texts)
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "spm_probe=debug,spm_bridge=debug,spm_tokenizer=debug"
        } else {
            "spm_probe=info,spm_bridge=warn,spm_tokenizer=warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_to_battery() {
        let cli = Cli::parse_from(["spm-probe", "--model", "/tmp/model"]);
        assert_eq!(cli.texts().unwrap().len(), DEFAULT_TEXTS.len());
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.dump_vocab.is_none());
    }

    #[test]
    fn test_explicit_texts_replace_battery() {
        let cli = Cli::parse_from([
            "spm-probe", "-m", "/tmp/model", "-t", "hello", "--text", "world", "--format", "json",
        ]);
        assert_eq!(cli.texts().unwrap(), vec!["hello", "world"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_texts_file_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello world").unwrap();
        writeln!(file, "test").unwrap();

        let cli = Cli::parse_from([
            "spm-probe",
            "--model",
            "/tmp/model",
            "--texts-file",
            file.path().to_str().unwrap(),
        ]);
        assert_eq!(cli.texts().unwrap(), vec!["hello world", "test"]);
    }

    #[test]
    fn test_missing_texts_file() {
        let cli = Cli::parse_from([
            "spm-probe",
            "--model",
            "/tmp/model",
            "--texts-file",
            "/nonexistent/texts.txt",
        ]);
        let err = cli.texts().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/texts.txt"));
    }
}
