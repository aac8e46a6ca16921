//! Probe results and their rendering.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use spm_bridge::client::SentencePieceProcessor;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct TextProbe {
    pub text: String,
    pub pieces: Vec<String>,
    pub ids: Vec<i32>,
    /// `None` when decoding failed
    pub decoded: Option<String>,
    pub round_trip: bool,
}

#[derive(Debug, Serialize)]
pub struct VocabEntry {
    pub id: i32,
    pub piece: String,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub model: String,
    pub vocab_size: usize,
    pub unk_id: Option<i32>,
    pub texts: Vec<TextProbe>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vocab: Vec<VocabEntry>,
}

impl TextProbe {
    pub fn run(processor: &SentencePieceProcessor, text: &str) -> Result<Self> {
        let pieces = processor.tokenize(text)?;
        let ids = processor.encode(text)?;
        let decoded = match processor.decode(&ids) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(text, error = %e, "Decode failed");
                None
            }
        };
        let round_trip = decoded.as_deref() == Some(text);

        Ok(Self {
            text: text.to_string(),
            pieces,
            ids,
            decoded,
            round_trip,
        })
    }
}

impl Report {
    pub fn build(
        processor: &SentencePieceProcessor,
        model: impl Into<String>,
        texts: &[String],
        dump_vocab: Option<usize>,
    ) -> Result<Self> {
        let texts = texts
            .iter()
            .map(|text| TextProbe::run(processor, text))
            .collect::<Result<Vec<_>>>()?;

        let vocab_size = processor.vocab_size();
        let vocab = match dump_vocab {
            Some(limit) => (0..vocab_size.min(limit))
                .filter_map(|id| i32::try_from(id).ok())
                .filter_map(|id| {
                    processor.convert_id_to_token(id).map(|piece| VocabEntry {
                        id,
                        piece,
                        score: processor.score(id),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            model: model.into(),
            vocab_size,
            unk_id: processor.unknown_token_id(),
            texts,
            vocab,
        })
    }

    pub fn round_trip_failures(&self) -> usize {
        self.texts.iter().filter(|probe| !probe.round_trip).count()
    }

    pub fn write_json(&self, out: &mut impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_text(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Model: {}", self.model)?;
        writeln!(out, "Vocabulary size: {}", self.vocab_size)?;
        match self.unk_id {
            Some(id) => writeln!(out, "Unknown id: {id}")?,
            None => writeln!(out, "Unknown id: none")?,
        }
        writeln!(out)?;

        for probe in &self.texts {
            writeln!(out, "Text: {:?}", probe.text)?;
            writeln!(out, "Pieces: {:?}", probe.pieces)?;
            writeln!(out, "IDs: {:?}", probe.ids)?;
            match &probe.decoded {
                Some(decoded) => writeln!(out, "Decoded: {decoded:?}")?,
                None => writeln!(out, "Decoded: <failed>")?,
            }
            writeln!(out, "{}", "-".repeat(30))?;
        }

        if !self.vocab.is_empty() {
            writeln!(out)?;
            for entry in &self.vocab {
                writeln!(out, "{:>6}  {:<24} {:>10.4}", entry.id, entry.piece, entry.score)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use spm_tokenizer::{mock::MockEngine, Processor};

    use super::*;

    fn mock_processor() -> SentencePieceProcessor {
        SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()))
    }

    #[test]
    fn test_probe_records_round_trip() {
        let processor = mock_processor();
        let probe = TextProbe::run(&processor, "Hello world").unwrap();
        assert_eq!(probe.pieces, vec!["▁Hello", "▁world"]);
        assert_eq!(probe.ids, vec![3, 4]);
        assert_eq!(probe.decoded.as_deref(), Some("Hello world"));
        assert!(probe.round_trip);

        let lossy = TextProbe::run(&processor, "Hello zebra").unwrap();
        assert!(!lossy.round_trip);
    }

    #[test]
    fn test_report_with_vocab_dump() {
        let processor = mock_processor();
        let texts = vec!["Hello world".to_string(), "Hello zebra".to_string()];
        let report = Report::build(&processor, "mock", &texts, Some(3)).unwrap();

        assert_eq!(report.vocab_size, 11);
        assert_eq!(report.unk_id, Some(0));
        assert_eq!(report.round_trip_failures(), 1);
        let pieces: Vec<_> = report.vocab.iter().map(|e| e.piece.as_str()).collect();
        assert_eq!(pieces, vec!["<unk>", "<s>", "</s>"]);
    }

    #[test]
    fn test_json_omits_empty_vocab() {
        let processor = mock_processor();
        let report = Report::build(&processor, "mock", &["Hello".to_string()], None).unwrap();

        let mut out = Vec::new();
        report.write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["vocab_size"], 11);
        assert_eq!(value["texts"][0]["ids"], serde_json::json!([3]));
        assert!(value.get("vocab").is_none());
    }

    #[test]
    fn test_text_rendering() {
        let processor = mock_processor();
        let report = Report::build(&processor, "mock", &["Hello".to_string()], Some(2)).unwrap();

        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("Vocabulary size: 11"));
        assert!(rendered.contains("Text: \"Hello\""));
        assert!(rendered.contains("IDs: [3]"));
        assert!(rendered.contains("<s>"));
    }

    #[test]
    fn test_encode_failure_is_an_error() {
        let processor =
            SentencePieceProcessor::from_processor(Processor::from(MockEngine::failing()));
        assert!(TextProbe::run(&processor, "Hello").is_err());
    }
}
