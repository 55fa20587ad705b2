use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::debug;

use crate::error::{preview, PipelineError, Result};

/// One windowed training/evaluation example.
///
/// Both segments hold word pieces straight from the tokenizer, so an example
/// can be turned into ids without re-tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputExample {
    /// Unique id, `"{set}-{index}"`.
    pub guid: String,
    /// Word pieces of the first sequence.
    pub text_a: Vec<String>,
    /// Word pieces of the optional second sequence.
    pub text_b: Option<Vec<String>>,
    /// The word piece that follows the window, when known.
    pub label: Option<String>,
}

/// Which split an example belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetType {
    /// Read from `train.txt`.
    Train,
    /// Read from `val.txt`.
    Dev,
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetType::Train => "train",
            SetType::Dev => "dev",
        };
        write!(f, "{name}")
    }
}

/// Windowing settings for [`LmProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Word pieces per example.
    pub window_size: usize,
    /// Stride between consecutive windows.
    pub skip: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            window_size: 300,
            skip: 1,
        }
    }
}

/// Source of examples for a dataset directory.
pub trait DataProcessor {
    /// Examples from the training split.
    fn train_examples(&self, data_dir: &Path) -> Result<Vec<InputExample>>;

    /// Examples from the validation split.
    fn dev_examples(&self, data_dir: &Path) -> Result<Vec<InputExample>>;

    /// Every label the model can predict.
    fn labels(&self) -> Vec<String>;
}

/// Language-modelling processor: slides a fixed window over the word pieces
/// of a text, labelling each window with the piece that follows it.
#[derive(Debug, Clone, Copy)]
pub struct LmProcessor<'a> {
    tokenizer: &'a Tokenizer,
    config: ProcessorConfig,
}

impl<'a> LmProcessor<'a> {
    /// Processor with the default 300-piece window and stride 1.
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self::with_config(tokenizer, ProcessorConfig::default())
    }

    /// Processor with explicit windowing settings.
    pub fn with_config(tokenizer: &'a Tokenizer, config: ProcessorConfig) -> Self {
        Self { tokenizer, config }
    }

    /// The active windowing settings.
    pub fn config(&self) -> ProcessorConfig {
        self.config
    }

    /// Word pieces of `text`, paragraph by paragraph, without special tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        for paragraph in text.split("\n\n") {
            let encoding = self.tokenizer.encode(paragraph, false).map_err(|e| {
                PipelineError::Tokenization(format!(
                    "Tokenization failed on '{}': {}",
                    preview(paragraph),
                    e
                ))
            })?;
            tokens.extend(encoding.get_tokens().iter().cloned());
        }
        Ok(tokens)
    }

    /// Splits `text` into windowed examples.
    ///
    /// A text too short for a single full window yields one example holding
    /// every piece but the last, labelled with the last.
    pub fn create_examples(&self, text: &str, set_type: SetType) -> Result<Vec<InputExample>> {
        let ProcessorConfig { window_size, skip } = self.config;
        if skip == 0 {
            return Err(PipelineError::InvalidInput(
                "Window stride must be at least 1".into(),
            ));
        }

        let tokens = self.tokenize(text)?;
        if tokens.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "No tokens in input '{}'",
                preview(text)
            )));
        }

        let stop = tokens.len().saturating_sub(window_size + 1);
        let mut examples: Vec<InputExample> = (0..stop)
            .step_by(skip)
            .enumerate()
            .map(|(i, start)| InputExample {
                guid: format!("{set_type}-{i}"),
                text_a: tokens[start..start + window_size].to_vec(),
                text_b: None,
                label: Some(tokens[start + window_size].clone()),
            })
            .collect();

        if examples.is_empty() {
            let (last, rest) = tokens.split_last().ok_or_else(|| {
                PipelineError::Unexpected("Token stream emptied while windowing".into())
            })?;
            examples.push(InputExample {
                guid: format!("{set_type}-0"),
                text_a: rest.to_vec(),
                text_b: None,
                label: Some(last.clone()),
            });
        }

        debug!(
            set = %set_type,
            tokens = tokens.len(),
            examples = examples.len(),
            window_size,
            skip,
            "created language-model examples"
        );
        Ok(examples)
    }

    fn read_split(&self, path: &Path, set_type: SetType) -> Result<Vec<InputExample>> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::InvalidInput(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let text = String::from_utf8_lossy(&bytes);
        self.create_examples(&text, set_type)
    }
}

impl DataProcessor for LmProcessor<'_> {
    fn train_examples(&self, data_dir: &Path) -> Result<Vec<InputExample>> {
        self.read_split(&data_dir.join("train.txt"), SetType::Train)
    }

    fn dev_examples(&self, data_dir: &Path) -> Result<Vec<InputExample>> {
        self.read_split(&data_dir.join("val.txt"), SetType::Dev)
    }

    /// Vocabulary tokens ordered by id.
    fn labels(&self) -> Vec<String> {
        let mut vocab: Vec<(String, u32)> = self.tokenizer.get_vocab(true).into_iter().collect();
        vocab.sort_by_key(|(_, id)| *id);
        vocab.into_iter().map(|(token, _)| token).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tiny_tokenizer;

    fn processor(tokenizer: &Tokenizer, window_size: usize, skip: usize) -> LmProcessor<'_> {
        LmProcessor::with_config(tokenizer, ProcessorConfig { window_size, skip })
    }

    #[test]
    fn tokenizes_paragraphs_into_word_pieces() {
        let tokenizer = tiny_tokenizer();
        let tokens = processor(&tokenizer, 3, 1)
            .tokenize("The cats sat.\n\nA dog playing")
            .unwrap();
        assert_eq!(
            tokens,
            vec!["the", "cat", "##s", "sat", ".", "a", "dog", "play", "##ing"]
        );
    }

    #[test]
    fn slides_window_with_following_label() {
        let tokenizer = tiny_tokenizer();
        // 7 pieces, window 3: starts 0..3
        let examples = processor(&tokenizer, 3, 1)
            .create_examples("the cat sat on the mat .", SetType::Train)
            .unwrap();

        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].guid, "train-0");
        assert_eq!(examples[0].text_a, vec!["the", "cat", "sat"]);
        assert_eq!(examples[0].label.as_deref(), Some("on"));
        assert_eq!(examples[2].guid, "train-2");
        assert_eq!(examples[2].text_a, vec!["sat", "on", "the"]);
        assert_eq!(examples[2].label.as_deref(), Some("mat"));
        assert!(examples.iter().all(|e| e.text_b.is_none()));
    }

    #[test]
    fn stride_skips_windows_but_keeps_sequential_guids() {
        let tokenizer = tiny_tokenizer();
        let examples = processor(&tokenizer, 2, 2)
            .create_examples("the cat sat on the mat .", SetType::Dev)
            .unwrap();

        let guids: Vec<_> = examples.iter().map(|e| e.guid.as_str()).collect();
        assert_eq!(guids, vec!["dev-0", "dev-1"]);
        assert_eq!(examples[1].text_a, vec!["sat", "on"]);
        assert_eq!(examples[1].label.as_deref(), Some("the"));
    }

    #[test]
    fn short_text_falls_back_to_single_example() {
        let tokenizer = tiny_tokenizer();
        let examples = processor(&tokenizer, 300, 1)
            .create_examples("the dog ran", SetType::Train)
            .unwrap();

        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].guid, "train-0");
        assert_eq!(examples[0].text_a, vec!["the", "dog"]);
        assert_eq!(examples[0].label.as_deref(), Some("ran"));
    }

    #[test]
    fn empty_text_is_rejected() {
        let tokenizer = tiny_tokenizer();
        let err = processor(&tokenizer, 3, 1)
            .create_examples("  \n\n ", SetType::Train)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn zero_stride_is_rejected() {
        let tokenizer = tiny_tokenizer();
        let err = processor(&tokenizer, 3, 0)
            .create_examples("the cat", SetType::Train)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn labels_follow_vocabulary_ids() {
        let tokenizer = tiny_tokenizer();
        let labels = LmProcessor::new(&tokenizer).labels();
        assert_eq!(labels.len(), tokenizer.get_vocab_size(true));
        assert_eq!(labels[..6], ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the"]);
        assert_eq!(labels.last().map(String::as_str), Some("'"));
    }

    #[test]
    fn reads_splits_from_data_dir() {
        let tokenizer = tiny_tokenizer();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.txt"), "the cat sat on the mat").unwrap();
        std::fs::write(dir.path().join("val.txt"), "a dog ran").unwrap();

        let processor = processor(&tokenizer, 2, 1);
        let train = processor.train_examples(dir.path()).unwrap();
        let dev = processor.dev_examples(dir.path()).unwrap();

        assert_eq!(train.len(), 3);
        assert!(train[0].guid.starts_with("train-"));
        assert_eq!(dev.len(), 1);
        assert_eq!(dev[0].guid, "dev-0");
        assert_eq!(dev[0].label.as_deref(), Some("ran"));
    }

    #[test]
    fn missing_split_is_invalid_input() {
        let tokenizer = tiny_tokenizer();
        let dir = tempfile::tempdir().unwrap();
        let err = LmProcessor::new(&tokenizer)
            .train_examples(dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ProcessorConfig = serde_json::from_str(r#"{"skip": 4}"#).unwrap();
        assert_eq!(
            config,
            ProcessorConfig {
                window_size: 300,
                skip: 4
            }
        );
    }
}
