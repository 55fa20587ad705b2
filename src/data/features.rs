use candle_core::{Device, Tensor};
use rand::Rng;
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::processor::InputExample;
use super::special::SpecialTokens;
use crate::error::{PipelineError, Result};

/// Model-ready features for one example, all of length `max_seq_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFeatures {
    /// Token ids after masking (`[MASK]` or random substitutions).
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding.
    pub input_mask: Vec<u32>,
    /// Segment each position belongs to (0 = first, 1 = second).
    pub segment_ids: Vec<u32>,
    /// True token ids before masking.
    pub label_ids: Vec<u32>,
    /// Positions selected for prediction.
    pub label_weights: Vec<bool>,
}

/// Probabilities driving BERT-style masking.
///
/// A position is selected with `mask_prob`. A selected position keeps its
/// token with `keep_prob`, otherwise takes a random token with `random_prob`,
/// otherwise becomes `[MASK]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Chance that a content position is selected for prediction.
    pub mask_prob: f64,
    /// Chance that a selected position is left unchanged.
    pub keep_prob: f64,
    /// Chance that a selected position is swapped for a random token.
    pub random_prob: f64,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            mask_prob: 0.10,
            keep_prob: 0.10,
            random_prob: 0.10,
        }
    }
}

impl MaskingConfig {
    /// No position is ever selected.
    pub fn disabled() -> Self {
        Self {
            mask_prob: 0.0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("mask_prob", self.mask_prob),
            ("keep_prob", self.keep_prob),
            ("random_prob", self.random_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(PipelineError::InvalidInput(format!(
                    "Masking probability '{name}' must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// Drops tokens from the end of the longer sequence until the pair fits.
pub fn truncate_seq_pair(tokens_a: &mut Vec<String>, tokens_b: &mut Vec<String>, max_length: usize) {
    while tokens_a.len() + tokens_b.len() > max_length {
        if tokens_a.len() > tokens_b.len() {
            tokens_a.pop();
        } else {
            tokens_b.pop();
        }
    }
}

/// Turns [`InputExample`]s into fixed-length [`InputFeatures`].
#[derive(Debug, Clone)]
pub struct FeatureConverter<'a> {
    tokenizer: &'a Tokenizer,
    special: SpecialTokens,
    max_seq_length: usize,
    masking: MaskingConfig,
    vocab_size: u32,
}

impl<'a> FeatureConverter<'a> {
    /// Converter producing sequences of exactly `max_seq_length` positions.
    pub fn new(
        tokenizer: &'a Tokenizer,
        max_seq_length: usize,
        masking: MaskingConfig,
    ) -> Result<Self> {
        masking.validate()?;
        if max_seq_length < 2 {
            return Err(PipelineError::InvalidInput(format!(
                "max_seq_length must leave room for [CLS] and [SEP], got {max_seq_length}"
            )));
        }
        let vocab_size = u32::try_from(tokenizer.get_vocab_size(true)).map_err(|_| {
            PipelineError::Unexpected("Vocabulary does not fit in u32 ids".into())
        })?;

        Ok(Self {
            tokenizer,
            special: SpecialTokens::from_tokenizer(tokenizer),
            max_seq_length,
            masking,
            vocab_size,
        })
    }

    /// Special token ids resolved from the tokenizer.
    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    /// Converts one example, drawing masking decisions from `rng`.
    pub fn convert<R: Rng + ?Sized>(
        &self,
        example: &InputExample,
        rng: &mut R,
    ) -> Result<InputFeatures> {
        let mut tokens_a = example.text_a.clone();
        let mut tokens_b = example.text_b.clone().filter(|b| !b.is_empty());

        match tokens_b.as_mut() {
            Some(tokens_b) => {
                // [CLS], [SEP], [SEP]
                if self.max_seq_length < 3 {
                    return Err(PipelineError::InvalidInput(format!(
                        "max_seq_length {} is too short for a sequence pair",
                        self.max_seq_length
                    )));
                }
                truncate_seq_pair(&mut tokens_a, tokens_b, self.max_seq_length - 3);
            }
            None => tokens_a.truncate(self.max_seq_length - 2),
        }

        let mut label_ids = Vec::with_capacity(self.max_seq_length);
        let mut segment_ids = Vec::with_capacity(self.max_seq_length);
        let mut candidates = Vec::with_capacity(self.max_seq_length);

        let mut push = |id: u32, segment: u32, content: bool| {
            label_ids.push(id);
            segment_ids.push(segment);
            candidates.push(content);
        };

        push(self.special.cls, 0, false);
        for token in &tokens_a {
            push(self.token_id(token), 0, true);
        }
        push(self.special.sep, 0, false);
        if let Some(tokens_b) = &tokens_b {
            for token in tokens_b {
                push(self.token_id(token), 1, true);
            }
            push(self.special.sep, 1, false);
        }

        let mut input_mask = vec![1u32; label_ids.len()];
        label_ids.resize(self.max_seq_length, self.special.pad);
        input_mask.resize(self.max_seq_length, 0);
        segment_ids.resize(self.max_seq_length, 0);
        candidates.resize(self.max_seq_length, false);

        let (input_ids, label_weights) = self.apply_masking(&label_ids, &candidates, rng);

        debug_assert_eq!(input_ids.len(), self.max_seq_length);
        debug_assert_eq!(input_mask.len(), self.max_seq_length);
        debug_assert_eq!(segment_ids.len(), self.max_seq_length);

        Ok(InputFeatures {
            input_ids,
            input_mask,
            segment_ids,
            label_ids,
            label_weights,
        })
    }

    /// Converts every example with the same `rng`.
    pub fn convert_all<R: Rng + ?Sized>(
        &self,
        examples: &[InputExample],
        rng: &mut R,
    ) -> Result<Vec<InputFeatures>> {
        examples.iter().map(|e| self.convert(e, rng)).collect()
    }

    fn token_id(&self, token: &str) -> u32 {
        self.tokenizer.token_to_id(token).unwrap_or(self.special.unk)
    }

    fn apply_masking<R: Rng + ?Sized>(
        &self,
        ids: &[u32],
        candidates: &[bool],
        rng: &mut R,
    ) -> (Vec<u32>, Vec<bool>) {
        let MaskingConfig {
            mask_prob,
            keep_prob,
            random_prob,
        } = self.masking;

        let mut masked = ids.to_vec();
        let mut weights = vec![false; ids.len()];

        for (pos, &candidate) in candidates.iter().enumerate() {
            if !candidate || rng.random::<f64>() >= mask_prob {
                continue;
            }
            weights[pos] = true;

            if rng.random::<f64>() < keep_prob {
                continue;
            }
            masked[pos] = if rng.random::<f64>() < random_prob && self.vocab_size > 1 {
                rng.random_range(0..self.vocab_size - 1)
            } else {
                self.special.mask
            };
        }

        (masked, weights)
    }
}

/// Converts `examples` into features of length `max_seq_length`.
pub fn convert_examples_to_features<R: Rng + ?Sized>(
    examples: &[InputExample],
    max_seq_length: usize,
    tokenizer: &Tokenizer,
    masking: MaskingConfig,
    rng: &mut R,
) -> Result<Vec<InputFeatures>> {
    FeatureConverter::new(tokenizer, max_seq_length, masking)?.convert_all(examples, rng)
}

/// Features stacked into `[batch, seq]` tensors.
#[derive(Debug, Clone)]
pub struct FeatureBatch {
    /// Masked token ids.
    pub input_ids: Tensor,
    /// Attention mask.
    pub input_mask: Tensor,
    /// Token type ids.
    pub segment_ids: Tensor,
    /// Unmasked token ids.
    pub label_ids: Tensor,
    /// Prediction positions as 0/1.
    pub label_weights: Tensor,
}

impl FeatureBatch {
    /// Stacks `features` onto `device`. All features must share one length.
    pub fn from_features(features: &[InputFeatures], device: &Device) -> Result<Self> {
        let seq_len = features.first().map(|f| f.input_ids.len()).ok_or_else(|| {
            PipelineError::InvalidInput("Cannot batch an empty list of features".into())
        })?;
        if features.iter().any(|f| f.input_ids.len() != seq_len) {
            return Err(PipelineError::InvalidInput(
                "Features in a batch must share one sequence length".into(),
            ));
        }
        let shape = (features.len(), seq_len);

        let stack = |field: fn(&InputFeatures) -> &[u32]| -> Result<Tensor> {
            let flat: Vec<u32> = features.iter().flat_map(|f| field(f).iter().copied()).collect();
            Ok(Tensor::from_vec(flat, shape, device)?)
        };

        let weights: Vec<u8> = features
            .iter()
            .flat_map(|f| f.label_weights.iter().map(|&w| u8::from(w)))
            .collect();

        Ok(Self {
            input_ids: stack(|f| f.input_ids.as_slice())?,
            input_mask: stack(|f| f.input_mask.as_slice())?,
            segment_ids: stack(|f| f.segment_ids.as_slice())?,
            label_ids: stack(|f| f.label_ids.as_slice())?,
            label_weights: Tensor::from_vec(weights, shape, device)?,
        })
    }
}
