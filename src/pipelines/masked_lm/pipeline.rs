use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::ops::softmax;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::builder::PipelineSettings;
use super::model::MaskedLmModel;
use super::params::GenerationParams;
use crate::data::{
    FeatureBatch, FeatureConverter, InputFeatures, LmProcessor, SetType, SpecialTokens,
};
use crate::error::{preview, PipelineError, Result};
use crate::pipelines::stats::{GenerationStats, PipelineStats};
use crate::render::{AnnotatedText, AnnotatedToken, HtmlRenderer, PieceDecoder, Rgb};

// ============ Output types ============

/// Model guess for one masked position.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedPrediction {
    /// Position in the model input (`[CLS]` is 0).
    pub position: usize,
    /// The true word piece, as displayed.
    pub original: String,
    /// The most likely word piece, as displayed.
    pub predicted: String,
    /// Probability of `predicted` (0.0 to 1.0).
    pub score: f32,
}

impl MaskedPrediction {
    /// Whether the model recovered the true piece.
    pub fn is_correct(&self) -> bool {
        self.original == self.predicted
    }
}

/// Output of [`MaskedLmPipeline::predict_masked_words`].
#[derive(Debug, Clone)]
pub struct MaskedWordsOutput {
    /// The true text, masked words highlighted.
    pub source: AnnotatedText,
    /// The text with masked words replaced by predictions, opacity = confidence.
    pub predicted: AnnotatedText,
    /// One entry per masked position, in order.
    pub predictions: Vec<MaskedPrediction>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

impl MaskedWordsOutput {
    /// Source text as HTML, masked words on a blue background.
    pub fn source_html(&self) -> String {
        HtmlRenderer::new(Rgb::BLUE).render(&self.source)
    }

    /// Predicted text as HTML, predictions on a red background.
    pub fn predicted_html(&self) -> String {
        HtmlRenderer::new(Rgb::RED).render(&self.predicted)
    }

    /// Fraction of masked positions predicted correctly, `None` if nothing was masked.
    pub fn accuracy(&self) -> Option<f32> {
        if self.predictions.is_empty() {
            return None;
        }
        let correct = self.predictions.iter().filter(|p| p.is_correct()).count();
        Some(correct as f32 / self.predictions.len() as f32)
    }
}

/// A sampled word piece.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedToken {
    /// Vocabulary id.
    pub id: u32,
    /// Vocabulary piece, markers included (`##s`, `Ġcat`).
    pub token: String,
    /// Decoded text of the piece; a leading space marks a new word.
    pub text: String,
    /// Model probability of the piece at the `[MASK]` position.
    pub score: f32,
}

/// Output of [`MaskedLmPipeline::predict_next_words`].
#[derive(Debug, Clone)]
pub struct NextWordsOutput {
    /// Prompt followed by the generated pieces, which are highlighted.
    pub text: AnnotatedText,
    /// Generated pieces in order.
    pub generated: Vec<GeneratedToken>,
    /// Generation statistics.
    pub stats: GenerationStats,
}

impl NextWordsOutput {
    /// Whole text as HTML, generated words on a red background.
    pub fn html(&self) -> String {
        HtmlRenderer::new(Rgb::RED).render(&self.text)
    }

    /// Only the generated words.
    pub fn generated_text(&self) -> String {
        let tokens: Vec<AnnotatedToken> = self
            .generated
            .iter()
            .map(|g| AnnotatedToken::from_fragment(&g.text, None))
            .collect();
        AnnotatedText::from_tokens(&tokens).plain_text()
    }
}

// ============ Pipeline ============

/// Masked-word prediction and next-word generation over a masked LM.
///
/// Construct with [`MaskedLmPipelineBuilder`](super::MaskedLmPipelineBuilder), or
/// [`from_parts`](Self::from_parts) for a custom model.
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_mlm::masked_lm::{BertSize, GenerationParams, MaskedLmPipelineBuilder};
/// # fn main() -> candle_mlm::error::Result<()> {
/// let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased).build()?;
///
/// let output = pipeline.predict_masked_words("The quick brown fox jumps over the lazy dog.")?;
/// println!("{}", output.predicted);
///
/// let output = pipeline.predict_next_words("The weather today is", GenerationParams::new(5))?;
/// println!("{}", output.text);
/// # Ok(())
/// # }
/// ```
pub struct MaskedLmPipeline<M: MaskedLmModel> {
    model: Arc<M>,
    tokenizer: Tokenizer,
    special: SpecialTokens,
    settings: PipelineSettings,
    rng: Mutex<StdRng>,
}

impl<M: MaskedLmModel> MaskedLmPipeline<M> {
    /// Wraps an already loaded model and its tokenizer.
    pub fn from_parts(model: M, tokenizer: Tokenizer, settings: PipelineSettings) -> Result<Self> {
        Self::with_settings(Arc::new(model), tokenizer, settings)
    }

    pub(crate) fn with_settings(
        model: Arc<M>,
        tokenizer: Tokenizer,
        settings: PipelineSettings,
    ) -> Result<Self> {
        // [CLS] + at least one piece + [MASK] + [SEP]
        if settings.max_seq_length < 4 {
            return Err(PipelineError::InvalidInput(format!(
                "max_seq_length must be at least 4, got {}",
                settings.max_seq_length
            )));
        }
        if settings.processor.window_size > settings.max_seq_length - 2 {
            return Err(PipelineError::InvalidInput(format!(
                "window_size {} does not fit in max_seq_length {} with [CLS] and [SEP]",
                settings.processor.window_size, settings.max_seq_length
            )));
        }
        let seed = settings.seed.unwrap_or_else(rand::random);
        let special = SpecialTokens::from_tokenizer(&tokenizer);
        debug!(?special, ?settings, "masked LM pipeline ready");

        Ok(Self {
            model,
            tokenizer,
            special,
            settings,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> &Device {
        self.model.device()
    }

    /// The underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The tokenizer paired with the model.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Active sequence and masking settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn processor(&self) -> LmProcessor<'_> {
        LmProcessor::with_config(&self.tokenizer, self.settings.processor)
    }

    fn converter(&self) -> Result<FeatureConverter<'_>> {
        FeatureConverter::new(
            &self.tokenizer,
            self.settings.max_seq_length,
            self.settings.masking,
        )
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> Result<T>) -> Result<T> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| PipelineError::Unexpected("Pipeline RNG lock poisoned".into()))?;
        f(&mut *rng)
    }

    fn decoder(&self) -> PieceDecoder<'_> {
        PieceDecoder::new(&self.tokenizer)
    }

    fn piece(&self, id: u32) -> String {
        self.tokenizer
            .id_to_token(id)
            .unwrap_or_else(|| format!("[{id}]"))
    }

    /// Masked features for every window of `text`.
    pub fn features(&self, text: &str) -> Result<Vec<InputFeatures>> {
        let examples = self.processor().create_examples(text, SetType::Train)?;
        let converter = self.converter()?;
        self.with_rng(|rng| converter.convert_all(&examples, rng))
    }

    /// Masks random words in the last window of `text` and asks the model to
    /// recover them.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use candle_mlm::masked_lm::{BertSize, MaskedLmPipelineBuilder};
    /// # fn main() -> candle_mlm::error::Result<()> {
    /// # let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased).build()?;
    /// let output = pipeline.predict_masked_words("Paris is the capital of France.")?;
    /// for p in &output.predictions {
    ///     println!("{} -> {} ({:.2})", p.original, p.predicted, p.score);
    /// }
    /// std::fs::write("masked.html", output.predicted_html())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn predict_masked_words(&self, text: &str) -> Result<MaskedWordsOutput> {
        let stats_builder = PipelineStats::start();

        let mut examples = self.processor().create_examples(text, SetType::Train)?;
        let example = examples.pop().ok_or_else(|| {
            PipelineError::InvalidInput(format!("No examples in input '{}'", preview(text)))
        })?;
        let converter = self.converter()?;
        let features = self.with_rng(|rng| converter.convert(&example, rng))?;

        let batch = FeatureBatch::from_features(std::slice::from_ref(&features), self.device())?;
        let logits = self
            .model
            .forward(&batch.input_ids, &batch.segment_ids, &batch.input_mask)?;
        let probs = softmax(&logits.squeeze(0)?.to_dtype(DType::F32)?, D::Minus1)?;
        let best_ids = probs.argmax(D::Minus1)?.to_vec1::<u32>()?;
        let best_scores = probs.max(D::Minus1)?.to_vec1::<f32>()?;

        let decoder = self.decoder();
        let mut source = Vec::new();
        let mut predicted = Vec::new();
        let mut predictions = Vec::new();

        for pos in 0..features.input_ids.len() {
            if features.input_mask[pos] == 0 || self.special.contains(features.label_ids[pos]) {
                continue;
            }
            let original = decoder.token(&self.piece(features.label_ids[pos]), None)?;

            if !features.label_weights[pos] {
                source.push(original.clone());
                predicted.push(original);
                continue;
            }

            let score = best_scores[pos];
            let guess = decoder.token(&self.piece(best_ids[pos]), Some(score))?;
            predictions.push(MaskedPrediction {
                position: pos,
                original: original.text.clone(),
                predicted: guess.text.clone(),
                score,
            });
            source.push(AnnotatedToken {
                highlight: Some(1.0),
                ..original
            });
            predicted.push(guess);
        }

        let output = MaskedWordsOutput {
            source: AnnotatedText::from_tokens(&source),
            predicted: AnnotatedText::from_tokens(&predicted),
            predictions,
            stats: stats_builder.finish(1),
        };
        info!(
            masked = output.predictions.len(),
            accuracy = ?output.accuracy(),
            elapsed = ?output.stats.total_time,
            "masked word prediction finished"
        );
        Ok(output)
    }

    /// Extends `text` one word piece at a time by repeatedly asking the model
    /// to fill a `[MASK]` placed after it.
    ///
    /// The model sees `[CLS] content [MASK] [SEP]`, where the content holds at
    /// most `max_seq_length - 3` pieces; once full, the oldest piece rolls out
    /// for every new one. Rolled-out pieces still appear in the output.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use candle_mlm::masked_lm::{BertSize, GenerationParams, MaskedLmPipelineBuilder};
    /// # fn main() -> candle_mlm::error::Result<()> {
    /// # let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased).build()?;
    /// let params = GenerationParams::new(10).temperature(0.7).seed(1);
    /// let output = pipeline.predict_next_words("Once upon a time", params)?;
    /// println!("{}", output.text);
    /// # Ok(())
    /// # }
    /// ```
    pub fn predict_next_words(
        &self,
        text: &str,
        params: GenerationParams,
    ) -> Result<NextWordsOutput> {
        params.validate()?;
        let capacity = self.settings.max_seq_length - 3;

        let prompt = self.processor().tokenize(text)?;
        if prompt.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "No tokens in input '{}'",
                preview(text)
            )));
        }
        let prompt_ids: Vec<u32> = prompt
            .iter()
            .map(|piece| self.tokenizer.token_to_id(piece).unwrap_or(self.special.unk))
            .collect();

        let decoder = self.decoder();
        let split = prompt_ids.len().saturating_sub(capacity);
        let mut rolled = prompt[..split]
            .iter()
            .map(|piece| decoder.token(piece, None))
            .collect::<Result<Vec<_>>>()?;
        let mut window: VecDeque<(u32, Option<f32>)> =
            prompt_ids[split..].iter().map(|&id| (id, None)).collect();

        let mut stats = GenerationStats::new(prompt_ids.len());
        let mut sampler = params.logits_processor();
        let mut generated = Vec::with_capacity(params.max_new_tokens);

        for step in 0..params.max_new_tokens {
            let (id, score) = self.sample_next(&window, &mut sampler)?;
            let token = self.piece(id);
            let text = decoder.fragment(&token)?;
            debug!(step, id, token = %token, score, "sampled next piece");

            let rolled_out = window.len() == capacity;
            if rolled_out {
                if let Some((old, score)) = window.pop_front() {
                    rolled.push(decoder.token(&self.piece(old), score)?);
                }
            }
            window.push_back((id, Some(score)));
            stats.record_token(rolled_out);
            generated.push(GeneratedToken {
                id,
                token,
                text,
                score,
            });
        }
        stats.finalize();

        for &(id, score) in &window {
            rolled.push(decoder.token(&self.piece(id), score)?);
        }

        info!(
            generated = stats.tokens_generated,
            discarded = stats.tokens_discarded,
            tokens_per_second = stats.tokens_per_second,
            "next word generation finished"
        );
        Ok(NextWordsOutput {
            text: AnnotatedText::from_tokens(&rolled),
            generated,
            stats,
        })
    }

    /// Runs the model on `[CLS] window [MASK] [SEP]` and samples the `[MASK]`.
    fn sample_next(
        &self,
        window: &VecDeque<(u32, Option<f32>)>,
        sampler: &mut candle_transformers::generation::LogitsProcessor,
    ) -> Result<(u32, f32)> {
        let mut ids = Vec::with_capacity(window.len() + 3);
        ids.push(self.special.cls);
        ids.extend(window.iter().map(|&(id, _)| id));
        ids.push(self.special.mask);
        ids.push(self.special.sep);
        let seq_len = ids.len();

        let device = self.device();
        let input_ids = Tensor::from_vec(ids, (1, seq_len), device)?;
        let token_type_ids = Tensor::zeros((1, seq_len), DType::U32, device)?;
        let attention_mask = Tensor::ones((1, seq_len), DType::U32, device)?;

        let logits = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)?;
        let mut scores = logits
            .i((0, seq_len - 2))?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;

        for special in [self.special.cls, self.special.sep, self.special.mask, self.special.pad] {
            if let Some(s) = scores.get_mut(special as usize) {
                *s = f32::NEG_INFINITY;
            }
        }

        let scores = Tensor::new(scores.as_slice(), &Device::Cpu)?;
        let next = sampler.sample(&scores)?;
        let probs = softmax(&scores, D::Minus1)?.to_vec1::<f32>()?;
        let score = probs.get(next as usize).copied().ok_or_else(|| {
            PipelineError::Unexpected(format!("Sampled id {next} outside the vocabulary"))
        })?;

        Ok((next, score))
    }
}
