use super::model::PretrainedMaskedLm;
use super::pipeline::MaskedLmPipeline;
use crate::data::{MaskingConfig, ProcessorConfig};
use crate::error::Result;
use crate::models::{BertMaskedLm, BertSize, ModernBertMaskedLm, ModernBertSize};
use crate::pipelines::utils::StandardPipelineBuilder;

crate::pipelines::utils::impl_device_methods!(delegated: MaskedLmPipelineBuilder<M: PretrainedMaskedLm>);

/// Builder for creating [`MaskedLmPipeline`] instances.
///
/// Use [`Self::bert`] or [`Self::modernbert`] as the entry point.
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_mlm::masked_lm::{BertSize, MaskedLmPipelineBuilder};
/// # fn main() -> candle_mlm::error::Result<()> {
/// let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
///     .max_seq_length(128)
///     .seed(42)
///     .cuda(0)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct MaskedLmPipelineBuilder<M: PretrainedMaskedLm> {
    base: StandardPipelineBuilder<M::Options>,
    settings: PipelineSettings,
    window_size: Option<usize>,
}

/// Sequence and masking settings shared by every pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Model input length including `[CLS]`/`[SEP]`.
    pub max_seq_length: usize,
    /// Windowing of input text. A window must fit in `max_seq_length - 2`.
    pub processor: ProcessorConfig,
    /// Masking used by masked-word prediction.
    pub masking: MaskingConfig,
    /// Seed for masking decisions. Random when unset.
    pub seed: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_seq_length: 300,
            processor: ProcessorConfig {
                window_size: 298,
                ..ProcessorConfig::default()
            },
            masking: MaskingConfig::default(),
            seed: None,
        }
    }
}

impl<M: PretrainedMaskedLm> MaskedLmPipelineBuilder<M> {
    pub(crate) fn new(options: M::Options) -> Self {
        Self {
            base: StandardPipelineBuilder::new(options),
            settings: PipelineSettings::default(),
            window_size: None,
        }
    }

    /// Model input length, special tokens included. Defaults to 300.
    pub fn max_seq_length(mut self, max_seq_length: usize) -> Self {
        self.settings.max_seq_length = max_seq_length;
        self
    }

    /// Word pieces per text window. Defaults to `max_seq_length - 2`.
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    /// Masking probabilities for masked-word prediction.
    pub fn masking(mut self, masking: MaskingConfig) -> Self {
        self.settings.masking = masking;
        self
    }

    /// Fixes the seed used for masking decisions.
    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    pub(crate) fn settings(&self) -> PipelineSettings {
        let mut settings = self.settings;
        settings.processor.window_size = self
            .window_size
            .unwrap_or(settings.max_seq_length.saturating_sub(2));
        settings
    }

    /// Builds the pipeline with configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or device initialization fails, or if
    /// an explicit window does not fit in `max_seq_length`.
    pub fn build(self) -> Result<MaskedLmPipeline<M>>
    where
        M: Send + Sync + 'static,
    {
        let (model, tokenizer) = self.base.load::<M>()?;
        MaskedLmPipeline::with_settings(model, tokenizer, self.settings())
    }
}

impl MaskedLmPipelineBuilder<BertMaskedLm> {
    /// Creates a builder for a BERT masked-LM checkpoint.
    pub fn bert(size: BertSize) -> Self {
        Self::new(size)
    }
}

impl MaskedLmPipelineBuilder<ModernBertMaskedLm> {
    /// Creates a builder for a ModernBERT masked-LM checkpoint.
    pub fn modernbert(size: ModernBertSize) -> Self {
        Self::new(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_follows_max_seq_length() {
        let builder = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased).max_seq_length(128);
        assert_eq!(builder.settings().max_seq_length, 128);
        assert_eq!(builder.settings().processor.window_size, 126);

        let builder = builder.window_size(50).max_seq_length(64);
        assert_eq!(builder.settings().processor.window_size, 50);
    }

    #[test]
    fn default_window_fits_default_sequence() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.processor.window_size + 2, settings.max_seq_length);
        assert_eq!(
            MaskedLmPipelineBuilder::modernbert(ModernBertSize::Base).settings(),
            settings
        );
    }
}
