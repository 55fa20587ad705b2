use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use crate::error::Result;
use crate::pipelines::cache::ModelOptions;

/// A transformer with a masked-language-model head.
///
/// Implement this to drive the pipeline with a model of your own.
pub trait MaskedLmModel {
    /// Scores every vocabulary entry at every position.
    ///
    /// All inputs are `[batch, seq]` u32 tensors; the result is
    /// `[batch, seq, vocab]` logits.
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor>;

    /// Device the weights live on.
    fn device(&self) -> &Device;
}

/// A [`MaskedLmModel`] that can be fetched from the HuggingFace hub.
pub trait PretrainedMaskedLm: MaskedLmModel + Sized {
    /// Selects the checkpoint (e.g. a size enum).
    type Options: ModelOptions + Clone + std::fmt::Debug;

    /// Downloads and loads the weights onto `device`.
    fn new(options: Self::Options, device: Device) -> Result<Self>;

    /// Downloads the matching tokenizer.
    fn get_tokenizer(options: Self::Options) -> Result<Tokenizer>;
}
