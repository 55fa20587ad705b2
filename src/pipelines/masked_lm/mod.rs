//! Masked language model pipeline.
//!
//! Two operations over a BERT-style model:
//!
//! - **Masked words**: random words of a text are masked (BERT pretraining
//!   style) and the model's guesses are shown next to the originals.
//! - **Next words**: a `[MASK]` is placed after the text and filled by
//!   sampling, one word piece at a time.
//!
//! Both return [`AnnotatedText`](crate::render::AnnotatedText) that renders
//! to a terminal or to HTML.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use candle_mlm::masked_lm::{BertSize, GenerationParams, MaskedLmPipelineBuilder};
//!
//! # fn main() -> candle_mlm::error::Result<()> {
//! let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased).build()?;
//!
//! let output = pipeline.predict_masked_words("The capital of France is Paris.")?;
//! println!("{}\n{}", output.source, output.predicted);
//!
//! let params = GenerationParams::new(8).temperature(0.8);
//! let output = pipeline.predict_next_words("My favourite food is", params)?;
//! println!("{}", output.text);
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Models
//!
//! | Model | Sizes | Builder Method |
//! |-------|-------|----------------|
//! | BERT | `BaseUncased`, `BaseCased`, `LargeUncased`, `LargeCased` | [`MaskedLmPipelineBuilder::bert`] |
//! | ModernBERT | `Base`, `Large` | [`MaskedLmPipelineBuilder::modernbert`] |
//!
//! Any other model can be plugged in by implementing [`MaskedLmModel`] and
//! using [`MaskedLmPipeline::from_parts`].

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod model;
pub(crate) mod params;
pub(crate) mod pipeline;

// ============ Public API ============

pub use crate::models::{BertMaskedLm, BertSize, ModernBertMaskedLm, ModernBertSize};
pub use crate::pipelines::cache::ModelOptions;
pub use crate::pipelines::stats::{GenerationStats, PipelineStats};
pub use builder::{MaskedLmPipelineBuilder, PipelineSettings};
pub use model::{MaskedLmModel, PretrainedMaskedLm};
pub use params::GenerationParams;
pub use pipeline::{
    GeneratedToken, MaskedLmPipeline, MaskedPrediction, MaskedWordsOutput, NextWordsOutput,
};
