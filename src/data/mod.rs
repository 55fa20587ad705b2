//! Masked language model data preparation.
//!
//! Raw text is split into fixed windows of word pieces ([`LmProcessor`]) and
//! each window is turned into padded, BERT-style masked features
//! ([`FeatureConverter`]).
//!
//! ```rust,no_run
//! use candle_mlm::data::{FeatureConverter, LmProcessor, MaskingConfig, SetType};
//! use rand::SeedableRng;
//!
//! # fn main() -> candle_mlm::error::Result<()> {
//! # let tokenizer: tokenizers::Tokenizer = unimplemented!();
//! let examples = LmProcessor::new(&tokenizer).create_examples("Some text.", SetType::Train)?;
//! let converter = FeatureConverter::new(&tokenizer, 300, MaskingConfig::default())?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let features = converter.convert_all(&examples, &mut rng)?;
//! # Ok(())
//! # }
//! ```

mod features;
mod processor;
mod special;

pub use features::{
    convert_examples_to_features, truncate_seq_pair, FeatureBatch, FeatureConverter,
    InputFeatures, MaskingConfig,
};
pub use processor::{DataProcessor, InputExample, LmProcessor, ProcessorConfig, SetType};
pub use special::SpecialTokens;
