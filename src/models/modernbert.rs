use candle_core::{Device, Tensor};
use candle_transformers::models::modernbert::{
    Config, ModernBertForMaskedLM as CandleModernBertForMaskedLM,
};
use tokenizers::Tokenizer;
use tracing::info;

use crate::error::Result;
use crate::loaders::{TokenizerLoader, WeightsLoader};
use crate::pipelines::cache::ModelOptions;
use crate::pipelines::masked_lm::model::{MaskedLmModel, PretrainedMaskedLm};

/// Available ModernBERT model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModernBertSize {
    /// Base model (~150M parameters).
    Base,
    /// Large model (~400M parameters).
    Large,
}

impl ModernBertSize {
    pub(crate) fn repo_id(&self) -> &'static str {
        match self {
            ModernBertSize::Base => "answerdotai/ModernBERT-base",
            ModernBertSize::Large => "answerdotai/ModernBERT-large",
        }
    }
}

impl std::fmt::Display for ModernBertSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModernBertSize::Base => "modernbert-base",
            ModernBertSize::Large => "modernbert-large",
        };
        write!(f, "{name}")
    }
}

impl ModelOptions for ModernBertSize {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// ModernBERT with its masked-LM head. Has no token type embeddings.
pub struct ModernBertMaskedLm {
    model: CandleModernBertForMaskedLM,
    device: Device,
}

impl ModernBertMaskedLm {
    /// Downloads the checkpoint for `size` and loads it onto `device`.
    pub fn new(size: ModernBertSize, device: Device) -> Result<Self> {
        info!(model = %size, "loading ModernBERT masked LM");
        let (config, vb) = WeightsLoader::new(size.repo_id()).load::<Config>(&device)?;
        let model = CandleModernBertForMaskedLM::load(vb, &config)?;
        Ok(Self { model, device })
    }

    /// Downloads the tokenizer matching `size`.
    pub fn get_tokenizer(size: ModernBertSize) -> Result<Tokenizer> {
        TokenizerLoader::new(size.repo_id()).load()
    }
}

impl MaskedLmModel for ModernBertMaskedLm {
    fn forward(
        &self,
        input_ids: &Tensor,
        _token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, attention_mask)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

impl PretrainedMaskedLm for ModernBertMaskedLm {
    type Options = ModernBertSize;

    fn new(options: Self::Options, device: Device) -> Result<Self> {
        ModernBertMaskedLm::new(options, device)
    }

    fn get_tokenizer(options: Self::Options) -> Result<Tokenizer> {
        ModernBertMaskedLm::get_tokenizer(options)
    }
}
