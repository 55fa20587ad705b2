use candle_core::{Device, Tensor};
use candle_transformers::models::bert::{BertForMaskedLM as CandleBertForMaskedLM, Config};
use tokenizers::Tokenizer;
use tracing::info;

use crate::error::Result;
use crate::loaders::{TokenizerLoader, WeightsLoader};
use crate::pipelines::cache::ModelOptions;
use crate::pipelines::masked_lm::model::{MaskedLmModel, PretrainedMaskedLm};

/// Available BERT checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BertSize {
    /// `bert-base-uncased` (~110M parameters).
    BaseUncased,
    /// `bert-base-cased` (~110M parameters).
    BaseCased,
    /// `bert-large-uncased` (~340M parameters).
    LargeUncased,
    /// `bert-large-cased` (~340M parameters).
    LargeCased,
}

impl BertSize {
    pub(crate) fn repo_id(&self) -> &'static str {
        match self {
            BertSize::BaseUncased => "google-bert/bert-base-uncased",
            BertSize::BaseCased => "google-bert/bert-base-cased",
            BertSize::LargeUncased => "google-bert/bert-large-uncased",
            BertSize::LargeCased => "google-bert/bert-large-cased",
        }
    }
}

impl std::fmt::Display for BertSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BertSize::BaseUncased => "bert-base-uncased",
            BertSize::BaseCased => "bert-base-cased",
            BertSize::LargeUncased => "bert-large-uncased",
            BertSize::LargeCased => "bert-large-cased",
        };
        write!(f, "{name}")
    }
}

impl ModelOptions for BertSize {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// BERT with its pretraining masked-LM head.
pub struct BertMaskedLm {
    model: CandleBertForMaskedLM,
    device: Device,
}

impl BertMaskedLm {
    /// Downloads the checkpoint for `size` and loads it onto `device`.
    pub fn new(size: BertSize, device: Device) -> Result<Self> {
        info!(model = %size, "loading BERT masked LM");
        let (config, vb) = WeightsLoader::new(size.repo_id()).load::<Config>(&device)?;
        let model = CandleBertForMaskedLM::load(vb, &config)?;
        Ok(Self { model, device })
    }

    /// Downloads the tokenizer matching `size`.
    pub fn get_tokenizer(size: BertSize) -> Result<Tokenizer> {
        TokenizerLoader::new(size.repo_id()).load()
    }
}

impl MaskedLmModel for BertMaskedLm {
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        Ok(self
            .model
            .forward(input_ids, token_type_ids, Some(attention_mask))?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

impl PretrainedMaskedLm for BertMaskedLm {
    type Options = BertSize;

    fn new(options: Self::Options, device: Device) -> Result<Self> {
        BertMaskedLm::new(options, device)
    }

    fn get_tokenizer(options: Self::Options) -> Result<Tokenizer> {
        BertMaskedLm::get_tokenizer(options)
    }
}
