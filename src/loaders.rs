use std::path::PathBuf;
use std::time::Duration;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::de::DeserializeOwned;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let hf_repo = open_repo(&self.repo)?;

        let max_retries = 3;
        let mut attempts = 0u32;

        for attempt in 0..max_retries {
            match hf_repo.get(self.filename.as_str()) {
                Ok(path) => {
                    debug!(repo = %self.repo, file = %self.filename, path = %path.display(), "resolved hub file");
                    return Ok(path);
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    attempts = attempt + 1;
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        let wait_time = Duration::from_millis(100 * (1 << attempt));
                        warn!(repo = %self.repo, file = %self.filename, ?wait_time, "hub cache locked, retrying");
                        std::thread::sleep(wait_time);
                        continue;
                    }
                    return Err(PipelineError::Download(format!(
                        "Failed to download '{}' from '{}': {}",
                        self.filename, self.repo, error_msg
                    )));
                }
            }
        }

        Err(PipelineError::Download(format!(
            "Download timed out for '{}' from '{}' after {} attempt(s)",
            self.filename, self.repo, attempts
        )))
    }
}

fn open_repo(repo_id: &str) -> Result<ApiRepo> {
    let api = ApiBuilder::new().build().map_err(|e| {
        PipelineError::Download(format!("Failed to initialize HuggingFace API: {e}"))
    })?;
    Ok(api.repo(Repo::new(repo_id.to_string(), RepoType::Model)))
}

#[derive(Debug, Clone)]
pub struct TokenizerLoader {
    pub tokenizer_file_loader: HfLoader,
}

impl TokenizerLoader {
    pub fn new(repo: &str) -> Self {
        Self {
            tokenizer_file_loader: HfLoader::new(repo, "tokenizer.json"),
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer_file_path = self.tokenizer_file_loader.load()?;
        let path_str = tokenizer_file_path.display().to_string();

        Tokenizer::from_file(&tokenizer_file_path).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Failed to load tokenizer from '{path_str}': {e}"
            ))
        })
    }
}

/// Config + weights of a safetensors (or legacy `.bin`) checkpoint.
#[derive(Debug, Clone)]
pub struct WeightsLoader {
    pub repo: String,
}

impl WeightsLoader {
    pub fn new(repo: &str) -> Self {
        Self { repo: repo.into() }
    }

    /// Downloads `config.json` and the weights, returning the parsed config and
    /// a var builder over the weights.
    pub fn load<C: DeserializeOwned>(&self, device: &Device) -> Result<(C, VarBuilder<'static>)> {
        let config_path = HfLoader::new(&self.repo, "config.json").load()?;
        let weights_path = HfLoader::new(&self.repo, "model.safetensors")
            .load()
            .or_else(|_| HfLoader::new(&self.repo, "pytorch_model.bin").load())?;

        let config: C = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

        let vb = if weights_path.extension().is_some_and(|e| e == "safetensors") {
            // SAFETY: the hub cache file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, device)?
        };

        Ok((config, vb))
    }
}
