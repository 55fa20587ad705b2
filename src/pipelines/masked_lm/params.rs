use candle_transformers::generation::{LogitsProcessor, Sampling};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Controls the next-word sampling loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Word pieces to generate.
    pub max_new_tokens: usize,
    /// Randomness of sampling. 0.0 = greedy, higher = more random.
    pub temperature: f64,
    /// Only consider the top k most likely pieces.
    pub top_k: Option<usize>,
    /// Nucleus sampling: only consider pieces with cumulative probability <= p.
    pub top_p: Option<f64>,
    /// Seed for reproducible sampling. Random when unset.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 10,
            temperature: 1.0,
            top_k: None,
            top_p: None,
            seed: None,
        }
    }
}

impl GenerationParams {
    /// Default parameters generating `max_new_tokens` pieces.
    pub fn new(max_new_tokens: usize) -> Self {
        Self {
            max_new_tokens,
            ..Self::default()
        }
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Restricts sampling to the `k` most likely pieces.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Restricts sampling to the smallest set with cumulative probability `p`.
    pub fn top_p(mut self, p: f64) -> Self {
        self.top_p = Some(p);
        self
    }

    /// Fixes the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() {
            return Err(PipelineError::InvalidInput(format!(
                "Temperature must be finite, got {}",
                self.temperature
            )));
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(PipelineError::InvalidInput(format!(
                    "top_p must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn sampling_strategy(&self) -> Sampling {
        if self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }

        let temperature = self.temperature.max(1e-7);
        let top_k = self.top_k.unwrap_or(0);
        let top_p = self.top_p.unwrap_or(1.0);

        match (top_k > 0, top_p < 1.0) {
            (true, true) => Sampling::TopKThenTopP {
                k: top_k,
                p: top_p,
                temperature,
            },
            (true, false) => Sampling::TopK {
                k: top_k,
                temperature,
            },
            (false, true) => Sampling::TopP {
                p: top_p,
                temperature,
            },
            (false, false) => Sampling::All { temperature },
        }
    }

    pub(crate) fn logits_processor(&self) -> LogitsProcessor {
        let seed = self.seed.unwrap_or_else(rand::random);
        LogitsProcessor::from_sampling(seed, self.sampling_strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_temperature_is_greedy() {
        let params = GenerationParams::new(3).temperature(0.0).top_k(5);
        assert!(matches!(params.sampling_strategy(), Sampling::ArgMax));
    }

    #[test]
    fn picks_filter_combination() {
        let params = GenerationParams::default();
        assert!(matches!(params.sampling_strategy(), Sampling::All { .. }));

        let params = GenerationParams::default().top_k(4);
        assert!(matches!(params.sampling_strategy(), Sampling::TopK { k: 4, .. }));

        let params = GenerationParams::default().top_p(0.9);
        assert!(matches!(params.sampling_strategy(), Sampling::TopP { .. }));

        let params = GenerationParams::default().top_k(4).top_p(0.9);
        assert!(matches!(
            params.sampling_strategy(),
            Sampling::TopKThenTopP { k: 4, .. }
        ));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(GenerationParams::default().top_p(1.5).validate().is_err());
        assert!(GenerationParams::default()
            .temperature(f64::NAN)
            .validate()
            .is_err());
        assert!(GenerationParams::default().validate().is_ok());
    }

    #[test]
    fn deserializes_partial_json() {
        let params: GenerationParams =
            serde_json::from_str(r#"{"max_new_tokens": 4, "seed": 9}"#).unwrap();
        assert_eq!(params, GenerationParams::new(4).seed(9));
    }
}
