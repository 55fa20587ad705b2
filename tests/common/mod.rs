#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use candle_core::{Device, Tensor};
use candle_mlm::error::Result;
use candle_mlm::masked_lm::MaskedLmModel;
use tokenizers::Tokenizer;

pub const MASK: u32 = 4;
const FIRST_WORD: u32 = 5;

fn fixture(name: &str) -> Tokenizer {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    Tokenizer::from_file(&path).expect("tokenizer fixture loads")
}

/// Lower-casing WordPiece tokenizer; special tokens are ids 0 to 4.
pub fn tokenizer() -> Tokenizer {
    fixture("wordpiece.json")
}

/// Byte-level BPE tokenizer with the same special ids.
pub fn byte_level_tokenizer() -> Tokenizer {
    fixture("byte_level_bpe.json")
}

/// Id of `token` in the WordPiece fixture.
pub fn id(token: &str) -> u32 {
    tokenizer().token_to_id(token).expect("token in vocabulary")
}

/// What the mock predicts at `[MASK]` positions.
#[derive(Debug, Clone, Copy)]
pub enum Fill {
    /// The vocabulary entry after the piece left of the mask, wrapping to the
    /// first non-special id.
    NextWord,
    /// Always this id.
    Fixed(u32),
    /// Equal scores for every id.
    Uniform,
}

/// Deterministic stand-in for a transformer: echoes unmasked ids and fills
/// masks according to [`Fill`].
pub struct MockModel {
    fill: Fill,
    vocab_size: usize,
    device: Device,
    pub longest_input: AtomicUsize,
    pub calls: AtomicUsize,
}

impl MockModel {
    pub fn new(fill: Fill, tokenizer: &Tokenizer) -> Self {
        Self {
            fill,
            vocab_size: tokenizer.get_vocab_size(true),
            device: Device::Cpu,
            longest_input: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn mask_target(&self, prev: Option<u32>) -> Option<u32> {
        let words = self.vocab_size as u32 - FIRST_WORD;
        match self.fill {
            Fill::NextWord => Some(match prev {
                Some(id) if id >= FIRST_WORD => FIRST_WORD + (id - FIRST_WORD + 1) % words,
                _ => FIRST_WORD,
            }),
            Fill::Fixed(id) => Some(id),
            Fill::Uniform => None,
        }
    }
}

impl MaskedLmModel for MockModel {
    fn forward(
        &self,
        input_ids: &Tensor,
        _token_type_ids: &Tensor,
        _attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let (batch, seq) = input_ids.dims2()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.longest_input.fetch_max(seq, Ordering::SeqCst);

        let vocab = self.vocab_size;
        let mut logits = vec![0f32; batch * seq * vocab];
        for (b, row) in input_ids.to_vec2::<u32>()?.iter().enumerate() {
            for (s, &id) in row.iter().enumerate() {
                let target = if id == MASK {
                    self.mask_target(s.checked_sub(1).map(|p| row[p]))
                } else {
                    Some(id)
                };
                if let Some(target) = target {
                    logits[(b * seq + s) * vocab + target as usize] = 10.0;
                }
            }
        }
        Ok(Tensor::from_vec(logits, (batch, seq, vocab), &self.device)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
