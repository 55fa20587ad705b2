use tokenizers::Tokenizer;

/// Ids of the BERT-style special tokens the pipelines place around content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// `[CLS]`, first token of every sequence.
    pub cls: u32,
    /// `[SEP]`, closes each segment.
    pub sep: u32,
    /// `[MASK]`, the position the model is asked to fill.
    pub mask: u32,
    /// `[PAD]`, fills sequences up to the fixed length.
    pub pad: u32,
    /// `[UNK]`, stands in for pieces missing from the vocabulary.
    pub unk: u32,
}

impl Default for SpecialTokens {
    /// Ids used by the original BERT vocabularies.
    fn default() -> Self {
        Self {
            cls: 101,
            sep: 102,
            mask: 103,
            pad: 0,
            unk: 100,
        }
    }
}

impl SpecialTokens {
    /// Looks the special tokens up in `tokenizer`, keeping the BERT ids for any
    /// that are missing.
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Self {
        let defaults = Self::default();
        let pad = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .unwrap_or(defaults.pad);

        Self {
            cls: tokenizer.token_to_id("[CLS]").unwrap_or(defaults.cls),
            sep: tokenizer.token_to_id("[SEP]").unwrap_or(defaults.sep),
            mask: tokenizer.token_to_id("[MASK]").unwrap_or(defaults.mask),
            pad,
            unk: tokenizer.token_to_id("[UNK]").unwrap_or(defaults.unk),
        }
    }

    /// True for ids that never carry content.
    pub fn contains(&self, id: u32) -> bool {
        id == self.cls || id == self.sep || id == self.mask || id == self.pad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tiny_tokenizer;

    #[test]
    fn resolves_ids_from_vocabulary() {
        let tokenizer = tiny_tokenizer();
        let special = SpecialTokens::from_tokenizer(&tokenizer);
        assert_eq!(
            special,
            SpecialTokens {
                cls: 2,
                sep: 3,
                mask: 4,
                pad: 0,
                unk: 1,
            }
        );
        assert!(special.contains(4));
        assert!(!special.contains(1));
    }
}
