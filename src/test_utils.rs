use tokenizers::Tokenizer;

fn fixture(name: &str) -> Tokenizer {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    Tokenizer::from_file(&path).expect("tokenizer fixture loads")
}

/// Lower-casing WordPiece tokenizer: `[PAD] [UNK] [CLS] [SEP] [MASK]` are ids
/// 0 to 4, followed by a handful of words and `##` pieces.
pub(crate) fn tiny_tokenizer() -> Tokenizer {
    fixture("wordpiece.json")
}

/// Byte-level BPE tokenizer with the same special ids; word starts carry `Ġ`.
pub(crate) fn byte_level_tokenizer() -> Tokenizer {
    fixture("byte_level_bpe.json")
}
