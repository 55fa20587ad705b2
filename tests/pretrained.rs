#![cfg(feature = "cuda")]

use candle_mlm::error::Result;
use candle_mlm::masked_lm::{
    BertSize, GenerationParams, MaskedLmPipelineBuilder, ModernBertSize,
};
use std::time::Instant;

const TEXT: &str = "The capital of France is Paris. It is known for the Eiffel Tower, \
    its museums and its cafes. Millions of tourists visit the city every year.";

#[test]
fn bert_masked_words() -> Result<()> {
    let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .max_seq_length(64)
        .seed(0)
        .cuda(0)
        .build()?;

    let output = pipeline.predict_masked_words(TEXT)?;
    assert!(!output.predicted.plain_text().is_empty());
    for p in &output.predictions {
        assert!(p.score >= 0.0 && p.score <= 1.0);
    }
    if let Some(accuracy) = output.accuracy() {
        assert!((0.0..=1.0).contains(&accuracy));
    }
    Ok(())
}

#[test]
fn bert_next_words_greedy_is_deterministic() -> Result<()> {
    let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .cuda(0)
        .build()?;

    let params = GenerationParams::new(5).temperature(0.0);
    let first = pipeline.predict_next_words("I went to the store to buy", params.clone())?;
    let second = pipeline.predict_next_words("I went to the store to buy", params)?;

    assert_eq!(first.generated.len(), 5);
    assert_eq!(first.generated, second.generated);
    for token in &first.generated {
        assert!(!["[CLS]", "[SEP]", "[MASK]", "[PAD]"].contains(&token.token.as_str()));
    }
    Ok(())
}

#[test]
fn bert_next_words_rolls_window() -> Result<()> {
    let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .max_seq_length(8)
        .cuda(0)
        .build()?;

    let output = pipeline.predict_next_words(TEXT, GenerationParams::new(4).seed(1))?;
    assert!(output.stats.tokens_discarded == 4);
    assert!(output.text.plain_text().starts_with("the capital of france"));
    Ok(())
}

#[test]
fn modernbert_masked_words() -> Result<()> {
    let pipeline = MaskedLmPipelineBuilder::modernbert(ModernBertSize::Base)
        .max_seq_length(64)
        .seed(3)
        .cuda(0)
        .build()?;

    let output = pipeline.predict_masked_words(TEXT)?;
    assert!(output.source_html().starts_with("<p>"));
    Ok(())
}

#[test]
fn second_build_reuses_cached_model() -> Result<()> {
    let _first = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .cuda(0)
        .build()?;

    let start = Instant::now();
    let _second = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .cuda(0)
        .build()?;
    assert!(start.elapsed().as_secs() < 5);
    Ok(())
}
