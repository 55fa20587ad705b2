use candle_mlm::error::Result;
use candle_mlm::masked_lm::{GenerationParams, MaskedLmPipelineBuilder, ModernBertSize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candle_mlm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Building pipeline...");

    let pipeline = MaskedLmPipelineBuilder::modernbert(ModernBertSize::Base)
        .max_seq_length(64)
        .build()?;

    println!("Pipeline built successfully.");

    let prompt = "Once upon a time, in a small village by the sea,";

    println!("\n=== Greedy ===");
    let output = pipeline.predict_next_words(prompt, GenerationParams::new(12).temperature(0.0))?;
    println!("{}", output.text);

    println!("\n=== Sampled ===");
    let params = GenerationParams::new(12)
        .temperature(0.8)
        .top_k(40)
        .top_p(0.95)
        .seed(42);
    let output = pipeline.predict_next_words(prompt, params)?;
    println!("{}", output.text);

    for token in &output.generated {
        println!(
            "  {:?} as {:?} (confidence: {:.4})",
            token.token, token.text, token.score
        );
    }
    println!(
        "Generated {} pieces at {:.1} pieces/s, {} rolled out of the window",
        output.stats.tokens_generated,
        output.stats.tokens_per_second,
        output.stats.tokens_discarded
    );

    std::fs::write("next_words.html", output.html())?;
    println!("\nWrote next_words.html");

    Ok(())
}
