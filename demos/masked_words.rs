use candle_mlm::error::Result;
use candle_mlm::masked_lm::{BertSize, MaskedLmPipelineBuilder};
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

    let pipeline = MaskedLmPipelineBuilder::bert(BertSize::BaseUncased)
        .max_seq_length(128)
        .build()?;

    println!("Pipeline built successfully.");

    let text = "The Eiffel Tower was built for the 1889 World's Fair in Paris. \
        At the time it was the tallest structure in the world, and it remains \
        the most visited paid monument on the planet.";

    let output = pipeline.predict_masked_words(text)?;

    println!("\n=== Masked Words ===");
    println!("Source:    {}", output.source);
    println!("Predicted: {}", output.predicted);

    println!("\nPredictions:");
    for p in &output.predictions {
        let mark = if p.is_correct() { "ok" } else { "  " };
        println!(
            "  [{mark}] {} -> \"{}\" (confidence: {:.4})",
            p.original, p.predicted, p.score
        );
    }
    if let Some(accuracy) = output.accuracy() {
        println!("Accuracy: {:.1}%", accuracy * 100.0);
    }
    println!(
        "Completed in {:.2}ms",
        output.stats.total_time.as_secs_f64() * 1000.0
    );

    let html = format!("{}\n{}\n", output.source_html(), output.predicted_html());
    std::fs::write("masked_words.html", html)?;
    println!("\nWrote masked_words.html");

    Ok(())
}
