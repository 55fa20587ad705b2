use std::time::{Duration, Instant};

// ============ Single-pass stats (masked prediction) ============

/// Statistics for a single forward-pass operation.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total execution time.
    pub total_time: Duration,
    /// Number of items processed.
    pub items_processed: usize,
}

impl PipelineStats {
    /// Create a new stats tracker (call at start of operation).
    pub(crate) fn start() -> PipelineStatsBuilder {
        PipelineStatsBuilder {
            start_time: Instant::now(),
        }
    }
}

/// Tracks timing from creation to [`finish`](Self::finish).
pub(crate) struct PipelineStatsBuilder {
    start_time: Instant,
}

impl PipelineStatsBuilder {
    pub fn finish(self, items_processed: usize) -> PipelineStats {
        PipelineStats {
            total_time: self.start_time.elapsed(),
            items_processed,
        }
    }
}

// ============ Generation stats (next-word loop) ============

/// Statistics for iterative next-word generation.
#[derive(Debug, Clone)]
pub struct GenerationStats {
    /// Number of tokens generated.
    pub tokens_generated: usize,
    /// Number of prompt word pieces fed to the model.
    pub prompt_tokens: usize,
    /// Pieces rolled out of the model window while generating.
    pub tokens_discarded: usize,
    /// Total generation time.
    pub total_time: Duration,
    /// Throughput in tokens per second.
    pub tokens_per_second: f64,
    start_time: Instant,
}

impl GenerationStats {
    pub(crate) fn new(prompt_tokens: usize) -> Self {
        Self {
            tokens_generated: 0,
            prompt_tokens,
            tokens_discarded: 0,
            total_time: Duration::default(),
            tokens_per_second: 0.0,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_token(&mut self, rolled_out: bool) {
        self.tokens_generated += 1;
        if rolled_out {
            self.tokens_discarded += 1;
        }
    }

    pub(crate) fn finalize(&mut self) {
        self.total_time = self.start_time.elapsed();
        self.tokens_per_second = if self.total_time.as_secs_f64() > 0.0 {
            self.tokens_generated as f64 / self.total_time.as_secs_f64()
        } else {
            0.0
        };
    }

    #[cfg(test)]
    pub(crate) fn override_start(&mut self, start_time: Instant) {
        self.start_time = start_time;
    }
}
