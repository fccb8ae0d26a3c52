//! Timing and throughput metrics attached to every answer.
//!
//! All durations are reported in seconds as `f64`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tokens per second, defined as 0 when no generation time elapsed.
pub fn tokens_per_second(tokens: u32, total_generation_time: f64) -> f64 {
    if total_generation_time > 0.0 {
        tokens as f64 / total_generation_time
    } else {
        0.0
    }
}

/// Measurements owned by the generation stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub time_to_first_token: f64,
    pub total_generation_time: f64,
    pub tokens: u32,
    pub tokens_per_second: f64,
}

impl GenerationMetrics {
    pub fn new(time_to_first_token: Duration, total_generation_time: Duration, tokens: u32) -> Self {
        let total = total_generation_time.as_secs_f64();
        Self {
            // First token can never arrive after completion
            time_to_first_token: time_to_first_token.as_secs_f64().min(total),
            total_generation_time: total,
            tokens,
            tokens_per_second: tokens_per_second(tokens, total),
        }
    }
}

/// The six-field metrics record returned with a batch answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingMetrics {
    pub retrieval_time: f64,
    pub time_to_first_token: f64,
    pub total_generation_time: f64,
    pub tokens: u32,
    pub tokens_per_second: f64,
    pub total_processing_time: f64,
}

impl TimingMetrics {
    /// Combine both stages' measurements with the end-to-end wall time.
    ///
    /// `total_processing_time` never reports less than the sum of the two
    /// stages, even when the float sum rounds above the measured wall time.
    pub fn assemble(
        retrieval_time: Duration,
        generation: &GenerationMetrics,
        total_processing_time: Duration,
    ) -> Self {
        let retrieval_time = retrieval_time.as_secs_f64();
        let floor = retrieval_time + generation.total_generation_time;
        Self {
            retrieval_time,
            time_to_first_token: generation.time_to_first_token,
            total_generation_time: generation.total_generation_time,
            tokens: generation.tokens,
            tokens_per_second: generation.tokens_per_second,
            total_processing_time: total_processing_time.as_secs_f64().max(floor),
        }
    }
}

/// A completed batch answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub metrics: TimingMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tokens_per_second_zero_time() {
        assert_eq!(tokens_per_second(12, 0.0), 0.0);
        assert_eq!(tokens_per_second(0, 0.0), 0.0);
    }

    #[test]
    fn test_tokens_per_second_exact() {
        assert_relative_eq!(tokens_per_second(7, 0.4), 17.5, epsilon = 1e-9);
        assert_relative_eq!(tokens_per_second(10, 2.0), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_generation_metrics_clamps_first_token() {
        let m = GenerationMetrics::new(Duration::from_millis(900), Duration::from_millis(500), 4);
        assert_eq!(m.time_to_first_token, m.total_generation_time);
    }

    #[test]
    fn test_assemble_keeps_total_above_stage_sum() {
        let generation = GenerationMetrics::new(
            Duration::from_millis(120),
            Duration::from_millis(400),
            7,
        );
        let metrics = TimingMetrics::assemble(
            Duration::from_millis(50),
            &generation,
            Duration::from_millis(450),
        );
        assert!(
            metrics.total_processing_time
                >= metrics.retrieval_time + metrics.total_generation_time
        );
        assert_relative_eq!(metrics.tokens_per_second, 17.5, epsilon = 1e-9);
        assert_eq!(metrics.tokens, 7);
    }

    #[test]
    fn test_metrics_serialize_six_fields() {
        let generation = GenerationMetrics::new(Duration::ZERO, Duration::ZERO, 0);
        let metrics = TimingMetrics::assemble(Duration::ZERO, &generation, Duration::ZERO);
        let json = serde_json::to_value(metrics).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        for key in [
            "retrieval_time",
            "time_to_first_token",
            "total_generation_time",
            "tokens",
            "tokens_per_second",
            "total_processing_time",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert!(obj["tokens"].is_u64());
    }
}
