//! Display helpers for ragctl output.

use owo_colors::OwoColorize;
use rag_shared::{AnswerResult, GenerationMetrics, TimingMetrics};
use std::io::Write;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Key column width
const KW: usize = 22;

fn print_kv(key: &str, value: &str) {
    println!("  {:width$} {}", key.dimmed(), value, width = KW);
}

fn secs(value: f64) -> String {
    format!("{:.3}s", value)
}

pub fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer.trim());
    print_timing(&result.metrics);
}

pub fn print_timing(m: &TimingMetrics) {
    println!("{}", SEPARATOR.dimmed());
    print_kv("retrieval", &secs(m.retrieval_time));
    print_kv("first token", &secs(m.time_to_first_token));
    print_kv("generation", &secs(m.total_generation_time));
    print_kv("tokens", &m.tokens.to_string());
    print_kv("tokens/s", &format!("{:.1}", m.tokens_per_second));
    print_kv("total", &secs(m.total_processing_time));
}

/// Print a token without a newline, flushing so it shows immediately.
pub fn print_token(token: &str) {
    print!("{}", token);
    let _ = std::io::stdout().flush();
}

/// Summary after a streamed answer.
pub fn print_stream_summary(
    retrieval_time: Option<f64>,
    generation: Option<&GenerationMetrics>,
    total_processing_time: f64,
) {
    println!();
    println!("{}", SEPARATOR.dimmed());
    if let Some(t) = retrieval_time {
        print_kv("retrieval", &secs(t));
    }
    if let Some(g) = generation {
        print_kv("first token", &secs(g.time_to_first_token));
        print_kv("generation", &secs(g.total_generation_time));
        print_kv("tokens", &g.tokens.to_string());
        print_kv("tokens/s", &format!("{:.1}", g.tokens_per_second));
    }
    print_kv("total", &secs(total_processing_time));
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {}", message.red());
}

pub fn print_ok(message: &str) {
    println!("[OK] {}", message.green());
}
