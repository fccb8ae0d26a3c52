//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

/// Client for the ragd answer service
#[derive(Parser)]
#[command(name = "ragctl")]
#[command(about = "Ask questions against a ragd document index", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the ragd server (overrides $RAGD_URL)
    #[arg(long, global = true, env = "RAGD_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// API route prefix
    #[arg(long, global = true, default_value = "/api/v1")]
    pub prefix: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question
    Ask {
        /// The question text
        question: String,

        /// Print tokens as they are generated
        #[arg(long)]
        stream: bool,

        /// Output raw JSON (the result, or one event per line)
        #[arg(long)]
        json: bool,
    },

    /// Check that the server is up
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_flags() {
        let cli = Cli::parse_from(["ragctl", "ask", "Why?", "--stream"]);
        match cli.command {
            Commands::Ask {
                question,
                stream,
                json,
            } => {
                assert_eq!(question, "Why?");
                assert!(stream);
                assert!(!json);
            }
            Commands::Health => panic!("expected ask"),
        }
    }

    #[test]
    fn test_global_url() {
        let cli = Cli::parse_from(["ragctl", "--url", "http://rag:9000", "health"]);
        assert_eq!(cli.url, "http://rag:9000");
        assert!(matches!(cli.command, Commands::Health));
    }
}
