//! ragctl - command-line client for ragd

mod cli;
mod client;
mod display;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use client::RagClient;
use rag_shared::{GenerationMetrics, StreamEvent};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RagClient::new(&cli.url, &cli.prefix)?;

    let ok = match cli.command {
        Commands::Health => health(&client).await?,
        Commands::Ask {
            question,
            stream: false,
            json,
        } => ask(&client, &question, json).await?,
        Commands::Ask {
            question,
            stream: true,
            json,
        } => ask_stream(&client, &question, json).await?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn health(client: &RagClient) -> Result<bool> {
    match client.health().await {
        Ok(health) => {
            display::print_ok(&health.message);
            Ok(true)
        }
        Err(e) => {
            display::print_error(&e.to_string());
            Ok(false)
        }
    }
}

async fn ask(client: &RagClient, question: &str, json: bool) -> Result<bool> {
    let result = match client.ask(question).await {
        Ok(result) => result,
        Err(e) => {
            display::print_error(&e.to_string());
            return Ok(false);
        }
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display::print_answer(&result);
    }
    Ok(true)
}

async fn ask_stream(client: &RagClient, question: &str, json: bool) -> Result<bool> {
    let mut retrieval_time = None;
    let mut generation: Option<GenerationMetrics> = None;

    let terminal = client
        .ask_stream(question, |event| {
            if json {
                print!("{}", event.to_line());
                return;
            }
            match event {
                StreamEvent::RetrievalComplete { retrieval_time: t } => retrieval_time = Some(*t),
                StreamEvent::Token(data) => {
                    display::print_token(&data.token);
                    if data.metrics.is_some() {
                        generation = data.metrics;
                    }
                }
                StreamEvent::Metrics { .. } | StreamEvent::Error { .. } => {}
            }
        })
        .await;

    match terminal {
        Ok(StreamEvent::Metrics {
            total_processing_time,
        }) => {
            if !json {
                display::print_stream_summary(
                    retrieval_time,
                    generation.as_ref(),
                    total_processing_time,
                );
            }
            Ok(true)
        }
        Ok(StreamEvent::Error { message }) => {
            if !json {
                println!();
                display::print_error(&message);
            }
            Ok(false)
        }
        Ok(_) => Ok(false),
        Err(e) => {
            display::print_error(&e.to_string());
            Ok(false)
        }
    }
}
