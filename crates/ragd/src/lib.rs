//! ragd library - exposes modules for testing.

pub mod chroma;
pub mod collaborators;
pub mod config;
pub mod factory;
pub mod ollama;
pub mod pipeline;
pub mod prompts;
pub mod routes;
pub mod server;
pub mod task_stream;
