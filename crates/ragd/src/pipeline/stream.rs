//! Stream orchestration as a pull-driven state machine.
//!
//! ```text
//! Start ──retrieve──▶ Retrieved ──open──▶ Generating ──(token)*──▶ Done
//!   │                     │                    │
//!   └──────── error ──────┴────── error ───────┴──── metrics ────▶ Done
//! ```
//!
//! Nothing runs until the consumer polls, and dropping the stream drops
//! whatever call is in flight. Every poll runs inside the span that was
//! current when the stream was created, so a transport polling the body
//! after the handler returned still logs under the request.

use super::{Pipeline, TokenStream};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use rag_shared::{
    terminal_event, Question, RagError, RetrievedContext, StreamEvent, StreamOutcome, TokenData,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, Instrument, Span};

/// Finite, non-restartable, single-reader sequence of events.
pub type EventStream = BoxStream<'static, StreamEvent>;

enum StreamState {
    Start {
        pipeline: Arc<Pipeline>,
        question: Question,
    },
    Retrieved {
        pipeline: Arc<Pipeline>,
        question: Question,
        contexts: RetrievedContext,
        started: Instant,
    },
    Generating {
        tokens: TokenStream,
        started: Instant,
    },
    Done,
}

impl Pipeline {
    /// Stream orchestration. Failures from either stage become the final
    /// `error` event; nothing is raised to the caller.
    pub fn answer_stream(self: Arc<Self>, question: Question) -> EventStream {
        let state = StreamState::Start {
            pipeline: self,
            question,
        };
        let span = Span::current();
        futures_util::stream::unfold(state, move |state| advance(state).instrument(span.clone()))
            .boxed()
    }
}

fn failed(err: RagError) -> (StreamEvent, StreamState) {
    error!("Error in stream generation: {}", err);
    let event = terminal_event(StreamOutcome::Failure {
        message: err.to_string(),
    });
    (event, StreamState::Done)
}

async fn advance(state: StreamState) -> Option<(StreamEvent, StreamState)> {
    let mut state = state;
    loop {
        state = match state {
            StreamState::Start { pipeline, question } => {
                let started = Instant::now();
                let retrieved = pipeline.retrieval().retrieve(&question).await;
                return match retrieved {
                    Ok((contexts, retrieval_time)) => Some((
                        StreamEvent::RetrievalComplete {
                            retrieval_time: retrieval_time.as_secs_f64(),
                        },
                        StreamState::Retrieved {
                            pipeline,
                            question,
                            contexts,
                            started,
                        },
                    )),
                    Err(e) => Some(failed(e)),
                };
            }

            StreamState::Retrieved {
                pipeline,
                question,
                contexts,
                started,
            } => {
                let opened = pipeline.generation().generate_stream(&question, &contexts).await;
                match opened {
                    // No event for opening the stream; poll the first token now
                    Ok(tokens) => StreamState::Generating { tokens, started },
                    Err(e) => return Some(failed(e)),
                }
            }

            StreamState::Generating {
                mut tokens,
                started,
            } => {
                let next = tokens.next().await;
                return match next {
                    Some(Ok(chunk)) => Some((
                        StreamEvent::Token(TokenData {
                            token: chunk.text,
                            metrics: chunk.metrics,
                        }),
                        StreamState::Generating { tokens, started },
                    )),
                    Some(Err(e)) => Some(failed(e)),
                    None => {
                        let total_processing_time = started.elapsed().as_secs_f64();
                        info!("Stream completed in {:.3}s", total_processing_time);
                        Some((
                            terminal_event(StreamOutcome::Success {
                                total_processing_time,
                            }),
                            StreamState::Done,
                        ))
                    }
                };
            }

            StreamState::Done => return None,
        };
    }
}
