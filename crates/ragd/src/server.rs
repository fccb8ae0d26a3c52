//! HTTP server for ragd

use crate::config::Config;
use crate::factory::{CollaboratorFactory, OllamaChromaFactory};
use crate::pipeline::Pipeline;
use crate::routes;
use anyhow::Result;
use axum::Router;
use rag_shared::RagError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    factory: Arc<dyn CollaboratorFactory>,
    /// Built by the first request that needs it
    pipeline: OnceCell<Arc<Pipeline>>,
}

impl AppState {
    pub fn new(config: Config, factory: Arc<dyn CollaboratorFactory>) -> Self {
        Self {
            config,
            factory,
            pipeline: OnceCell::new(),
        }
    }

    /// Production state: collaborators from config on first use.
    pub fn from_config(config: Config) -> Self {
        let factory = Arc::new(OllamaChromaFactory::new(config.clone()));
        Self::new(config, factory)
    }

    /// The shared pipeline, built at most once.
    ///
    /// Concurrent first requests wait on the same construction. A failed
    /// construction leaves the cell empty, so the next request tries again.
    pub async fn pipeline(&self) -> Result<Arc<Pipeline>, RagError> {
        self.pipeline
            .get_or_try_init(|| async {
                info!("Initializing collaborators");
                self.factory.build().await.map(Arc::new)
            })
            .await
            .cloned()
    }

    pub fn pipeline_ready(&self) -> bool {
        self.pipeline.initialized()
    }
}

/// Build the router with all routes and layers
pub fn router(state: Arc<AppState>) -> Router {
    let prefix = state.config.server.api_prefix.clone();
    Router::new()
        .merge(routes::health_routes())
        .nest(&prefix, routes::answer_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let addr = config.server.bind.clone();
    let state = Arc::new(AppState::from_config(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully");
}
