//! Civic Pipeline Library
//!
//! Screens citizen report text for abusive content and condenses batches of
//! reports into per-category digests for administrators.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  civic-pipeline (Rust Service)               │
//! │                           :4460                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐           ┌──────────────────┐         │
//! │  │ Moderation Gate  │           │ Digest Aggregator│         │
//! │  │  classifier ──┐  │           │  group ─► fan-out│         │
//! │  │  keywords  ◄──┘  │           │  summarizer      │         │
//! │  └──────────────────┘           └──────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Remote inference failures never surface to callers: the gate falls back
//! to a keyword check and the summarizer falls back to truncation.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod classifier;
pub mod digest;
pub mod error;
pub mod inference;
pub mod keywords;
pub mod moderation;
pub mod routes;
pub mod summarizer;
pub mod types;

pub use classifier::{Classifier, HttpClassifier};
pub use digest::{group_by_category, DigestAggregator};
pub use error::{ClientFailure, PipelineError};
pub use keywords::KeywordFilter;
pub use moderation::{ModerationGate, RetryPolicy, ReviewPolicy, SubmissionDecision};
pub use routes::PipelineState;
pub use summarizer::{HttpSummarizer, Summarizer, SummarizerClient};
pub use types::{Digest, DigestEntry, ModerationVerdict, Report, ReportText, VerdictSource};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use civic_common::config::Config;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the service router with all routes and middleware.
pub fn build_router(state: PipelineState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/moderate", post(routes::moderate))
        .route("/api/v1/digest", post(routes::digest))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}

/// Moderation and digest service.
pub struct PipelineService {
    config: Config,
    state: PipelineState,
}

impl PipelineService {
    /// Wire the HTTP-backed classifier and summarizer from configuration.
    pub fn new(config: Config) -> Self {
        let classifier = Arc::new(HttpClassifier::from_config(&config));
        let gate = ModerationGate::from_config(classifier, &config.moderation);

        let summarizer = SummarizerClient::new(
            Arc::new(HttpSummarizer::from_config(&config)),
            config.summarizer.timeout(),
        );
        let aggregator = DigestAggregator::from_config(summarizer, &config.digest);

        Self::with_state(config, PipelineState::new(gate, aggregator))
    }

    pub fn with_state(config: Config, state: PipelineState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Serve until Ctrl-C. Shutdown cancels every in-flight digest.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address().parse()?;
        let shutdown = self.state.shutdown.clone();
        let app = build_router(self.state);

        tracing::info!(
            address = %addr,
            max_concurrency = self.config.digest.max_concurrency,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal(token: tokio_util::sync::CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, cancelling in-flight work");
    token.cancel();
}
