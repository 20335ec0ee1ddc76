//! Civic Pipeline - moderation and leadership digest service for citizen reports.

use anyhow::Result;
use civic_common::config::Config;
use civic_common::logging::init_logging;
use civic_pipeline::PipelineService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_and_validate()?;

    init_logging(&config.observability);

    tracing::info!("Civic Pipeline v{}", env!("CARGO_PKG_VERSION"));
    if config.secrets.inference_token.is_none() {
        tracing::warn!("No inference token configured, remote calls will likely be rejected");
    }

    let service = PipelineService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
