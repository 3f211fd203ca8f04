pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::ai_generation::OpenAiGenerationClient;
use crate::services::grade_extraction::ExtractionPolicy;
use crate::services::grading::GradingOrchestrator;
use crate::services::store::PgStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let client = OpenAiGenerationClient::from_settings(&settings)?;
    if settings.ai().openai_api_key.trim().is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; AI grading requests will fail");
    }
    let policy = ExtractionPolicy::from_settings(settings.grading());
    tracing::info!(
        max_attempts = policy.max_attempts,
        attempt_timeout_secs = policy.attempt_timeout.as_secs(),
        deadline_secs = policy.deadline.as_secs(),
        "Grade extraction policy loaded"
    );
    let orchestrator = GradingOrchestrator::new(Arc::new(client), policy);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state =
        AppState::new(settings, Arc::new(PgStore::new(db_pool.clone())), orchestrator, shutdown_rx);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Gradewise API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal(shutdown_tx))
        .await;

    db_pool.close().await;
    tracing::info!("Database pool closed");

    result?;

    Ok(())
}
