//! Quiz Arena API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use quizarena_api::config::AppConfig;
use quizarena_api::error::AppError;
use quizarena_api::routes::api_router;
use quizarena_api::state::AppState;
use quizarena_api::ticker;
use quizarena_core::clock::SystemClock;
use quizarena_core::repository::SettlementRepository;
use quizarena_core::transfer::UnconfiguredTransferExecutor;
use quizarena_payments::application::http_gateway::HttpPaymentGateway;
use quizarena_store::{InMemorySettlementRepository, PgSettlementRepository};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Quiz Arena API server");

    let config = AppConfig::from_env()?;

    let repository: Arc<dyn SettlementRepository> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            let repository = PgSettlementRepository::new(pool);
            repository.migrate().await?;
            Arc::new(repository)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; settlement records are kept in memory");
            Arc::new(InMemorySettlementRepository::new())
        }
    };

    let app_state = AppState::new(
        Arc::new(SystemClock),
        repository,
        Arc::new(UnconfiguredTransferExecutor),
        Arc::new(HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_api_key.clone(),
        )),
        config.explorer_base_url.clone(),
        config.payment_destination.clone(),
    );

    let tick_loop = ticker::spawn(app_state.clone(), config.tick_interval);
    let scheduler = Arc::clone(&app_state.scheduler);

    // TODO: Replace CorsLayer::permissive() with the mini-app origin once it is fixed.
    let app = api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Shutting down; waiting for in-flight settlements");
    tick_loop.abort();
    scheduler.wait_for_settlements().await;

    Ok(())
}
