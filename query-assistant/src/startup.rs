//! Application startup and lifecycle management.

use crate::config::AssistantConfig;
use crate::handlers::{ask, health, metrics::metrics_handler};
use crate::services::providers::gemini::{GeminiChatProvider, GeminiConfig};
use crate::services::providers::ChatProvider;
use crate::services::metrics::init_metrics;
use crate::services::schema::system_instruction;
use crate::services::{AssistantDb, ConversationSession, QueryOrchestrator, SqlGuard};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AssistantConfig,
    pub db: AssistantDb,
    pub provider: Arc<dyn ChatProvider>,
    pub orchestrator: Arc<QueryOrchestrator>,
}

impl AppState {
    /// Wire the conversation, guard and database into one orchestrator.
    pub fn new(config: AssistantConfig, db: AssistantDb, provider: Arc<dyn ChatProvider>) -> Self {
        let mode = config.assistant.execution_mode;

        let session = ConversationSession::new(
            provider.clone(),
            system_instruction(mode),
            config.gemini.generation_params(),
        )
        .with_history_window(config.assistant.history_window);

        let orchestrator = QueryOrchestrator::new(session, db.clone(), SqlGuard::new(mode))
            .with_max_attempts(config.assistant.max_attempts);

        Self {
            config,
            db,
            provider,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/v1/ask", post(ask::ask))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AssistantConfig) -> Result<Self, AppError> {
        let db = AssistantDb::connect(
            &config.database.url,
            config.database.max_connections,
            config.assistant.execution_mode,
        )
        .await?;

        match db.count_employees().await {
            Ok(count) => tracing::info!(employees = count, "Database reachable"),
            Err(e) => tracing::warn!(error = %e, "Could not count employees"),
        }

        let provider = GeminiChatProvider::new(GeminiConfig {
            api_key: config.gemini.api_key.clone(),
            model: config.gemini.model.clone(),
            api_base: config.gemini.api_base.clone(),
        })
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        tracing::info!(model = %config.gemini.model, "Initialized Gemini chat provider");

        Self::build_with(config, db, Arc::new(provider)).await
    }

    /// Build around an existing database and provider.
    pub async fn build_with(
        config: AssistantConfig,
        db: AssistantDb,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        init_metrics().map_err(|e| {
            tracing::error!("Failed to initialize metrics: {}", e);
            AppError::InternalError(anyhow::anyhow!(e))
        })?;

        // Port 0 picks a random port, used by the tests.
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(
            mode = %config.assistant.execution_mode,
            max_attempts = config.assistant.max_attempts,
            "Query assistant listening on port {}",
            http_port
        );

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, db, provider),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.http_listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
