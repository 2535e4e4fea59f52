use query_assistant::config::AssistantConfig;
use query_assistant::startup::Application;
use service_core::observability::init_tracing;

const SERVICE_NAME: &str = "query-assistant";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = match AssistantConfig::load() {
        Ok(config) => config,
        Err(e) => {
            let _ = init_tracing(SERVICE_NAME, "info", None);
            tracing::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };

    init_tracing(
        SERVICE_NAME,
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    )
    .map_err(|e| std::io::Error::other(format!("Tracing setup error: {}", e)))?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start query assistant: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
