use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wizard_core::HttpGenerationService;
use wizard_ui::{config::Config, page, state::AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    info!("Starting wizard_ui server...");

    let config = Config::from_env();
    let generation = Arc::new(HttpGenerationService::new(
        config.generation_url.clone(),
        config.generation_api_key.clone(),
    ));

    let state = Arc::new(AppState::new(config, generation));
    let addr = state.config.addr;

    let app = page::app(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
