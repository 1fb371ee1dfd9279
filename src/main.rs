mod client;
mod config;
mod console;
mod engine;
mod error;
mod hf_engine;
mod history;
mod interpret;
mod normalize;
mod rate_limit;
mod relay;
mod speech;
mod types;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use config::{Cli, Command, ServeConfig};
use engine::InferenceBackend;
use hf_engine::HfInferenceClient;
use relay::{AppState, RelayPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(config) => serve(config).await,
        Command::Console(config) => console::run_console(config).await,
        Command::Analyze(config) => console::run_once(config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,moodrelay=debug".into());

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(config: ServeConfig) -> anyhow::Result<()> {
    tracing::info!("Starting relay with config: {:?}", config);

    let backend: Option<Arc<dyn InferenceBackend + Send + Sync>> =
        match HfInferenceClient::new(config.hf_config()) {
            Ok(client) => {
                tracing::info!(endpoint = client.endpoint(), "Inference endpoint configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("{e}; analyze requests will fail until HF_TOKEN is set");
                None
            }
        };

    let state = AppState::new(backend, config.request_timeout())
        .with_normalized_responses(config.normalize_response);
    let policy = RelayPolicy {
        allowed_origins: config.allowed_origins.clone(),
        rate_limit_per_minute: config.rate_limit_per_minute,
    };

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = relay::router(state, &policy)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Relay running on http://{}", config.server_address());
    tracing::info!(
        "Request timeout: {:?}, rate limit: {}/min",
        config.request_timeout(),
        config.rate_limit_per_minute
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
