use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    response::Json,
    routing::{get, post},
};
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::engine::InferenceBackend;
use crate::error::RelayError;
use crate::normalize::normalize;
use crate::rate_limit::{self, RateLimiter};
use crate::types::HealthResponse;

#[derive(Clone)]
pub struct AppState {
    backend: Option<Arc<dyn InferenceBackend + Send + Sync>>,
    timeout: Duration,
    normalize_response: bool,
}

impl AppState {
    /// `backend` is `None` when the relay was started without credentials.
    pub fn new(backend: Option<Arc<dyn InferenceBackend + Send + Sync>>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            normalize_response: false,
        }
    }

    pub fn with_normalized_responses(mut self, enabled: bool) -> Self {
        self.normalize_response = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RelayPolicy {
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
}

pub fn router(state: AppState, policy: &RelayPolicy) -> Router {
    let limiter = Arc::new(RateLimiter::per_minute(policy.rate_limit_per_minute));

    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(cors_layer(&policy.allowed_origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Reads `text` out of a JSON body; anything else is invalid input.
fn extract_text(body: &[u8]) -> Result<String, RelayError> {
    let payload: Value = serde_json::from_slice(body).map_err(|_| RelayError::InvalidInput)?;
    payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(RelayError::InvalidInput)
}

#[tracing::instrument(skip(state, body), fields(body_len = body.len()))]
async fn analyze_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    counter!("analyze_requests_total").increment(1);

    let backend = state.backend.as_ref().ok_or(RelayError::Misconfiguration)?;
    let text = extract_text(&body)?;
    tracing::info!(text_len = text.len(), "Forwarding text to inference endpoint");

    let data = tokio::time::timeout(state.timeout, backend.infer(&text))
        .await
        .map_err(|_| RelayError::Timeout)??;

    let reply = if state.normalize_response {
        serde_json::to_value(normalize(&data)).unwrap_or_else(|_| Value::Array(Vec::new()))
    } else {
        match data {
            Value::Array(_) => data,
            other => Value::Array(vec![other]),
        }
    };

    tracing::info!("Analysis relayed successfully");
    Ok(Json(reply))
}
