use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::counter;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("missing or non-string text")]
    InvalidInput,

    #[error("inference endpoint returned status {status}")]
    Upstream { status: u16, body: Value },

    #[error("inference request exceeded its deadline")]
    Timeout,

    #[error("HF_TOKEN is not configured")]
    Misconfiguration,

    #[error("transport failure: {0}")]
    Network(String),

    #[error("rate limit exceeded")]
    RateLimited,
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Upstream { .. } => "upstream",
            Self::Timeout => "timeout",
            Self::Misconfiguration => "misconfiguration",
            Self::Network(_) => "network",
            Self::RateLimited => "rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Misconfiguration | Self::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::InvalidInput => json!({ "error": "Invalid text" }),
            Self::Upstream { body, .. } => json!({ "error": body }),
            Self::Timeout => json!({ "error": "HF request timeout" }),
            Self::Misconfiguration => {
                json!({ "error": "Server misconfigured: missing HF_TOKEN" })
            }
            Self::Network(message) => json!({ "error": "Server error", "details": message }),
            Self::RateLimited => {
                json!({ "error": "Too many requests, please try again later." })
            }
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::InvalidInput | Self::RateLimited => {
                tracing::debug!(kind = self.kind(), "Rejected request")
            }
            Self::Upstream { status, .. } => {
                tracing::warn!(upstream_status = status, "Inference endpoint failed")
            }
            Self::Timeout => tracing::warn!("Inference request timed out"),
            Self::Misconfiguration | Self::Network(_) => {
                tracing::error!(kind = self.kind(), error = %self, "Relay error")
            }
        }
        counter!("analyze_failures_total", "kind" => self.kind()).increment(1);

        (status, Json(self.body())).into_response()
    }
}
