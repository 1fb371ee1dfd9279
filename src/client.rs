use serde_json::Value;

use crate::types::AnalyzeRequest;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("relay returned status {status}: {body}")]
    Status { status: u16, body: Value },

    #[error("relay returned an empty or non-JSON body")]
    EmptyBody,

    #[error("could not reach relay: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for a running relay's `/api/analyze` endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    analyze_url: String,
}

impl RelayClient {
    pub fn new(relay_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            analyze_url: format!("{}/api/analyze", relay_url.trim_end_matches('/')),
        }
    }

    /// Raw prediction payload for `text`, exactly as the relay returned it.
    #[tracing::instrument(skip(self, text), fields(url = %self.analyze_url))]
    pub async fn analyze(&self, text: &str) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(&self.analyze_url)
            .json(&AnalyzeRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let raw: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }
        if raw.is_null() {
            return Err(ClientError::EmptyBody);
        }

        Ok(raw)
    }
}
