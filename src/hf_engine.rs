use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::ApiToken;
use crate::engine::InferenceBackend;
use crate::error::RelayError;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HfConfig {
    pub inference_url: String,
    pub model_id: String,
    pub token: Option<ApiToken>,
}

/// Hosted inference client (`POST {inference_url}/{model_id}`).
pub struct HfInferenceClient {
    http: reqwest::Client,
    endpoint: String,
    token: ApiToken,
}

impl HfInferenceClient {
    /// Fails with [`RelayError::Misconfiguration`] when no token is set.
    pub fn new(config: HfConfig) -> Result<Self, RelayError> {
        let token = config.token.ok_or(RelayError::Misconfiguration)?;
        let endpoint = format!(
            "{}/{}",
            config.inference_url.trim_end_matches('/'),
            config.model_id
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceBackend for HfInferenceClient {
    #[tracing::instrument(skip(self, text), fields(endpoint = %self.endpoint, text_len = text.len()))]
    async fn infer(&self, text: &str) -> Result<Value, RelayError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.token.expose())
            .json(&json!({ "inputs": text }))
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let data: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        tracing::info!(
            status = status.as_u16(),
            preview = %preview(&data),
            "Inference endpoint responded"
        );

        if !status.is_success() {
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                body: data,
            });
        }

        Ok(data)
    }
}

fn preview(data: &Value) -> String {
    data.to_string().chars().take(PREVIEW_CHARS).collect()
}
