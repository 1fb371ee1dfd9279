use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;

/// Upstream that turns text into a raw, unnormalized prediction payload.
#[async_trait]
pub trait InferenceBackend {
    async fn infer(&self, text: &str) -> Result<Value, RelayError>;
}
