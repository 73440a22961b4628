use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Inference service returned {status}")]
    Downstream { status: u16, body: Value },
}

/// Thin client for the Python inference process. One POST per prediction,
/// bounded by the configured timeout; no retries.
#[derive(Clone)]
pub struct InferenceClient {
    http_client: HttpClient,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn predict(&self, payload: &Value) -> Result<Value, InferenceError> {
        let url = format!("{}/predict", self.base_url);

        let response = self.http_client.post(&url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Keep the downstream body intact for the caller's `details`,
            // whether or not it was JSON.
            let body =
                serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            return Err(InferenceError::Downstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
