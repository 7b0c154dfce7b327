//! Thin `generateContent` client for the Gemini REST API.
//!
//! One [`GeminiClient`] serves all three collaborators (detection,
//! translation, speech).  It owns a single `reqwest::Client` configured with
//! the per-call timeout from [`ServiceConfig`].

use serde_json::Value;

use super::error::ServiceError;
use crate::config::ServiceConfig;

/// Header carrying the API key on every request.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    client: reqwest::Client,
    config: ServiceConfig,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Build a client from application config.
    ///
    /// The key is resolved once, here.  A missing key is not an error yet;
    /// every call then fails with [`ServiceError::MissingApiKey`] so the
    /// session can surface a configuration message at the point of use.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::with_api_key(config, config.resolve_api_key())
    }

    /// Build a client with an explicit key, bypassing the environment.
    pub fn with_api_key(config: &ServiceConfig, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!("gemini: no API key configured; service calls will fail");
        }

        Self {
            client,
            config: config.clone(),
            api_key,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` to `models/{model}:generateContent` and return the JSON
    /// reply.
    pub async fn generate(&self, model: &str, body: &Value) -> Result<Value, ServiceError> {
        let key = self.api_key.as_deref().ok_or(ServiceError::MissingApiKey)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        log::debug!("gemini: POST {url}");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            log::warn!("gemini: {model} returned HTTP {}: {message}", status.as_u16());
            return Err(ServiceError::from_status(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Extract `error.message` from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parts of the first candidate, or an empty slice.
pub fn candidate_parts(response: &Value) -> &[Value] {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Concatenated `text` of the first candidate's parts.
pub fn response_text(response: &Value) -> String {
    candidate_parts(response)
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect()
}

/// `finishReason` of the first candidate, or `"UNKNOWN"`.
pub fn finish_reason(response: &Value) -> String {
    response["candidates"][0]["finishReason"]
        .as_str()
        .unwrap_or("UNKNOWN")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        assert_eq!(error_message(body), "API key not valid");
        assert_eq!(error_message(" gateway down \n"), "gateway down");
    }

    #[test]
    fn response_text_joins_text_parts() {
        let reply = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Hel" }, { "inlineData": {} }, { "text": "lo" }
            ]}}]
        });
        assert_eq!(response_text(&reply), "Hello");
        assert_eq!(candidate_parts(&reply).len(), 3);
    }

    #[test]
    fn missing_candidates_yield_empty_values() {
        let reply = json!({});
        assert!(candidate_parts(&reply).is_empty());
        assert_eq!(response_text(&reply), "");
        assert_eq!(finish_reason(&reply), "UNKNOWN");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let client = GeminiClient::with_api_key(&ServiceConfig::default(), Some("  ".into()));
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn generate_without_key_fails_before_any_request() {
        let client = GeminiClient::with_api_key(&ServiceConfig::default(), None);
        let err = client.generate("m", &json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingApiKey));
    }
}
