//! Speech synthesis: text in, raw 16-bit PCM out.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

use super::client::{candidate_parts, finish_reason, GeminiClient};
use super::error::ServiceError;

/// Produces little-endian `i16` PCM for a piece of text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    /// The reply may split audio across several `inlineData` parts; they are
    /// decoded and concatenated in order.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyText);
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.config().voice }
                    }
                }
            }
        });

        let response = self.generate(&self.config().speech_model, &body).await?;

        let mut pcm = Vec::new();
        let mut chunks = 0usize;
        for data in candidate_parts(&response)
            .iter()
            .filter_map(|part| part["inlineData"]["data"].as_str())
        {
            let bytes = BASE64
                .decode(data)
                .map_err(|e| ServiceError::Parse(format!("audio chunk: {e}")))?;
            pcm.extend_from_slice(&bytes);
            chunks += 1;
        }

        if pcm.is_empty() {
            return Err(ServiceError::NoAudio {
                finish_reason: finish_reason(&response),
            });
        }

        log::debug!("gemini: synthesised {} bytes in {chunks} chunk(s)", pcm.len());
        Ok(pcm)
    }
}
