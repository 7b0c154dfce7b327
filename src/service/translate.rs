//! Translation of tapped text before it is spoken.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::client::{response_text, GeminiClient};
use super::error::ServiceError;
use super::prompt::translation_prompt;

// ---------------------------------------------------------------------------
// TranslationMode
// ---------------------------------------------------------------------------

/// What happens to a tapped region's text before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TranslationMode {
    /// Speak the detected text as-is.
    #[default]
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "translate_en")]
    English,
    #[serde(rename = "translate_zh")]
    Chinese,
    #[serde(rename = "translate_es")]
    Spanish,
}

impl TranslationMode {
    pub const ALL: [TranslationMode; 4] = [
        TranslationMode::Original,
        TranslationMode::English,
        TranslationMode::Chinese,
        TranslationMode::Spanish,
    ];

    /// Language named in the translation prompt, `None` for
    /// [`Original`](Self::Original).
    pub fn target_language(&self) -> Option<&'static str> {
        match self {
            TranslationMode::Original => None,
            TranslationMode::English => Some("English"),
            TranslationMode::Chinese => Some("Chinese"),
            TranslationMode::Spanish => Some("Spanish"),
        }
    }

    /// Config / command-line key.
    pub fn key(&self) -> &'static str {
        match self {
            TranslationMode::Original => "original",
            TranslationMode::English => "translate_en",
            TranslationMode::Chinese => "translate_zh",
            TranslationMode::Spanish => "translate_es",
        }
    }

    /// Human-readable name shown in the status line.
    pub fn label(&self) -> &'static str {
        match self {
            TranslationMode::Original => "Original",
            TranslationMode::English => "To English",
            TranslationMode::Chinese => "To Chinese",
            TranslationMode::Spanish => "To Spanish",
        }
    }
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TranslationMode {
    type Err = String;

    /// Accepts the config key or a short alias (`en`, `zh`, `es`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "orig" => Ok(TranslationMode::Original),
            "translate_en" | "en" | "english" => Ok(TranslationMode::English),
            "translate_zh" | "zh" | "chinese" => Ok(TranslationMode::Chinese),
            "translate_es" | "es" | "spanish" => Ok(TranslationMode::Spanish),
            other => Err(format!(
                "unknown translation mode '{other}' (expected one of: original, translate_en, translate_zh, translate_es)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// Turns detected text into the text to speak for a given mode.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, ServiceError>;
}

#[async_trait]
impl Translator for GeminiClient {
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, ServiceError> {
        let Some(language) = mode.target_language() else {
            return Ok(text.to_string());
        };

        let body = json!({
            "contents": [{ "parts": [{ "text": translation_prompt(text, language) }] }]
        });

        let response = self.generate(&self.config().translation_model, &body).await?;
        let translated = response_text(&response).trim().to_string();

        if translated.is_empty() {
            log::warn!("gemini: empty translation, speaking source text");
            return Ok(text.to_string());
        }

        log::debug!("gemini: translated {:?} -> {:?}", text, translated);
        Ok(translated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
