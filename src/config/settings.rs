//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::PcmFormat;
use crate::service::TranslationMode;

/// A zero timeout would fail every call before it is sent.
const MIN_TIMEOUT_SECS: u64 = 1;

/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the generative-AI backend that performs text
/// detection, translation and speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the Gemini REST API.
    pub base_url: String,
    /// API key.  When `None`, the environment variables in
    /// [`API_KEY_ENV_VARS`] are consulted.
    pub api_key: Option<String>,
    /// Model that locates text and returns bounding boxes.
    pub detection_model: String,
    /// Model that translates tapped text.
    pub translation_model: String,
    /// Text-to-speech model.
    pub speech_model: String,
    /// Prebuilt voice used for synthesis.
    pub voice: String,
    /// Upper bound on any single service call, in seconds.  Values below
    /// one second are raised to one.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            detection_model: "gemini-3-flash-preview".into(),
            translation_model: "gemini-3-flash-preview".into(),
            speech_model: "gemini-2.5-flash-preview-tts".into(),
            voice: "Kore".into(),
            timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// The configured key, or the first non-empty key found in the
    /// environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                API_KEY_ENV_VARS.iter().find_map(|var| {
                    std::env::var(var)
                        .ok()
                        .map(|key| key.trim().to_string())
                        .filter(|key| !key.is_empty())
                })
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS))
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Layout of the raw PCM returned by the speech model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Sample rate of synthesised speech in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count of synthesised speech.
    pub channels: u16,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let format = PcmFormat::default();
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }
}

impl PlaybackConfig {
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Defaults applied when a new session starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Translation mode selected at startup.
    pub default_mode: TranslationMode,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use point_reader::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Generative-AI backend settings.
    pub service: ServiceConfig,
    /// Speech PCM layout.
    pub playback: PlaybackConfig,
    /// Session defaults.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
