//! Remote collaborators: text detection, translation and speech synthesis.
//!
//! Each capability is an `async` trait so the session can be driven by
//! test doubles.  [`GeminiClient`] implements all three against the Gemini
//! `generateContent` REST endpoint.
//!
//! ```text
//! image bytes ── TextDetector::detect ──▶ Vec<Region>
//! region text ── Translator::translate ─▶ text to speak
//! text ───────── SpeechSynthesizer::synthesize ─▶ PCM bytes
//! ```

pub mod client;
pub mod detect;
pub mod error;
pub mod prompt;
pub mod speech;
pub mod translate;

pub use client::GeminiClient;
pub use detect::{image_mime_type, parse_regions, TextDetector};
pub use error::{ErrorKind, ServiceError};
pub use speech::SpeechSynthesizer;
pub use translate::{TranslationMode, Translator};
