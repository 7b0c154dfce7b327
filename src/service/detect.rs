//! Text detection: image bytes in, located text regions out.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

use super::client::{response_text, GeminiClient};
use super::error::ServiceError;
use super::prompt::{detection_schema, DETECTION_PROMPT};
use crate::region::{BoundingBox, Region, NORMALIZED_MAX};

// ---------------------------------------------------------------------------
// TextDetector trait
// ---------------------------------------------------------------------------

/// Locates text in an image.
///
/// Returned boxes are `[ymin, xmin, ymax, xmax]` on the 0–1000 grid; the
/// order is the service's detection order and is significant for
/// tie-breaking during hit testing.
#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Region>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// MIME type of an encoded image, sniffed from its magic bytes.
///
/// ```
/// use point_reader::service::image_mime_type;
///
/// let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
/// assert_eq!(image_mime_type(&png).unwrap(), "image/png");
/// assert!(image_mime_type(b"plain text").is_err());
/// ```
pub fn image_mime_type(bytes: &[u8]) -> Result<&'static str, ServiceError> {
    if bytes.is_empty() {
        return Err(ServiceError::InvalidImage("image is empty".into()));
    }
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .map_err(|e| ServiceError::InvalidImage(e.to_string()))
}

#[derive(Deserialize)]
struct WireRegion {
    text: String,
    box_2d: Vec<f64>,
}

/// Parse the model's JSON reply into regions.
///
/// Blank replies mean "no text".  Markdown code fences are tolerated.
/// Entries whose box does not have exactly four numbers are skipped;
/// coordinates are rounded and clamped into `0..=1000`.
pub fn parse_regions(reply: &str) -> Result<Vec<Region>, ServiceError> {
    let body = strip_code_fence(reply.trim());
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let wire: Vec<WireRegion> =
        serde_json::from_str(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    let regions = wire
        .into_iter()
        .filter_map(|w| {
            let Ok([ymin, xmin, ymax, xmax]) = <[f64; 4]>::try_from(w.box_2d.as_slice()) else {
                log::warn!(
                    "gemini: skipping region {:?} with {} box values",
                    w.text,
                    w.box_2d.len()
                );
                return None;
            };
            let bounds = BoundingBox::new(
                to_grid(ymin),
                to_grid(xmin),
                to_grid(ymax),
                to_grid(xmax),
            );
            Some(Region::new(w.text, bounds))
        })
        .collect();

    Ok(regions)
}

fn to_grid(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, NORMALIZED_MAX as f64) as u16
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// Gemini implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TextDetector for GeminiClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Region>, ServiceError> {
        let mime_type = image_mime_type(image)?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": BASE64.encode(image) } },
                    { "text": DETECTION_PROMPT }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": detection_schema()
            }
        });

        let response = self.generate(&self.config().detection_model, &body).await?;
        let regions = parse_regions(&response_text(&response))?;
        log::info!("gemini: detected {} text regions", regions.len());
        Ok(regions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
