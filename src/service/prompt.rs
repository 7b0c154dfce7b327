//! Prompts and response schemas sent to the generative model.

use serde_json::{json, Value};

/// Instruction sent alongside the image for text detection.
pub const DETECTION_PROMPT: &str = "\
Find all the text in this image.
For each distinct phrase or block of text, provide the exact text and its bounding box in [ymin, xmin, ymax, xmax] format.
The coordinates should be normalized from 0 to 1000.
Return the result as a JSON array of objects with keys \"text\" and \"box_2d\".";

/// JSON schema constraining the detection reply to
/// `[{ "text": string, "box_2d": [n, n, n, n] }, …]`.
pub fn detection_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "text": { "type": "STRING" },
                "box_2d": {
                    "type": "ARRAY",
                    "items": { "type": "NUMBER" },
                    "minItems": 4,
                    "maxItems": 4
                }
            },
            "required": ["text", "box_2d"]
        }
    })
}

/// Single-turn translation instruction.
///
/// ```rust
/// use point_reader::service::prompt::translation_prompt;
///
/// let p = translation_prompt("你好", "English");
/// assert!(p.contains("to English"));
/// assert!(p.ends_with("\"你好\""));
/// ```
pub fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text to {target_language}. \
         Only return the translated text without any explanation: \"{text}\""
    )
}
