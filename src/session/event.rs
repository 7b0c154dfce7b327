//! Inputs accepted by the session and completions it reacts to.

use crate::audio::PlaybackHandle;
use crate::region::Region;
use crate::service::{ServiceError, TranslationMode};

/// What the user tapped.
#[derive(Debug, Clone, PartialEq)]
pub enum TapTarget {
    /// Pixel position on the displayed image plus its rendered size.
    Point {
        x: f64,
        y: f64,
        rendered_width: f64,
        rendered_height: f64,
    },
    /// A region the presentation layer already resolved.
    Region(Region),
}

/// Events from the presentation layer.
#[derive(Debug, Clone)]
pub enum UserInput {
    /// Raw bytes of a newly selected image.
    ImageSelected(Vec<u8>),
    /// A tap; `mode` overrides the session's translation mode when set.
    Tap {
        target: TapTarget,
        mode: Option<TranslationMode>,
    },
    SetMode(TranslationMode),
    /// Drop the current image and return to `Idle`.
    Clear,
}

/// Result of an asynchronous step, tagged with the generation that
/// started it.
#[derive(Debug)]
pub enum Completion {
    Detected {
        generation: u64,
        result: Result<Vec<Region>, ServiceError>,
    },
    Translated {
        generation: u64,
        result: Result<String, ServiceError>,
    },
    Synthesized {
        generation: u64,
        result: Result<Vec<u8>, ServiceError>,
    },
    /// End of stream reported by the playback controller.
    PlaybackFinished(PlaybackHandle),
}
