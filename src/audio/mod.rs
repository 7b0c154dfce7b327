//! Audio playback: synthesis PCM → `f32` clip → output device.
//!
//! # Pipeline
//!
//! ```text
//! PCM bytes (i16 LE, 24 kHz mono) → decode_pcm16 → AudioClip
//!     → PlaybackController::play → AudioOutput (cpal thread)
//!         → convert_clip (resample + channel map) → device
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use point_reader::audio::{CpalOutput, PcmFormat, PlaybackController};
//!
//! # async fn example(pcm: Vec<u8>) {
//! let (finished_tx, mut finished_rx) = tokio::sync::mpsc::unbounded_channel();
//! let output = CpalOutput::new().unwrap();
//! let mut playback = PlaybackController::new(output, PcmFormat::default(), finished_tx);
//!
//! let handle = playback.play(&pcm).unwrap();
//! if let Some(done) = finished_rx.recv().await {
//!     assert!(playback.finish(done));
//!     assert_eq!(done, handle);
//! }
//! # }
//! ```

pub mod output;
pub mod pcm;
pub mod playback;
pub mod resample;

pub use output::{CpalOutput, SilentOutput};
pub use pcm::{decode_pcm16, AudioClip, PcmFormat};
pub use playback::{AudioOutput, FinishedCallback, PlaybackController, PlaybackError, PlaybackHandle};
pub use resample::{convert_clip, downmix_to_mono, resample_linear, upmix_mono};

// test-only re-export so the session tests can drive playback completion.
#[cfg(test)]
pub use output::ManualOutput;
