//! Decoding of raw synthesis output into playable `f32` samples.
//!
//! The speech service returns headerless little-endian signed 16-bit PCM.
//! Sample rate and channel count are not carried in the payload, so they
//! come from [`PcmFormat`] (24 kHz mono by default).

use super::playback::PlaybackError;

/// Scale factor between `i16` PCM and normalised `f32`.
const I16_SCALE: f32 = 32_768.0;

/// Layout of a raw PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

/// Decoded audio ready for an output device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Interleaved samples in roughly `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    /// Playing time in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// Decode little-endian `i16` PCM into an [`AudioClip`].
///
/// Each sample becomes `i16 / 32768.0`.  A trailing odd byte, or a trailing
/// partial frame for multi-channel audio, is dropped.
///
/// ```
/// use point_reader::audio::{decode_pcm16, PcmFormat};
///
/// // i16::MIN, 0, 16384
/// let clip = decode_pcm16(&[0x00, 0x80, 0x00, 0x00, 0x00, 0x40], PcmFormat::default()).unwrap();
/// assert_eq!(clip.samples, vec![-1.0, 0.0, 0.5]);
/// ```
pub fn decode_pcm16(bytes: &[u8], format: PcmFormat) -> Result<AudioClip, PlaybackError> {
    if format.channels == 0 || format.sample_rate == 0 {
        return Err(PlaybackError::InvalidFormat(format!(
            "{} Hz, {} channels",
            format.sample_rate, format.channels
        )));
    }

    if bytes.len() % 2 != 0 {
        log::warn!(
            "playback: PCM payload has odd length ({} bytes), dropping last byte",
            bytes.len()
        );
    }

    let mut samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE)
        .collect();

    let channels = format.channels as usize;
    let whole_frames = samples.len() / channels;
    samples.truncate(whole_frames * channels);

    if samples.is_empty() {
        return Err(PlaybackError::EmptyAudio);
    }

    Ok(AudioClip {
        samples,
        sample_rate: format.sample_rate,
        channels: format.channels,
    })
}
