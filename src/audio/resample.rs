//! Sample-rate and channel conversion for playback.
//!
//! Speech clips arrive at 24 kHz mono; output devices usually run at
//! 44.1/48 kHz with two or more channels.  [`convert_clip`] bridges the two:
//!
//! 1. [`downmix_to_mono`]: average any interleaved channels to mono.
//! 2. [`resample_linear`]: linear-interpolation resample to the device rate.
//! 3. [`upmix_mono`]: duplicate the mono signal into every device channel.
//!
//! Linear interpolation is plenty for speech.

use super::pcm::AudioClip;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging each frame.
///
/// * `channels == 1` returns the input unchanged.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use point_reader::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// upmix_mono
// ---------------------------------------------------------------------------

/// Repeat each mono sample `channels` times to build interleaved frames.
pub fn upmix_mono(mono: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => mono.to_vec(),
        n => mono
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(n as usize))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` to `target_rate` Hz.
///
/// Equal rates (or empty input) return the input unchanged.  The output
/// length is `ceil(samples.len() * target_rate / source_rate)`.
///
/// ```rust
/// use point_reader::audio::resample_linear;
///
/// let speech = vec![0.25_f32; 240]; // 10 ms @ 24 kHz
/// assert_eq!(resample_linear(&speech, 24_000, 48_000).len(), 480);
/// assert_eq!(resample_linear(&speech, 24_000, 24_000).len(), 240);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// convert_clip
// ---------------------------------------------------------------------------

/// Convert `clip` into interleaved samples for a device running at
/// `target_rate` Hz with `target_channels` channels.
pub fn convert_clip(clip: &AudioClip, target_rate: u32, target_channels: u16) -> Vec<f32> {
    if clip.sample_rate == target_rate && clip.channels == target_channels {
        return clip.samples.clone();
    }

    let mono = downmix_to_mono(&clip.samples, clip.channels);
    let resampled = resample_linear(&mono, clip.sample_rate, target_rate);
    upmix_mono(&resampled, target_channels)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
