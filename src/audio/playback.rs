//! Single-stream playback with supersession.
//!
//! [`PlaybackController`] owns at most one live stream.  Every
//! [`play`](PlaybackController::play) stops the previous stream before the
//! new one starts, and completion of a stopped stream is swallowed, so only
//! the newest clip can ever report that it finished.
//!
//! # Completion protocol
//!
//! ```text
//! play(pcm) ─▶ AudioOutput::start(id, clip, on_finished)
//!                         │
//!            end of clip  ▼
//!            on_finished() ── unless stopped ──▶ finished_tx.send(handle)
//!                                                       │
//!            owner receives handle ─▶ finish(handle) ───┘  true ⇔ still current
//! ```
//!
//! Two checks guard against stale completions: the per-stream cancel flag
//! (set by `stop`) stops the callback from sending, and `finish` rejects any
//! handle that is no longer the live one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use super::pcm::{decode_pcm16, AudioClip, PcmFormat};

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors raised while decoding or starting playback.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    #[error("no audio samples to play")]
    EmptyAudio,

    #[error("unsupported PCM format: {0}")]
    InvalidFormat(String),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("audio output failed: {0}")]
    Output(String),
}

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Identifies one started stream.  Handles are never reused by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(u64);

impl PlaybackHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// AudioOutput trait
// ---------------------------------------------------------------------------

/// Callback an [`AudioOutput`] invokes when a clip has played to its end.
pub type FinishedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A sink that can play one clip at a time.
///
/// # Contract
///
/// - `start` begins playing `clip` and calls `on_finished` at most once,
///   from any thread, after the last sample has been handed to the device.
/// - `stop` silences stream `id` immediately.  Unknown or already-stopped
///   ids are ignored.
pub trait AudioOutput: Send {
    fn start(
        &mut self,
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError>;

    fn stop(&mut self, id: u64);
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn start(
        &mut self,
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        (**self).start(id, clip, on_finished)
    }

    fn stop(&mut self, id: u64) {
        (**self).stop(id)
    }
}

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

struct ActivePlayback {
    handle: PlaybackHandle,
    /// Set once the stream is stopped or has reported completion.
    done: Arc<AtomicBool>,
}

/// Owns the single live playback stream.
pub struct PlaybackController<O: AudioOutput> {
    output: O,
    format: PcmFormat,
    next_id: u64,
    active: Option<ActivePlayback>,
    finished_tx: mpsc::UnboundedSender<PlaybackHandle>,
}

impl<O: AudioOutput> PlaybackController<O> {
    /// Create a controller that plays through `output`.
    ///
    /// Raw payloads passed to [`play`](Self::play) are interpreted with
    /// `format`.  Handles of streams that play to completion are sent on
    /// `finished_tx`.
    pub fn new(
        output: O,
        format: PcmFormat,
        finished_tx: mpsc::UnboundedSender<PlaybackHandle>,
    ) -> Self {
        Self {
            output,
            format,
            next_id: 0,
            active: None,
            finished_tx,
        }
    }

    /// Stop whatever is playing, then decode and start `pcm`.
    pub fn play(&mut self, pcm: &[u8]) -> Result<PlaybackHandle, PlaybackError> {
        self.stop_all();

        let clip = decode_pcm16(pcm, self.format)?;

        self.next_id += 1;
        let handle = PlaybackHandle(self.next_id);
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        let tx = self.finished_tx.clone();
        let on_finished: FinishedCallback = Box::new(move || {
            // `swap` makes the notification fire at most once and never after
            // an explicit stop.
            if !flag.swap(true, Ordering::AcqRel) {
                let _ = tx.send(handle);
            }
        });

        log::debug!(
            "playback: starting stream {} ({:.2} s)",
            handle.0,
            clip.duration_secs()
        );
        self.output.start(handle.0, clip, on_finished)?;
        self.active = Some(ActivePlayback { handle, done });
        Ok(handle)
    }

    /// Stop `handle` if it is still live.  Stale or repeated calls are no-ops.
    pub fn stop(&mut self, handle: PlaybackHandle) {
        if self.current() == Some(handle) {
            self.stop_all();
        }
    }

    /// Stop the live stream, if any.
    pub fn stop_all(&mut self) {
        if let Some(active) = self.active.take() {
            active.done.store(true, Ordering::Release);
            self.output.stop(active.handle.0);
            log::debug!("playback: stopped stream {}", active.handle.0);
        }
    }

    /// Acknowledge a completion received on the finished channel.
    ///
    /// Returns `true` when `handle` was the live stream, which is then
    /// released.  Superseded handles return `false`.
    pub fn finish(&mut self, handle: PlaybackHandle) -> bool {
        match &self.active {
            Some(active) if active.handle == handle => {
                self.active = None;
                self.output.stop(handle.0);
                log::debug!("playback: stream {} finished", handle.0);
                true
            }
            _ => {
                log::debug!("playback: ignoring completion of stale stream {}", handle.0);
                false
            }
        }
    }

    /// The live stream, if any.
    pub fn current(&self) -> Option<PlaybackHandle> {
        self.active.as_ref().map(|a| a.handle)
    }

    /// `true` while a stream is live.
    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: AudioOutput> Drop for PlaybackController<O> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
