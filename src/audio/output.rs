//! [`AudioOutput`] implementations.
//!
//! * [`CpalOutput`]: the system default output device via `cpal`.
//! * [`SilentOutput`]: a timer that "plays" for the clip's duration; used
//!   when no output device is available.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::pcm::AudioClip;
use super::playback::{AudioOutput, FinishedCallback, PlaybackError};
use super::resample::convert_clip;

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

enum OutputCommand {
    Start {
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
        reply: mpsc::Sender<Result<(), PlaybackError>>,
    },
    Stop {
        id: u64,
    },
}

/// Plays clips on the default output device.
///
/// `cpal::Stream` is not `Send` on every platform, so the device and the
/// live stream are owned by a dedicated `audio-output` thread; this handle
/// only forwards commands to it.  Dropping the handle ends the thread.
pub struct CpalOutput {
    commands: mpsc::Sender<OutputCommand>,
    sample_rate: u32,
    channels: u16,
}

impl CpalOutput {
    /// Open the default output device.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoDevice`] when the host has no output device, or
    /// [`PlaybackError::InvalidFormat`] when the device does not take `f32`
    /// samples.
    pub fn new() -> Result<Self, PlaybackError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || run_output_thread(command_rx, ready_tx))
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| PlaybackError::Output("audio thread exited during setup".into()))??;

        log::info!("playback: output device ready ({sample_rate} Hz, {channels} ch)");

        Ok(Self {
            commands: command_tx,
            sample_rate,
            channels,
        })
    }

    /// Native sample rate of the output device in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels the device expects.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl AudioOutput for CpalOutput {
    fn start(
        &mut self,
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(OutputCommand::Start {
                id,
                clip,
                on_finished,
                reply: reply_tx,
            })
            .map_err(|_| PlaybackError::Output("audio thread has stopped".into()))?;

        reply_rx
            .recv()
            .map_err(|_| PlaybackError::Output("audio thread has stopped".into()))?
    }

    fn stop(&mut self, id: u64) {
        let _ = self.commands.send(OutputCommand::Stop { id });
    }
}

fn run_output_thread(
    commands: mpsc::Receiver<OutputCommand>,
    ready: mpsc::Sender<Result<(u32, u16), PlaybackError>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready.send(Err(PlaybackError::NoDevice));
        return;
    };

    let supported = match device.default_output_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::Output(e.to_string())));
            return;
        }
    };

    if supported.sample_format() != cpal::SampleFormat::F32 {
        let _ = ready.send(Err(PlaybackError::InvalidFormat(format!(
            "device sample format {:?}",
            supported.sample_format()
        ))));
        return;
    }

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let config: cpal::StreamConfig = supported.into();
    let _ = ready.send(Ok((sample_rate, channels)));

    let mut current: Option<(u64, cpal::Stream)> = None;

    while let Ok(command) = commands.recv() {
        match command {
            OutputCommand::Start {
                id,
                clip,
                on_finished,
                reply,
            } => {
                // Dropping the old stream silences it at once.
                current = None;
                let samples = convert_clip(&clip, sample_rate, channels);
                let result = build_stream(&device, &config, samples, on_finished)
                    .map(|stream| current = Some((id, stream)));
                let _ = reply.send(result);
            }
            OutputCommand::Stop { id } => {
                if current.as_ref().is_some_and(|(live, _)| *live == id) {
                    current = None;
                }
            }
        }
    }

    log::debug!("playback: command channel closed, audio thread exiting");
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<f32>,
    on_finished: FinishedCallback,
) -> Result<cpal::Stream, PlaybackError> {
    let mut position = 0usize;
    let mut on_finished = Some(on_finished);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let n = (samples.len() - position).min(data.len());
                data[..n].copy_from_slice(&samples[position..position + n]);
                data[n..].fill(0.0);
                position += n;

                if position >= samples.len() {
                    if let Some(done) = on_finished.take() {
                        done();
                    }
                }
            },
            |err: cpal::StreamError| {
                log::error!("cpal output stream error: {err}");
            },
            None,
        )
        .map_err(|e| PlaybackError::Output(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Output(e.to_string()))?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// SilentOutput
// ---------------------------------------------------------------------------

/// Output that produces no sound but reports completion after the clip's
/// real duration, so the session behaves the same on headless machines.
#[derive(Default)]
pub struct SilentOutput {
    /// Id of the stream allowed to report completion; `0` means none.
    live: Arc<AtomicU64>,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for SilentOutput {
    fn start(
        &mut self,
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        self.live.store(id, Ordering::Release);
        let live = Arc::clone(&self.live);
        let duration = Duration::from_secs_f32(clip.duration_secs());

        std::thread::Builder::new()
            .name("silent-playback".into())
            .spawn(move || {
                std::thread::sleep(duration);
                if live.load(Ordering::Acquire) == id {
                    on_finished();
                }
            })
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        let _ = self
            .live
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

// ---------------------------------------------------------------------------
// ManualOutput  (test-only)
// ---------------------------------------------------------------------------

/// Test double whose clips only "finish" when the test says so.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct ManualOutput {
    inner: Arc<std::sync::Mutex<ManualState>>,
}

#[cfg(test)]
#[derive(Default)]
struct ManualState {
    started: Vec<u64>,
    stopped: Vec<u64>,
    clips: Vec<AudioClip>,
    callbacks: Vec<(u64, FinishedCallback)>,
    fail_next_start: bool,
}

#[cfg(test)]
impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids passed to `start`, in order.
    pub fn started(&self) -> Vec<u64> {
        self.inner.lock().unwrap().started.clone()
    }

    /// Ids passed to `stop`, in order, including repeated stops of the
    /// same id.
    pub fn stopped(&self) -> Vec<u64> {
        self.inner.lock().unwrap().stopped.clone()
    }

    /// Clips handed to the device, in order.
    pub fn clips(&self) -> Vec<AudioClip> {
        self.inner.lock().unwrap().clips.clone()
    }

    /// Make the next `start` fail with [`PlaybackError::Output`].
    pub fn fail_next_start(&self) {
        self.inner.lock().unwrap().fail_next_start = true;
    }

    /// Simulate the device reaching the end of clip `id`.
    pub fn finish(&self, id: u64) {
        let callback = {
            let mut st = self.inner.lock().unwrap();
            st.callbacks
                .iter()
                .position(|(cb_id, _)| *cb_id == id)
                .map(|pos| st.callbacks.remove(pos).1)
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[cfg(test)]
impl AudioOutput for ManualOutput {
    fn start(
        &mut self,
        id: u64,
        clip: AudioClip,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        let mut st = self.inner.lock().unwrap();
        if std::mem::take(&mut st.fail_next_start) {
            return Err(PlaybackError::Output("device unplugged".into()));
        }
        st.started.push(id);
        st.clips.push(clip);
        st.callbacks.push((id, on_finished));
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        let mut st = self.inner.lock().unwrap();
        // Only record stops of streams the device knows about; a real device
        // ignores unknown ids.
        if st.started.contains(&id) && !st.stopped.contains(&id) {
            st.stopped.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
