//! Session controller: drives the upload → detect → tap → speak loop.
//!
//! [`SessionController`] is the single owner of the [`Session`] and of the
//! [`PlaybackController`].  It reacts to two streams of events:
//!
//! * [`UserInput`]s from the presentation layer, handled synchronously by
//!   [`handle_input`](SessionController::handle_input);
//! * [`Completion`]s from spawned collaborator calls and from playback,
//!   handled by [`handle_completion`](SessionController::handle_completion).
//!
//! # Supersession
//!
//! Every upload, every tap that hits a region, and every clear bumps the
//! session generation.  Collaborator calls carry the generation that
//! started them and their completions are dropped once it is no longer
//! current.  The in-flight call of a superseded flow is also aborted, so at
//! most one call is outstanding per session.
//!
//! ```text
//! ImageSelected ──▶ [Uploading] ─validate─▶ [Detecting] ─detect()─▶ [Ready]
//! Tap(hit, original)  ──▶ [Speaking]    ─synthesize()─▶ play ─end─▶ [Ready]
//! Tap(hit, translate) ──▶ [Translating] ─translate()──▶ [Speaking] ─▶ …
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audio::{AudioOutput, PcmFormat, PlaybackController, PlaybackHandle};
use crate::region::{hit_index, normalize_click, Region};
use crate::service::{
    image_mime_type, ServiceError, SpeechSynthesizer, TextDetector, TranslationMode, Translator,
};

use super::event::{Completion, TapTarget, UserInput};
use super::state::{Session, SessionError, SessionSnapshot, Status};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The three remote capabilities the session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn TextDetector>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Collaborators {
    /// Use one value for all three roles (e.g. a `GeminiClient`).
    pub fn from_shared<T>(service: Arc<T>) -> Self
    where
        T: TextDetector + Translator + SpeechSynthesizer + 'static,
    {
        Self {
            detector: service.clone(),
            translator: service.clone(),
            synthesizer: service,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns the session and serialises every state change onto one task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use point_reader::audio::{PcmFormat, SilentOutput};
/// use point_reader::config::ServiceConfig;
/// use point_reader::service::{GeminiClient, TranslationMode};
/// use point_reader::session::{Collaborators, SessionController, UserInput};
///
/// # async fn example(image: Vec<u8>) {
/// let client = Arc::new(GeminiClient::from_config(&ServiceConfig::default()));
/// let controller = SessionController::new(
///     Collaborators::from_shared(client),
///     SilentOutput::new(),
///     PcmFormat::default(),
///     TranslationMode::Original,
///     Duration::from_secs(30),
/// );
/// let mut snapshots = controller.subscribe();
///
/// let (input_tx, input_rx) = tokio::sync::mpsc::channel(16);
/// tokio::spawn(controller.run(input_rx));
///
/// input_tx.send(UserInput::ImageSelected(image)).await.unwrap();
/// while snapshots.changed().await.is_ok() {
///     println!("{}", snapshots.borrow().status);
/// }
/// # }
/// ```
pub struct SessionController<O: AudioOutput> {
    session: Session,
    collaborators: Collaborators,
    playback: PlaybackController<O>,
    finished_rx: mpsc::UnboundedReceiver<PlaybackHandle>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Bumped whenever a new flow supersedes the current one.
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    call_timeout: Duration,
}

impl<O: AudioOutput> SessionController<O> {
    pub fn new(
        collaborators: Collaborators,
        output: O,
        format: PcmFormat,
        translation_mode: TranslationMode,
        call_timeout: Duration,
    ) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let session = Session::new(translation_mode);
        let (snapshot_tx, _) = watch::channel(session.snapshot());

        Self {
            session,
            collaborators,
            playback: PlaybackController::new(output, format, finished_tx),
            finished_rx,
            completion_tx,
            completion_rx,
            snapshot_tx,
            generation: 0,
            in_flight: None,
            call_timeout,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Receiver that observes a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn playback(&self) -> &PlaybackController<O> {
        &self.playback
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `inputs` is closed, then stop playback.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<UserInput>) {
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                Some(handle) = self.finished_rx.recv() => {
                    self.handle_completion(Completion::PlaybackFinished(handle));
                }
            }
        }

        self.abort_in_flight();
        self.playback.stop_all();
        log::info!("session: input channel closed, controller shutting down");
    }

    /// Wait for the next collaborator or playback completion.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        tokio::select! {
            Some(completion) = self.completion_rx.recv() => Some(completion),
            Some(handle) = self.finished_rx.recv() => Some(Completion::PlaybackFinished(handle)),
            else => None,
        }
    }

    // -----------------------------------------------------------------------
    // User input
    // -----------------------------------------------------------------------

    /// Apply one user event.  Must be called from inside a tokio runtime
    /// because collaborator calls are spawned as tasks.
    pub fn handle_input(&mut self, input: UserInput) {
        match input {
            UserInput::ImageSelected(bytes) => self.handle_image(bytes),
            UserInput::Tap { target, mode } => self.handle_tap(target, mode),
            UserInput::SetMode(mode) => {
                log::debug!("session: translation mode → {mode}");
                self.session.translation_mode = mode;
                self.publish();
            }
            UserInput::Clear => {
                log::debug!("session: cleared");
                self.supersede();
                self.session.reset();
                self.publish();
            }
        }
    }

    fn handle_image(&mut self, bytes: Vec<u8>) {
        self.supersede();
        self.session.reset();
        self.session.status = Status::Uploading;
        self.publish();

        if let Err(e) = image_mime_type(&bytes) {
            log::warn!("session: rejected image ({} bytes): {e}", bytes.len());
            self.fail_session(&e);
            return;
        }

        log::info!("session: image loaded ({} bytes), detecting text", bytes.len());
        self.session.status = Status::Detecting;
        self.publish();

        let detector = Arc::clone(&self.collaborators.detector);
        let generation = self.generation;
        self.spawn_call(
            async move { detector.detect(&bytes).await },
            move |result| Completion::Detected { generation, result },
        );
    }

    fn handle_tap(&mut self, target: TapTarget, mode: Option<TranslationMode>) {
        if !self.session.status.accepts_taps() {
            log::debug!("session: ignoring tap while {}", self.session.status);
            return;
        }

        let (region, index) = match target {
            TapTarget::Point {
                x,
                y,
                rendered_width,
                rendered_height,
            } => {
                let point = match normalize_click(x, y, rendered_width, rendered_height) {
                    Ok(point) => point,
                    Err(e) => {
                        log::debug!("session: ignoring tap: {e}");
                        return;
                    }
                };
                match hit_index(point, &self.session.regions) {
                    Some(index) => (self.session.regions[index].clone(), Some(index)),
                    None => {
                        log::debug!("session: tap at ({:.0}, {:.0}) hit no region", point.x, point.y);
                        return;
                    }
                }
            }
            TapTarget::Region(region) => {
                let index = self.session.regions.iter().position(|r| *r == region);
                (region, index)
            }
        };

        if let Some(mode) = mode {
            self.session.translation_mode = mode;
        }
        self.start_utterance(region, index);
    }

    fn start_utterance(&mut self, region: Region, index: Option<usize>) {
        self.supersede();

        let mode = self.session.translation_mode;
        let text = region.text.clone();
        log::info!("session: reading {:?} ({})", text, mode.label());

        self.session.set_active(region, index);
        self.session.last_error = None;

        if mode == TranslationMode::Original {
            self.session.status = Status::Speaking;
            self.publish();
            self.spawn_synthesis(text);
        } else {
            self.session.status = Status::Translating;
            self.publish();

            let translator = Arc::clone(&self.collaborators.translator);
            let generation = self.generation;
            self.spawn_call(
                async move { translator.translate(&text, mode).await },
                move |result| Completion::Translated { generation, result },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    /// Apply one completion.  Completions from superseded flows are ignored.
    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Detected { generation, result } => {
                if !self.is_current(generation, Status::Detecting) {
                    return;
                }
                match result {
                    Ok(regions) => {
                        log::info!("session: {} regions ready", regions.len());
                        self.session.regions = regions;
                        self.session.status = Status::Ready;
                        self.publish();
                    }
                    Err(e) => {
                        log::error!("session: detection failed: {e}");
                        self.fail_session(&e);
                    }
                }
            }
            Completion::Translated { generation, result } => {
                if !self.is_current(generation, Status::Translating) {
                    return;
                }
                match result {
                    Ok(text) => {
                        self.session.status = Status::Speaking;
                        self.publish();
                        self.spawn_synthesis(text);
                    }
                    Err(e) => {
                        log::warn!("session: translation failed: {e}");
                        self.fail_utterance(SessionError::from(&e));
                    }
                }
            }
            Completion::Synthesized { generation, result } => {
                if !self.is_current(generation, Status::Speaking) {
                    return;
                }
                self.in_flight = None;
                let pcm = match result {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        log::warn!("session: synthesis failed: {e}");
                        self.fail_utterance(SessionError::from(&e));
                        return;
                    }
                };
                if let Err(e) = self.playback.play(&pcm) {
                    log::warn!("session: playback failed: {e}");
                    self.fail_utterance(SessionError::from(&e));
                }
            }
            Completion::PlaybackFinished(handle) => {
                if !self.playback.finish(handle) || self.session.status != Status::Speaking {
                    return;
                }
                log::debug!("session: utterance finished");
                self.session.clear_active();
                self.session.status = Status::Ready;
                self.publish();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn is_current(&self, generation: u64, expected: Status) -> bool {
        if generation != self.generation || self.session.status != expected {
            log::debug!(
                "session: dropping stale completion (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        true
    }

    /// Start a new flow: cancel the old one and silence its audio.
    fn supersede(&mut self) {
        self.generation += 1;
        self.abort_in_flight();
        self.playback.stop_all();
    }

    fn abort_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn spawn_synthesis(&mut self, text: String) {
        let synthesizer = Arc::clone(&self.collaborators.synthesizer);
        let generation = self.generation;
        self.spawn_call(
            async move { synthesizer.synthesize(&text).await },
            move |result| Completion::Synthesized { generation, result },
        );
    }

    /// Run one collaborator call under the session timeout and post its
    /// result back as a [`Completion`].
    fn spawn_call<T, F, W>(&mut self, call: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ServiceError>> + Send + 'static,
        W: FnOnce(Result<T, ServiceError>) -> Completion + Send + 'static,
    {
        self.abort_in_flight();

        let tx = self.completion_tx.clone();
        let limit = self.call_timeout;
        self.in_flight = Some(tokio::spawn(async move {
            let result = tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ServiceError::Timeout));
            let _ = tx.send(wrap(result));
        }));
    }

    /// Detection-stage failure: the image session is unusable.
    fn fail_session(&mut self, error: &ServiceError) {
        self.in_flight = None;
        self.session.regions.clear();
        self.session.clear_active();
        self.session.last_error = Some(SessionError::from(error));
        self.session.status = Status::Error;
        self.publish();
    }

    /// Utterance failure: regions stay, the session returns to `Ready`.
    fn fail_utterance(&mut self, error: SessionError) {
        self.in_flight = None;
        self.playback.stop_all();
        self.session.clear_active();
        self.session.last_error = Some(error);
        self.session.status = Status::Ready;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.session.snapshot());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::audio::ManualOutput;
    use crate::region::BoundingBox;
    use crate::service::ErrorKind;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    const PNG_MAGIC: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    struct MockDetector(Result<Vec<Region>, ServiceError>);

    #[async_trait]
    impl TextDetector for MockDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<Region>, ServiceError> {
            self.0.clone()
        }
    }

    /// Detector that never answers within the test timeout.
    struct SlowDetector;

    #[async_trait]
    impl TextDetector for SlowDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<Region>, ServiceError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    /// Answers each upload with the next region set in line.
    struct SequenceDetector(Mutex<VecDeque<Vec<Region>>>);

    impl SequenceDetector {
        fn new(sets: Vec<Vec<Region>>) -> Self {
            Self(Mutex::new(sets.into()))
        }
    }

    #[async_trait]
    impl TextDetector for SequenceDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<Region>, ServiceError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MockTranslator {
        calls: Mutex<Vec<(String, TranslationMode)>>,
        fail: bool,
    }

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(
            &self,
            text: &str,
            mode: TranslationMode,
        ) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push((text.to_string(), mode));
            if self.fail {
                return Err(ServiceError::Request("connection reset".into()));
            }
            Ok(format!("{text} ({})", mode.key()))
        }
    }

    #[derive(Default)]
    struct MockSynthesizer {
        texts: Mutex<Vec<String>>,
        fail: Option<ServiceError>,
    }

    #[async_trait]
    impl SpeechSynthesizer for MockSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
            self.texts.lock().unwrap().push(text.to_string());
            match &self.fail {
                Some(e) => Err(e.clone()),
                None => Ok(vec![0u8; 480]),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn sample_regions() -> Vec<Region> {
        vec![
            Region::new("Hello", BoundingBox::new(100, 100, 200, 300)),
            Region::new("lo", BoundingBox::new(150, 250, 180, 290)),
        ]
    }

    struct Harness {
        ctl: SessionController<ManualOutput>,
        output: ManualOutput,
        translator: Arc<MockTranslator>,
        synthesizer: Arc<MockSynthesizer>,
    }

    fn harness_with(
        detector: Arc<dyn TextDetector>,
        translator: MockTranslator,
        synthesizer: MockSynthesizer,
        timeout: Duration,
    ) -> Harness {
        let output = ManualOutput::new();
        let translator = Arc::new(translator);
        let synthesizer = Arc::new(synthesizer);
        let collaborators = Collaborators {
            detector,
            translator: translator.clone(),
            synthesizer: synthesizer.clone(),
        };
        let ctl = SessionController::new(
            collaborators,
            output.clone(),
            PcmFormat::default(),
            TranslationMode::Original,
            timeout,
        );
        Harness {
            ctl,
            output,
            translator,
            synthesizer,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(MockDetector(Ok(sample_regions()))),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        )
    }

    async fn step(ctl: &mut SessionController<ManualOutput>) {
        let completion = tokio::time::timeout(Duration::from_secs(2), ctl.next_completion())
            .await
            .expect("completion within 2 s")
            .expect("completion channel open");
        ctl.handle_completion(completion);
    }

    /// Upload the sample image and wait for detection.
    async fn ready(h: &mut Harness) {
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        assert_eq!(h.ctl.session().status, Status::Detecting);
        step(&mut h.ctl).await;
        assert_eq!(h.ctl.session().status, Status::Ready);
    }

    fn tap_pixel(x: f64, y: f64, mode: TranslationMode) -> UserInput {
        UserInput::Tap {
            target: TapTarget::Point {
                x,
                y,
                rendered_width: 1000.0,
                rendered_height: 1000.0,
            },
            mode: Some(mode),
        }
    }

    fn tap_region(region: &Region, mode: TranslationMode) -> UserInput {
        UserInput::Tap {
            target: TapTarget::Region(region.clone()),
            mode: Some(mode),
        }
    }

    // -----------------------------------------------------------------------
    // Upload and detection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_detects_regions() {
        let mut h = harness();
        let mut rx = h.ctl.subscribe();
        ready(&mut h).await;

        assert_eq!(h.ctl.session().regions, sample_regions());
        assert!(h.ctl.session().active_region.is_none());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, Status::Ready);
    }

    #[tokio::test]
    async fn unreadable_image_is_an_input_error() {
        let mut h = harness();
        h.ctl.handle_input(UserInput::ImageSelected(b"not an image".to_vec()));

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Error);
        assert_eq!(session.last_error.as_ref().unwrap().kind, ErrorKind::Input);
    }

    #[tokio::test]
    async fn detection_failure_moves_to_error() {
        let mut h = harness_with(
            Arc::new(MockDetector(Err(ServiceError::from_status(500, "internal")))),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        step(&mut h.ctl).await;

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Error);
        assert_eq!(session.last_error.as_ref().unwrap().kind, ErrorKind::Service);
        assert!(session.regions.is_empty());
    }

    #[tokio::test]
    async fn missing_key_surfaces_configuration_message() {
        let mut h = harness_with(
            Arc::new(MockDetector(Err(ServiceError::MissingApiKey))),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        step(&mut h.ctl).await;

        let snap = h.ctl.snapshot();
        assert_eq!(snap.status, Status::Error);
        assert_eq!(
            snap.error_message(),
            Some(ErrorKind::Configuration.user_message())
        );
    }

    #[tokio::test]
    async fn slow_detection_times_out_as_network_error() {
        let mut h = harness_with(
            Arc::new(SlowDetector),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_millis(50),
        );
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        step(&mut h.ctl).await;

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Error);
        assert_eq!(session.last_error.as_ref().unwrap().kind, ErrorKind::Network);
    }

    #[tokio::test]
    async fn new_upload_replaces_regions_and_recovers_from_error() {
        let mut h = harness();
        h.ctl.handle_input(UserInput::ImageSelected(Vec::new()));
        assert_eq!(h.ctl.session().status, Status::Error);

        ready(&mut h).await;
        assert!(h.ctl.session().last_error.is_none());
        assert_eq!(h.ctl.session().regions.len(), 2);
    }

    #[tokio::test]
    async fn second_upload_replaces_region_set() {
        let menu = Region::new("Menu", BoundingBox::new(500, 500, 600, 700));
        let mut h = harness_with(
            Arc::new(SequenceDetector::new(vec![
                sample_regions(),
                vec![menu.clone()],
            ])),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        ready(&mut h).await;
        assert_eq!(h.ctl.session().regions, sample_regions());

        ready(&mut h).await;
        assert_eq!(h.ctl.session().regions, vec![menu]);
    }

    #[tokio::test]
    async fn late_detection_of_replaced_image_is_ignored() {
        let mut h = harness_with(
            Arc::new(SlowDetector),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        let first = h.ctl.generation();
        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        assert!(h.ctl.generation() > first);

        h.ctl.handle_completion(Completion::Detected {
            generation: first,
            result: Ok(sample_regions()),
        });
        h.ctl.handle_completion(Completion::Detected {
            generation: first,
            result: Err(ServiceError::from_status(500, "internal")),
        });

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Detecting);
        assert!(session.regions.is_empty());
        assert!(session.last_error.is_none());
    }

    #[tokio::test]
    async fn upload_while_speaking_stops_audio() {
        let mut h = harness();
        ready(&mut h).await;
        h.ctl.handle_input(tap_region(&sample_regions()[0], TranslationMode::Original));
        step(&mut h.ctl).await;
        let live = h.output.started()[0];
        assert!(h.ctl.playback().is_playing());

        h.ctl.handle_input(UserInput::ImageSelected(PNG_MAGIC.to_vec()));
        assert_eq!(h.output.stopped(), vec![live]);
        assert!(!h.ctl.playback().is_playing());
        assert_eq!(h.ctl.session().status, Status::Detecting);
        assert!(h.ctl.session().active_region.is_none());

        step(&mut h.ctl).await;
        assert_eq!(h.ctl.session().status, Status::Ready);
        assert_eq!(h.ctl.session().regions.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Taps
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_tap_reads_the_smaller_region() {
        let mut h = harness();
        ready(&mut h).await;

        h.ctl.handle_input(tap_pixel(270.0, 160.0, TranslationMode::Original));
        assert_eq!(h.ctl.session().status, Status::Speaking);
        assert_eq!(h.ctl.session().active_region.as_ref().unwrap().text, "lo");

        step(&mut h.ctl).await;
        assert_eq!(*h.synthesizer.texts.lock().unwrap(), vec!["lo".to_string()]);
        let started = h.output.started();
        assert_eq!(started.len(), 1);
        // 480 bytes of 16-bit mono PCM.
        assert_eq!(h.output.clips()[0].frames(), 240);
        assert_eq!(h.ctl.session().status, Status::Speaking);
        assert!(h.ctl.snapshot().overlays[1].active);

        h.output.finish(started[0]);
        step(&mut h.ctl).await;
        assert_eq!(h.ctl.session().status, Status::Ready);
        assert!(h.ctl.session().active_region.is_none());
        assert!(h.translator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn translate_mode_passes_through_translating() {
        let mut h = harness();
        ready(&mut h).await;
        let mut rx = h.ctl.subscribe();

        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::English));
        assert_eq!(rx.borrow_and_update().status, Status::Translating);
        assert_eq!(h.ctl.session().active_region.as_ref().unwrap().text, "Hello");

        step(&mut h.ctl).await;
        assert_eq!(h.ctl.session().status, Status::Speaking);

        step(&mut h.ctl).await;
        assert_eq!(
            *h.synthesizer.texts.lock().unwrap(),
            vec!["Hello (translate_en)".to_string()]
        );
        assert_eq!(
            *h.translator.calls.lock().unwrap(),
            vec![("Hello".to_string(), TranslationMode::English)]
        );
    }

    #[tokio::test]
    async fn identical_regions_highlight_only_the_tapped_one() {
        let twin = Region::new("Exit", BoundingBox::new(400, 400, 450, 500));
        let mut h = harness_with(
            Arc::new(MockDetector(Ok(vec![twin.clone(), twin]))),
            MockTranslator::default(),
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        ready(&mut h).await;

        h.ctl.handle_input(tap_pixel(450.0, 420.0, TranslationMode::Original));

        let snap = h.ctl.snapshot();
        assert_eq!(snap.status, Status::Speaking);
        let active: Vec<bool> = snap.overlays.iter().map(|o| o.active).collect();
        assert_eq!(active, vec![true, false]);
    }

    #[tokio::test]
    async fn tap_outside_all_regions_changes_nothing() {
        let mut h = harness();
        ready(&mut h).await;
        let generation = h.ctl.generation();

        h.ctl.handle_input(tap_pixel(900.0, 900.0, TranslationMode::Original));

        assert_eq!(h.ctl.session().status, Status::Ready);
        assert!(h.ctl.session().active_region.is_none());
        assert_eq!(h.ctl.generation(), generation);
    }

    #[tokio::test]
    async fn tap_on_unrendered_image_is_ignored() {
        let mut h = harness();
        ready(&mut h).await;

        h.ctl.handle_input(UserInput::Tap {
            target: TapTarget::Point {
                x: 10.0,
                y: 10.0,
                rendered_width: 0.0,
                rendered_height: 0.0,
            },
            mode: None,
        });

        assert_eq!(h.ctl.session().status, Status::Ready);
        assert!(h.ctl.session().last_error.is_none());
    }

    #[tokio::test]
    async fn taps_before_detection_are_ignored() {
        let mut h = harness();
        h.ctl.handle_input(tap_region(&sample_regions()[0], TranslationMode::Original));
        assert_eq!(h.ctl.session().status, Status::Idle);
        assert!(h.ctl.session().active_region.is_none());
    }

    #[tokio::test]
    async fn stale_translation_does_not_touch_newer_flow() {
        let mut h = harness();
        ready(&mut h).await;
        let [hello, lo]: [Region; 2] = sample_regions().try_into().unwrap();

        h.ctl.handle_input(tap_region(&hello, TranslationMode::Chinese));
        let first = h.ctl.generation();
        h.ctl.handle_input(tap_region(&lo, TranslationMode::Chinese));
        assert!(h.ctl.generation() > first);

        // Generation 1's translation resolves late.
        h.ctl.handle_completion(Completion::Translated {
            generation: first,
            result: Ok("你好".into()),
        });
        assert_eq!(h.ctl.session().status, Status::Translating);
        assert_eq!(h.ctl.session().active_region.as_ref(), Some(&lo));

        h.ctl.handle_completion(Completion::Translated {
            generation: first,
            result: Err(ServiceError::Timeout),
        });
        assert!(h.ctl.session().last_error.is_none());
        assert_eq!(h.ctl.session().active_region.as_ref(), Some(&lo));
    }

    #[tokio::test]
    async fn new_tap_while_speaking_stops_old_audio() {
        let mut h = harness();
        ready(&mut h).await;
        let [hello, lo]: [Region; 2] = sample_regions().try_into().unwrap();

        h.ctl.handle_input(tap_region(&hello, TranslationMode::Original));
        step(&mut h.ctl).await;
        let first = h.output.started()[0];

        h.ctl.handle_input(tap_region(&lo, TranslationMode::Original));
        assert_eq!(h.output.stopped(), vec![first]);
        assert!(!h.ctl.playback().is_playing());

        // The old clip reaching its end must not end the new flow.
        h.output.finish(first);
        step(&mut h.ctl).await;
        assert_eq!(h.ctl.session().status, Status::Speaking);
        assert_eq!(h.ctl.session().active_region.as_ref(), Some(&lo));
        assert_eq!(h.output.started().len(), 2);
    }

    #[tokio::test]
    async fn translation_failure_returns_to_ready_with_error() {
        let mut h = harness_with(
            Arc::new(MockDetector(Ok(sample_regions()))),
            MockTranslator {
                fail: true,
                ..MockTranslator::default()
            },
            MockSynthesizer::default(),
            Duration::from_secs(5),
        );
        ready(&mut h).await;

        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Spanish));
        step(&mut h.ctl).await;

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Ready);
        assert!(session.active_region.is_none());
        assert_eq!(session.last_error.as_ref().unwrap().kind, ErrorKind::Network);
        assert_eq!(session.regions.len(), 2);
        assert!(h.synthesizer.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_audio_returns_to_ready_with_service_error() {
        let mut h = harness_with(
            Arc::new(MockDetector(Ok(sample_regions()))),
            MockTranslator::default(),
            MockSynthesizer {
                fail: Some(ServiceError::NoAudio {
                    finish_reason: "SAFETY".into(),
                }),
                ..MockSynthesizer::default()
            },
            Duration::from_secs(5),
        );
        ready(&mut h).await;

        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Original));
        step(&mut h.ctl).await;

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Ready);
        assert!(session.active_region.is_none());
        assert_eq!(session.last_error.as_ref().unwrap().kind, ErrorKind::Service);
        assert!(h.output.started().is_empty());
    }

    #[tokio::test]
    async fn playback_start_failure_returns_to_ready() {
        let mut h = harness();
        ready(&mut h).await;
        h.output.fail_next_start();

        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Original));
        step(&mut h.ctl).await;

        assert_eq!(h.ctl.session().status, Status::Ready);
        assert!(h.ctl.session().last_error.is_some());
    }

    #[tokio::test]
    async fn successful_tap_clears_previous_error() {
        let mut h = harness();
        ready(&mut h).await;
        h.output.fail_next_start();
        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Original));
        step(&mut h.ctl).await;
        assert!(h.ctl.session().last_error.is_some());

        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Original));
        assert!(h.ctl.session().last_error.is_none());
    }

    // -----------------------------------------------------------------------
    // Mode and clear
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tap_without_mode_uses_session_mode() {
        let mut h = harness();
        ready(&mut h).await;
        h.ctl.handle_input(UserInput::SetMode(TranslationMode::Chinese));

        h.ctl.handle_input(UserInput::Tap {
            target: TapTarget::Region(sample_regions()[0].clone()),
            mode: None,
        });
        assert_eq!(h.ctl.session().status, Status::Translating);
        assert_eq!(h.ctl.session().translation_mode, TranslationMode::Chinese);
    }

    #[tokio::test]
    async fn clear_stops_audio_and_returns_to_idle() {
        let mut h = harness();
        ready(&mut h).await;
        h.ctl.handle_input(tap_pixel(150.0, 120.0, TranslationMode::Original));
        step(&mut h.ctl).await;
        let started = h.output.started()[0];

        h.ctl.handle_input(UserInput::Clear);

        let session = h.ctl.session();
        assert_eq!(session.status, Status::Idle);
        assert!(session.regions.is_empty());
        assert!(session.active_region.is_none());
        assert_eq!(h.output.stopped(), vec![started]);
    }

    #[tokio::test]
    async fn run_processes_inputs_until_channel_closes() {
        let h = harness();
        let mut snapshots = h.ctl.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(h.ctl.run(rx));

        tx.send(UserInput::ImageSelected(PNG_MAGIC.to_vec()))
            .await
            .unwrap();

        let ready = tokio::time::timeout(
            Duration::from_secs(2),
            snapshots.wait_for(|s| s.status == Status::Ready),
        )
        .await
        .expect("ready within 2 s")
        .expect("controller alive")
        .clone();
        assert_eq!(ready.regions.len(), 2);
        assert_eq!(ready.overlays.len(), 2);

        drop(tx);
        task.await.unwrap();
    }
}
