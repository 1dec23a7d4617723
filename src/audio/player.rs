//! Recitation player
//!
//! Owns the reciter selection, the playback request and the derived locator,
//! and commands a [`MediaBackend`]. The backend is created on first use and
//! re-pointed afterwards.

use super::backend::{MediaBackend, PlaybackError};
use super::locator::AudioSource;
use crate::models::{PlaybackRequest, PlaybackState, ReciterId};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// How a play request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// A later pause or source change made this request stale
    Superseded,
    Failed,
}

/// Playback state shared with play futures and completion handlers
#[derive(Clone, Default)]
pub struct SharedPlaybackState {
    inner: Arc<Mutex<PlaybackInner>>,
}

#[derive(Default)]
struct PlaybackInner {
    state: PlaybackState,
    /// Advanced by play, pause and source changes
    request: u64,
    /// Advanced by source changes only
    source: u64,
}

impl SharedPlaybackState {
    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    /// Start a new play request and return its generation
    fn begin_request(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.request += 1;
        inner.request
    }

    fn pause(&self) {
        let mut inner = self.inner.lock();
        inner.request += 1;
        inner.state = PlaybackState::Paused;
    }

    /// Invalidate pending requests for a new source, returning its epoch
    fn next_source(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.request += 1;
        inner.source += 1;
        inner.source
    }

    /// Mark playing if `request` is still the latest request
    fn resolve_play(&self, request: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.request != request {
            return false;
        }
        inner.state = PlaybackState::Playing;
        true
    }

    /// Natural end of the track loaded for `source`
    fn finish(&self, source: u64) {
        let mut inner = self.inner.lock();
        if inner.source == source {
            inner.state = PlaybackState::Paused;
        }
    }
}

type BackendFactory<B> = Box<dyn FnMut(&str) -> B>;

/// Plays one verse at a time for the selected reciter
pub struct AudioPlayer<B: MediaBackend> {
    source: AudioSource,
    request: PlaybackRequest,
    reciter: ReciterId,
    locator: String,
    playback: SharedPlaybackState,
    backend: Option<B>,
    open_backend: BackendFactory<B>,
}

impl<B: MediaBackend> AudioPlayer<B> {
    /// Create a player for `request` with the default reciter
    ///
    /// `open_backend` is called once, with the first derived locator.
    pub fn new(
        source: AudioSource,
        request: PlaybackRequest,
        open_backend: impl FnMut(&str) -> B + 'static,
    ) -> Self {
        let mut player = Self {
            source,
            request,
            reciter: ReciterId::default(),
            locator: String::new(),
            playback: SharedPlaybackState::default(),
            backend: None,
            open_backend: Box::new(open_backend),
        };
        player.sync_source();
        player
    }

    /// Start with a reciter other than the default
    pub fn with_reciter(mut self, reciter: impl Into<ReciterId>) -> Self {
        self.change_reciter(reciter);
        self
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn reciter(&self) -> &ReciterId {
        &self.reciter
    }

    pub fn request(&self) -> &PlaybackRequest {
        &self.request
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Get shared playback state for UI updates
    pub fn shared_state(&self) -> SharedPlaybackState {
        self.playback.clone()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Switch reciter, stopping playback first if it is running
    pub fn change_reciter(&mut self, reciter: impl Into<ReciterId>) {
        let reciter = reciter.into();
        if self.is_playing() {
            self.pause();
        }
        info!("Reciter changed to {}", reciter);
        self.reciter = reciter;
        self.sync_source();
    }

    /// Switch chapter/verse, stopping playback first if it is running
    pub fn set_request(&mut self, request: PlaybackRequest) {
        if request == self.request {
            return;
        }
        if self.is_playing() {
            self.pause();
        }
        self.request = request;
        self.sync_source();
    }

    /// Request playback of the current locator
    ///
    /// The returned future drives the backend request and updates the state
    /// when it resolves. Failures are logged, never returned.
    pub fn play(&mut self) -> impl Future<Output = PlayOutcome> + Send + 'static {
        let generation = self.playback.begin_request();
        let pending = self.backend.as_mut().map(|backend| backend.play());
        let playback = self.playback.clone();
        let locator = self.locator.clone();

        async move {
            let Some(pending) = pending else {
                error!("Error playing audio: no media backend for {}", locator);
                return PlayOutcome::Failed;
            };

            match pending.await {
                Ok(()) => {
                    if playback.resolve_play(generation) {
                        debug!("Playing {}", locator);
                        PlayOutcome::Started
                    } else {
                        debug!("Ignoring stale play request for {}", locator);
                        PlayOutcome::Superseded
                    }
                }
                Err(PlaybackError::Superseded) => {
                    debug!("Play request for {} superseded", locator);
                    PlayOutcome::Superseded
                }
                Err(e) => {
                    error!("Error playing audio {}: {}", locator, e);
                    PlayOutcome::Failed
                }
            }
        }
    }

    /// Stop playback. Calling it while paused changes nothing.
    pub fn pause(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
        }
        self.playback.pause();
    }

    /// Recompute the locator and re-point the backend if it changed
    fn sync_source(&mut self) {
        let locator = self.source.locate(&self.reciter, &self.request);
        if self.backend.is_some() && locator == self.locator {
            return;
        }
        self.locator = locator;
        let epoch = self.playback.next_source();
        debug!("Audio source is now {}", self.locator);

        if let Some(backend) = self.backend.as_mut() {
            backend.set_source(&self.locator);
            backend.load();
        } else {
            self.backend = Some((self.open_backend)(&self.locator));
        }

        let playback = self.playback.clone();
        if let Some(backend) = self.backend.as_mut() {
            backend.set_on_ended(Arc::new(move || playback.finish(epoch)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{EndedHandler, PlayFuture};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Open(String),
        SetSource(String),
        Load,
        Play,
        Pause,
    }

    /// Records every command and lets tests fire the completion handler
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        ended: Arc<Mutex<Option<EndedHandler>>>,
        fail_play: Arc<Mutex<Option<PlaybackError>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn clear(&self) {
            self.calls.lock().clear();
        }

        fn fire_ended(&self) {
            let handler = self.ended.lock().clone();
            if let Some(handler) = handler {
                handler();
            }
        }

        fn current_ended(&self) -> Option<EndedHandler> {
            self.ended.lock().clone()
        }
    }

    struct FakeBackend {
        recorder: Recorder,
    }

    impl MediaBackend for FakeBackend {
        fn set_source(&mut self, locator: &str) {
            self.recorder.calls.lock().push(Call::SetSource(locator.to_string()));
        }

        fn load(&mut self) {
            self.recorder.calls.lock().push(Call::Load);
        }

        fn play(&mut self) -> PlayFuture {
            self.recorder.calls.lock().push(Call::Play);
            let failure = self.recorder.fail_play.lock().take();
            Box::pin(async move {
                match failure {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            })
        }

        fn pause(&mut self) {
            self.recorder.calls.lock().push(Call::Pause);
        }

        fn set_on_ended(&mut self, handler: EndedHandler) {
            *self.recorder.ended.lock() = Some(handler);
        }
    }

    fn player(request: PlaybackRequest) -> (AudioPlayer<FakeBackend>, Recorder) {
        let recorder = Recorder::default();
        let factory_recorder = recorder.clone();
        let player = AudioPlayer::new(AudioSource::default(), request, move |locator: &str| {
            factory_recorder
                .calls
                .lock()
                .push(Call::Open(locator.to_string()));
            FakeBackend {
                recorder: factory_recorder.clone(),
            }
        });
        (player, recorder)
    }

    #[test]
    fn test_initial_locator_and_state() {
        let (player, recorder) = player(PlaybackRequest::new("1"));
        assert_eq!(
            player.locator(),
            "https://audio.qurancentral.com/reciters/01/001/001.mp3"
        );
        assert_eq!(player.reciter().as_str(), "01");
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(recorder.calls(), vec![Call::Open(player.locator().to_string())]);
    }

    #[tokio::test]
    async fn test_play_then_change_reciter() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));

        assert_eq!(player.play().await, PlayOutcome::Started);
        assert_eq!(player.state(), PlaybackState::Playing);

        recorder.clear();
        player.change_reciter("02");
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(
            player.locator(),
            "https://audio.qurancentral.com/reciters/02/001/001.mp3"
        );
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Pause,
                Call::SetSource(player.locator().to_string()),
                Call::Load,
            ]
        );
    }

    #[test]
    fn test_change_reciter_while_paused() {
        let (mut player, recorder) = player(PlaybackRequest::new("2").with_verse(3));
        recorder.clear();

        player.change_reciter("05");
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(player.locator().ends_with("/05/002/003.mp3"));
        assert!(!recorder.calls().contains(&Call::Pause));
    }

    #[tokio::test]
    async fn test_natural_completion_pauses() {
        let (mut player, recorder) = player(PlaybackRequest::new("114"));
        player.play().await;
        assert!(player.is_playing());

        recorder.fire_ended();
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_play_failure_leaves_state() {
        let (mut player, recorder) = player(PlaybackRequest::new("999"));
        *recorder.fail_play.lock() = Some(PlaybackError::Fetch {
            url: "test".to_string(),
            reason: "HTTP 404".to_string(),
        });

        assert_eq!(player.play().await, PlayOutcome::Failed);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_output_failure_leaves_state() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));
        *recorder.fail_play.lock() = Some(PlaybackError::Output(
            "Failed to connect stream".to_string(),
        ));

        assert_eq!(player.play().await, PlayOutcome::Failed);
        assert_eq!(player.state(), PlaybackState::Paused);

        // The failed stream reports itself stopped
        recorder.fire_ended();
        assert_eq!(player.state(), PlaybackState::Paused);

        // A later attempt still works
        assert_eq!(player.play().await, PlayOutcome::Started);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_pause_is_idempotent() {
        let (mut player, _recorder) = player(PlaybackRequest::new("1"));
        player.play().await;

        player.pause();
        let once = player.state();
        player.pause();
        assert_eq!(player.state(), once);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_pause_supersedes_pending_play() {
        let (mut player, _recorder) = player(PlaybackRequest::new("1"));
        let pending = player.play();
        player.pause();

        assert_eq!(pending.await, PlayOutcome::Superseded);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_reciter_change_supersedes_pending_play() {
        let (mut player, _recorder) = player(PlaybackRequest::new("1"));
        let pending = player.play();
        player.change_reciter("03");

        assert_eq!(pending.await, PlayOutcome::Superseded);
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_stale_completion_ignored() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));
        let stale = recorder.current_ended();

        player.set_request(PlaybackRequest::new("1").with_verse(2));
        player.play().await;
        assert!(player.is_playing());

        if let Some(handler) = stale {
            handler();
        }
        assert!(player.is_playing());

        recorder.fire_ended();
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_set_request_while_playing_pauses() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));
        player.play().await;
        recorder.clear();

        player.set_request(PlaybackRequest::new("1").with_verse(2));
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(player.locator().ends_with("/01/001/002.mp3"));
        assert_eq!(recorder.calls().first(), Some(&Call::Pause));
    }

    #[test]
    fn test_backend_created_once() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));
        player.change_reciter("02");
        player.set_request(PlaybackRequest::new("3"));

        let opens = recorder
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Open(_)))
            .count();
        assert_eq!(opens, 1);
        assert_eq!(
            recorder.calls().last(),
            Some(&Call::Load),
            "later changes re-point the existing backend"
        );
    }

    #[test]
    fn test_unchanged_locator_does_not_reload() {
        let (mut player, recorder) = player(PlaybackRequest::new("1"));
        recorder.clear();

        player.change_reciter("01");
        player.set_request(PlaybackRequest::new("1"));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_with_reciter() {
        let (player, _recorder) = player(PlaybackRequest::new("36"));
        let player = player.with_reciter("04");
        assert_eq!(player.reciter().as_str(), "04");
        assert!(player.locator().ends_with("/04/036/001.mp3"));
    }
}
