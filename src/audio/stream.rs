//! Network-backed media backend
//!
//! Downloads the recitation with reqwest, decodes it on a blocking task and
//! hands the samples to the PipeWire output. Play futures must run on the
//! Tokio runtime.

use super::backend::{EndedHandler, MediaBackend, PlayFuture, PlaybackError};
use super::decoder::{self, DecodedTrack};
use super::output::{PipewireOutput, SharedOutputState};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The output plus what is loaded into it
///
/// The epoch is only advanced and checked with `output` locked, so a stale
/// request can never install samples or start the stream after a reload or
/// pause.
struct OutputSlot {
    output: Mutex<PipewireOutput>,
    /// Whether the current locator has been decoded into the output
    ready: AtomicBool,
    /// Advanced whenever pending play requests must give up
    epoch: AtomicU64,
}

impl OutputSlot {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate pending requests and forget the loaded track
    fn reload(&self) {
        let mut output = self.output.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        output.unload();
    }

    /// Invalidate pending requests and stop the stream
    fn pause(&self) {
        let mut output = self.output.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        output.stop();
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Load a decoded track if `requested` is still current
    fn install(&self, requested: u64, track: DecodedTrack) -> Result<(), PlaybackError> {
        let mut output = self.output.lock();
        if self.epoch() != requested {
            return Err(PlaybackError::Superseded);
        }
        output.load(track.samples, track.sample_rate);
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Start the stream if `requested` is still current
    ///
    /// Blocks until PipeWire reports the stream connected.
    fn start(&self, requested: u64) -> Result<(), PlaybackError> {
        let mut output = self.output.lock();
        if self.epoch() != requested {
            return Err(PlaybackError::Superseded);
        }
        output.play().map_err(PlaybackError::Output)
    }
}

/// Streams verse recordings over HTTP into a PipeWire output
pub struct StreamingBackend {
    locator: String,
    client: reqwest::Client,
    slot: Arc<OutputSlot>,
    output_state: SharedOutputState,
}

impl StreamingBackend {
    pub fn new(locator: &str) -> Self {
        let output = PipewireOutput::new();
        let output_state = output.shared_state();
        Self {
            locator: locator.to_string(),
            client: reqwest::Client::new(),
            slot: Arc::new(OutputSlot {
                output: Mutex::new(output),
                ready: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
            output_state,
        }
    }

    /// Get shared output state for progress display
    pub fn output_state(&self) -> SharedOutputState {
        self.output_state.clone()
    }
}

impl MediaBackend for StreamingBackend {
    fn set_source(&mut self, locator: &str) {
        self.locator = locator.to_string();
    }

    fn load(&mut self) {
        self.slot.reload();
    }

    fn play(&mut self) -> PlayFuture {
        let url = self.locator.clone();
        let client = self.client.clone();
        let slot = self.slot.clone();
        let requested = slot.epoch();

        Box::pin(async move {
            if !slot.is_ready() {
                let data = fetch(&client, &url).await?;
                let track = tokio::task::spawn_blocking(move || decoder::decode(data))
                    .await
                    .map_err(|e| PlaybackError::Decode(e.to_string()))?
                    .map_err(|e| PlaybackError::Decode(e.to_string()))?;

                info!(
                    "Loaded {} ({:.1}s at {}Hz)",
                    url,
                    track.duration_seconds(),
                    track.sample_rate
                );
                slot.install(requested, track)?;
            }

            tokio::task::spawn_blocking(move || slot.start(requested))
                .await
                .map_err(|e| PlaybackError::Output(e.to_string()))?
        })
    }

    fn pause(&mut self) {
        self.slot.pause();
    }

    fn set_on_ended(&mut self, handler: EndedHandler) {
        self.slot.output.lock().set_on_ended(handler);
    }
}

/// Download a recording
async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, PlaybackError> {
    debug!("Fetching {}", url);
    let fetch_error = |reason: String| PlaybackError::Fetch {
        url: url.to_string(),
        reason,
    };

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", resp.status())));
    }

    let bytes = resp.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> DecodedTrack {
        DecodedTrack {
            samples: vec![0.1; 4410],
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_source_tracking() {
        let mut backend = StreamingBackend::new("http://localhost/a.mp3");
        backend.set_source("http://localhost/b.mp3");
        backend.load();
        assert_eq!(backend.locator, "http://localhost/b.mp3");
        assert!(backend.output_state().is_empty());
    }

    #[test]
    fn test_install_current_request() {
        let backend = StreamingBackend::new("http://localhost/a.mp3");
        let requested = backend.slot.epoch();
        assert!(backend.slot.install(requested, track()).is_ok());
        assert!(backend.slot.is_ready());
        assert!(!backend.output_state().is_empty());
    }

    #[test]
    fn test_reload_between_decode_and_install() {
        let mut backend = StreamingBackend::new("http://localhost/a.mp3");
        let requested = backend.slot.epoch();

        // Source moves on while the old verse is still decoding
        backend.set_source("http://localhost/b.mp3");
        backend.load();

        let result = backend.slot.install(requested, track());
        assert!(matches!(result, Err(PlaybackError::Superseded)));
        assert!(!backend.slot.is_ready());
        assert!(backend.output_state().is_empty());
    }

    #[test]
    fn test_pause_before_start() {
        let mut backend = StreamingBackend::new("http://localhost/a.mp3");
        let requested = backend.slot.epoch();
        backend.slot.install(requested, track()).unwrap();

        backend.pause();
        let result = backend.slot.start(requested);
        assert!(matches!(result, Err(PlaybackError::Superseded)));
        assert!(!backend.slot.output.lock().is_running());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_to_fetch() {
        let mut backend = StreamingBackend::new("http://127.0.0.1:9/reciters/01/001/001.mp3");
        let result = backend.play().await;
        assert!(matches!(result, Err(PlaybackError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_pause_supersedes_pending_play() {
        let mut backend = StreamingBackend::new("http://127.0.0.1:9/reciters/01/001/001.mp3");
        backend.slot.ready.store(true, Ordering::SeqCst);
        let pending = backend.play();
        backend.pause();
        assert!(matches!(pending.await, Err(PlaybackError::Superseded)));
    }
}
