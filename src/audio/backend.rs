//! The seam between the player and whatever actually produces sound

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Why a play request did not start playback
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio output error: {0}")]
    Output(String),

    #[error("source changed before playback started")]
    Superseded,
}

/// Resolves once the backend has started (or failed to start) playback
pub type PlayFuture = Pin<Box<dyn Future<Output = Result<(), PlaybackError>> + Send + 'static>>;

/// Called when the current track finishes on its own
pub type EndedHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// A media element the player points at a locator and commands
pub trait MediaBackend {
    /// Point the backend at a new resource
    fn set_source(&mut self, locator: &str);

    /// Drop whatever was loaded for the previous source
    fn load(&mut self);

    /// Request playback of the current source
    fn play(&mut self) -> PlayFuture;

    /// Stop producing audio, keeping the position
    fn pause(&mut self);

    /// Replace the natural-completion handler
    fn set_on_ended(&mut self, handler: EndedHandler);
}
