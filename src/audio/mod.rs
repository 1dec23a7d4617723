//! Recitation playback
//!
//! This module provides:
//! - Resource locator derivation for reciter/chapter/verse
//! - The player state machine driving a media backend
//! - A streaming backend (HTTP fetch, symphonia decode, PipeWire output)

mod backend;
mod decoder;
mod locator;
mod output;
mod player;
mod stream;

pub use locator::AudioSource;
pub use output::SharedOutputState;
pub use player::{AudioPlayer, PlayOutcome};
pub use stream::StreamingBackend;
