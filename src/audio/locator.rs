//! Resource locator derivation
//!
//! Builds `{base}/{reciter}/{chapter:03}/{verse:03}.mp3` from the current
//! reciter and playback request.

use crate::models::{PlaybackRequest, ReciterId};

/// Default host serving the recitation files
pub const DEFAULT_BASE_URL: &str = "https://audio.qurancentral.com/reciters";

const FIELD_WIDTH: usize = 3;

/// Where recitation audio is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    base_url: String,
}

impl AudioSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Derive the URL of one verse's recording
    pub fn locate(&self, reciter: &ReciterId, request: &PlaybackRequest) -> String {
        format!(
            "{}/{}/{}/{:0width$}.mp3",
            self.base_url.trim_end_matches('/'),
            reciter,
            zero_pad(&request.chapter_id),
            request.verse_number,
            width = FIELD_WIDTH,
        )
    }
}

impl Default for AudioSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Left-pad with '0' to three characters; longer values are kept as is
fn zero_pad(value: &str) -> String {
    let len = value.chars().count();
    if len >= FIELD_WIDTH {
        return value.to_string();
    }
    let mut padded = "0".repeat(FIELD_WIDTH - len);
    padded.push_str(value);
    padded
}
