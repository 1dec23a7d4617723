use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reciter used when nothing else was chosen
pub const DEFAULT_RECITER: &str = "01";

const RECITER_CATALOG: &str = include_str!("../assets/reciters.json");

/// Identifier selecting whose recordings are played
///
/// Any string is accepted; an unknown id simply resolves to a URL the
/// backend fails to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReciterId(String);

impl ReciterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReciterId {
    fn default() -> Self {
        Self(DEFAULT_RECITER.to_string())
    }
}

impl From<&str> for ReciterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ReciterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ReciterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entry of the bundled reciter catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reciter {
    pub id: ReciterId,
    pub name: String,
}

impl Reciter {
    /// Load the bundled reciter catalog
    ///
    /// Falls back to the default reciter alone if the catalog can't be parsed.
    pub fn catalog() -> Vec<Reciter> {
        match Self::parse_catalog(RECITER_CATALOG) {
            Ok(reciters) if !reciters.is_empty() => reciters,
            Ok(_) => {
                error!("Reciter catalog is empty");
                vec![Self::fallback()]
            }
            Err(e) => {
                error!("Failed to parse reciter catalog: {}", e);
                vec![Self::fallback()]
            }
        }
    }

    fn parse_catalog(json: &str) -> Result<Vec<Reciter>, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn fallback() -> Reciter {
        Reciter {
            id: ReciterId::default(),
            name: format!("Reciter {}", DEFAULT_RECITER),
        }
    }
}

/// Chapter (surah) and verse (ayah) to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub chapter_id: String,
    pub verse_number: u32,
}

impl PlaybackRequest {
    /// Request the first verse of a chapter
    pub fn new(chapter_id: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            verse_number: 1,
        }
    }

    /// Set the verse number (clamped to at least 1)
    pub fn with_verse(mut self, verse_number: u32) -> Self {
        self.verse_number = verse_number.max(1);
        self
    }

    pub fn next_verse(&self) -> Self {
        self.clone().with_verse(self.verse_number.saturating_add(1))
    }

    pub fn previous_verse(&self) -> Self {
        self.clone().with_verse(self.verse_number.saturating_sub(1))
    }
}

/// Whether the player is currently producing audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Paused,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}
