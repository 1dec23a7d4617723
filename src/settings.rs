//! User preferences persisted in dconf
//!
//! Settings are stored in dconf under `/com/qiraah/player/`

use log::error;

const DCONF_PATH: &str = "/com/qiraah/player/";

/// Keys for dconf settings
mod keys {
    pub const RECITER: &str = "reciter";
    pub const AUDIO_BASE_URL: &str = "audio-base-url";
}

fn key(name: &str) -> String {
    format!("{}{}", DCONF_PATH, name)
}

/// Get the last chosen reciter from dconf
pub fn get_reciter() -> Option<String> {
    dconf_rs::get_string(&key(keys::RECITER))
        .ok()
        .filter(|r| !r.is_empty())
}

/// Remember the chosen reciter in dconf
pub fn set_reciter(reciter: &str) {
    if let Err(e) = dconf_rs::set_string(&key(keys::RECITER), reciter) {
        error!("Failed to save reciter to dconf: {}", e);
    }
}

/// Get the audio host override from dconf
pub fn get_audio_base_url() -> Option<String> {
    dconf_rs::get_string(&key(keys::AUDIO_BASE_URL))
        .ok()
        .filter(|url| !url.is_empty())
}
