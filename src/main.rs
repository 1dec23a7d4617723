//! Qiraah - A Quran recitation player for Linux
//!
//! This is the main entry point for the Qiraah application.

mod app;
mod audio;
mod cli;
mod control;
mod models;
mod settings;
mod tokio_runtime;

use app::{LaunchOptions, Qiraah};
use audio::AudioSource;
use clap::Parser;
use gpui::prelude::*;
use gpui::*;
use log::info;
use models::{PlaybackRequest, ReciterId};

fn main() {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    info!("Starting Qiraah");

    // CLI flags win over saved preferences
    let source = args
        .audio_base_url
        .clone()
        .or_else(settings::get_audio_base_url)
        .map(AudioSource::new)
        .unwrap_or_default();
    info!("Audio source: {}", source.base_url());
    let reciter = args
        .reciter
        .clone()
        .or_else(settings::get_reciter)
        .map(ReciterId::from);
    let options = LaunchOptions {
        source,
        request: PlaybackRequest::new(args.surah.clone()).with_verse(args.ayah),
        reciter,
    };

    Application::new().run(move |cx: &mut App| {
        // Initialize global Tokio runtime for reqwest/decoding
        tokio_runtime::init(cx);
        let bounds = Bounds::centered(None, size(px(720.0), px(480.0)), cx);
        cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                // No titlebar - we'll draw our own
                titlebar: None,
                window_decorations: Some(WindowDecorations::Client),
                app_id: Some("com.qiraah.Player".to_string()),
                ..Default::default()
            },
            |window, cx| {
                window.set_app_id("com.qiraah.Player");
                cx.new(|cx| Qiraah::new(options.clone(), cx))
            },
        )
        .expect("Failed to open window");
    });
}
