//! Main application component for Qiraah

use crate::audio::{AudioPlayer, AudioSource, PlayOutcome, SharedOutputState, StreamingBackend};
use crate::control::AudioControl;
use crate::models::{PlaybackRequest, Reciter, ReciterId};
use crate::settings;
use crate::tokio_runtime;
use gpui::prelude::*;
use gpui::{InteractiveElement, *};
use log::{error, info};
use std::time::Duration;

/// What the window opens on
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub source: AudioSource,
    pub request: PlaybackRequest,
    pub reciter: Option<ReciterId>,
}

/// The root application view
pub struct Qiraah {
    player: AudioPlayer<StreamingBackend>,
    reciters: Vec<Reciter>,
    _ui_refresh_task: Option<Task<()>>,
}

impl Qiraah {
    pub fn new(options: LaunchOptions, _cx: &mut Context<Self>) -> Self {
        let mut player = AudioPlayer::new(options.source, options.request, StreamingBackend::new);
        if let Some(reciter) = options.reciter {
            player = player.with_reciter(reciter);
        }
        info!("Opened {}", player.locator());

        Self {
            player,
            reciters: Reciter::catalog(),
            _ui_refresh_task: None,
        }
    }

    fn output_state(&self) -> Option<SharedOutputState> {
        self.player.backend().map(|backend| backend.output_state())
    }

    /// Request playback; the state flips once the backend has started
    fn start_playback(&mut self, cx: &mut Context<Self>) {
        let pending = self.player.play();
        let task = tokio_runtime::spawn(cx, pending);

        cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Playback task failed: {}", e);
                    return;
                }
            };

            let Some(this) = this.upgrade() else {
                return;
            };
            let result = cx.update_entity(&this, |this, cx| {
                if outcome == PlayOutcome::Started {
                    this.start_ui_refresh(cx);
                }
                cx.notify();
            });
            if let Err(e) = result {
                error!("Failed to apply play outcome {:?}: {}", outcome, e);
            }
        })
        .detach();
    }

    fn pause_playback(&mut self, cx: &mut Context<Self>) {
        self.player.pause();
        cx.notify();
    }

    /// Toggle playback (play/pause)
    fn toggle_playback(&mut self, cx: &mut Context<Self>) {
        if self.player.is_playing() {
            self.pause_playback(cx);
        } else {
            self.start_playback(cx);
        }
    }

    fn change_reciter(&mut self, reciter: ReciterId, cx: &mut Context<Self>) {
        settings::set_reciter(reciter.as_str());
        self.player.change_reciter(reciter);
        cx.notify();
    }

    fn next_verse(&mut self, cx: &mut Context<Self>) {
        let request = self.player.request().next_verse();
        self.player.set_request(request);
        cx.notify();
    }

    fn previous_verse(&mut self, cx: &mut Context<Self>) {
        let request = self.player.request().previous_verse();
        self.player.set_request(request);
        cx.notify();
    }

    /// Re-render while playing so progress and natural completion show up
    fn start_ui_refresh(&mut self, cx: &mut Context<Self>) {
        let playback_state = self.player.shared_state();
        self._ui_refresh_task = Some(cx.spawn({
            async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
                loop {
                    cx.background_executor()
                        .timer(Duration::from_millis(16))
                        .await;

                    let Some(this) = this.upgrade() else {
                        break;
                    };
                    let result = cx.update_entity(&this, |_, cx| {
                        cx.notify();
                    });
                    if result.is_err() || !playback_state.is_playing() {
                        break;
                    }
                }
            }
        }));
    }
}

impl Render for Qiraah {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let request = self.player.request().clone();
        let locator = self.player.locator().to_string();
        let is_playing = self.player.state().is_playing();
        let (progress, current_time, duration) = self
            .output_state()
            .map(|state| (state.progress(), state.current_time(), state.duration()))
            .unwrap_or((0.0, 0.0, 0.0));

        let control = AudioControl::new(
            self.reciters.clone(),
            self.player.reciter().clone(),
            is_playing,
        )
        .on_change_reciter(cx.listener(|this, reciter: &ReciterId, _w, cx| {
            this.change_reciter(reciter.clone(), cx);
        }))
        .on_play(cx.listener(|this, _: &ClickEvent, _w, cx| {
            this.start_playback(cx);
        }))
        .on_pause(cx.listener(|this, _: &ClickEvent, _w, cx| {
            this.pause_playback(cx);
        }));

        div()
            .size_full()
            .flex()
            .flex_col()
            .bg(rgb(0x111827))
            .key_context("Qiraah")
            .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                match event.keystroke.key.as_str() {
                    "space" => this.toggle_playback(cx),
                    "right" => this.next_verse(cx),
                    "left" => this.previous_verse(cx),
                    "q" if event.keystroke.modifiers.control => {
                        this.player.pause();
                        window.remove_window();
                    }
                    _ => {}
                }
            }))
            // Custom titlebar
            .child(
                div()
                    .id("titlebar")
                    .flex()
                    .items_center()
                    .justify_between()
                    .w_full()
                    .h(px(36.0))
                    .bg(rgb(0x0b1220))
                    .border_b_1()
                    .border_color(rgb(0x1f2937))
                    .child(
                        div()
                            .id("titlebar-drag-area")
                            .flex()
                            .flex_grow()
                            .items_center()
                            .h_full()
                            .px_4()
                            .on_mouse_down(
                                MouseButton::Left,
                                cx.listener(|_this, _event: &MouseDownEvent, window, _cx| {
                                    window.start_window_move();
                                }),
                            )
                            .child(
                                div()
                                    .text_sm()
                                    .font_weight(FontWeight::SEMIBOLD)
                                    .text_color(rgb(0xcccccc))
                                    .child("Qiraah - Quran Recitation"),
                            ),
                    )
                    .child(
                        div()
                            .id("close-button")
                            .w(px(46.0))
                            .h(px(36.0))
                            .flex()
                            .items_center()
                            .justify_center()
                            .cursor_pointer()
                            .hover(|style| style.bg(rgb(0xe81123)))
                            .on_click(cx.listener(|this, _, window, _cx| {
                                this.player.pause();
                                window.remove_window();
                            }))
                            .child(div().text_lg().text_color(rgb(0xcccccc)).child("×")),
                    ),
            )
            .child(
                div()
                    .flex()
                    .flex_col()
                    .flex_grow()
                    .gap_6()
                    .p_8()
                    // Chapter / verse header with stepping buttons
                    .child(
                        div()
                            .flex()
                            .items_center()
                            .gap_4()
                            .child(verse_button("prev-verse", "<").on_click(cx.listener(
                                |this, _, _w, cx| {
                                    this.previous_verse(cx);
                                },
                            )))
                            .child(
                                div()
                                    .flex()
                                    .flex_col()
                                    .child(
                                        div()
                                            .text_2xl()
                                            .font_weight(FontWeight::BOLD)
                                            .text_color(rgb(0xf3f4f6))
                                            .child(format!(
                                                "Surah {} · Ayah {}",
                                                request.chapter_id, request.verse_number
                                            )),
                                    )
                                    .child(
                                        div()
                                            .text_xs()
                                            .text_color(rgb(0x6b7280))
                                            .child(locator),
                                    ),
                            )
                            .child(verse_button("next-verse", ">").on_click(cx.listener(
                                |this, _, _w, cx| {
                                    this.next_verse(cx);
                                },
                            ))),
                    )
                    .child(control)
                    // Progress bar
                    .child(
                        div()
                            .flex()
                            .items_center()
                            .gap_3()
                            .child(
                                div()
                                    .text_xs()
                                    .text_color(rgb(0x9ca3af))
                                    .child(format_time(current_time)),
                            )
                            .child(
                                div()
                                    .flex_grow()
                                    .h(px(6.0))
                                    .bg(rgb(0x374151))
                                    .rounded_full()
                                    .relative()
                                    .child(
                                        div()
                                            .absolute()
                                            .left_0()
                                            .top_0()
                                            .h_full()
                                            .w(relative(progress.clamp(0.0, 1.0)))
                                            .bg(rgb(0x10b981))
                                            .rounded_full(),
                                    ),
                            )
                            .child(
                                div()
                                    .text_xs()
                                    .text_color(rgb(0x9ca3af))
                                    .child(format_time(duration)),
                            ),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(rgb(0x4b5563))
                            .child("Space: play/pause   ←/→: previous/next ayah   Ctrl+Q: quit"),
                    ),
            )
    }
}

fn verse_button(id: &'static str, label: &'static str) -> Stateful<Div> {
    div()
        .id(id)
        .w(px(36.0))
        .h(px(36.0))
        .rounded_full()
        .bg(rgb(0x374151))
        .flex()
        .items_center()
        .justify_center()
        .cursor_pointer()
        .hover(|style| style.opacity(0.9))
        .child(div().text_color(rgb(0xffffff)).child(label))
}

/// Format seconds as m:ss
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
