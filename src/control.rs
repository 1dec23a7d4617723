//! Playback controls: play/pause button and reciter selector

use crate::models::{Reciter, ReciterId};
use gpui::prelude::*;
use gpui::*;
use std::rc::Rc;

type ReciterHandler = Rc<dyn Fn(&ReciterId, &mut Window, &mut App)>;
type ClickHandler = Rc<dyn Fn(&ClickEvent, &mut Window, &mut App)>;

/// Renders the player state and raises play, pause and reciter intents
#[derive(IntoElement)]
pub struct AudioControl {
    reciters: Vec<Reciter>,
    current_reciter: ReciterId,
    playing: bool,
    on_change_reciter: Option<ReciterHandler>,
    on_play: Option<ClickHandler>,
    on_pause: Option<ClickHandler>,
}

impl AudioControl {
    pub fn new(reciters: Vec<Reciter>, current_reciter: ReciterId, playing: bool) -> Self {
        Self {
            reciters,
            current_reciter,
            playing,
            on_change_reciter: None,
            on_play: None,
            on_pause: None,
        }
    }

    pub fn on_change_reciter(
        mut self,
        handler: impl Fn(&ReciterId, &mut Window, &mut App) + 'static,
    ) -> Self {
        self.on_change_reciter = Some(Rc::new(handler));
        self
    }

    pub fn on_play(mut self, handler: impl Fn(&ClickEvent, &mut Window, &mut App) + 'static) -> Self {
        self.on_play = Some(Rc::new(handler));
        self
    }

    pub fn on_pause(mut self, handler: impl Fn(&ClickEvent, &mut Window, &mut App) + 'static) -> Self {
        self.on_pause = Some(Rc::new(handler));
        self
    }
}

impl RenderOnce for AudioControl {
    fn render(self, _window: &mut Window, _cx: &mut App) -> impl IntoElement {
        let playing = self.playing;
        let click = if playing { self.on_pause } else { self.on_play };
        let current_name = self
            .reciters
            .iter()
            .find(|r| r.id == self.current_reciter)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| format!("Reciter {}", self.current_reciter));

        div()
            .flex()
            .flex_col()
            .gap_4()
            .p_4()
            .rounded_lg()
            .bg(rgb(0x1f2937))
            .child(
                div()
                    .flex()
                    .items_center()
                    .gap_4()
                    .child(
                        div()
                            .id("play-pause")
                            .w(px(48.0))
                            .h(px(48.0))
                            .rounded_full()
                            .bg(rgb(0x10b981))
                            .flex()
                            .items_center()
                            .justify_center()
                            .cursor_pointer()
                            .hover(|style| style.opacity(0.9))
                            .when_some(click, |el, handler| {
                                el.on_click(move |event, window, cx| handler(event, window, cx))
                            })
                            .child(
                                div()
                                    .text_color(rgb(0xffffff))
                                    .child(if playing { "||" } else { ">" }),
                            ),
                    )
                    .child(
                        div()
                            .flex()
                            .flex_col()
                            .child(
                                div()
                                    .text_base()
                                    .font_weight(FontWeight::SEMIBOLD)
                                    .text_color(rgb(0xf3f4f6))
                                    .child(current_name),
                            )
                            .child(
                                div()
                                    .text_sm()
                                    .text_color(rgb(0x9ca3af))
                                    .child(if playing { "Playing" } else { "Paused" }),
                            ),
                    ),
            )
            .child(
                div()
                    .flex()
                    .flex_wrap()
                    .gap_2()
                    .children(self.reciters.into_iter().map(|reciter| {
                        let is_selected = reciter.id == self.current_reciter;
                        let handler = self.on_change_reciter.clone();
                        let id = reciter.id.clone();

                        div()
                            .id(SharedString::from(format!("reciter-{}", reciter.id)))
                            .px_3()
                            .py_1()
                            .rounded_md()
                            .bg(if is_selected { rgb(0x10b981) } else { rgb(0x374151) })
                            .cursor_pointer()
                            .hover(|style| style.opacity(0.9))
                            .when_some(handler, |el, handler| {
                                el.on_click(move |_, window, cx| handler(&id, window, cx))
                            })
                            .child(
                                div()
                                    .text_sm()
                                    .text_color(rgb(0xffffff))
                                    .child(reciter.name),
                            )
                    })),
            )
    }
}
