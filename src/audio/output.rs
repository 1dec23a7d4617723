//! Audio output using PipeWire
//!
//! Plays a decoded mono buffer on a background thread, tracking position so a
//! stopped stream resumes where it left off.

use super::backend::EndedHandler;
use log::{debug, error, warn};
use parking_lot::Mutex;
use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Output buffer shared with the PipeWire thread
#[derive(Clone)]
pub struct SharedOutputState {
    inner: Arc<Mutex<OutputStateInner>>,
}

struct OutputStateInner {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Current playback position (sample index)
    position: usize,
}

impl SharedOutputState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputStateInner {
                samples: Vec::new(),
                sample_rate: 48000,
                position: 0,
            })),
        }
    }

    /// Replace the buffer and rewind
    pub fn load(&self, samples: Vec<f32>, sample_rate: u32) {
        let mut inner = self.inner.lock();
        inner.samples = samples;
        inner.sample_rate = sample_rate.max(1);
        inner.position = 0;
    }

    /// Drop the buffer entirely
    pub fn clear(&self) {
        self.load(Vec::new(), 48000);
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    /// Current position in seconds
    pub fn current_time(&self) -> f64 {
        let inner = self.inner.lock();
        inner.position as f64 / inner.sample_rate as f64
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        let inner = self.inner.lock();
        inner.samples.len() as f64 / inner.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().samples.is_empty()
    }

    /// Playback progress as fraction (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        let inner = self.inner.lock();
        if inner.samples.is_empty() {
            0.0
        } else {
            inner.position as f32 / inner.samples.len() as f32
        }
    }

    /// Whether every sample has been handed to the stream
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        !inner.samples.is_empty() && inner.position >= inner.samples.len()
    }

    fn rewind(&self) {
        self.inner.lock().position = 0;
    }

    /// Take the next `count` samples, advancing the position
    fn next_samples(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        if inner.position >= inner.samples.len() {
            return None;
        }

        let end = (inner.position + count).min(inner.samples.len());
        let samples = inner.samples[inner.position..end].to_vec();
        inner.position = end;
        Some(samples)
    }
}

impl Default for SharedOutputState {
    fn default() -> Self {
        Self::new()
    }
}

enum OutputCommand {
    Stop,
}

/// Reports whether the stream connected
type StartedSender = mpsc::Sender<Result<(), String>>;

/// PipeWire playback stream for one decoded track at a time
pub struct PipewireOutput {
    state: SharedOutputState,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<OutputCommand>>,
    on_ended: Option<EndedHandler>,
}

impl PipewireOutput {
    pub fn new() -> Self {
        Self {
            state: SharedOutputState::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
            on_ended: None,
        }
    }

    /// Get shared output state for UI updates
    pub fn shared_state(&self) -> SharedOutputState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn set_on_ended(&mut self, handler: EndedHandler) {
        self.on_ended = Some(handler);
    }

    /// Load a new track, stopping the current one
    pub fn load(&mut self, samples: Vec<f32>, sample_rate: u32) {
        self.stop();
        self.state.load(samples, sample_rate);
    }

    /// Stop and forget the loaded track
    pub fn unload(&mut self) {
        self.stop();
        self.state.clear();
    }

    /// Start or resume playback
    ///
    /// Returns once the PipeWire stream is connected, or with the setup error.
    pub fn play(&mut self) -> Result<(), String> {
        self.start_with(run_output_loop)
    }

    fn start_with<F>(&mut self, run: F) -> Result<(), String>
    where
        F: FnOnce(SharedOutputState, pw::channel::Receiver<OutputCommand>, StartedSender) -> Result<(), String>
            + Send
            + 'static,
    {
        if self.is_running() {
            return Ok(());
        }
        if self.state.is_empty() {
            return Err("No audio loaded".to_string());
        }

        // A finished track starts over
        if self.state.is_finished() {
            self.state.rewind();
        }

        self.is_running.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        let is_running = self.is_running.clone();
        let on_ended = self.on_ended.clone();

        let (sender, receiver) = pw::channel::channel::<OutputCommand>();
        let (started_tx, started_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = run(state.clone(), receiver, started_tx.clone());
            is_running.store(false, Ordering::SeqCst);

            if let Err(e) = &result {
                error!("Playback error: {}", e);
                // Only reaches play() if setup never reported success
                let _ = started_tx.send(Err(e.clone()));
            }

            // A stream that dies mid-track also counts as stopped
            if state.is_finished() || result.is_err() {
                debug!("Output stopped");
                if let Some(on_ended) = on_ended {
                    on_ended();
                }
            }
        });

        match started_rx.recv() {
            Ok(Ok(())) => {
                self.sender = Some(sender);
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.is_running.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.is_running.store(false, Ordering::SeqCst);
                Err("Output thread exited before starting".to_string())
            }
        }
    }

    /// Stop playback, keeping the position
    pub fn stop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(OutputCommand::Stop);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.is_running.store(false, Ordering::SeqCst);
    }
}

impl Default for PipewireOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PipewireOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the PipeWire main loop until stopped or the buffer runs out
fn run_output_loop(
    state: SharedOutputState,
    receiver: pw::channel::Receiver<OutputCommand>,
    started: StartedSender,
) -> Result<(), String> {
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    // Stop commands from the UI side quit the loop
    let mainloop_weak = mainloop.downgrade();
    let _receiver = receiver.attach(mainloop.loop_(), move |cmd| match cmd {
        OutputCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    // User data for the stream callbacks
    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedOutputState,
        mainloop_weak: pw::main_loop::MainLoopWeak,
    }

    let user_data = UserData {
        format: Default::default(),
        state: state.clone(),
        mainloop_weak: mainloop.downgrade(),
    };

    // Create playback stream
    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Playback",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => "Qiraah",
    };

    let stream = pw::stream::StreamBox::new(&core, "qiraah-playback", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(user_data)
        .param_changed(|_, user_data, id, param| {
            let Some(param) = param else { return };
            if id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };

            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if let Err(e) = user_data.format.parse(param) {
                warn!("Failed to parse negotiated audio format: {:?}", e);
            }
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let n_channels = user_data.format.channels().max(1) as usize;
            let sample_size = std::mem::size_of::<f32>();
            let stride = sample_size * n_channels;

            let Some(slice) = data.data() else {
                return;
            };

            let n_frames = slice.len() / stride;

            match user_data.state.next_samples(n_frames) {
                Some(samples) => {
                    // Same mono sample on every channel
                    for (i, &sample) in samples.iter().enumerate() {
                        let bytes = sample.to_le_bytes();
                        for channel in 0..n_channels {
                            let offset = i * stride + channel * sample_size;
                            if offset + sample_size <= slice.len() {
                                slice[offset..offset + sample_size].copy_from_slice(&bytes);
                            }
                        }
                    }
                    let written = samples.len() * stride;
                    if written < slice.len() {
                        slice[written..].fill(0);
                    }

                    let chunk = data.chunk_mut();
                    *chunk.offset_mut() = 0;
                    *chunk.stride_mut() = stride as i32;
                    *chunk.size_mut() = written as u32;
                }
                None => {
                    // Out of samples - stop playback
                    if let Some(mainloop) = user_data.mainloop_weak.upgrade() {
                        mainloop.quit();
                    }
                }
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // F32LE stereo at the track's sample rate
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(state.sample_rate());
    audio_info.set_channels(2);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values: Vec<u8> = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner();

    let format_pod =
        Pod::from_bytes(&values).ok_or_else(|| "Invalid audio format pod".to_string())?;
    let mut params = [format_pod];

    stream
        .connect(
            spa::utils::Direction::Output,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    let _ = started.send(Ok(()));

    // Run until stopped or playback ends
    mainloop.run();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_only_when_exhausted() {
        let state = SharedOutputState::new();
        assert!(!state.is_finished());

        state.load(vec![0.1; 10], 10);
        assert_eq!(state.next_samples(6).map(|s| s.len()), Some(6));
        assert!(!state.is_finished());
        assert_eq!(state.next_samples(6).map(|s| s.len()), Some(4));
        assert!(state.is_finished());
        assert!(state.next_samples(6).is_none());
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_times() {
        let state = SharedOutputState::new();
        state.load(vec![0.0; 48000], 16000);
        assert_eq!(state.duration(), 3.0);
        state.next_samples(8000);
        assert_eq!(state.current_time(), 0.5);

        state.clear();
        assert!(state.is_empty());
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_play_without_audio_fails() {
        let mut output = PipewireOutput::new();
        assert!(output.play().is_err());
        assert!(!output.is_running());
    }

    #[test]
    fn test_failed_start_reports_error() {
        let ended = Arc::new(AtomicBool::new(false));
        let flag = ended.clone();
        let mut output = PipewireOutput::new();
        output.set_on_ended(Arc::new(move || flag.store(true, Ordering::SeqCst)));
        output.load(vec![0.1; 10], 10);

        let result = output.start_with(|_, _, _| Err("Failed to connect stream".to_string()));
        assert_eq!(result, Err("Failed to connect stream".to_string()));
        assert!(!output.is_running());
        assert!(ended.load(Ordering::SeqCst));
        assert_eq!(output.shared_state().current_time(), 0.0);
    }

    #[test]
    fn test_start_waits_for_stream() {
        let mut output = PipewireOutput::new();
        output.load(vec![0.1; 10], 10);

        let result = output.start_with(|_, _receiver, started| {
            let _ = started.send(Ok(()));
            Ok(())
        });
        assert!(result.is_ok());

        output.stop();
        assert!(!output.is_running());
    }
}
