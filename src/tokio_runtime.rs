//! Global Tokio runtime for the network side of playback
//!
//! GPUI runs its own executor, but reqwest and the blocking decode need Tokio.
//! Futures spawned here are awaited from GPUI tasks.

use gpui::{App, Context, Task};
use log::info;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the global Tokio runtime. Call this during app startup.
pub fn init(_cx: &mut App) {
    TOKIO_RUNTIME.get_or_init(|| {
        info!("Starting Tokio runtime");
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("qiraah-net")
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime")
    });
}

fn handle() -> tokio::runtime::Handle {
    TOKIO_RUNTIME
        .get()
        .expect("Tokio runtime not initialized - call tokio_runtime::init() first")
        .handle()
        .clone()
}

/// Spawn a future on the Tokio runtime and return a GPUI Task
pub fn spawn<T, R, F>(cx: &mut Context<T>, future: F) -> Task<Result<R, tokio::task::JoinError>>
where
    R: Send + 'static,
    F: Future<Output = R> + Send + 'static,
{
    let join_handle = handle().spawn(future);
    cx.foreground_executor().spawn(join_handle)
}
