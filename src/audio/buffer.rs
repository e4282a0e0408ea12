use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{AudioFormat, MediaTransport};
use super::window::{AudioChunk, ClipWindow};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Length of each buffered chunk
    pub chunk_duration: Duration,
    /// Total audio retained, i.e. the maximum clip length
    pub clip_duration: Duration,
}

impl BufferConfig {
    /// Window capacity in chunks.
    pub fn capacity(&self) -> usize {
        let chunk_ms = self.chunk_duration.as_millis().max(1);
        ((self.clip_duration.as_millis() / chunk_ms) as usize).max(1)
    }
}

/// Sliding window of live audio
///
/// Owns the `ClipWindow` exclusively: the capture loop spawned by `start()`
/// is its only writer, pushing exactly one chunk per `chunk_duration` —
/// including chunks nobody spoke in, so chronology stays time-driven.
/// Readers take `snapshot()` copies and never observe a torn push.
pub struct ClipBuffer {
    config: BufferConfig,
    format: AudioFormat,
    window: Arc<Mutex<ClipWindow>>,
    transport: Arc<AsyncMutex<Box<dyn MediaTransport>>>,
    is_capturing: Arc<AtomicBool>,
    capture_task: Option<JoinHandle<()>>,
}

fn lock(window: &Mutex<ClipWindow>) -> MutexGuard<'_, ClipWindow> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClipBuffer {
    pub fn new(config: BufferConfig, transport: Box<dyn MediaTransport>) -> Self {
        let format = transport.format();
        let window = Arc::new(Mutex::new(ClipWindow::new(config.capacity())));

        info!(
            "Clip buffer initialized: {} chunks of {:?} ({}Hz, {} channels)",
            config.capacity(),
            config.chunk_duration,
            format.sample_rate,
            format.channels
        );

        Self {
            config,
            format,
            window,
            transport: Arc::new(AsyncMutex::new(transport)),
            is_capturing: Arc::new(AtomicBool::new(false)),
            capture_task: None,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn chunk_duration(&self) -> Duration {
        self.config.chunk_duration
    }

    /// Begin the periodic capture loop. Idempotent: returns immediately if
    /// capture is already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_capturing.swap(true, Ordering::SeqCst) {
            warn!("Capture already running");
            return Ok(());
        }

        if let Err(e) = self.transport.lock().await.start_recording().await {
            self.is_capturing.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.capture_task = Some(tokio::spawn(capture_loop(
            self.config.chunk_duration,
            Arc::clone(&self.window),
            Arc::clone(&self.transport),
            Arc::clone(&self.is_capturing),
        )));

        info!("Capture started");
        Ok(())
    }

    /// Cancel the capture loop and release the transport's recording
    /// resource. Idempotent and safe to call when never started.
    pub async fn stop(&mut self) -> Result<()> {
        let was_capturing = self.is_capturing.swap(false, Ordering::SeqCst);

        if let Some(task) = self.capture_task.take() {
            task.abort();
        }

        if !was_capturing {
            return Ok(());
        }

        self.transport.lock().await.stop_recording().await?;
        info!("Capture stopped");
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.window).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.window).is_empty()
    }

    /// Atomic copy of the current window for clip assembly.
    pub fn snapshot(&self) -> Vec<AudioChunk> {
        lock(&self.window).snapshot()
    }
}

async fn capture_loop(
    chunk_duration: Duration,
    window: Arc<Mutex<ClipWindow>>,
    transport: Arc<AsyncMutex<Box<dyn MediaTransport>>>,
    is_capturing: Arc<AtomicBool>,
) {
    debug!("Capture loop started");
    let mut index: u64 = 0;

    loop {
        let start = Utc::now();
        tokio::time::sleep(chunk_duration).await;

        if !is_capturing.load(Ordering::SeqCst) {
            break;
        }

        let frames = transport.lock().await.drain().await;
        debug!(
            "Captured chunk {} with {} speaking participants",
            index,
            frames.len()
        );

        lock(&window).push(AudioChunk {
            index,
            start,
            frames,
        });
        index += 1;
    }

    debug!("Capture loop stopped");
}
