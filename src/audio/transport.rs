use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Platform id of a speaking participant.
pub type SpeakerId = u64;

/// Fixed audio constants of the active media transport. Samples are signed
/// 16-bit little-endian PCM, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        // stereo 48kHz, the voice platform's decoder output
        Self {
            channels: 2,
            bits_per_sample: 16,
            sample_rate: 48_000,
        }
    }
}

impl AudioFormat {
    /// Number of interleaved samples spanning `duration` at this format.
    pub fn samples_in(&self, duration: Duration) -> usize {
        (self.sample_rate as u128 * self.channels as u128 * duration.as_millis() / 1000) as usize
    }

    /// Duration in milliseconds of `samples` interleaved samples.
    pub fn duration_ms(&self, samples: usize) -> u64 {
        samples as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// Media transport seam
///
/// The transport decodes the platform's voice packets into per-speaker PCM
/// and hands them over on a push basis; the buffer only ever asks for
/// "everything that arrived since the last drain". Decoding itself happens
/// outside this crate.
#[async_trait::async_trait]
pub trait MediaTransport: Send + Sync {
    /// Fixed channel count / sample width / sampling rate of the decoder.
    fn format(&self) -> AudioFormat;

    /// Acquire the transport's recording resource.
    async fn start_recording(&mut self) -> Result<()>;

    /// Take all per-speaker frame bytes that arrived since the last drain.
    /// Speakers silent over the interval are absent from the map.
    async fn drain(&mut self) -> HashMap<SpeakerId, Vec<u8>>;

    /// Release the recording resource. Safe to call when not recording.
    async fn stop_recording(&mut self) -> Result<()>;
}

/// Transport that produces no frames. Used for wiring a session before a
/// real transport is attached, and in tests.
pub struct IdleTransport {
    format: AudioFormat,
    recording: bool,
}

impl IdleTransport {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

#[async_trait::async_trait]
impl MediaTransport for IdleTransport {
    fn format(&self) -> AudioFormat {
        self.format
    }

    async fn start_recording(&mut self) -> Result<()> {
        self.recording = true;
        Ok(())
    }

    async fn drain(&mut self) -> HashMap<SpeakerId, Vec<u8>> {
        HashMap::new()
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.recording = false;
        Ok(())
    }
}
