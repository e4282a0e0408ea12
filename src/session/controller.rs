use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use super::config::SessionConfig;
use crate::audio::{Clip, ClipAssembler, ClipBuffer, ConsentSource, MediaTransport, SpeakerClips};
use crate::error::Result;
use crate::gateway::{GatewayClient, GatewayEvent, MediaParams, SessionState};

/// Composition root for one clipped voice session
///
/// Owns one `GatewayClient` and one `ClipBuffer` exclusively and routes
/// clip requests to the `ClipAssembler`. Neither component holds a
/// reference back here; gateway lifecycle changes arrive through the event
/// channel and assembled clips are returned to the caller, which hands them
/// to the storage/transcription collaborators.
pub struct SessionController {
    config: SessionConfig,
    gateway: GatewayClient,
    gateway_events: mpsc::Receiver<GatewayEvent>,
    buffer: ClipBuffer,
    assembler: ClipAssembler,
    consent: Arc<dyn ConsentSource>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn MediaTransport>,
        consent: Arc<dyn ConsentSource>,
    ) -> Self {
        let (gateway, gateway_events) = GatewayClient::new(config.gateway_config());
        let buffer = ClipBuffer::new(config.buffer_config(), transport);
        let assembler = ClipAssembler::new(buffer.format(), config.chunk_duration);

        info!(
            "Session controller created for server {} channel {}",
            config.server_id, config.channel_id
        );

        Self {
            config,
            gateway,
            gateway_events,
            buffer,
            assembler,
            consent,
        }
    }

    pub fn server_id(&self) -> u64 {
        self.config.server_id
    }

    pub fn state(&self) -> SessionState {
        self.gateway.state()
    }

    pub fn media_params(&self) -> Result<MediaParams> {
        self.gateway.media_params()
    }

    /// Negotiate the control-plane session.
    pub async fn connect(&mut self) -> Result<()> {
        self.gateway.connect().await
    }

    /// Begin filling the sliding window from the media transport.
    pub async fn start_capture(&mut self) -> Result<()> {
        self.buffer.start().await
    }

    /// Next gateway lifecycle notification; `None` once the client is torn
    /// down and the channel has drained.
    pub async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.gateway_events.recv().await
    }

    /// Clip the buffered window into a single mixed-down recording.
    pub fn clip_mixed(&self) -> Result<Clip> {
        let snapshot = self.buffer.snapshot();
        self.assembler.assemble_mixed(&snapshot, self.consent.as_ref())
    }

    /// Clip the buffered window into time-aligned per-speaker tracks.
    pub fn clip_per_speaker(&self) -> Result<SpeakerClips> {
        let snapshot = self.buffer.snapshot();
        self.assembler
            .assemble_per_speaker(&snapshot, self.consent.as_ref())
    }

    /// Stop capture and disconnect. Idempotent; both halves tolerate being
    /// already stopped.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.buffer.stop().await?;
        self.gateway.disconnect(false).await?;
        Ok(())
    }
}
