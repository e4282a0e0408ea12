use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::BufferConfig;
use crate::gateway::{ConnectionProperties, GatewayConfig};

/// Configuration for one clipped voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server hosting the voice channel
    pub server_id: u64,

    /// Voice channel to join
    pub channel_id: u64,

    /// Length of assembled clips; also the audio retained in memory
    pub clip_duration: Duration,

    /// Length of each buffered audio chunk
    pub chunk_duration: Duration,

    /// Websocket URL of the control-plane gateway
    pub gateway_url: String,

    /// Auth token presented at identify time
    pub token: String,

    /// Capability/intent bitmask requested at identify time
    pub intents: u64,

    pub self_mute: bool,
    pub self_deaf: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_id: 0,
            channel_id: 0,
            clip_duration: Duration::from_secs(30),
            chunk_duration: Duration::from_secs(1),
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
            token: String::new(),
            intents: 0b1110_1000_0001,
            self_mute: false,
            self_deaf: false,
        }
    }
}

impl SessionConfig {
    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            chunk_duration: self.chunk_duration,
            clip_duration: self.clip_duration,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            url: self.gateway_url.clone(),
            token: self.token.clone(),
            intents: self.intents,
            properties: ConnectionProperties::default(),
            server_id: self.server_id,
            channel_id: self.channel_id,
            self_mute: self.self_mute,
            self_deaf: self.self_deaf,
        }
    }
}
