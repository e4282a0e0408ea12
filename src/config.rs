use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub gateway: GatewaySettings,
    pub audio: AudioSettings,
    pub clip: ClipSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewaySettings {
    /// Websocket URL of the control-plane gateway
    pub url: String,
    /// Auth token presented in the identify payload
    pub token: String,
    /// Capability/intent bitmask requested at identify time
    pub intents: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Deserialize)]
pub struct ClipSettings {
    /// Length of assembled clips, in seconds
    pub clip_duration_secs: u64,
    /// Length of each buffered audio chunk, in seconds
    pub chunk_duration_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
