use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed control-plane opcodes.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const MEDIA_JOIN: u8 = 4;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Event-type tags carried on dispatch frames.
pub mod event {
    pub const READY: &str = "READY";
    pub const GUILD_CREATE: &str = "GUILD_CREATE";
    pub const VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
    pub const VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";
}

/// JSON envelope for every control-plane message.
///
/// `s` and `t` are only present on dispatch frames and are omitted when
/// serializing everything else.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Client properties sent with the identify payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "voice-clipper".to_string(),
            device: "voice-clipper".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaJoin {
    pub server_id: u64,
    pub channel_id: u64,
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl GatewayPayload {
    fn outgoing(op: u8, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    pub fn identify(identify: &Identify) -> crate::Result<Self> {
        Ok(Self::outgoing(opcode::IDENTIFY, serde_json::to_value(identify)?))
    }

    pub fn media_join(join: &MediaJoin) -> crate::Result<Self> {
        Ok(Self::outgoing(opcode::MEDIA_JOIN, serde_json::to_value(join)?))
    }

    /// Heartbeat carrying the last-seen dispatch sequence number (or null
    /// before any dispatch has arrived).
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        let d = match last_sequence {
            Some(seq) => Value::from(seq),
            None => Value::Null,
        };
        Self::outgoing(opcode::HEARTBEAT, d)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read a platform id out of a dispatch payload. Ids arrive as JSON
/// numbers or as decimal strings depending on the sender; accept both.
pub fn id_field(d: &Value, key: &str) -> Option<u64> {
    match d.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
