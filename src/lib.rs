pub mod audio;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;

pub use audio::{
    AudioChunk, AudioFormat, BufferConfig, Clip, ClipAssembler, ClipBuffer, ClipMetadata,
    ClipWindow, ConsentSource, IdleTransport, MediaTransport, SpeakerClips, SpeakerId,
    OPT_IN_DEFAULT,
};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{
    GatewayClient, GatewayConfig, GatewayEvent, MediaParams, SessionState, VoiceSession,
};
pub use session::{SessionConfig, SessionController, SessionRegistry};
