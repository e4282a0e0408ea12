//! Control-plane gateway client
//!
//! Negotiates and maintains the signaling session with the voice platform:
//! handshake, heartbeats, and voice server/state negotiation. The media
//! transport that carries actual audio is a separate collaborator; this
//! module only hands over its negotiated parameters.

pub mod client;
pub mod payload;

pub use client::{
    GatewayClient, GatewayConfig, GatewayEvent, MediaParams, SessionState, VoiceSession,
};
pub use payload::{ConnectionProperties, GatewayPayload, Identify, MediaJoin};
