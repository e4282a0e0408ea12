//! Voice session composition
//!
//! This module wires one gateway client and one clip buffer together per
//! active voice session and routes clip requests to the assembler:
//! - `SessionConfig`: per-session settings (channel, durations, auth)
//! - `SessionController`: composition root with exclusive ownership
//! - `SessionRegistry`: explicit app-owned lookup of active sessions

mod config;
mod controller;
mod registry;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use registry::SessionRegistry;
