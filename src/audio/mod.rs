pub mod assembler;
pub mod buffer;
pub mod transport;
pub mod window;

pub use assembler::{
    Clip, ClipAssembler, ClipMetadata, ConsentSource, SpeakerClips, OPT_IN_DEFAULT,
};
pub use buffer::{BufferConfig, ClipBuffer};
pub use transport::{AudioFormat, IdleTransport, MediaTransport, SpeakerId};
pub use window::{AudioChunk, ClipWindow};
