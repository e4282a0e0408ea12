// Clip assembly from a window snapshot
//
// The pipeline mirrors how the audio was captured: per chunk, keep only
// consented speakers, decode their raw frame bytes into PCM samples, and
// left-pad each segment with silence to exactly one chunk. Mixed clips
// then overlay all speakers within each chunk (additive, clamped) and
// concatenate; per-speaker clips skip the overlay and concatenate each
// speaker's segments with full-silence gap fill, so every track spans the
// whole window.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::transport::{AudioFormat, SpeakerId};
use super::window::AudioChunk;
use crate::error::{Error, Result};

/// Opt-in status assumed for a speaker with no recorded preference.
pub const OPT_IN_DEFAULT: bool = true;

/// Externally-owned consent lookup. Implementations answer
/// [`OPT_IN_DEFAULT`] for speakers they have never seen.
pub trait ConsentSource: Send + Sync {
    fn is_opted_in(&self, speaker: SpeakerId) -> bool;
}

impl<F> ConsentSource for F
where
    F: Fn(SpeakerId) -> bool + Send + Sync,
{
    fn is_opted_in(&self, speaker: SpeakerId) -> bool {
        self(speaker)
    }
}

#[derive(Debug, Clone)]
pub struct ClipMetadata {
    pub id: Uuid,
    /// Start of the oldest chunk in the assembled window
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Consented speakers heard anywhere in the window
    pub participants: Vec<SpeakerId>,
}

/// A single mixed-down WAV recording of the whole window.
#[derive(Debug, Clone)]
pub struct Clip {
    pub wav: Vec<u8>,
    pub meta: ClipMetadata,
}

/// Time-aligned per-speaker WAV tracks spanning the whole window.
#[derive(Debug, Clone)]
pub struct SpeakerClips {
    pub tracks: HashMap<SpeakerId, Vec<u8>>,
    pub meta: ClipMetadata,
}

/// Slack before an over-long segment becomes a hard error.
const LENGTH_TOLERANCE: Duration = Duration::from_millis(50);

/// Turns window snapshots into clips. Never mutates the window — both
/// entry points operate on the immutable copy they are given.
pub struct ClipAssembler {
    format: AudioFormat,
    chunk_duration: Duration,
}

impl ClipAssembler {
    pub fn new(format: AudioFormat, chunk_duration: Duration) -> Self {
        Self {
            format,
            chunk_duration,
        }
    }

    /// Assemble one mixed-down WAV track from the snapshot.
    pub fn assemble_mixed(
        &self,
        window: &[AudioChunk],
        consent: &dyn ConsentSource,
    ) -> Result<Clip> {
        let standardized = self.standardize(window, consent)?;

        let mut samples = Vec::with_capacity(self.samples_per_chunk() * standardized.len());
        for segments in &standardized {
            samples.extend(self.mix_chunk(segments));
        }

        let meta = self.metadata(window, &standardized);
        debug!(
            "Assembled mixed clip: {:.1}s, {} participants",
            meta.duration_secs,
            meta.participants.len()
        );

        Ok(Clip {
            wav: encode_wav(&samples, self.format)?,
            meta,
        })
    }

    /// Assemble one WAV track per consented speaker, all spanning the whole
    /// window: a chunk the speaker was silent in contributes a full chunk
    /// of silence at that position.
    pub fn assemble_per_speaker(
        &self,
        window: &[AudioChunk],
        consent: &dyn ConsentSource,
    ) -> Result<SpeakerClips> {
        let standardized = self.standardize(window, consent)?;
        let meta = self.metadata(window, &standardized);

        let mut tracks = HashMap::new();
        for &speaker in &meta.participants {
            let mut samples = Vec::with_capacity(self.samples_per_chunk() * standardized.len());
            for segments in &standardized {
                match segments.get(&speaker) {
                    Some(segment) => samples.extend_from_slice(segment),
                    None => samples.extend(std::iter::repeat(0i16).take(self.samples_per_chunk())),
                }
            }
            tracks.insert(speaker, encode_wav(&samples, self.format)?);
        }

        debug!(
            "Assembled per-speaker clips: {:.1}s, {} tracks",
            meta.duration_secs,
            tracks.len()
        );

        Ok(SpeakerClips { tracks, meta })
    }

    fn samples_per_chunk(&self) -> usize {
        self.format.samples_in(self.chunk_duration)
    }

    /// Consent-filter, decode and pad every chunk of the snapshot.
    fn standardize(
        &self,
        window: &[AudioChunk],
        consent: &dyn ConsentSource,
    ) -> Result<Vec<HashMap<SpeakerId, Vec<i16>>>> {
        if window.is_empty() {
            return Err(Error::Precondition(
                "clip window is empty; capture has not produced any chunks".into(),
            ));
        }

        let mut standardized = Vec::with_capacity(window.len());
        for chunk in window {
            let mut segments = HashMap::new();
            for (&speaker, bytes) in &chunk.frames {
                if !consent.is_opted_in(speaker) {
                    debug!("Excluding speaker {} from chunk {} (opted out)", speaker, chunk.index);
                    continue;
                }
                segments.insert(speaker, self.pad_to_chunk(decode_pcm(bytes))?);
            }
            standardized.push(segments);
        }

        Ok(standardized)
    }

    /// Left-pad a segment with silence to exactly one chunk of samples,
    /// simulating a speaker who started talking partway through. A segment
    /// already at (or within tolerance above) the chunk length is returned
    /// unchanged; one over tolerance is a hard error, never truncated.
    fn pad_to_chunk(&self, samples: Vec<i16>) -> Result<Vec<i16>> {
        let target = self.samples_per_chunk();
        let tolerance = self.format.samples_in(LENGTH_TOLERANCE);

        if samples.len() > target + tolerance {
            return Err(Error::LengthMismatch {
                actual_ms: self.format.duration_ms(samples.len()),
                limit_ms: (self.chunk_duration + LENGTH_TOLERANCE).as_millis() as u64,
            });
        }
        if samples.len() >= target {
            return Ok(samples);
        }

        let mut padded = vec![0i16; target - samples.len()];
        padded.extend_from_slice(&samples);
        Ok(padded)
    }

    /// Overlay all segments of one chunk onto a silent base of exactly one
    /// chunk. Mixing is sample-wise addition clamped to the i16 range;
    /// silence is the identity. The base never grows, so a segment running
    /// into the tolerance is cut at the chunk boundary here.
    fn mix_chunk(&self, segments: &HashMap<SpeakerId, Vec<i16>>) -> Vec<i16> {
        let mut mixed = vec![0i16; self.samples_per_chunk()];

        for samples in segments.values() {
            for (slot, &sample) in mixed.iter_mut().zip(samples.iter()) {
                let sum = *slot as i32 + sample as i32;
                *slot = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            }
        }

        mixed
    }

    fn metadata(
        &self,
        window: &[AudioChunk],
        standardized: &[HashMap<SpeakerId, Vec<i16>>],
    ) -> ClipMetadata {
        let participants: BTreeSet<SpeakerId> = standardized
            .iter()
            .flat_map(|segments| segments.keys().copied())
            .collect();

        ClipMetadata {
            id: Uuid::new_v4(),
            started_at: window[0].start,
            duration_secs: window.len() as f64 * self.chunk_duration.as_secs_f64(),
            participants: participants.into_iter().collect(),
        }
    }
}

fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn encode_wav(samples: &[i16], format: AudioFormat) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> ClipAssembler {
        // mono 16kHz keeps the sample math readable
        let format = AudioFormat {
            channels: 1,
            bits_per_sample: 16,
            sample_rate: 16_000,
        };
        ClipAssembler::new(format, Duration::from_secs(1))
    }

    #[test]
    fn test_pad_prepends_silence() {
        let assembler = assembler();
        let half_chunk = vec![1000i16; 8_000];

        let padded = assembler.pad_to_chunk(half_chunk).unwrap();

        assert_eq!(padded.len(), 16_000);
        assert!(padded[..8_000].iter().all(|&s| s == 0));
        assert!(padded[8_000..].iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_pad_is_idempotent_on_exact_length() {
        let assembler = assembler();
        let exact = vec![7i16; 16_000];

        let padded = assembler.pad_to_chunk(exact.clone()).unwrap();

        assert_eq!(padded, exact);
    }

    #[test]
    fn test_mix_is_additive_with_clamping() {
        let assembler = assembler();
        let mut segments = HashMap::new();
        segments.insert(1, vec![100i16; 16_000]);
        segments.insert(2, vec![200i16; 16_000]);

        let mixed = assembler.mix_chunk(&segments);
        assert!(mixed.iter().all(|&s| s == 300));

        let mut loud = HashMap::new();
        loud.insert(1, vec![i16::MAX; 16_000]);
        loud.insert(2, vec![i16::MAX; 16_000]);

        let clipped = assembler.mix_chunk(&loud);
        assert!(clipped.iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_mix_of_no_speakers_is_silence() {
        let assembler = assembler();
        let mixed = assembler.mix_chunk(&HashMap::new());

        assert_eq!(mixed.len(), 16_000);
        assert!(mixed.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_decode_pcm_little_endian() {
        let bytes = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        assert_eq!(decode_pcm(&bytes), vec![1, -1, i16::MIN]);
    }
}
