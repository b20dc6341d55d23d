//! Audio frame types and utilities
//!
//! Telephony media arrives as 8 kHz G.711 μ-law. Frames are decoded into
//! normalized f32 samples so recognizers and endpointing work on one format.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Supported audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// 8kHz - Telephony
    #[default]
    Hz8000,
    /// 16kHz - Standard speech recognition
    Hz16000,
}

impl SampleRate {
    /// Get sample rate as u32
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
        }
    }

    /// Parse a rate in Hz, as announced by a media stream
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(SampleRate::Hz8000),
            16000 => Some(SampleRate::Hz16000),
            _ => None,
        }
    }

    /// Get frame size for 20ms chunk
    pub fn frame_size_20ms(&self) -> usize {
        (self.as_u32() as usize * 20) / 1000
    }
}

/// Audio encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioEncoding {
    /// μ-law (telephony)
    #[default]
    Mulaw,
    /// 16-bit signed PCM (little-endian)
    Pcm16,
}

impl AudioEncoding {
    /// Map a MIME-style encoding name (`audio/x-mulaw`, `audio/l16`)
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "audio/x-mulaw" | "audio/mulaw" | "audio/pcmu" => Some(AudioEncoding::Mulaw),
            "audio/l16" | "audio/pcm" => Some(AudioEncoding::Pcm16),
            _ => None,
        }
    }
}

/// Mono audio frame with metadata
///
/// Internally stores samples as f32 for processing efficiency.
#[derive(Clone)]
pub struct AudioFrame {
    /// Raw audio samples (f32, normalized to [-1.0, 1.0])
    pub samples: Arc<[f32]>,
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Frame sequence number for ordering
    pub sequence: u64,
    /// Timestamp when frame was received
    pub timestamp: Instant,
    /// Duration of this frame
    pub duration: Duration,
    /// Energy level in dB
    pub energy_db: f32,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("sequence", &self.sequence)
            .field("duration", &self.duration)
            .field("energy_db", &self.energy_db)
            .finish()
    }
}

const PCM16_NORMALIZE: f32 = 32768.0;
const PCM16_SCALE: f32 = 32767.0;
const SILENCE_DB: f32 = -96.0;

impl AudioFrame {
    /// Create a new audio frame from f32 samples
    pub fn new(samples: Vec<f32>, sample_rate: SampleRate, sequence: u64) -> Self {
        let duration =
            Duration::from_secs_f64(samples.len() as f64 / sample_rate.as_u32() as f64);
        let energy_db = Self::calculate_energy_db(&samples);

        Self {
            samples: samples.into(),
            sample_rate,
            sequence,
            timestamp: Instant::now(),
            duration,
            energy_db,
        }
    }

    /// Calculate RMS energy in decibels
    fn calculate_energy_db(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return SILENCE_DB;
        }

        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();

        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            SILENCE_DB
        }
    }

    /// Decode G.711 μ-law bytes (one byte per sample)
    pub fn from_mulaw(bytes: &[u8], sample_rate: SampleRate, sequence: u64) -> Self {
        let samples = bytes
            .iter()
            .map(|&b| mulaw_to_linear(b) as f32 / PCM16_NORMALIZE)
            .collect();
        Self::new(samples, sample_rate, sequence)
    }

    /// Convert from PCM16 bytes (little-endian)
    pub fn from_pcm16(bytes: &[u8], sample_rate: SampleRate, sequence: u64) -> Self {
        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|chunk| {
                let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
                sample as f32 / PCM16_NORMALIZE
            })
            .collect();

        Self::new(samples, sample_rate, sequence)
    }

    /// Decode raw payload bytes according to the stream's encoding
    pub fn decode(
        bytes: &[u8],
        encoding: AudioEncoding,
        sample_rate: SampleRate,
        sequence: u64,
    ) -> Self {
        match encoding {
            AudioEncoding::Mulaw => Self::from_mulaw(bytes, sample_rate, sequence),
            AudioEncoding::Pcm16 => Self::from_pcm16(bytes, sample_rate, sequence),
        }
    }

    /// Convert to PCM16 bytes (little-endian)
    pub fn to_pcm16(&self) -> Vec<u8> {
        samples_to_pcm16(&self.samples)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    pub fn is_likely_silence(&self, threshold_db: f32) -> bool {
        self.energy_db < threshold_db
    }
}

/// Expand one G.711 μ-law byte to a 16-bit linear sample
pub fn mulaw_to_linear(byte: u8) -> i16 {
    const BIAS: i16 = 0x84;

    let u = !byte;
    let exponent = (u >> 4) & 0x07;
    let mantissa = (u & 0x0F) as i16;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;

    if u & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode normalized f32 samples as PCM16 little-endian bytes
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            ((clamped * PCM16_SCALE) as i16).to_le_bytes()
        })
        .collect()
}

/// Audio buffer for accumulating frames of one utterance
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: SampleRate,
    max_duration: Duration,
}

impl AudioBuffer {
    pub fn new(sample_rate: SampleRate, max_duration: Duration) -> Self {
        Self {
            samples: Vec::with_capacity(Self::max_samples(sample_rate, max_duration)),
            sample_rate,
            max_duration,
        }
    }

    fn max_samples(sample_rate: SampleRate, max_duration: Duration) -> usize {
        (sample_rate.as_u32() as f64 * max_duration.as_secs_f64()) as usize
    }

    /// Push audio frame to buffer, keeping only the newest `max_duration`
    pub fn push(&mut self, frame: &AudioFrame) {
        self.samples.extend(frame.samples.iter());

        let max_samples = Self::max_samples(self.sample_rate, self.max_duration);
        if self.samples.len() > max_samples {
            let excess = self.samples.len() - max_samples;
            self.samples.drain(0..excess);
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get buffer duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.as_u32() as f64)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Take every buffered sample, leaving the buffer empty
    pub fn take(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }
}
