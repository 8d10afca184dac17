//! PCM16 audio types and helpers
//!
//! Everything on the call path is 16-bit signed little-endian mono PCM.
//! Frames carry raw bytes tagged with their sample rate so that each
//! pipeline stage knows whether a conversion is needed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rates seen on the call path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    /// 8kHz - narrowband telephony
    #[default]
    Hz8000,
    /// 16kHz - wideband telephony / speech recognition
    Hz16000,
    /// 22.05kHz - common synthesizer output
    Hz22050,
    /// 24kHz - common synthesizer output
    Hz24000,
    /// 44.1kHz
    Hz44100,
    /// 48kHz
    Hz48000,
}

impl SampleRate {
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz22050 => 22050,
            SampleRate::Hz24000 => 24000,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }

    pub fn from_u32(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(SampleRate::Hz8000),
            16000 => Some(SampleRate::Hz16000),
            22050 => Some(SampleRate::Hz22050),
            24000 => Some(SampleRate::Hz24000),
            44100 => Some(SampleRate::Hz44100),
            48000 => Some(SampleRate::Hz48000),
            _ => None,
        }
    }

    /// Rates accepted by the telephony leg for `audio/x-l16` playback
    pub fn is_telephony(&self) -> bool {
        matches!(self, SampleRate::Hz8000 | SampleRate::Hz16000)
    }

    /// Number of samples covering `duration` at this rate
    pub fn samples_for(&self, duration: Duration) -> usize {
        (self.as_u32() as u128 * duration.as_millis() / 1000) as usize
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = String;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        SampleRate::from_u32(hz).ok_or_else(|| format!("unsupported sample rate: {hz}"))
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.as_u32()
    }
}

impl std::fmt::Display for SampleRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz", self.as_u32())
    }
}

/// Raw PCM16 mono audio tagged with its rate
#[derive(Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub sample_rate: u32,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("bytes", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl AudioFrame {
    pub fn new(data: Vec<u8>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() < 2
    }
}

/// Decode little-endian PCM16 bytes; a trailing odd byte is ignored
pub fn pcm16_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Encode samples as little-endian PCM16 bytes
pub fn samples_to_pcm16(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_conversion() {
        assert_eq!(SampleRate::Hz8000.as_u32(), 8000);
        assert_eq!(SampleRate::from_u32(22050), Some(SampleRate::Hz22050));
        assert_eq!(SampleRate::from_u32(11025), None);
        assert!(SampleRate::Hz16000.is_telephony());
        assert!(!SampleRate::Hz24000.is_telephony());
        assert_eq!(SampleRate::Hz8000.samples_for(Duration::from_millis(100)), 800);
    }

    #[test]
    fn test_sample_rate_serde_as_number() {
        let json = serde_json::to_string(&SampleRate::Hz16000).unwrap();
        assert_eq!(json, "16000");
        let parsed: SampleRate = serde_json::from_str("8000").unwrap();
        assert_eq!(parsed, SampleRate::Hz8000);
        assert!(serde_json::from_str::<SampleRate>("12345").is_err());
    }

    #[test]
    fn test_pcm16_conversion() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = samples_to_pcm16(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[2..4], &[1, 0]);
        assert_eq!(pcm16_to_samples(&bytes), samples);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        assert_eq!(pcm16_to_samples(&[1, 0, 7]), vec![1]);
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0u8; 1600], 8000);
        assert_eq!(frame.sample_count(), 800);
        assert_eq!(frame.duration(), Duration::from_millis(100));
        assert!(!frame.is_empty());
    }
}
