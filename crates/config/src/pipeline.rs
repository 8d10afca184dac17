//! Audio pipeline and turn-taking configuration

use serde::{Deserialize, Serialize};

use crate::constants::{audio, echo, turn_detection};
use crate::ConfigError;

/// Interpolation used when converting synthesizer audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResampleQuality {
    Linear,
    #[default]
    Lanczos,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub turn: TurnConfig,

    #[serde(default)]
    pub echo: EchoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub quality: ResampleQuality,

    /// Lanczos kernel half-width
    #[serde(default = "default_lanczos_a")]
    pub lanczos_a: usize,

    /// Zero padding appended to each outbound chunk
    #[serde(default = "default_silence_pad_ms")]
    pub silence_pad_ms: u64,

    /// Rate the recognizer expects; inbound audio is converted when it differs
    #[serde(default = "default_recognizer_sample_rate")]
    pub recognizer_sample_rate: u32,
}

fn default_lanczos_a() -> usize {
    audio::LANCZOS_A
}

fn default_silence_pad_ms() -> u64 {
    audio::SILENCE_PAD_MS
}

fn default_recognizer_sample_rate() -> u32 {
    audio::RECOGNIZER_SAMPLE_RATE
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            quality: ResampleQuality::default(),
            lanczos_a: default_lanczos_a(),
            silence_pad_ms: default_silence_pad_ms(),
            recognizer_sample_rate: default_recognizer_sample_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Silence after a final transcript before dispatching the turn
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,

    /// Delay between an accepted barge-in and dispatch
    #[serde(default = "default_interrupt_grace_ms")]
    pub interrupt_grace_ms: u64,
}

fn default_silence_ms() -> u64 {
    turn_detection::SILENCE_TIMEOUT_MS
}

fn default_interrupt_grace_ms() -> u64 {
    turn_detection::INTERRUPT_GRACE_MS
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_ms: default_silence_ms(),
            interrupt_grace_ms: default_interrupt_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_similarity_words")]
    pub similarity_words: usize,

    #[serde(default = "default_min_barge_in_chars")]
    pub min_barge_in_chars: usize,
}

fn default_window_ms() -> u64 {
    echo::WINDOW_MS
}

fn default_similarity_words() -> usize {
    echo::SIMILARITY_WORDS
}

fn default_min_barge_in_chars() -> usize {
    echo::MIN_BARGE_IN_CHARS
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            similarity_words: default_similarity_words(),
            min_barge_in_chars: default_min_barge_in_chars(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.lanczos_a == 0 {
            return Err(ConfigError::invalid(
                "pipeline.audio.lanczos_a",
                "Kernel half-width must be at least 1",
            ));
        }

        if self.audio.recognizer_sample_rate == 0 {
            return Err(ConfigError::invalid(
                "pipeline.audio.recognizer_sample_rate",
                "Sample rate cannot be 0",
            ));
        }

        if self.turn.silence_ms == 0 {
            return Err(ConfigError::invalid(
                "pipeline.turn.silence_ms",
                "Silence timeout must be positive",
            ));
        }

        if !(echo::WINDOW_MIN_MS..=echo::WINDOW_MAX_MS).contains(&self.echo.window_ms) {
            return Err(ConfigError::invalid(
                "pipeline.echo.window_ms",
                format!(
                    "Must be between {} and {}, got {}",
                    echo::WINDOW_MIN_MS,
                    echo::WINDOW_MAX_MS,
                    self.echo.window_ms
                ),
            ));
        }

        if self.echo.similarity_words == 0 {
            return Err(ConfigError::invalid(
                "pipeline.echo.similarity_words",
                "Must compare at least one word",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.turn.silence_ms, 500);
        assert_eq!(config.turn.interrupt_grace_ms, 300);
        assert_eq!(config.echo.window_ms, 3500);
        assert_eq!(config.audio.quality, ResampleQuality::Lanczos);
        assert_eq!(config.audio.lanczos_a, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_echo_window_range() {
        let mut config = PipelineConfig::default();
        config.echo.window_ms = 2500;
        assert!(config.validate().is_err());

        config.echo.window_ms = 4000;
        assert!(config.validate().is_ok());

        config.echo.window_ms = 4001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quality_parses_lowercase() {
        let audio: AudioConfig = serde_json::from_str(r#"{"quality":"linear"}"#).unwrap();
        assert_eq!(audio.quality, ResampleQuality::Linear);
        assert_eq!(audio.silence_pad_ms, 100);
    }
}
