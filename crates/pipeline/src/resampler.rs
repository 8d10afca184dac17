//! PCM16 sample-rate conversion
//!
//! Synthesizers produce audio at their own native rate (commonly 22.05 or
//! 24 kHz) while the telephony leg plays 8 or 16 kHz. Conversion is done per
//! chunk, so each call must be self-contained: the output length is
//! `floor(n * target / source)` and the first output sample lines up with the
//! first input sample.
//!
//! Two kernels are available. Linear interpolation is cheap but aliases
//! audibly on downsampling; Lanczos (default, `a = 3`) is a windowed sinc
//! whose weights are renormalized over the in-range taps, so chunk edges are
//! handled by truncation rather than by zero-extension.

use std::borrow::Cow;
use std::f64::consts::PI;
use std::time::Duration;

use voice_call_config::constants::audio::LANCZOS_A;
use voice_call_config::{AudioConfig, ResampleQuality};
use voice_call_core::audio::{pcm16_to_samples, samples_to_pcm16};

use crate::PipelineError;

/// Convert PCM16 mono bytes from `source_rate` to `target_rate`.
///
/// Equal rates return the input untouched. A zero rate yields empty output.
pub fn resample(
    input: &[u8],
    source_rate: u32,
    target_rate: u32,
    quality: ResampleQuality,
) -> Cow<'_, [u8]> {
    resample_with(input, source_rate, target_rate, quality, LANCZOS_A)
}

fn resample_with(
    input: &[u8],
    source_rate: u32,
    target_rate: u32,
    quality: ResampleQuality,
    lanczos_a: usize,
) -> Cow<'_, [u8]> {
    if source_rate == target_rate {
        return Cow::Borrowed(input);
    }
    if source_rate == 0 || target_rate == 0 {
        return Cow::Owned(Vec::new());
    }

    let samples = pcm16_to_samples(input);
    let out_len = output_len(samples.len(), source_rate, target_rate);
    let ratio = source_rate as f64 / target_rate as f64;

    let output: Vec<i16> = match quality {
        ResampleQuality::Linear => (0..out_len)
            .map(|i| linear_at(&samples, i as f64 * ratio))
            .collect(),
        ResampleQuality::Lanczos => (0..out_len)
            .map(|i| lanczos_at(&samples, i as f64 * ratio, lanczos_a.max(1)))
            .collect(),
    };

    Cow::Owned(samples_to_pcm16(&output))
}

/// `floor(n / (source / target))`, computed without floating point
fn output_len(input_samples: usize, source_rate: u32, target_rate: u32) -> usize {
    (input_samples as u64 * target_rate as u64 / source_rate as u64) as usize
}

fn linear_at(samples: &[i16], position: f64) -> i16 {
    if samples.is_empty() {
        return 0;
    }
    let last = samples.len() - 1;
    let base = position.floor();
    let i0 = (base as usize).min(last);
    let i1 = (i0 + 1).min(last);
    let frac = position - base;

    let s0 = samples[i0] as f64;
    let s1 = samples[i1] as f64;
    clamp_sample(s0 + (s1 - s0) * frac)
}

fn lanczos_at(samples: &[i16], position: f64, a: usize) -> i16 {
    if samples.is_empty() {
        return 0;
    }
    let a_f = a as f64;
    let center = position.floor() as i64;
    let lo = center - a as i64 + 1;
    let hi = center + a as i64;

    let mut sum = 0.0;
    let mut weight_total = 0.0;
    for j in lo..=hi {
        if j < 0 || j as usize >= samples.len() {
            continue;
        }
        let x = position - j as f64;
        if x.abs() >= a_f {
            continue;
        }
        let weight = lanczos_kernel(x, a_f);
        sum += samples[j as usize] as f64 * weight;
        weight_total += weight;
    }

    if weight_total.abs() < f64::EPSILON {
        let nearest = (position.round() as usize).min(samples.len() - 1);
        return samples[nearest];
    }
    clamp_sample(sum / weight_total)
}

/// `sinc(x) * sinc(x / a)` for `|x| < a`, else 0
fn lanczos_kernel(x: f64, a: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let px = PI * x;
    a * px.sin() * (px / a).sin() / (px * px)
}

fn clamp_sample(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Zero-valued PCM16 covering `duration` at `sample_rate`
pub fn silence(duration: Duration, sample_rate: u32) -> Vec<u8> {
    let samples = (sample_rate as u128 * duration.as_millis() / 1000) as usize;
    vec![0u8; samples * 2]
}

/// Outbound audio converter configured for one call
#[derive(Debug, Clone)]
pub struct Resampler {
    quality: ResampleQuality,
    lanczos_a: usize,
    silence_pad: Duration,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

impl Resampler {
    pub fn new(quality: ResampleQuality, lanczos_a: usize, silence_pad: Duration) -> Self {
        Self {
            quality,
            lanczos_a: lanczos_a.max(1),
            silence_pad,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            config.quality,
            config.lanczos_a,
            Duration::from_millis(config.silence_pad_ms),
        )
    }

    pub fn quality(&self) -> ResampleQuality {
        self.quality
    }

    pub fn resample<'a>(
        &self,
        input: &'a [u8],
        source_rate: u32,
        target_rate: u32,
    ) -> Result<Cow<'a, [u8]>, PipelineError> {
        if source_rate == 0 || target_rate == 0 {
            return Err(PipelineError::InvalidSampleRate {
                source_rate,
                target_rate,
            });
        }
        Ok(resample_with(
            input,
            source_rate,
            target_rate,
            self.quality,
            self.lanczos_a,
        ))
    }

    /// Convert a synthesized chunk to the telephony rate and append the
    /// silence pad. `chunk` must contain whole samples.
    pub fn prepare_outbound(
        &self,
        chunk: &[u8],
        source_rate: u32,
        target_rate: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        let converted = self.resample(chunk, source_rate, target_rate)?;
        let pad = silence(self.silence_pad, target_rate);

        let mut out = Vec::with_capacity(converted.len() + pad.len());
        out.extend_from_slice(&converted);
        out.extend_from_slice(&pad);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, rate: u32, samples: usize, amplitude: f64) -> Vec<i16> {
        (0..samples)
            .map(|n| (amplitude * (2.0 * PI * freq * n as f64 / rate as f64).sin()).round() as i16)
            .collect()
    }

    /// Squared error against the ideal tone, skipping chunk edges
    fn error_energy(output: &[i16], freq: f64, rate: u32, amplitude: f64, skip: usize) -> f64 {
        output[skip..output.len() - skip]
            .iter()
            .enumerate()
            .map(|(k, &s)| {
                let n = k + skip;
                let ideal = amplitude * (2.0 * PI * freq * n as f64 / rate as f64).sin();
                (s as f64 - ideal).powi(2)
            })
            .sum()
    }

    #[test]
    fn test_equal_rates_are_identity() {
        let input = samples_to_pcm16(&[1, -2, 3, i16::MAX]);
        for quality in [ResampleQuality::Linear, ResampleQuality::Lanczos] {
            let out = resample(&input, 16000, 16000, quality);
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(out.as_ref(), input.as_slice());
        }
    }

    #[test]
    fn test_output_length_is_floored() {
        let input = vec![0u8; 2 * 1001];
        let out = resample(&input, 24000, 8000, ResampleQuality::Lanczos);
        assert_eq!(out.len() / 2, 333);

        let out = resample(&input, 22050, 8000, ResampleQuality::Linear);
        assert_eq!(out.len() / 2, 1001 * 8000 / 22050);

        let out = resample(&input, 8000, 16000, ResampleQuality::Linear);
        assert_eq!(out.len() / 2, 2002);
    }

    #[test]
    fn test_zero_rate_yields_empty() {
        let input = vec![0u8; 64];
        assert!(resample(&input, 0, 8000, ResampleQuality::Lanczos).is_empty());
        assert!(Resampler::default().resample(&input, 8000, 0).is_err());
    }

    #[test]
    fn test_integer_decimation_picks_aligned_samples() {
        let input: Vec<i16> = (0..30).map(|n| n * 100).collect();
        let pcm = samples_to_pcm16(&input);
        let out = pcm16_to_samples(&resample(&pcm, 24000, 8000, ResampleQuality::Linear));
        assert_eq!(out, vec![0, 300, 600, 900, 1200, 1500, 1800, 2100, 2400, 2700]);
    }

    #[test]
    fn test_linear_upsampling_interpolates() {
        let input = samples_to_pcm16(&[0, 1000, 2000]);
        let out = pcm16_to_samples(&resample(&input, 8000, 16000, ResampleQuality::Linear));
        assert_eq!(out, vec![0, 500, 1000, 1500, 2000, 2000]);
    }

    #[test]
    fn test_constant_signal_survives_lanczos() {
        let input = samples_to_pcm16(&vec![1234i16; 500]);
        let out = pcm16_to_samples(&resample(&input, 22050, 8000, ResampleQuality::Lanczos));
        assert!(out.iter().all(|&s| s == 1234));
    }

    #[test]
    fn test_samples_are_clamped() {
        assert_eq!(clamp_sample(40000.0), i16::MAX);
        assert_eq!(clamp_sample(-40000.0), i16::MIN);
        assert_eq!(clamp_sample(12.4), 12);

        // Full-scale square wave overshoots under a sinc kernel
        let square: Vec<i16> = (0..2000)
            .map(|n| if (n / 10) % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let out = pcm16_to_samples(&resample(
            &samples_to_pcm16(&square),
            22050,
            8000,
            ResampleQuality::Lanczos,
        ));
        assert!(out.contains(&i16::MAX));
        assert!(out.contains(&i16::MIN));
    }

    #[test]
    fn test_lanczos_beats_linear_on_non_integer_ratio() {
        let (source, target, freq, amplitude) = (22050u32, 8000u32, 2000.0, 12000.0);
        let input = samples_to_pcm16(&tone(freq, source, source as usize / 5, amplitude));

        let linear = pcm16_to_samples(&resample(&input, source, target, ResampleQuality::Linear));
        let lanczos = pcm16_to_samples(&resample(&input, source, target, ResampleQuality::Lanczos));
        assert_eq!(linear.len(), lanczos.len());

        let linear_err = error_energy(&linear, freq, target, amplitude, 8);
        let lanczos_err = error_energy(&lanczos, freq, target, amplitude, 8);
        assert!(
            lanczos_err < linear_err * 0.25,
            "lanczos {lanczos_err} vs linear {linear_err}"
        );
    }

    #[test]
    fn test_kernel_shape() {
        assert_eq!(lanczos_kernel(0.0, 3.0), 1.0);
        assert_eq!(lanczos_kernel(3.0, 3.0), 0.0);
        assert_eq!(lanczos_kernel(-3.5, 3.0), 0.0);
        assert!(lanczos_kernel(1.0, 3.0).abs() < 1e-12);
        assert!(lanczos_kernel(0.5, 3.0) > 0.5);
        assert!(lanczos_kernel(1.5, 3.0) < 0.0);
    }

    #[test]
    fn test_prepare_outbound_appends_pad() {
        let resampler = Resampler::default();
        let chunk = samples_to_pcm16(&vec![500i16; 2400]);
        let out = resampler.prepare_outbound(&chunk, 24000, 8000).unwrap();

        // 800 converted samples + 100ms of silence at 8kHz
        assert_eq!(out.len(), (800 + 800) * 2);
        assert!(out[1600..].iter().all(|&b| b == 0));
        assert!(pcm16_to_samples(&out[..1600]).iter().all(|&s| s == 500));
    }

    #[test]
    fn test_silence_length() {
        assert_eq!(silence(Duration::from_millis(100), 16000).len(), 3200);
        assert!(silence(Duration::ZERO, 8000).is_empty());
    }
}
