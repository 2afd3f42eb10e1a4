//! Decoder configuration types
//!
//! This module defines the bit-timing settings the decoder needs. Display
//! concerns (numeric base, vendor profile rendering) belong to the application
//! layer and are not part of this configuration.

use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};

/// Fewer samples per bit than this cannot place a sample point mid-bit reliably
pub const MIN_SAMPLES_PER_BIT: f64 = 4.0;

/// Configuration for the decoder library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Nominal bus bit rate in bits per second
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,

    /// Capture sample rate in samples per second
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Optional: stop looking for a start of frame after this many idle bit times
    #[serde(default)]
    pub idle_timeout_bits: Option<u32>,

    /// Sample index that time values are reported relative to; negative when
    /// the trigger precedes the first sample
    #[serde(default)]
    pub trigger_sample: i64,
}

fn default_bit_rate() -> u32 {
    1_000_000
}

fn default_sample_rate() -> u32 {
    10_000_000
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            bit_rate: default_bit_rate(),
            sample_rate: default_sample_rate(),
            idle_timeout_bits: None,
            trigger_sample: 0,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the bus bit rate
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Builder method: set the capture sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Builder method: set the idle timeout in bit times
    pub fn with_idle_timeout_bits(mut self, bits: u32) -> Self {
        self.idle_timeout_bits = Some(bits);
        self
    }

    /// Builder method: set the trigger sample
    pub fn with_trigger_sample(mut self, sample: i64) -> Self {
        self.trigger_sample = sample;
        self
    }

    /// Nominal bit period measured in samples
    pub fn samples_per_bit(&self) -> f64 {
        self.sample_rate as f64 / self.bit_rate as f64
    }

    /// Idle timeout converted to samples
    pub fn idle_timeout_samples(&self) -> Option<u64> {
        self.idle_timeout_bits
            .map(|bits| (bits as f64 * self.samples_per_bit()).ceil() as u64)
    }

    /// Check the timing settings before a decode pass
    pub fn validate(&self) -> Result<()> {
        if self.bit_rate == 0 {
            return Err(DecoderError::InvalidConfig("bit rate must be non-zero".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(DecoderError::InvalidConfig("sample rate must be non-zero".to_string()));
        }
        let samples_per_bit = self.samples_per_bit();
        if samples_per_bit < MIN_SAMPLES_PER_BIT {
            return Err(DecoderError::InvalidConfig(format!(
                "sample rate {} Hz gives {:.2} samples per bit at {} bit/s, need at least {}",
                self.sample_rate, samples_per_bit, self.bit_rate, MIN_SAMPLES_PER_BIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_builder() {
        let config = DecoderConfig::new()
            .with_bit_rate(500_000)
            .with_sample_rate(8_000_000)
            .with_idle_timeout_bits(100)
            .with_trigger_sample(42);

        assert_eq!(config.bit_rate, 500_000);
        assert_eq!(config.samples_per_bit(), 16.0);
        assert_eq!(config.idle_timeout_samples(), Some(1600));
        assert_eq!(config.trigger_sample, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DecoderConfig::default();
        assert_eq!(config.samples_per_bit(), 10.0);
        assert_eq!(config.idle_timeout_samples(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_undersampling() {
        let config = DecoderConfig::new().with_bit_rate(1_000_000).with_sample_rate(2_000_000);
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::new().with_bit_rate(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let config: DecoderConfig = serde_json::from_str(r#"{ "bit_rate": 250000 }"#).unwrap();
        assert_eq!(config.bit_rate, 250_000);
        assert_eq!(config.sample_rate, 10_000_000);
        assert_eq!(config.idle_timeout_bits, None);
    }
}
