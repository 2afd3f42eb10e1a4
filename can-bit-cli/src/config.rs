//! Configuration loading and parsing
//!
//! Analyzer settings (channel, bit timing, FRC mode, display base) and output
//! settings come from an optional `config.toml`; command-line flags override
//! whatever the file sets.

use crate::render::DisplayBase;
use anyhow::{Context, Result};
use can_bit_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// Logic analyzer channel carrying the bus
    #[serde(default)]
    pub channel: usize,
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Decompose identifiers with the FRC layout
    #[serde(default)]
    pub frc: bool,
    #[serde(default)]
    pub display_base: DisplayBase,
    /// Stop looking for a start of frame after this many idle bit times
    pub idle_timeout_bits: Option<u32>,
}

fn default_bit_rate() -> u32 {
    DecoderConfig::default().bit_rate
}

fn default_sample_rate() -> u32 {
    DecoderConfig::default().sample_rate
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            bit_rate: default_bit_rate(),
            sample_rate: default_sample_rate(),
            frc: false,
            display_base: DisplayBase::default(),
            idle_timeout_bits: None,
        }
    }
}

impl AnalyzerConfig {
    /// Bit timing handed to the decoder library
    pub fn decoder_config(&self) -> DecoderConfig {
        let config = DecoderConfig::new()
            .with_bit_rate(self.bit_rate)
            .with_sample_rate(self.sample_rate);
        match self.idle_timeout_bits {
            Some(bits) => config.with_idle_timeout_bits(bits),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Output file (default: stdout); with several inputs, a directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Csv,
    Json,
    /// One line per packet of fitted bubble texts
    Bubbles,
}

impl OutputFormat {
    /// File extension for per-input output files
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Bubbles => "txt",
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .analyzer
        .decoder_config()
        .validate()
        .with_context(|| format!("Invalid analyzer settings in {:?}", path))?;

    Ok(config)
}
