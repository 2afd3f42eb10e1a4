//! Capture file loading
//!
//! Two formats are accepted:
//! - `.bits`: one `0`/`1` character per sample, whitespace ignored, lines
//!   starting with `#` are comments
//! - `.csv`: logic analyzer transition export, a `Time [s],Channel 0,...`
//!   header followed by one row per level change, with times relative to the
//!   analyzer trigger

use anyhow::{bail, Context, Result};
use can_bit_decoder::frame_machine::BUS_IDLE_BITS;
use can_bit_decoder::{DecoderConfig, EdgeCapture, SampleBuffer, SampleSource};
use std::fs;
use std::path::Path;

/// A loaded capture, dense or edge-encoded
#[derive(Debug, Clone)]
pub enum Capture {
    Dense(SampleBuffer),
    Edges(EdgeCapture),
}

impl SampleSource for Capture {
    fn sample_count(&self) -> u64 {
        match self {
            Capture::Dense(buffer) => buffer.sample_count(),
            Capture::Edges(edges) => edges.sample_count(),
        }
    }

    fn level(&self, index: u64) -> bool {
        match self {
            Capture::Dense(buffer) => buffer.level(index),
            Capture::Edges(edges) => edges.level(index),
        }
    }

    fn next_falling_edge(&self, from: u64, until: u64) -> Option<u64> {
        match self {
            Capture::Dense(buffer) => buffer.next_falling_edge(from, until),
            Capture::Edges(edges) => edges.next_falling_edge(from, until),
        }
    }

    fn is_recessive_over(&self, start: u64, end: u64) -> bool {
        match self {
            Capture::Dense(buffer) => buffer.is_recessive_over(start, end),
            Capture::Edges(edges) => edges.is_recessive_over(start, end),
        }
    }
}

/// A capture plus the sample index of its trigger (time zero)
#[derive(Debug, Clone)]
pub struct LoadedCapture {
    pub samples: Capture,
    pub trigger_sample: i64,
}

impl LoadedCapture {
    /// `config` with the trigger of this capture applied
    pub fn decoder_config(&self, config: &DecoderConfig) -> DecoderConfig {
        config.clone().with_trigger_sample(self.trigger_sample)
    }
}

/// Load a capture, choosing the format by extension
///
/// `channel` selects the column of a CSV export; the timing in `config`
/// converts its timestamps to sample indices. A `.bits` capture is triggered
/// at its first sample.
pub fn load_capture(
    path: &Path,
    channel: usize,
    config: &DecoderConfig,
) -> Result<LoadedCapture> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read capture file: {:?}", path))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let loaded = match extension.as_deref() {
        Some("csv") => {
            let (edges, trigger_sample) = parse_transition_csv(&content, channel, config)
                .with_context(|| format!("Failed to parse CSV capture: {:?}", path))?;
            LoadedCapture {
                samples: Capture::Edges(edges),
                trigger_sample,
            }
        }
        Some("bits") | Some("txt") => LoadedCapture {
            samples: parse_bit_text(&content)
                .map(Capture::Dense)
                .with_context(|| format!("Failed to parse bit capture: {:?}", path))?,
            trigger_sample: 0,
        },
        _ => bail!("Unsupported capture format: {:?} (expected .bits or .csv)", path),
    };

    log::debug!(
        "Loaded {} samples from {:?}, trigger at sample {}",
        loaded.samples.sample_count(),
        path,
        loaded.trigger_sample
    );
    Ok(loaded)
}

/// Parse `.bits` text
pub fn parse_bit_text(content: &str) -> Result<SampleBuffer> {
    let samples: String = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    Ok(SampleBuffer::from_bit_string(&samples)?)
}

/// Parse a transition CSV export into an edge capture and its trigger sample
///
/// Sample 0 is the first row; the trigger (time zero) may lie before or after
/// it. The line keeps its final level for one bus-idle period past the last
/// row so a trailing frame is complete. Rows closer together than one sample
/// period collapse onto the same index, and a pulse between them is dropped.
pub fn parse_transition_csv(
    content: &str,
    channel: usize,
    config: &DecoderConfig,
) -> Result<(EdgeCapture, i64)> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().context("CSV capture is empty")?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if !columns.first().is_some_and(|first| first.starts_with("Time")) {
        bail!("CSV header must start with a time column, found {:?}", header);
    }
    let wanted = format!("Channel {}", channel);
    let column = columns
        .iter()
        .position(|name| *name == wanted)
        .with_context(|| format!("CSV capture has no '{}' column", wanted))?;

    let mut rows = Vec::new();
    for (number, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let time: f64 = cells[0]
            .parse()
            .with_context(|| format!("Bad time value on data row {}: {:?}", number + 1, cells[0]))?;
        let level = match cells.get(column) {
            Some(&"1") => true,
            Some(&"0") => false,
            other => bail!("Bad level on data row {}: {:?}", number + 1, other),
        };
        rows.push((time, level));
    }

    let Some(&(start_time, initial)) = rows.first() else {
        bail!("CSV capture has no data rows");
    };

    let sample_rate = config.sample_rate as f64;
    let mut transitions = Vec::with_capacity(rows.len());
    let mut last_sample = 0u64;
    for &(time, level) in &rows[1..] {
        if time < start_time {
            bail!("CSV rows are not in time order");
        }
        let sample = ((time - start_time) * sample_rate).round() as u64;
        if sample < last_sample {
            bail!("CSV rows are not in time order");
        }
        last_sample = sample;
        transitions.push((sample, level));
    }

    let tail = (BUS_IDLE_BITS as f64 * config.samples_per_bit()).ceil() as u64;
    let sample_count = last_sample + tail.max(1) + 1;
    let trigger_sample = (-start_time * sample_rate).round() as i64;
    let edges = EdgeCapture::from_transitions(initial, transitions, sample_count)?;
    Ok((edges, trigger_sample))
}
