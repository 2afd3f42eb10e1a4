//! Output writers: CSV export, text listing, bubble lines, JSON dump
//!
//! The CSV layout has a fixed column set; a field missing from a packet (no
//! data on a remote frame, everything after an error) leaves an empty cell.

use crate::render::{ack_text, fit_bubble, format_number, DisplayBase, FrameRenderer};
use anyhow::Result;
use can_bit_decoder::{DecodeResults, FrameType};
use chrono::TimeDelta;
use std::io::Write;

/// CSV header row
pub const CSV_HEADER: &str = "Time [s],Packet,Type,Identifier,Control,Data,CRC,ACK";

/// Seconds with nanosecond resolution, e.g. `-0.000012500`
pub fn format_seconds(delta: TimeDelta) -> String {
    let nanos = delta.num_nanoseconds().unwrap_or(i64::MAX);
    let sign = if nanos < 0 { "-" } else { "" };
    let magnitude = nanos.unsigned_abs();
    format!("{}{}.{:09}", sign, magnitude / 1_000_000_000, magnitude % 1_000_000_000)
}

fn csv_cell(text: &str) -> String {
    if text.contains(|ch: char| matches!(ch, ',' | '"' | '\n')) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Cells of one CSV row, in [`CSV_HEADER`] order
pub fn packet_row(results: &DecodeResults, packet_index: usize, base: DisplayBase) -> Option<[String; 8]> {
    let fields = results.packet_fields(packet_index)?;
    let (first, _) = results.frames_in_packet(packet_index)?;
    let start = results.frame(first)?.start_sample;

    let number = |value: u64, frame_type: FrameType| format_number(value, base, frame_type.value_bits());
    let packet_type = if fields.is_remote() { "REMOTE" } else { "DATA" };

    Some([
        format_seconds(results.sample_time(start)),
        packet_index.to_string(),
        packet_type.to_string(),
        fields
            .identifier
            .map(|frame| number(frame.value, frame.frame_type))
            .unwrap_or_default(),
        fields
            .control
            .map(|frame| number(frame.value, frame.frame_type))
            .unwrap_or_default(),
        fields
            .data
            .iter()
            .map(|frame| number(frame.value, frame.frame_type))
            .collect::<Vec<_>>()
            .join(" "),
        fields
            .crc
            .map(|frame| number(frame.value, frame.frame_type))
            .unwrap_or_default(),
        fields.ack.map(ack_text).unwrap_or_default().to_string(),
    ])
}

/// Write the CSV export, flushing after every packet
pub fn write_csv<W: Write>(writer: &mut W, results: &DecodeResults, base: DisplayBase) -> Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for packet_index in 0..results.packet_count() {
        let Some(row) = packet_row(results, packet_index, base) else {
            continue;
        };
        let cells: Vec<String> = row.iter().map(|cell| csv_cell(cell)).collect();
        writeln!(writer, "{}", cells.join(","))?;
        writer.flush()?;
    }
    Ok(())
}

/// Write a human-readable listing, one block per packet
pub fn write_text<W: Write>(
    writer: &mut W,
    results: &DecodeResults,
    renderer: &FrameRenderer,
) -> Result<()> {
    for packet_index in 0..results.packet_count() {
        let Some(frames) = results.packet_frames(packet_index) else {
            continue;
        };
        let start = frames.first().map_or(0, |frame| frame.start_sample);
        writeln!(
            writer,
            "Packet {} @ {} s",
            packet_index,
            format_seconds(results.sample_time(start))
        )?;
        for frame in frames {
            for line in renderer.tabular_text(frame) {
                writeln!(writer, "  [{:>10}..{:>10}] {}", frame.start_sample, frame.end_sample, line)?;
            }
        }
    }
    if results.is_cancelled() {
        writeln!(writer, "(decode stopped after {} packets)", results.packet_count())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one line per packet, each field as the widest bubble text that fits
/// its duration at one character per bit
pub fn write_bubbles<W: Write>(
    writer: &mut W,
    results: &DecodeResults,
    renderer: &FrameRenderer,
    samples_per_bit: f64,
) -> Result<()> {
    for packet_index in 0..results.packet_count() {
        let Some(frames) = results.packet_frames(packet_index) else {
            continue;
        };
        let cells: Vec<String> = frames
            .iter()
            .map(|frame| {
                let samples = (frame.end_sample - frame.start_sample + 1) as f64;
                let width = (samples / samples_per_bit).round() as usize;
                format!("[{}]", fit_bubble(&renderer.bubble_text(frame), width))
            })
            .collect();
        writeln!(writer, "{:>5} {}", packet_index, cells.join(" "))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the raw frames and packets as JSON
pub fn write_json<W: Write>(writer: &mut W, results: &DecodeResults) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, results)?;
    writeln!(writer)?;
    Ok(())
}
