//! Output of one decode pass
//!
//! [`DecodeResults`] owns the frames and packets a pass produced and offers the
//! random-access queries rendering and export build on.

use crate::packet::{Packet, PacketFields};
use crate::types::Frame;
use chrono::TimeDelta;
use serde::Serialize;

/// Frames and packets of one decode pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeResults {
    frames: Vec<Frame>,
    packets: Vec<Packet>,
    sample_rate: u32,
    trigger_sample: i64,
    cancelled: bool,
}

impl DecodeResults {
    pub(crate) fn new(
        frames: Vec<Frame>,
        packets: Vec<Packet>,
        sample_rate: u32,
        trigger_sample: i64,
        cancelled: bool,
    ) -> Self {
        Self {
            frames,
            packets,
            sample_rate,
            trigger_sample,
            cancelled,
        }
    }

    /// Frame by global index
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// All frames in emission order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// All packets in emission order
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Inclusive frame index range of a packet
    pub fn frames_in_packet(&self, packet_index: usize) -> Option<(usize, usize)> {
        self.packets
            .get(packet_index)
            .map(|packet| (packet.first_frame_index, packet.last_frame_index))
    }

    /// Frames of a packet
    pub fn packet_frames(&self, packet_index: usize) -> Option<&[Frame]> {
        let (first, last) = self.frames_in_packet(packet_index)?;
        self.frames.get(first..=last)
    }

    /// Fields of a packet, sorted by type
    pub fn packet_fields(&self, packet_index: usize) -> Option<PacketFields<'_>> {
        self.packet_frames(packet_index).map(PacketFields::collect)
    }

    /// Packet containing a frame
    pub fn packet_of_frame(&self, frame_index: usize) -> Option<usize> {
        let position = self
            .packets
            .partition_point(|packet| packet.last_frame_index < frame_index);
        self.packets
            .get(position)
            .filter(|packet| packet.contains(frame_index))
            .map(|_| position)
    }

    /// Capture sample rate the pass ran at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Time of a sample relative to the trigger sample
    pub fn sample_time(&self, sample: u64) -> TimeDelta {
        let offset = sample as i128 - self.trigger_sample as i128;
        let nanos = offset * 1_000_000_000 / self.sample_rate.max(1) as i128;
        TimeDelta::nanoseconds(nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// True if the pass stopped early on a cancellation request
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
