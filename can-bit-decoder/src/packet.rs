//! Packet assembly
//!
//! A packet is the contiguous run of frames decoded for one bus transaction,
//! from the identifier through the ACK or through the error that ended it.

use crate::frame_machine::FrameSink;
use crate::types::{Frame, FrameType};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Inclusive range of frame indices belonging to one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    pub first_frame_index: usize,
    pub last_frame_index: usize,
}

impl Packet {
    /// Frame indices covered by the packet
    pub fn frame_indices(&self) -> RangeInclusive<usize> {
        self.first_frame_index..=self.last_frame_index
    }

    /// Number of frames in the packet (never zero)
    pub fn frame_count(&self) -> usize {
        self.last_frame_index - self.first_frame_index + 1
    }

    /// Whether the global frame index belongs to this packet
    pub fn contains(&self, frame_index: usize) -> bool {
        self.frame_indices().contains(&frame_index)
    }
}

/// The fields present in one packet, looked up by type
///
/// A packet can lack any field (remote frames carry no data, an error can cut
/// a frame short), so every slot is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFields<'a> {
    pub identifier: Option<&'a Frame>,
    pub control: Option<&'a Frame>,
    pub data: Vec<&'a Frame>,
    pub crc: Option<&'a Frame>,
    pub ack: Option<&'a Frame>,
    pub errors: Vec<&'a Frame>,
}

impl<'a> PacketFields<'a> {
    /// Sort the frames of a packet into their slots
    pub fn collect(frames: &'a [Frame]) -> Self {
        let mut fields = PacketFields::default();
        for frame in frames {
            match frame.frame_type {
                FrameType::IdentifierField | FrameType::IdentifierFieldEx => {
                    fields.identifier.get_or_insert(frame);
                }
                FrameType::ControlField => {
                    fields.control.get_or_insert(frame);
                }
                FrameType::DataField => fields.data.push(frame),
                FrameType::CrcField => {
                    fields.crc.get_or_insert(frame);
                }
                FrameType::AckField => {
                    fields.ack.get_or_insert(frame);
                }
                FrameType::CanError => fields.errors.push(frame),
            }
        }
        fields
    }

    /// True if the identifier carries the remote-frame flag
    pub fn is_remote(&self) -> bool {
        self.identifier.is_some_and(|frame| frame.is_remote())
    }

    /// Data bytes in transmission order
    pub fn data_bytes(&self) -> Vec<u8> {
        self.data.iter().map(|frame| frame.value as u8).collect()
    }

    /// True if the packet contains no error frame
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Groups the frame stream into packets
///
/// Implements [`FrameSink`]: frames are appended as they arrive and a packet is
/// closed whenever the state machine reports it is idle again.
#[derive(Debug, Default)]
pub struct PacketAssembler {
    frames: Vec<Frame>,
    packets: Vec<Packet>,
    open_packet: Option<usize>,
}

impl PacketAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames received so far
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Packets closed so far
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Close any open packet and hand over the records
    pub fn finish(mut self) -> (Vec<Frame>, Vec<Packet>) {
        self.on_idle();
        (self.frames, self.packets)
    }
}

impl FrameSink for PacketAssembler {
    fn on_frame(&mut self, frame: Frame) {
        debug_assert!(frame.start_sample <= frame.end_sample);
        debug_assert!(
            self.frames
                .last()
                .map_or(true, |previous| previous.end_sample < frame.start_sample),
            "frames must arrive in sample order without overlap"
        );
        self.open_packet.get_or_insert(self.frames.len());
        self.frames.push(frame);
    }

    fn on_idle(&mut self) {
        let Some(first_frame_index) = self.open_packet.take() else {
            return;
        };
        let packet = Packet {
            first_frame_index,
            last_frame_index: self.frames.len() - 1,
        };
        log::debug!(
            "Packet {} closed with frames {}..={}",
            self.packets.len(),
            packet.first_frame_index,
            packet.last_frame_index
        );
        self.packets.push(packet);
    }
}
