//! Synthetic CAN captures
//!
//! Encodes frame descriptions into the bit sequence a transmitter would put on
//! the bus (CRC, stuffing, delimiters, EOF) and renders bit sequences into
//! sample buffers. Used to exercise the decoder without a logic analyzer.

use crate::config::DecoderConfig;
use crate::crc::Crc15;
use crate::destuff::stuff_bits;
use crate::samples::SampleBuffer;
use crate::types::{DOMINANT, RECESSIVE};
use serde::{Deserialize, Serialize};

/// CAN identifier of a synthetic frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanId {
    /// 11-bit identifier
    Standard(u16),
    /// 29-bit identifier
    Extended(u32),
}

impl CanId {
    /// Identifier value masked to its width
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Standard(id) => (*id as u32) & 0x7FF,
            CanId::Extended(id) => id & 0x1FFF_FFFF,
        }
    }
}

/// Description of one frame to encode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub id: CanId,
    pub remote: bool,
    /// Data length code as transmitted (0..=15)
    pub dlc: u8,
    /// Payload; shorter than the DLC implies is padded with zeros
    pub data: Vec<u8>,
    /// Whether a receiver drives the ACK slot dominant
    pub ack: bool,
    /// Transmit this CRC instead of the correct one
    pub crc_override: Option<u16>,
}

impl FrameSpec {
    /// Data frame carrying `data`
    pub fn data(id: CanId, data: &[u8]) -> Self {
        Self {
            id,
            remote: false,
            dlc: data.len().min(8) as u8,
            data: data.iter().copied().take(8).collect(),
            ack: true,
            crc_override: None,
        }
    }

    /// Remote frame requesting `dlc` bytes
    pub fn remote(id: CanId, dlc: u8) -> Self {
        Self {
            id,
            remote: true,
            dlc: dlc & 0x0F,
            data: Vec::new(),
            ack: true,
            crc_override: None,
        }
    }

    /// Builder method: set whether the frame is acknowledged
    pub fn with_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    /// Builder method: transmit a wrong CRC
    pub fn with_crc(mut self, crc: u16) -> Self {
        self.crc_override = Some(crc & 0x7FFF);
        self
    }

    /// Number of data bytes actually transmitted
    pub fn transmitted_bytes(&self) -> usize {
        if self.remote {
            0
        } else {
            self.dlc.min(8) as usize
        }
    }

    /// Destuffed bits from SOF through the last data bit
    pub fn crc_covered_bits(&self) -> Vec<bool> {
        let mut bits = vec![DOMINANT];
        let rtr = if self.remote { RECESSIVE } else { DOMINANT };
        match self.id {
            CanId::Standard(_) => {
                push_bits(&mut bits, self.id.raw(), 11);
                bits.push(rtr);
                bits.push(DOMINANT); // IDE
                bits.push(DOMINANT); // r0
            }
            CanId::Extended(_) => {
                let raw = self.id.raw();
                push_bits(&mut bits, raw >> 18, 11);
                bits.push(RECESSIVE); // SRR
                bits.push(RECESSIVE); // IDE
                push_bits(&mut bits, raw & 0x3FFFF, 18);
                bits.push(rtr);
                bits.push(DOMINANT); // r1
                bits.push(DOMINANT); // r0
            }
        }
        push_bits(&mut bits, self.dlc as u32, 4);
        for index in 0..self.transmitted_bytes() {
            let byte = self.data.get(index).copied().unwrap_or(0);
            push_bits(&mut bits, byte as u32, 8);
        }
        bits
    }

    /// Correct CRC-15 for this frame
    pub fn crc(&self) -> u16 {
        Crc15::compute(self.crc_covered_bits())
    }
}

fn push_bits(bits: &mut Vec<bool>, value: u32, width: u32) {
    for shift in (0..width).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

/// Bus-level bit sequence of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// All bits from SOF through the last EOF bit
    pub bits: Vec<bool>,
    /// Indices into `bits` of the inserted stuff bits
    pub stuff_positions: Vec<usize>,
    /// CRC value placed on the bus
    pub crc: u16,
}

/// Encode a frame as a transmitter would send it
pub fn encode_frame(spec: &FrameSpec) -> EncodedFrame {
    let mut unstuffed = spec.crc_covered_bits();
    let crc = spec.crc_override.unwrap_or_else(|| Crc15::compute(unstuffed.iter().copied()));
    push_bits(&mut unstuffed, crc as u32, 15);

    let (mut bits, stuff_positions) = stuff_bits(&unstuffed);
    bits.push(RECESSIVE); // CRC delimiter
    bits.push(if spec.ack { DOMINANT } else { RECESSIVE });
    bits.push(RECESSIVE); // ACK delimiter
    bits.extend(std::iter::repeat(RECESSIVE).take(7));

    EncodedFrame {
        bits,
        stuff_positions,
        crc,
    }
}

/// Renders bits into a dense sample buffer
#[derive(Debug, Clone)]
pub struct CaptureBuilder {
    samples_per_bit: f64,
    position: f64,
    levels: Vec<bool>,
}

impl CaptureBuilder {
    /// Start an empty capture; `samples_per_bit` may be fractional
    pub fn new(samples_per_bit: f64) -> Self {
        Self {
            samples_per_bit,
            position: 0.0,
            levels: Vec::new(),
        }
    }

    /// Start an empty capture with the timing of `config`
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self::new(config.samples_per_bit())
    }

    /// Append recessive bus idle
    pub fn idle(self, bits: usize) -> Self {
        self.bits(&vec![RECESSIVE; bits])
    }

    /// Append raw bus bits
    pub fn bits(mut self, bits: &[bool]) -> Self {
        for &bit in bits {
            self.position += self.samples_per_bit;
            let end = self.position.round() as usize;
            while self.levels.len() < end {
                self.levels.push(bit);
            }
        }
        self
    }

    /// Append an encoded frame
    pub fn frame(self, spec: &FrameSpec) -> Self {
        let encoded = encode_frame(spec);
        self.bits(&encoded.bits)
    }

    /// Sample index the next appended bit will start at
    pub fn next_sample(&self) -> usize {
        self.levels.len()
    }

    /// Finish the capture
    pub fn build(self) -> SampleBuffer {
        SampleBuffer::new(self.levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destuff::STUFF_RUN_LENGTH;

    #[test]
    fn test_standard_frame_length() {
        let spec = FrameSpec::data(CanId::Standard(0x123), &[0xAA, 0xBB]);
        let encoded = encode_frame(&spec);
        // 19 header bits + 16 data + 15 CRC, then stuffing, then 10 tail bits
        let unstuffed = 19 + 16 + 15;
        assert_eq!(encoded.bits.len(), unstuffed + encoded.stuff_positions.len() + 10);
        assert!(!encoded.bits[0]);
        assert_eq!(encoded.crc, spec.crc());
    }

    #[test]
    fn test_extended_identifier_layout() {
        let spec = FrameSpec::remote(CanId::Extended(0x1F2AB3), 2);
        let bits = spec.crc_covered_bits();
        // SOF + 11 + SRR + IDE + 18 + RTR + r1 + r0 + DLC
        assert_eq!(bits.len(), 1 + 11 + 2 + 18 + 3 + 4);
        assert!(bits[12] && bits[13], "SRR and IDE are recessive");
        assert!(bits[32], "RTR is recessive on a remote frame");
    }

    #[test]
    fn test_no_long_runs_in_stuffed_region() {
        let spec = FrameSpec::data(CanId::Standard(0x000), &[0x00, 0xFF, 0x00]);
        let encoded = encode_frame(&spec);
        let stuffed_len = encoded.bits.len() - 10;
        let mut longest = 0;
        let mut run = 0;
        for (index, &bit) in encoded.bits[..stuffed_len].iter().enumerate() {
            run = if index > 0 && encoded.bits[index - 1] == bit { run + 1 } else { 1 };
            longest = longest.max(run);
        }
        assert!(longest <= STUFF_RUN_LENGTH as usize);
        assert!(!encoded.stuff_positions.is_empty());
    }

    #[test]
    fn test_capture_builder_fractional_rate() {
        let buffer = CaptureBuilder::new(2.5).idle(4).bits(&[false, true]).build();
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.to_bit_string(), "111111111100011");
    }

    #[test]
    fn test_remote_frame_ignores_payload() {
        let mut spec = FrameSpec::remote(CanId::Standard(0x10), 8);
        spec.data = vec![1, 2, 3];
        assert_eq!(spec.transmitted_bytes(), 0);
        assert_eq!(spec.crc_covered_bits().len(), 19);
    }
}
