//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct is the entry point for running decode passes over
//! captured samples.

use crate::config::DecoderConfig;
use crate::frame_machine::FrameStateMachine;
use crate::packet::PacketAssembler;
use crate::results::DecodeResults;
use crate::samples::SampleSource;
use crate::types::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation, polled once per packet boundary
///
/// A packet in progress is always decoded to completion before the check.
pub trait Cancellation {
    /// Return true to end the pass after `packets_decoded` packets
    fn should_stop(&self, packets_decoded: usize) -> bool;
}

/// Never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn should_stop(&self, _packets_decoded: usize) -> bool {
        false
    }
}

/// Flag set from another thread
impl Cancellation for AtomicBool {
    fn should_stop(&self, _packets_decoded: usize) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Stop after a fixed number of packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLimit(pub usize);

impl Cancellation for PacketLimit {
    fn should_stop(&self, packets_decoded: usize) -> bool {
        packets_decoded >= self.0
    }
}

/// The main decoder struct - entry point for all decoding operations
///
/// A decoder holds only validated configuration; every pass builds its own
/// state, so one decoder can serve several passes, on several threads.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a decoder, rejecting unusable bit timing
    ///
    /// # Example
    /// ```
    /// use can_bit_decoder::{Decoder, DecoderConfig};
    ///
    /// let decoder = Decoder::new(DecoderConfig::new().with_bit_rate(500_000)).unwrap();
    /// assert_eq!(decoder.config().samples_per_bit(), 20.0);
    /// ```
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration used for every pass
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a whole sample source
    pub fn decode<S: SampleSource + ?Sized>(&self, source: &S) -> DecodeResults {
        self.decode_with_cancel(source, &NeverCancel)
    }

    /// Decode until the source is exhausted or `cancel` asks to stop
    pub fn decode_with_cancel<S, C>(&self, source: &S, cancel: &C) -> DecodeResults
    where
        S: SampleSource + ?Sized,
        C: Cancellation + ?Sized,
    {
        log::info!(
            "Decoding {} samples at {:.2} samples per bit",
            source.sample_count(),
            self.config.samples_per_bit()
        );

        let mut machine = FrameStateMachine::new(source, &self.config);
        let mut assembler = PacketAssembler::new();
        let mut cancelled = false;

        loop {
            if cancel.should_stop(assembler.packets().len()) {
                log::info!("Decode cancelled after {} packets", assembler.packets().len());
                cancelled = true;
                break;
            }
            if !machine.decode_next_packet(&mut assembler) {
                break;
            }
        }

        let (frames, packets) = assembler.finish();
        log::info!("Decoded {} frames in {} packets", frames.len(), packets.len());

        DecodeResults::new(
            frames,
            packets,
            self.config.sample_rate,
            self.config.trigger_sample,
            cancelled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{CanId, CaptureBuilder, FrameSpec};
    use crate::types::FrameType;

    fn three_frames() -> crate::samples::SampleBuffer {
        let mut builder = CaptureBuilder::new(10.0).idle(12);
        for id in [0x100u16, 0x200, 0x300] {
            builder = builder.frame(&FrameSpec::data(CanId::Standard(id), &[id as u8])).idle(3);
        }
        builder.build()
    }

    #[test]
    fn test_decoder_rejects_bad_config() {
        let config = DecoderConfig::new().with_sample_rate(1_000_000);
        assert!(Decoder::new(config).is_err());
    }

    #[test]
    fn test_decode_groups_packets() {
        let decoder = Decoder::default();
        let results = decoder.decode(&three_frames());
        assert_eq!(results.packet_count(), 3);
        for index in 0..3 {
            let frames = results.packet_frames(index).unwrap();
            assert_eq!(frames[0].frame_type, FrameType::IdentifierField);
            assert_eq!(frames[0].value, 0x100 * (index as u64 + 1));
        }
        assert!(!results.is_cancelled());
    }

    #[test]
    fn test_packet_limit_stops_at_boundary() {
        let decoder = Decoder::default();
        let results = decoder.decode_with_cancel(&three_frames(), &PacketLimit(2));
        assert_eq!(results.packet_count(), 2);
        assert!(results.is_cancelled());
        let (_, last) = results.frames_in_packet(1).unwrap();
        assert_eq!(last, results.frame_count() - 1);
    }

    #[test]
    fn test_atomic_flag_cancels() {
        let flag = AtomicBool::new(true);
        let results = Decoder::default().decode_with_cancel(&three_frames(), &flag);
        assert_eq!(results.packet_count(), 0);
        assert!(results.is_cancelled());
    }
}
