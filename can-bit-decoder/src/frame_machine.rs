//! Frame state machine
//!
//! Walks the classic CAN frame grammar over the bits recovered by the
//! [`BitSampler`], destuffing the SOF-to-CRC region on the fly and emitting one
//! [`Frame`] per semantic field to a [`FrameSink`].
//!
//! ```text
//! Idle -> SOF -> Arbitration -> [ArbitrationExt] -> Control -> [Data]* -> CRC
//!      -> CRC delimiter -> ACK slot -> ACK delimiter -> EOF -> Idle
//! ```
//!
//! Any bit-level violation moves to `Error`, which emits a `CanError` frame and
//! returns to `Idle`. Violations never abort the pass; after one the machine
//! waits for a bus-idle period before accepting the next start of frame.

use crate::config::DecoderConfig;
use crate::crc::Crc15;
use crate::destuff::{Destuffed, Destuffer};
use crate::sampler::{BitSampler, SampledBit};
use crate::samples::SampleSource;
use crate::types::{ErrorKind, Frame, FrameFlags, FrameType, DOMINANT, RECESSIVE};

/// Recessive bit times a receiver waits for before joining bus traffic
pub const BUS_IDLE_BITS: u32 = 11;

/// Length of the end-of-frame field
pub const EOF_BITS: u32 = 7;

/// Consumer of the frame stream
pub trait FrameSink {
    /// A field was decoded
    fn on_frame(&mut self, frame: Frame);

    /// The machine re-entered `Idle`; the current transaction is over
    fn on_idle(&mut self);
}

/// States of the frame grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    StartOfFrame,
    Arbitration,
    ArbitrationExt,
    Control,
    Data,
    Crc,
    CrcDelimiter,
    AckSlot,
    AckDelimiter,
    EndOfFrame,
    Error(ErrorKind),
}

/// Per-frame decoding context, reset at every start of frame
#[derive(Debug, Default)]
struct FrameContext {
    identifier: u32,
    extended: bool,
    remote: bool,
    bytes_remaining: u8,
    received_crc: u16,
    computed_crc: u16,
}

/// The decoding state machine for one pass over a sample source
pub struct FrameStateMachine<'a, S: SampleSource + ?Sized> {
    sampler: BitSampler<'a, S>,
    destuffer: Destuffer,
    crc: Crc15,
    state: State,
    frame: FrameContext,
    /// Idle bit times required before the next start of frame
    idle_bits_required: u32,
    /// First sample of the field currently being read
    field_start: Option<u64>,
    /// First and last sample of the most recently read bit
    last_start: u64,
    last_end: u64,
    /// Last sample covered by an emitted frame
    emitted_end: Option<u64>,
}

impl<'a, S: SampleSource + ?Sized> FrameStateMachine<'a, S> {
    /// Create a machine over `source` using the timing in `config`
    ///
    /// The capture may begin mid-frame, so the first start of frame is only
    /// accepted after a full bus-idle period.
    pub fn new(source: &'a S, config: &DecoderConfig) -> Self {
        Self {
            sampler: BitSampler::new(
                source,
                config.samples_per_bit(),
                config.idle_timeout_samples(),
            ),
            destuffer: Destuffer::new(),
            crc: Crc15::new(),
            state: State::Idle,
            frame: FrameContext::default(),
            idle_bits_required: BUS_IDLE_BITS,
            field_start: None,
            last_start: 0,
            last_end: 0,
            emitted_end: None,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Decode one bus transaction into `sink`
    ///
    /// Returns `false` once no further start of frame exists in the buffer.
    /// The machine is back in `Idle` whenever this returns.
    pub fn decode_next_packet<K: FrameSink + ?Sized>(&mut self, sink: &mut K) -> bool {
        let Some(edge) = self.sampler.sync_to_start_of_frame(self.idle_bits_required) else {
            return false;
        };
        log::trace!("Frame starts at sample {}", edge);

        self.begin_frame();
        self.state = State::StartOfFrame;
        loop {
            let next = match self.step(sink) {
                Ok(State::Idle) => break,
                Ok(next) => next,
                Err(kind) => State::Error(kind),
            };
            self.state = next;
        }

        self.state = State::Idle;
        sink.on_idle();
        true
    }

    fn begin_frame(&mut self) {
        self.destuffer.reset();
        self.crc = Crc15::new();
        self.frame = FrameContext::default();
        self.field_start = None;
    }

    /// Execute the current state and return the next one
    fn step<K: FrameSink + ?Sized>(&mut self, sink: &mut K) -> Result<State, ErrorKind> {
        match self.state {
            State::Idle => Ok(State::Idle),

            State::StartOfFrame => {
                let sof = self.read_stuffed()?;
                if sof != DOMINANT {
                    log::trace!("Glitch at sample {}, not a start of frame", self.last_end);
                    return Ok(State::Idle);
                }
                self.crc.push(sof);
                self.field_start = None;
                Ok(State::Arbitration)
            }

            State::Arbitration => {
                let identifier = self.read_field(11, true)?;
                let rtr_or_srr = self.read_field(1, true)? == 1;
                let ide = self.read_field(1, true)? == 1;
                self.frame.identifier = identifier;

                if ide {
                    self.frame.extended = true;
                    return Ok(State::ArbitrationExt);
                }
                self.frame.remote = rtr_or_srr;
                self.emit(sink, FrameType::IdentifierField, identifier as u64);
                Ok(State::Control)
            }

            State::ArbitrationExt => {
                let extension = self.read_field(18, true)?;
                let rtr = self.read_field(1, true)? == 1;
                self.frame.identifier = (self.frame.identifier << 18) | extension;
                self.frame.remote = rtr;
                self.emit(sink, FrameType::IdentifierFieldEx, self.frame.identifier as u64);
                Ok(State::Control)
            }

            State::Control => {
                // r0 only, or r1 + r0 after an extended identifier
                let reserved_bits = if self.frame.extended { 2 } else { 1 };
                self.read_field(reserved_bits, true)?;
                let dlc = self.read_field(4, true)? as u8;
                self.emit(sink, FrameType::ControlField, dlc as u64);

                self.frame.bytes_remaining = if self.frame.remote { 0 } else { dlc.min(8) };
                if self.frame.bytes_remaining > 0 {
                    Ok(State::Data)
                } else {
                    Ok(State::Crc)
                }
            }

            State::Data => {
                let byte = self.read_field(8, true)?;
                self.emit(sink, FrameType::DataField, byte as u64);
                self.frame.bytes_remaining -= 1;
                if self.frame.bytes_remaining > 0 {
                    Ok(State::Data)
                } else {
                    Ok(State::Crc)
                }
            }

            State::Crc => {
                self.frame.computed_crc = self.crc.value();
                self.frame.received_crc = self.read_field(15, false)? as u16;
                self.consume_pending_stuff_bit()?;
                self.emit(sink, FrameType::CrcField, self.frame.received_crc as u64);
                Ok(State::CrcDelimiter)
            }

            State::CrcDelimiter => {
                self.read_fixed(RECESSIVE)?;
                if self.frame.received_crc != self.frame.computed_crc {
                    log::warn!(
                        "CRC mismatch at sample {}: received 0x{:04X}, computed 0x{:04X}",
                        self.last_end,
                        self.frame.received_crc,
                        self.frame.computed_crc
                    );
                    self.emit_error(sink, ErrorKind::Crc);
                } else {
                    self.field_start = None;
                }
                Ok(State::AckSlot)
            }

            State::AckSlot => {
                let bit = self.read_raw()?;
                self.emit(sink, FrameType::AckField, (bit.value == DOMINANT) as u64);
                Ok(State::AckDelimiter)
            }

            State::AckDelimiter => {
                self.read_fixed(RECESSIVE)?;
                self.field_start = None;
                Ok(State::EndOfFrame)
            }

            State::EndOfFrame => {
                for _ in 0..EOF_BITS {
                    self.read_fixed(RECESSIVE)?;
                }
                self.field_start = None;
                self.idle_bits_required = 0;
                Ok(State::Idle)
            }

            State::Error(kind) => {
                self.emit_error(sink, kind);
                self.idle_bits_required = BUS_IDLE_BITS;
                Ok(State::Idle)
            }
        }
    }

    /// Read one raw bit, extending the current field's sample span
    fn read_raw(&mut self) -> Result<SampledBit, ErrorKind> {
        let bit = self.sampler.read_bit().ok_or(ErrorKind::Truncated)?;
        self.field_start.get_or_insert(bit.start);
        self.last_start = bit.start;
        self.last_end = bit.end;
        Ok(bit)
    }

    /// Read one raw bit that must have a fixed level
    fn read_fixed(&mut self, level: bool) -> Result<(), ErrorKind> {
        let bit = self.read_raw()?;
        if bit.value != level {
            log::warn!(
                "Form error at sample {}: expected {} bit",
                bit.sample,
                if level == RECESSIVE { "recessive" } else { "dominant" }
            );
            return Err(ErrorKind::Form);
        }
        Ok(())
    }

    /// Read the next payload bit of the stuffed region, dropping stuff bits
    fn read_stuffed(&mut self) -> Result<bool, ErrorKind> {
        loop {
            let bit = self.read_raw()?;
            match self.destuffer.push(bit.value) {
                Destuffed::Data(value) => return Ok(value),
                Destuffed::Stuff => log::trace!("Stuff bit at sample {}", bit.sample),
                Destuffed::Violation => {
                    log::warn!("Stuff error at sample {}", bit.sample);
                    return Err(ErrorKind::Stuff);
                }
            }
        }
    }

    /// Read `bits` payload bits MSB first, optionally feeding the CRC
    fn read_field(&mut self, bits: u32, crc_covered: bool) -> Result<u32, ErrorKind> {
        let mut value = 0u32;
        for _ in 0..bits {
            let bit = self.read_stuffed()?;
            if crc_covered {
                self.crc.push(bit);
            }
            value = (value << 1) | bit as u32;
        }
        Ok(value)
    }

    /// The stuffed region ends with the CRC; a stuff bit may still follow it
    fn consume_pending_stuff_bit(&mut self) -> Result<(), ErrorKind> {
        if !self.destuffer.stuff_pending() {
            return Ok(());
        }
        let bit = self.read_raw()?;
        match self.destuffer.push(bit.value) {
            Destuffed::Stuff => Ok(()),
            _ => {
                log::warn!("Stuff error after CRC at sample {}", bit.sample);
                Err(ErrorKind::Stuff)
            }
        }
    }

    fn emit<K: FrameSink + ?Sized>(&mut self, sink: &mut K, frame_type: FrameType, value: u64) {
        let mut flags = FrameFlags::empty();
        if self.frame.remote && frame_type.is_identifier() {
            flags.insert(FrameFlags::REMOTE_FRAME);
        }
        let start_sample = self.field_start.take().unwrap_or(self.last_end);
        let frame = Frame {
            frame_type,
            value,
            flags,
            start_sample,
            end_sample: self.last_end,
        };
        log::trace!(
            "{} = 0x{:X} [{}..={}]",
            frame_type,
            value,
            frame.start_sample,
            frame.end_sample
        );
        self.emitted_end = Some(frame.end_sample);
        sink.on_frame(frame);
    }

    fn emit_error<K: FrameSink + ?Sized>(&mut self, sink: &mut K, kind: ErrorKind) {
        let (start_sample, end_sample) = match kind {
            // The buffer ran out: mark everything left after the last whole field.
            ErrorKind::Truncated => {
                let last = self.sampler.sample_count().saturating_sub(1);
                let mut start = self.field_start.take().unwrap_or(self.sampler.cursor());
                if start > last {
                    start = self.last_start;
                }
                let start = start.max(self.emitted_end.map_or(0, |end| end + 1));
                if start > last {
                    log::debug!("Capture ends right after a field, no samples left to mark");
                    return;
                }
                (start, last)
            }
            _ => (self.field_start.take().unwrap_or(self.last_end), self.last_end),
        };
        log::debug!("{} error [{}..={}]", kind, start_sample, end_sample);
        self.emitted_end = Some(end_sample);
        sink.on_frame(Frame {
            frame_type: FrameType::CanError,
            value: kind.code(),
            flags: FrameFlags::empty(),
            start_sample,
            end_sample,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleBuffer;
    use crate::synth::{CanId, CaptureBuilder, FrameSpec};

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Frame>,
        idles: usize,
    }

    impl FrameSink for Recorder {
        fn on_frame(&mut self, frame: Frame) {
            self.frames.push(frame);
        }

        fn on_idle(&mut self) {
            self.idles += 1;
        }
    }

    fn run(buffer: &SampleBuffer) -> Recorder {
        let config = DecoderConfig::default();
        let mut machine = FrameStateMachine::new(buffer, &config);
        let mut recorder = Recorder::default();
        while machine.decode_next_packet(&mut recorder) {
            assert_eq!(machine.state(), State::Idle);
        }
        recorder
    }

    fn types(frames: &[Frame]) -> Vec<FrameType> {
        frames.iter().map(|frame| frame.frame_type).collect()
    }

    #[test]
    fn test_standard_data_frame() {
        let spec = FrameSpec::data(CanId::Standard(0x123), &[0xAA, 0xBB]);
        let buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).idle(5).build();
        let recorder = run(&buffer);

        assert_eq!(
            types(&recorder.frames),
            vec![
                FrameType::IdentifierField,
                FrameType::ControlField,
                FrameType::DataField,
                FrameType::DataField,
                FrameType::CrcField,
                FrameType::AckField,
            ]
        );
        assert_eq!(recorder.frames[0].value, 0x123);
        assert_eq!(recorder.frames[4].value, spec.crc() as u64);
        assert_eq!(recorder.frames[5].value, 1);
        assert_eq!(recorder.idles, 1);
    }

    #[test]
    fn test_extended_remote_frame() {
        let spec = FrameSpec::remote(CanId::Extended(0x1F2AB3), 4);
        let buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).idle(5).build();
        let recorder = run(&buffer);

        assert_eq!(
            types(&recorder.frames),
            vec![
                FrameType::IdentifierFieldEx,
                FrameType::ControlField,
                FrameType::CrcField,
                FrameType::AckField,
            ]
        );
        assert_eq!(recorder.frames[0].value, 0x1F2AB3);
        assert!(recorder.frames[0].is_remote());
        assert_eq!(recorder.frames[1].value, 4);
    }

    #[test]
    fn test_missing_ack_is_nak() {
        let spec = FrameSpec::data(CanId::Standard(0x7FF), &[0x00]).with_ack(false);
        let buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).idle(5).build();
        let recorder = run(&buffer);

        let ack = recorder.frames.last().unwrap();
        assert_eq!(ack.frame_type, FrameType::AckField);
        assert_eq!(ack.value, 0);
    }

    #[test]
    fn test_bad_crc_keeps_fields() {
        let spec = FrameSpec::data(CanId::Standard(0x55), &[0x01]).with_crc(0x1234);
        let buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).idle(5).build();
        let recorder = run(&buffer);

        assert_eq!(
            types(&recorder.frames),
            vec![
                FrameType::IdentifierField,
                FrameType::ControlField,
                FrameType::DataField,
                FrameType::CrcField,
                FrameType::CanError,
                FrameType::AckField,
            ]
        );
        assert_eq!(recorder.frames[3].value, 0x1234);
        assert_eq!(recorder.frames[4].error_kind(), Some(ErrorKind::Crc));
    }

    #[test]
    fn test_truncated_frame_reports_error() {
        let spec = FrameSpec::data(CanId::Standard(0x123), &[0xAA, 0xBB]);
        let mut buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).build();
        // Cut the capture in the middle of the first data byte.
        let levels = buffer.as_slice()[..120 + 10 * 25].to_vec();
        buffer = SampleBuffer::new(levels);

        let recorder = run(&buffer);
        let error = recorder.frames.last().unwrap();
        assert_eq!(error.error_kind(), Some(ErrorKind::Truncated));
        assert_eq!(error.end_sample, buffer.sample_count() - 1);
        assert_eq!(recorder.idles, 1);
    }

    #[test]
    fn test_frame_ending_on_final_sample_is_complete() {
        let spec = FrameSpec::data(CanId::Standard(0x123), &[0xAA, 0xBB]);
        let buffer = CaptureBuilder::new(10.0).idle(12).frame(&spec).build();
        let recorder = run(&buffer);

        assert_eq!(recorder.frames.len(), 6);
        assert!(recorder.frames.iter().all(|frame| frame.error_kind().is_none()));
        assert_eq!(recorder.idles, 1);
    }

    #[test]
    fn test_truncation_never_overlaps_emitted_fields() {
        let spec = FrameSpec::data(CanId::Standard(0x123), &[0xAA]);
        let full = CaptureBuilder::new(10.0).idle(12).frame(&spec).build();
        let ack_end = run(&full).frames[4].end_sample as usize;

        // Cut right after the ACK slot: nothing is left to mark.
        let recorder = run(&SampleBuffer::new(full.as_slice()[..=ack_end].to_vec()));
        assert_eq!(types(&recorder.frames).last(), Some(&FrameType::AckField));
        assert_eq!(recorder.idles, 1);

        // Cut right after the ACK delimiter: the delimiter carries the error.
        let buffer = SampleBuffer::new(full.as_slice()[..=ack_end + 10].to_vec());
        let recorder = run(&buffer);
        let error = recorder.frames.last().unwrap();
        assert_eq!(error.error_kind(), Some(ErrorKind::Truncated));
        assert_eq!(error.start_sample, ack_end as u64 + 1);
        assert_eq!(error.end_sample, buffer.sample_count() - 1);
    }

    #[test]
    fn test_glitch_is_ignored() {
        // A dominant pulse shorter than half a bit is not a start of frame.
        let mut levels = vec![true; 200];
        levels[150..153].iter_mut().for_each(|level| *level = false);
        let recorder = run(&SampleBuffer::new(levels));
        assert!(recorder.frames.is_empty());
    }
}
