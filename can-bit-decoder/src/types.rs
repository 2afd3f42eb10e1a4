//! Core types for the CAN bit decoder library
//!
//! This module defines the records the decoder emits while walking a sampled
//! CAN signal. Every decoded protocol field becomes one [`Frame`]; the frames of
//! one bus transaction are grouped by a [`Packet`](crate::Packet).
//!
//! The types are plain data. Rendering them as text is left to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Logical level of a recessive bit (bus idle, logic high)
pub const RECESSIVE: bool = true;

/// Logical level of a dominant bit (logic low)
pub const DOMINANT: bool = false;

/// Errors that can occur outside of a decode pass
///
/// Protocol violations found while decoding are not errors in this sense: they
/// are reported in-band as [`FrameType::CanError`] frames.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid identifier layout: {0}")]
    InvalidLayout(String),

    #[error("Failed to parse capture: {0}")]
    CaptureParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Kind of protocol field a [`Frame`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Standard 11-bit identifier
    IdentifierField,
    /// Extended 29-bit identifier
    IdentifierFieldEx,
    /// Data length code
    ControlField,
    /// One data byte
    DataField,
    /// Received CRC-15 sequence
    CrcField,
    /// ACK slot (1 = acknowledged)
    AckField,
    /// Bit-level violation, value holds the [`ErrorKind`] code
    CanError,
}

impl FrameType {
    /// Width in bits of the value carried by this field type
    ///
    /// Identifier frames differ (11 vs 29 bits), so consumers formatting a
    /// value must branch on the type rather than assume one width.
    pub fn value_bits(&self) -> u32 {
        match self {
            FrameType::IdentifierField => 11,
            FrameType::IdentifierFieldEx => 29,
            FrameType::ControlField => 4,
            FrameType::DataField => 8,
            FrameType::CrcField => 15,
            FrameType::AckField => 1,
            FrameType::CanError => 8,
        }
    }

    /// True for both identifier variants
    pub fn is_identifier(&self) -> bool {
        matches!(self, FrameType::IdentifierField | FrameType::IdentifierFieldEx)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameType::IdentifierField => "IdentifierField",
            FrameType::IdentifierFieldEx => "IdentifierFieldEx",
            FrameType::ControlField => "ControlField",
            FrameType::DataField => "DataField",
            FrameType::CrcField => "CrcField",
            FrameType::AckField => "AckField",
            FrameType::CanError => "CanError",
        };
        write!(f, "{}", name)
    }
}

/// Bit set attached to a [`Frame`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// The frame belongs to a remote (request) frame: RTR was set
    pub const REMOTE_FRAME: FrameFlags = FrameFlags(1 << 0);

    /// No flags set
    pub const fn empty() -> Self {
        FrameFlags(0)
    }

    /// Raw flag bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// True if every flag in `other` is set
    pub const fn contains(&self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`
    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }
}

/// Classification of a [`FrameType::CanError`] frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorKind {
    /// Six equal bits inside the stuffed region
    Stuff = 1,
    /// Received CRC differs from the computed one
    Crc = 2,
    /// Dominant bit where a delimiter or EOF requires recessive
    Form = 3,
    /// Sample buffer ended in the middle of a frame
    Truncated = 4,
}

impl ErrorKind {
    /// Numeric code stored in a `CanError` frame's value
    pub fn code(&self) -> u64 {
        *self as u64
    }

    /// Recover the kind from a `CanError` frame's value
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::Stuff),
            2 => Some(ErrorKind::Crc),
            3 => Some(ErrorKind::Form),
            4 => Some(ErrorKind::Truncated),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Stuff => write!(f, "Stuff"),
            ErrorKind::Crc => write!(f, "CRC"),
            ErrorKind::Form => write!(f, "Form"),
            ErrorKind::Truncated => write!(f, "Truncated"),
        }
    }
}

/// One decoded protocol field
///
/// `start_sample` and `end_sample` are inclusive bounds on the sampled signal
/// and cover every raw bit (stuff bits included) that made up the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Field kind
    pub frame_type: FrameType,
    /// Field value; meaning depends on `frame_type`
    pub value: u64,
    /// Frame flags (`REMOTE_FRAME`)
    pub flags: FrameFlags,
    /// First sample of the field
    pub start_sample: u64,
    /// Last sample of the field
    pub end_sample: u64,
}

impl Frame {
    /// Check whether the remote-frame flag is set
    pub fn is_remote(&self) -> bool {
        self.flags.contains(FrameFlags::REMOTE_FRAME)
    }

    /// Identifier value for identifier frames
    pub fn identifier(&self) -> Option<u32> {
        if self.frame_type.is_identifier() {
            Some(self.value as u32)
        } else {
            None
        }
    }

    /// Error classification for `CanError` frames
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.frame_type {
            FrameType::CanError => ErrorKind::from_code(self.value),
            _ => None,
        }
    }

    /// Number of samples covered by the frame
    pub fn sample_len(&self) -> u64 {
        self.end_sample - self.start_sample + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame_type: FrameType, value: u64) -> Frame {
        Frame {
            frame_type,
            value,
            flags: FrameFlags::empty(),
            start_sample: 10,
            end_sample: 19,
        }
    }

    #[test]
    fn test_flags() {
        let mut flags = FrameFlags::empty();
        assert!(!flags.contains(FrameFlags::REMOTE_FRAME));
        flags.insert(FrameFlags::REMOTE_FRAME);
        assert!(flags.contains(FrameFlags::REMOTE_FRAME));
        assert_eq!(flags.bits(), 1);
    }

    #[test]
    fn test_error_kind_codes() {
        for kind in [ErrorKind::Stuff, ErrorKind::Crc, ErrorKind::Form, ErrorKind::Truncated] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
    }

    #[test]
    fn test_frame_accessors() {
        let id = frame(FrameType::IdentifierFieldEx, 0x1F2AB3);
        assert_eq!(id.identifier(), Some(0x1F2AB3));
        assert_eq!(id.error_kind(), None);
        assert_eq!(id.sample_len(), 10);

        let err = frame(FrameType::CanError, ErrorKind::Form.code());
        assert_eq!(err.identifier(), None);
        assert_eq!(err.error_kind(), Some(ErrorKind::Form));
    }

    #[test]
    fn test_identifier_widths() {
        assert_eq!(FrameType::IdentifierField.value_bits(), 11);
        assert_eq!(FrameType::IdentifierFieldEx.value_bits(), 29);
        assert!(FrameType::IdentifierFieldEx.is_identifier());
        assert!(!FrameType::CrcField.is_identifier());
    }
}
