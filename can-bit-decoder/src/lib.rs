//! CAN Bit Decoder Library
//!
//! A stateless, reusable library for decoding classic CAN traffic from raw
//! logic-level samples, with optional FRC identifier decomposition.
//!
//! # Architecture
//!
//! Data flows strictly forward through one decode pass:
//! - [`BitSampler`] recovers bits at the configured bit rate, resyncing on edges
//! - [`Destuffer`] removes stuff bits and flags stuff violations
//! - [`FrameStateMachine`] walks the frame grammar and emits one [`Frame`] per field
//! - [`PacketAssembler`] groups frames into [`Packet`]s, one per bus transaction
//!
//! [`IdentifierLayout`] decomposes identifiers on demand and is independent of
//! the pass.
//!
//! The library does NOT:
//! - Render fields as text
//! - Export CSV or any other file format
//! - Read capture files from disk
//!
//! All higher-level functionality is in the application layer (can-bit-cli).
//!
//! # Example Usage
//!
//! ```
//! use can_bit_decoder::synth::{CanId, CaptureBuilder, FrameSpec};
//! use can_bit_decoder::{Decoder, DecoderConfig, FrameType};
//!
//! let config = DecoderConfig::new()
//!     .with_bit_rate(500_000)
//!     .with_sample_rate(5_000_000);
//! let decoder = Decoder::new(config.clone()).unwrap();
//!
//! let capture = CaptureBuilder::from_config(&config)
//!     .idle(11)
//!     .frame(&FrameSpec::data(CanId::Standard(0x123), &[0xAA, 0xBB]))
//!     .idle(3)
//!     .build();
//!
//! let results = decoder.decode(&capture);
//! assert_eq!(results.packet_count(), 1);
//! assert_eq!(results.frame(0).unwrap().frame_type, FrameType::IdentifierField);
//! ```

// Public modules
pub mod config;
pub mod crc;
pub mod decoder;
pub mod destuff;
pub mod frame_machine;
pub mod identifier;
pub mod packet;
pub mod results;
pub mod sampler;
pub mod samples;
pub mod synth;
pub mod types;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use crc::Crc15;
pub use decoder::{Cancellation, Decoder, NeverCancel, PacketLimit};
pub use destuff::Destuffer;
pub use frame_machine::{FrameSink, FrameStateMachine};
pub use identifier::{
    device_type_name, manufacturer_name, DecomposedIdentifier, IdentifierLayout, SubField,
    SubFieldKind, FRC_LAYOUT,
};
pub use packet::{Packet, PacketAssembler, PacketFields};
pub use results::DecodeResults;
pub use sampler::BitSampler;
pub use samples::{EdgeCapture, SampleBuffer, SampleSource};
pub use types::{DecoderError, ErrorKind, Frame, FrameFlags, FrameType, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
