//! Text rendering of decoded frames
//!
//! Every frame renders as a list of bubble strings, shortest first, so a viewer
//! can pick the longest one that fits, plus one or more tabular lines. Numbers
//! follow the selected [`DisplayBase`] at the field's bit width.

use can_bit_decoder::{
    DecomposedIdentifier, Frame, FrameType, IdentifierLayout, SubFieldKind, FRC_LAYOUT,
};
use serde::{Deserialize, Serialize};

/// Numeric display base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBase {
    Binary,
    Decimal,
    #[default]
    Hexadecimal,
    Octal,
    Ascii,
}

/// Format `value` in `base`, zero-padded to `bits` where the base has a width
pub fn format_number(value: u64, base: DisplayBase, bits: u32) -> String {
    let bits = bits.clamp(1, 64) as usize;
    match base {
        DisplayBase::Binary => format!("0b{:0width$b}", value, width = bits),
        DisplayBase::Decimal => value.to_string(),
        DisplayBase::Hexadecimal => format!("0x{:0width$X}", value, width = (bits + 3) / 4),
        DisplayBase::Octal => format!("0o{:0width$o}", value, width = (bits + 2) / 3),
        DisplayBase::Ascii => match u8::try_from(value) {
            Ok(byte) if byte.is_ascii_graphic() || byte == b' ' => format!("'{}'", byte as char),
            _ => format!("0x{:0width$X}", value, width = (bits + 3) / 4),
        },
    }
}

/// How identifiers are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierProfile {
    /// A single opaque number
    Plain,
    /// Decomposed into FRC sub-fields
    Frc(IdentifierLayout),
}

impl IdentifierProfile {
    pub fn from_flag(frc: bool) -> Self {
        if frc {
            IdentifierProfile::Frc(FRC_LAYOUT)
        } else {
            IdentifierProfile::Plain
        }
    }
}

/// Renders frames for one display base and identifier profile
#[derive(Debug, Clone, Copy)]
pub struct FrameRenderer {
    pub base: DisplayBase,
    pub profile: IdentifierProfile,
}

impl FrameRenderer {
    pub fn new(base: DisplayBase, profile: IdentifierProfile) -> Self {
        Self { base, profile }
    }

    fn number(&self, frame: &Frame) -> String {
        format_number(frame.value, self.base, frame.frame_type.value_bits())
    }

    fn sub_field(&self, layout: &IdentifierLayout, parts: &DecomposedIdentifier, kind: SubFieldKind) -> String {
        format_number(parts.get(kind) as u64, self.base, layout.field(kind).width)
    }

    /// One-line FRC summary of an identifier
    pub fn frc_summary(&self, layout: &IdentifierLayout, identifier: u32) -> String {
        let parts = layout.decompose(identifier);
        format!(
            "Dev: {} M: {} Class: {} Idx: {} ID: {}",
            parts.device_type_name(),
            parts.manufacturer_name(),
            self.sub_field(layout, &parts, SubFieldKind::ApiClass),
            self.sub_field(layout, &parts, SubFieldKind::ApiIndex),
            self.sub_field(layout, &parts, SubFieldKind::DeviceId),
        )
    }

    fn identifier_label(frame: &Frame) -> &'static str {
        match frame.frame_type {
            FrameType::IdentifierFieldEx => "Extended CAN Identifier",
            _ => "Standard CAN Identifier",
        }
    }

    fn rtr_suffix(frame: &Frame) -> &'static str {
        if frame.is_remote() {
            " (RTR)"
        } else {
            ""
        }
    }

    /// Bubble strings, shortest first
    pub fn bubble_text(&self, frame: &Frame) -> Vec<String> {
        let number = self.number(frame);
        match frame.frame_type {
            FrameType::IdentifierField | FrameType::IdentifierFieldEx => match &self.profile {
                IdentifierProfile::Plain => vec![
                    "Id".to_string(),
                    format!("Id: {}", number),
                    format!("Identifier: {}", number),
                    format!(
                        "{}: {}{}",
                        Self::identifier_label(frame),
                        number,
                        Self::rtr_suffix(frame)
                    ),
                ],
                IdentifierProfile::Frc(layout) => {
                    let identifier = frame.value as u32;
                    let parts = layout.decompose(identifier);
                    vec![
                        "Id".to_string(),
                        format!("Id: {}", self.sub_field(layout, &parts, SubFieldKind::DeviceId)),
                        format!(
                            "{}{}",
                            self.frc_summary(layout, identifier),
                            Self::rtr_suffix(frame)
                        ),
                    ]
                }
            },
            FrameType::ControlField => vec![
                "Ctrl".to_string(),
                format!("Ctrl: {}", number),
                format!("Control Field: {}", number),
                format!("Control Field: {} bytes", number),
            ],
            FrameType::DataField => vec![
                number.clone(),
                format!("Data: {}", number),
                format!("Data Field Byte: {}", number),
            ],
            FrameType::CrcField => vec![
                "CRC".to_string(),
                format!("CRC: {}", number),
                format!("CRC value: {}", number),
            ],
            FrameType::AckField => vec![ack_text(frame).to_string()],
            FrameType::CanError => {
                let mut texts = vec!["E".to_string(), "Error".to_string()];
                if let Some(kind) = frame.error_kind() {
                    texts.push(format!("Error: {}", kind));
                }
                texts
            }
        }
    }

    /// Tabular lines for one frame
    pub fn tabular_text(&self, frame: &Frame) -> Vec<String> {
        let number = self.number(frame);
        match frame.frame_type {
            FrameType::IdentifierField | FrameType::IdentifierFieldEx => match &self.profile {
                IdentifierProfile::Plain => vec![format!(
                    "{}: {}{}",
                    Self::identifier_label(frame),
                    number,
                    Self::rtr_suffix(frame)
                )],
                IdentifierProfile::Frc(layout) => {
                    let parts = layout.decompose(frame.value as u32);
                    vec![
                        format!("{}: {}", SubFieldKind::DeviceType, parts.device_type_name()),
                        format!("{}: {}", SubFieldKind::Manufacturer, parts.manufacturer_name()),
                        format!(
                            "{}: {}",
                            SubFieldKind::ApiClass,
                            self.sub_field(layout, &parts, SubFieldKind::ApiClass)
                        ),
                        format!(
                            "{}: {}",
                            SubFieldKind::ApiIndex,
                            self.sub_field(layout, &parts, SubFieldKind::ApiIndex)
                        ),
                        format!(
                            "{}: {}",
                            SubFieldKind::DeviceId,
                            self.sub_field(layout, &parts, SubFieldKind::DeviceId)
                        ),
                    ]
                }
            },
            FrameType::ControlField => vec![format!("Control Field: {} bytes", number)],
            FrameType::DataField => vec![format!("Data Field Byte: {}", number)],
            FrameType::CrcField => vec![format!("CRC value: {}", number)],
            FrameType::AckField => vec![ack_text(frame).to_string()],
            FrameType::CanError => vec![match frame.error_kind() {
                Some(kind) => format!("Error: {}", kind),
                None => "Error".to_string(),
            }],
        }
    }
}

/// Longest bubble text at most `width` characters wide, else the shortest one
pub fn fit_bubble(texts: &[String], width: usize) -> &str {
    texts
        .iter()
        .rev()
        .find(|text| text.chars().count() <= width)
        .or_else(|| texts.first())
        .map_or("", String::as_str)
}

/// `ACK` or `NAK`
pub fn ack_text(frame: &Frame) -> &'static str {
    if frame.value != 0 {
        "ACK"
    } else {
        "NAK"
    }
}
