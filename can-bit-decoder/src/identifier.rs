//! FRC identifier decomposition
//!
//! FRC devices pack a device classification into the arbitration identifier.
//! [`IdentifierLayout`] describes where each sub-field lives; [`FRC_LAYOUT`] is
//! the layout those devices use. The decomposition is a pure function of the
//! raw identifier and never fails on unknown codes: out-of-range device types
//! and manufacturers resolve to the `"Invalid"` sentinel name.

use crate::types::{DecoderError, Frame, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest identifier a layout may cover
pub const MAX_IDENTIFIER_BITS: u32 = 29;

/// Device type names, indexed by code; the last entry is the sentinel
pub static DEVICE_TYPES: [&str; 33] = [
    "Broadcast",
    "RobotCtrl",
    "motorCtrl",
    "relayCtrl",
    "gyroSensor",
    "Accelerometer",
    "Ultrasonic",
    "Geartooth",
    "PDP",
    "PCM",
    "Misc",
    "IOBreakout",
    "dev_rsvd12",
    "dev_rsvd13",
    "dev_rsvd14",
    "dev_rsvd15",
    "dev_rsvd16",
    "dev_rsvd17",
    "dev_rsvd18",
    "dev_rsvd19",
    "dev_rsvd20",
    "dev_rsvd21",
    "dev_rsvd22",
    "dev_rsvd23",
    "dev_rsvd24",
    "dev_rsvd25",
    "dev_rsvd26",
    "dev_rsvd27",
    "dev_rsvd28",
    "dev_rsvd29",
    "dev_rsvd30",
    "FWUpdate",
    "Invalid",
];

/// Manufacturer names, indexed by code; the last entry is the sentinel
pub static MANUFACTURERS: [&str; 9] = [
    "Broadcast",
    "NI",
    "TI",
    "DEKA",
    "CTRE",
    "MindSensors",
    "REV",
    "Unknown",
    "Invalid",
];

fn resolve_or_sentinel(table: &'static [&'static str], index: u32) -> &'static str {
    let last = table.len() - 1;
    table[(index as usize).min(last)]
}

/// Display name of a device type code
pub fn device_type_name(code: u32) -> &'static str {
    resolve_or_sentinel(&DEVICE_TYPES, code)
}

/// Display name of a manufacturer code
pub fn manufacturer_name(code: u32) -> &'static str {
    resolve_or_sentinel(&MANUFACTURERS, code)
}

/// The five sub-fields of an FRC identifier, in layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubFieldKind {
    DeviceType,
    Manufacturer,
    ApiClass,
    ApiIndex,
    DeviceId,
}

impl SubFieldKind {
    /// All kinds in layout order
    pub const ALL: [SubFieldKind; 5] = [
        SubFieldKind::DeviceType,
        SubFieldKind::Manufacturer,
        SubFieldKind::ApiClass,
        SubFieldKind::ApiIndex,
        SubFieldKind::DeviceId,
    ];

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SubFieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubFieldKind::DeviceType => "Device Type",
            SubFieldKind::Manufacturer => "Manufacturer",
            SubFieldKind::ApiClass => "API Class",
            SubFieldKind::ApiIndex => "API Index",
            SubFieldKind::DeviceId => "CANID",
        };
        f.write_str(label)
    }
}

/// One sub-field: `width` bits starting at bit `shift`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubField {
    pub kind: SubFieldKind,
    pub width: u32,
    pub shift: u32,
}

impl SubField {
    pub const fn new(kind: SubFieldKind, width: u32, shift: u32) -> Self {
        Self { kind, width, shift }
    }

    /// Mask of the sub-field in identifier position
    pub const fn mask(&self) -> u32 {
        ((1u32 << self.width) - 1) << self.shift
    }

    /// Extract the sub-field from a raw identifier
    pub const fn extract(&self, identifier: u32) -> u32 {
        (identifier & self.mask()) >> self.shift
    }

    /// Place a value into identifier position, dropping bits beyond the width
    pub const fn place(&self, value: u32) -> u32 {
        (value << self.shift) & self.mask()
    }
}

/// Bit layout of the five sub-fields within an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierLayout {
    fields: [SubField; 5],
}

/// Layout used by FRC devices
pub const FRC_LAYOUT: IdentifierLayout = IdentifierLayout {
    fields: [
        SubField::new(SubFieldKind::DeviceType, 5, 24),
        SubField::new(SubFieldKind::Manufacturer, 8, 16),
        SubField::new(SubFieldKind::ApiClass, 6, 10),
        SubField::new(SubFieldKind::ApiIndex, 4, 6),
        SubField::new(SubFieldKind::DeviceId, 6, 0),
    ],
};

impl IdentifierLayout {
    /// Build a layout, checking that the sub-fields are well formed
    ///
    /// Fields must be given in [`SubFieldKind::ALL`] order, be non-empty, fit
    /// in a 29-bit identifier and not overlap.
    pub fn new(fields: [SubField; 5]) -> Result<Self> {
        let mut used = 0u32;
        for (field, expected) in fields.iter().zip(SubFieldKind::ALL) {
            if field.kind != expected {
                return Err(DecoderError::InvalidLayout(format!(
                    "expected {} at this position, found {}",
                    expected, field.kind
                )));
            }
            if field.width == 0 || field.shift + field.width > MAX_IDENTIFIER_BITS {
                return Err(DecoderError::InvalidLayout(format!(
                    "{} occupies bits {}..{}, outside the identifier",
                    field.kind,
                    field.shift,
                    field.shift + field.width
                )));
            }
            if used & field.mask() != 0 {
                return Err(DecoderError::InvalidLayout(format!(
                    "{} overlaps another sub-field",
                    field.kind
                )));
            }
            used |= field.mask();
        }
        Ok(Self { fields })
    }

    /// The sub-fields in layout order
    pub fn fields(&self) -> &[SubField; 5] {
        &self.fields
    }

    /// Layout entry for one kind
    pub fn field(&self, kind: SubFieldKind) -> &SubField {
        &self.fields[kind.position()]
    }

    /// Extract a single sub-field
    pub fn extract(&self, kind: SubFieldKind, identifier: u32) -> u32 {
        self.field(kind).extract(identifier)
    }

    /// Split a raw identifier into its sub-fields
    pub fn decompose(&self, identifier: u32) -> DecomposedIdentifier {
        DecomposedIdentifier {
            device_type: self.extract(SubFieldKind::DeviceType, identifier),
            manufacturer: self.extract(SubFieldKind::Manufacturer, identifier),
            api_class: self.extract(SubFieldKind::ApiClass, identifier),
            api_index: self.extract(SubFieldKind::ApiIndex, identifier),
            device_id: self.extract(SubFieldKind::DeviceId, identifier),
        }
    }

    /// Reassemble a raw identifier from its sub-fields
    pub fn compose(&self, parts: &DecomposedIdentifier) -> u32 {
        self.fields
            .iter()
            .fold(0, |identifier, field| identifier | field.place(parts.get(field.kind)))
    }
}

impl Default for IdentifierLayout {
    fn default() -> Self {
        FRC_LAYOUT
    }
}

/// Sub-field values of one identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecomposedIdentifier {
    pub device_type: u32,
    pub manufacturer: u32,
    pub api_class: u32,
    pub api_index: u32,
    pub device_id: u32,
}

impl DecomposedIdentifier {
    /// Decompose an identifier frame; `None` for any other frame type
    pub fn from_frame(frame: &Frame, layout: &IdentifierLayout) -> Option<Self> {
        frame.identifier().map(|identifier| layout.decompose(identifier))
    }

    /// Value of one sub-field
    pub fn get(&self, kind: SubFieldKind) -> u32 {
        match kind {
            SubFieldKind::DeviceType => self.device_type,
            SubFieldKind::Manufacturer => self.manufacturer,
            SubFieldKind::ApiClass => self.api_class,
            SubFieldKind::ApiIndex => self.api_index,
            SubFieldKind::DeviceId => self.device_id,
        }
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.device_type)
    }

    pub fn manufacturer_name(&self) -> &'static str {
        manufacturer_name(self.manufacturer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameFlags, FrameType};

    #[test]
    fn test_frc_layout_masks() {
        let masks: Vec<u32> = FRC_LAYOUT.fields().iter().map(SubField::mask).collect();
        assert_eq!(masks, vec![0x1F00_0000, 0x00FF_0000, 0xFC00, 0x3C0, 0x3F]);
        assert_eq!(IdentifierLayout::new(*FRC_LAYOUT.fields()).unwrap(), FRC_LAYOUT);
    }

    #[test]
    fn test_decompose_and_compose() {
        let parts = FRC_LAYOUT.decompose(0x1F2AB3);
        assert_eq!(
            parts,
            DecomposedIdentifier {
                device_type: 0,
                manufacturer: 0x1F,
                api_class: 10,
                api_index: 10,
                device_id: 0x33,
            }
        );
        assert_eq!(parts.device_type_name(), "Broadcast");
        assert_eq!(parts.manufacturer_name(), "Invalid");
        assert_eq!(FRC_LAYOUT.compose(&parts), 0x1F2AB3);
    }

    #[test]
    fn test_names_clamp_to_sentinel() {
        assert_eq!(device_type_name(2), "motorCtrl");
        assert_eq!(device_type_name(31), "FWUpdate");
        assert_eq!(device_type_name(32), "Invalid");
        assert_eq!(device_type_name(u32::MAX), "Invalid");
        assert_eq!(manufacturer_name(6), "REV");
        assert_eq!(manufacturer_name(8), "Invalid");
        assert_eq!(manufacturer_name(255), "Invalid");
    }

    #[test]
    fn test_compose_masks_oversized_values() {
        let parts = DecomposedIdentifier {
            device_id: 0x7F,
            ..Default::default()
        };
        assert_eq!(FRC_LAYOUT.compose(&parts), 0x3F);
    }

    #[test]
    fn test_from_frame() {
        let frame = Frame {
            frame_type: FrameType::IdentifierFieldEx,
            value: 0x0204_1C85,
            flags: FrameFlags::empty(),
            start_sample: 0,
            end_sample: 1,
        };
        let parts = DecomposedIdentifier::from_frame(&frame, &FRC_LAYOUT).unwrap();
        assert_eq!(parts.device_type_name(), "motorCtrl");
        assert_eq!(parts.manufacturer_name(), "CTRE");
        assert_eq!(parts.api_class, 7);
        assert_eq!(parts.api_index, 2);
        assert_eq!(parts.device_id, 5);

        let control = Frame { frame_type: FrameType::ControlField, ..frame };
        assert!(DecomposedIdentifier::from_frame(&control, &FRC_LAYOUT).is_none());
    }

    #[test]
    fn test_invalid_layouts_rejected() {
        let mut fields = *FRC_LAYOUT.fields();
        fields[4] = SubField::new(SubFieldKind::DeviceId, 7, 0);
        assert!(matches!(IdentifierLayout::new(fields), Err(DecoderError::InvalidLayout(_))));

        let mut fields = *FRC_LAYOUT.fields();
        fields[0] = SubField::new(SubFieldKind::DeviceType, 6, 24);
        assert!(IdentifierLayout::new(fields).is_err());

        let mut fields = *FRC_LAYOUT.fields();
        fields.swap(0, 1);
        assert!(IdentifierLayout::new(fields).is_err());

        let mut fields = *FRC_LAYOUT.fields();
        fields[2] = SubField::new(SubFieldKind::ApiClass, 0, 10);
        assert!(IdentifierLayout::new(fields).is_err());
    }
}
