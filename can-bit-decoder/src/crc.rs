//! CAN CRC-15
//!
//! The CRC covers the destuffed bits from the start of frame through the last
//! data bit, shifted in most significant bit first.

/// Generator polynomial x^15 + x^14 + x^10 + x^8 + x^7 + x^4 + x^3 + 1
pub const CAN_CRC15_POLY: u16 = 0x4599;

const CRC15_MASK: u16 = 0x7FFF;

/// Incremental CRC-15 register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc15 {
    register: u16,
}

impl Crc15 {
    /// Create a zeroed register
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift one bit into the register
    pub fn push(&mut self, bit: bool) {
        let feedback = bit ^ ((self.register >> 14) & 1 == 1);
        self.register = (self.register << 1) & CRC15_MASK;
        if feedback {
            self.register ^= CAN_CRC15_POLY;
        }
    }

    /// Current CRC value
    pub fn value(&self) -> u16 {
        self.register
    }

    /// CRC of a complete bit sequence
    pub fn compute<I: IntoIterator<Item = bool>>(bits: I) -> u16 {
        let mut crc = Self::new();
        for bit in bits {
            crc.push(bit);
        }
        crc.value()
    }
}
