//! Bit de-stuffing
//!
//! Between the start of frame and the end of the CRC sequence a CAN
//! transmitter inserts one complementary bit after every five equal bits. The
//! [`Destuffer`] removes those bits one at a time as the state machine reads
//! them; destuffing cannot be done as a bulk pre-pass because the stuffed
//! region ends at a field boundary only the state machine knows about.

/// Number of equal bits after which a stuff bit follows
pub const STUFF_RUN_LENGTH: u8 = 5;

/// Classification of one raw bit fed to the [`Destuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destuffed {
    /// A payload bit to forward to the state machine
    Data(bool),
    /// A stuff bit to discard
    Stuff,
    /// The sixth equal bit in a row
    Violation,
}

/// Run-length tracker for the stuffed region of one frame
#[derive(Debug, Clone, Default)]
pub struct Destuffer {
    last: Option<bool>,
    run: u8,
}

impl Destuffer {
    /// Create a destuffer for a new frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current run; call at every start of frame
    pub fn reset(&mut self) {
        self.last = None;
        self.run = 0;
    }

    /// Feed one raw bit
    ///
    /// A stuff bit counts as the first bit of the next run.
    pub fn push(&mut self, bit: bool) -> Destuffed {
        if self.run == STUFF_RUN_LENGTH {
            if self.last == Some(bit) {
                return Destuffed::Violation;
            }
            self.last = Some(bit);
            self.run = 1;
            return Destuffed::Stuff;
        }

        if self.last == Some(bit) {
            self.run += 1;
        } else {
            self.last = Some(bit);
            self.run = 1;
        }
        Destuffed::Data(bit)
    }

    /// True if the next raw bit must be a stuff bit
    pub fn stuff_pending(&self) -> bool {
        self.run == STUFF_RUN_LENGTH
    }
}

/// Apply bit stuffing to a frame's stuffed region
///
/// Returns the stuffed bits and the positions (in the stuffed output) of the
/// inserted stuff bits. A stuff bit that falls due after the final input bit is
/// appended as well.
pub fn stuff_bits(bits: &[bool]) -> (Vec<bool>, Vec<usize>) {
    let mut stuffed = Vec::with_capacity(bits.len() + bits.len() / 4 + 1);
    let mut positions = Vec::new();
    let mut last = None;
    let mut run = 0u8;

    for &bit in bits {
        if last == Some(bit) {
            run += 1;
        } else {
            last = Some(bit);
            run = 1;
        }
        stuffed.push(bit);

        if run == STUFF_RUN_LENGTH {
            let stuff = !bit;
            positions.push(stuffed.len());
            stuffed.push(stuff);
            last = Some(stuff);
            run = 1;
        }
    }

    (stuffed, positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(text: &str) -> Vec<bool> {
        text.chars().map(|ch| ch == '1').collect()
    }

    fn destuff(raw: &[bool]) -> Result<Vec<bool>, usize> {
        let mut destuffer = Destuffer::new();
        let mut out = Vec::new();
        for (position, &bit) in raw.iter().enumerate() {
            match destuffer.push(bit) {
                Destuffed::Data(value) => out.push(value),
                Destuffed::Stuff => {}
                Destuffed::Violation => return Err(position),
            }
        }
        Ok(out)
    }

    #[test]
    fn test_stuffing_inserts_complement() {
        let (stuffed, positions) = stuff_bits(&bits("0000011111"));
        assert_eq!(stuffed, bits("000001111101"));
        assert_eq!(positions, vec![5, 10]);
    }

    #[test]
    fn test_stuff_bit_starts_new_run() {
        // The inserted 1 plus four more 1s makes a run of five.
        let (stuffed, positions) = stuff_bits(&bits("000001111"));
        assert_eq!(stuffed, bits("00000111110"));
        assert_eq!(positions, vec![5, 10]);
    }

    #[test]
    fn test_destuff_inverts_stuffing() {
        let original = bits("1100000000111111111010101000001");
        let (stuffed, _) = stuff_bits(&original);
        assert_eq!(destuff(&stuffed), Ok(original));
    }

    #[test]
    fn test_sixth_equal_bit_is_violation() {
        assert_eq!(destuff(&bits("1111110")), Err(5));
        assert_eq!(destuff(&bits("00000100000")), Ok(bits("0000000000")));
    }

    #[test]
    fn test_stuff_pending_and_reset() {
        let mut destuffer = Destuffer::new();
        for _ in 0..5 {
            destuffer.push(true);
        }
        assert!(destuffer.stuff_pending());
        destuffer.reset();
        assert!(!destuffer.stuff_pending());
        assert_eq!(destuffer.push(true), Destuffed::Data(true));
    }
}
