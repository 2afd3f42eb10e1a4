//! Bit sampler
//!
//! Recovers one logical bit per nominal bit period from a [`SampleSource`].
//! The sampler is hard-synchronized on the falling edge of a start of frame and
//! resynchronizes on every recessive-to-dominant edge that arrives within one
//! bit period of the previous sample point, which keeps the sample point
//! centred even when transmitter and capture clocks drift apart.

use crate::samples::SampleSource;

/// One recovered bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledBit {
    /// Level at the sample point (`true` = recessive)
    pub value: bool,
    /// Sample index the level was read at
    pub sample: u64,
    /// First sample of the bit time
    pub start: u64,
    /// Last sample of the bit time (inclusive)
    pub end: u64,
}

/// Pull-based bit recovery over a sample source
pub struct BitSampler<'a, S: SampleSource + ?Sized> {
    source: &'a S,
    samples_per_bit: f64,
    idle_timeout: Option<u64>,
    /// Fractional index of the next sample point
    next_point: f64,
    /// First sample of the next bit
    cursor: u64,
}

impl<'a, S: SampleSource + ?Sized> BitSampler<'a, S> {
    /// Create a sampler positioned at the start of the source
    pub fn new(source: &'a S, samples_per_bit: f64, idle_timeout: Option<u64>) -> Self {
        Self {
            source,
            samples_per_bit,
            idle_timeout,
            next_point: samples_per_bit / 2.0,
            cursor: 0,
        }
    }

    /// First sample not yet consumed by a bit
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Total samples in the underlying source
    pub fn sample_count(&self) -> u64 {
        self.source.sample_count()
    }

    /// Nominal bit period in samples
    pub fn samples_per_bit(&self) -> f64 {
        self.samples_per_bit
    }

    /// Hard-synchronize on the next start-of-frame edge
    ///
    /// Searches from the cursor for a falling edge preceded by at least
    /// `idle_bits` bit times of recessive bus (with half a bit of tolerance).
    /// Returns the edge index, or `None` when the buffer (or the idle timeout)
    /// runs out first.
    pub fn sync_to_start_of_frame(&mut self, idle_bits: u32) -> Option<u64> {
        let count = self.source.sample_count();
        let min_idle = if idle_bits == 0 {
            0
        } else {
            ((idle_bits as f64 - 0.5) * self.samples_per_bit).floor() as u64
        };
        let until = match self.idle_timeout {
            Some(timeout) => self.cursor.saturating_add(timeout).min(count),
            None => count,
        };

        let mut from = self.cursor;
        loop {
            let edge = self.source.next_falling_edge(from, until)?;
            if edge >= min_idle && self.source.is_recessive_over(edge - min_idle, edge) {
                log::trace!("Start of frame edge at sample {}", edge);
                self.cursor = edge;
                self.next_point = edge as f64 + self.samples_per_bit / 2.0;
                return Some(edge);
            }
            from = edge + 1;
        }
    }

    /// Read the next bit, or `None` if the buffer ends before the bit does
    ///
    /// A bit may end on the final sample of the buffer.
    pub fn read_bit(&mut self) -> Option<SampledBit> {
        let count = self.source.sample_count();
        let sample = self.next_point.floor() as u64;
        if sample >= count {
            return None;
        }
        let value = self.source.level(sample);

        let window_end = ((self.next_point + self.samples_per_bit).floor() as u64)
            .saturating_add(1)
            .min(count);
        let (end, next_point) = match self.source.next_falling_edge(sample + 1, window_end) {
            Some(edge) => (edge - 1, edge as f64 + self.samples_per_bit / 2.0),
            None => {
                let boundary = (self.next_point + self.samples_per_bit / 2.0).floor() as u64;
                (
                    boundary.saturating_sub(1).max(sample),
                    self.next_point + self.samples_per_bit,
                )
            }
        };
        if end >= count {
            return None;
        }

        let bit = SampledBit {
            value,
            sample,
            start: self.cursor.min(sample),
            end,
        };
        self.cursor = end + 1;
        self.next_point = next_point;
        Some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleBuffer;

    /// Render bits at an integer number of samples per bit
    fn render(bits: &str, samples_per_bit: usize) -> SampleBuffer {
        let levels = bits
            .chars()
            .flat_map(|ch| std::iter::repeat(ch == '1').take(samples_per_bit))
            .collect::<Vec<_>>();
        SampleBuffer::new(levels)
    }

    fn read_all<S: SampleSource + ?Sized>(sampler: &mut BitSampler<'_, S>) -> String {
        std::iter::from_fn(|| sampler.read_bit())
            .map(|bit| if bit.value { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_reads_bits_after_sync() {
        let buffer = render("1111111111110110010011111", 10);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);

        assert_eq!(sampler.sync_to_start_of_frame(11), Some(120));
        let bits = read_all(&mut sampler);
        assert!(bits.starts_with("0110010011"), "got {}", bits);
    }

    #[test]
    fn test_bits_are_contiguous() {
        let buffer = render("11111111111101100100111111", 10);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        sampler.sync_to_start_of_frame(11).unwrap();

        let mut expected_start = 120;
        while let Some(bit) = sampler.read_bit() {
            assert_eq!(bit.start, expected_start);
            assert!(bit.start <= bit.sample && bit.sample <= bit.end);
            expected_start = bit.end + 1;
        }
        assert_eq!(expected_start, buffer.sample_count());
    }

    #[test]
    fn test_resync_absorbs_clock_drift() {
        // Transmitter runs about 4% slow relative to the nominal bit period.
        let pattern = "1111111111110101010101010101010111";
        let mut levels = Vec::new();
        let mut position = 0.0f64;
        for ch in pattern.chars() {
            let end = position + 10.4;
            while (levels.len() as f64) < end.round() {
                levels.push(ch == '1');
            }
            position = end;
        }
        let buffer = SampleBuffer::new(levels);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        sampler.sync_to_start_of_frame(11).unwrap();

        let bits = read_all(&mut sampler);
        assert!(bits.starts_with("0101010101010101010"), "got {}", bits);
    }

    #[test]
    fn test_idle_requirement_skips_short_gaps() {
        // A falling edge after only 3 recessive bits does not count as SOF.
        let buffer = render("000111011111111111110111", 10);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        assert_eq!(sampler.sync_to_start_of_frame(11), Some(200));
    }

    #[test]
    fn test_idle_timeout_reports_end_of_stream() {
        let buffer = render("111111111111111111111111111111110111", 10);
        let mut sampler = BitSampler::new(&buffer, 10.0, Some(100));
        assert_eq!(sampler.sync_to_start_of_frame(0), None);

        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        assert_eq!(sampler.sync_to_start_of_frame(0), Some(320));
    }

    #[test]
    fn test_last_bit_may_end_on_final_sample() {
        let buffer = render("111111111111010", 10);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        sampler.sync_to_start_of_frame(11).unwrap();

        assert_eq!(read_all(&mut sampler), "010");
        assert_eq!(sampler.cursor(), buffer.sample_count());
    }

    #[test]
    fn test_partial_bit_at_end_is_not_read() {
        // The last bit is cut after its sample point.
        let mut levels = render("11111111111101", 10).as_slice().to_vec();
        levels.truncate(levels.len() - 3);
        let buffer = SampleBuffer::new(levels);
        let mut sampler = BitSampler::new(&buffer, 10.0, None);
        sampler.sync_to_start_of_frame(11).unwrap();

        assert_eq!(read_all(&mut sampler), "0");
        assert_eq!(sampler.cursor(), 130);
    }
}
