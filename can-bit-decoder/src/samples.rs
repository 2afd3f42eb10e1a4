//! Sample sources
//!
//! A decode pass reads the captured bus level through the [`SampleSource`]
//! trait. Two representations are provided: a dense buffer with one level per
//! sample, and an edge list as recorded by logic analyzers.
//!
//! Levels are `bool`s where `true` is recessive (logic high).

use crate::types::{DecoderError, Result};

/// Cursor-addressable sequence of binary samples
pub trait SampleSource {
    /// Total number of samples
    fn sample_count(&self) -> u64;

    /// Level at `index`; `index` must be below [`sample_count`](Self::sample_count)
    fn level(&self, index: u64) -> bool;

    /// First index `e` in `[from, until)` where the level falls from recessive
    /// to dominant, i.e. `level(e - 1) && !level(e)`
    fn next_falling_edge(&self, from: u64, until: u64) -> Option<u64> {
        let until = until.min(self.sample_count());
        (from.max(1)..until).find(|&index| self.level(index - 1) && !self.level(index))
    }

    /// True if every sample in `[start, end)` is recessive
    fn is_recessive_over(&self, start: u64, end: u64) -> bool {
        let end = end.min(self.sample_count());
        (start..end).all(|index| self.level(index))
    }
}

/// Dense capture: one level per sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    levels: Vec<bool>,
}

impl SampleBuffer {
    /// Wrap a vector of levels
    pub fn new(levels: Vec<bool>) -> Self {
        Self { levels }
    }

    /// Parse a string of `0`/`1` characters, one per sample
    ///
    /// Whitespace is ignored so captures can be wrapped across lines.
    pub fn from_bit_string(text: &str) -> Result<Self> {
        let mut levels = Vec::with_capacity(text.len());
        for (offset, ch) in text.char_indices() {
            match ch {
                '0' => levels.push(false),
                '1' => levels.push(true),
                c if c.is_whitespace() => continue,
                other => {
                    return Err(DecoderError::CaptureParseError(format!(
                        "unexpected character {:?} at offset {}",
                        other, offset
                    )))
                }
            }
        }
        Ok(Self { levels })
    }

    /// Render the buffer as a `0`/`1` string
    pub fn to_bit_string(&self) -> String {
        self.levels.iter().map(|&level| if level { '1' } else { '0' }).collect()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Borrow the levels
    pub fn as_slice(&self) -> &[bool] {
        &self.levels
    }

    /// Mutable access, used to inject faults into synthetic captures
    pub fn levels_mut(&mut self) -> &mut [bool] {
        &mut self.levels
    }
}

impl From<Vec<bool>> for SampleBuffer {
    fn from(levels: Vec<bool>) -> Self {
        Self::new(levels)
    }
}

impl SampleSource for SampleBuffer {
    fn sample_count(&self) -> u64 {
        self.levels.len() as u64
    }

    fn level(&self, index: u64) -> bool {
        self.levels[index as usize]
    }

    fn next_falling_edge(&self, from: u64, until: u64) -> Option<u64> {
        let from = from.max(1) as usize;
        let until = (until as usize).min(self.levels.len());
        if from >= until {
            return None;
        }
        self.levels[from - 1..until]
            .windows(2)
            .position(|pair| pair[0] && !pair[1])
            .map(|offset| (from + offset) as u64)
    }

    fn is_recessive_over(&self, start: u64, end: u64) -> bool {
        let end = (end as usize).min(self.levels.len());
        let start = (start as usize).min(end);
        self.levels[start..end].iter().all(|&level| level)
    }
}

/// Edge-list capture: an initial level plus the indices where the level toggles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCapture {
    initial: bool,
    edges: Vec<u64>,
    sample_count: u64,
}

impl EdgeCapture {
    /// Build from strictly increasing toggle indices
    pub fn new(initial: bool, edges: Vec<u64>, sample_count: u64) -> Result<Self> {
        if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(DecoderError::CaptureParseError(
                "edge indices must be strictly increasing".to_string(),
            ));
        }
        if let Some(&last) = edges.last() {
            if last >= sample_count {
                return Err(DecoderError::CaptureParseError(format!(
                    "edge at sample {} lies beyond the capture length {}",
                    last, sample_count
                )));
            }
        }
        if edges.first() == Some(&0) {
            return Err(DecoderError::CaptureParseError(
                "an edge cannot occur at sample 0".to_string(),
            ));
        }
        Ok(Self {
            initial,
            edges,
            sample_count,
        })
    }

    /// Build from `(sample, level)` observations, keeping only level changes
    ///
    /// Observations must be in non-decreasing sample order. A pulse shorter
    /// than one sample (two toggles on the same index) vanishes, and a toggle
    /// at sample 0 sets the initial level.
    pub fn from_transitions<I>(initial: bool, transitions: I, sample_count: u64) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, bool)>,
    {
        let mut initial = initial;
        let mut level = initial;
        let mut edges = Vec::new();
        for (sample, value) in transitions {
            if value == level {
                continue;
            }
            level = value;
            if sample == 0 && edges.is_empty() {
                initial = value;
            } else if edges.last() == Some(&sample) {
                edges.pop();
            } else {
                edges.push(sample);
            }
        }
        Self::new(initial, edges, sample_count)
    }

    /// Level at the first sample
    pub fn initial_level(&self) -> bool {
        self.initial
    }

    /// Toggle indices
    pub fn edges(&self) -> &[u64] {
        &self.edges
    }

    /// Level right after the edge at position `edge_index` in the edge list
    fn level_after(&self, edge_index: usize) -> bool {
        self.initial ^ (edge_index % 2 == 0)
    }
}

impl SampleSource for EdgeCapture {
    fn sample_count(&self) -> u64 {
        self.sample_count
    }

    fn level(&self, index: u64) -> bool {
        let toggles = self.edges.partition_point(|&edge| edge <= index);
        self.initial ^ (toggles % 2 == 1)
    }

    fn next_falling_edge(&self, from: u64, until: u64) -> Option<u64> {
        let until = until.min(self.sample_count);
        let first = self.edges.partition_point(|&edge| edge < from);
        self.edges[first..]
            .iter()
            .enumerate()
            .take_while(|(_, &edge)| edge < until)
            .find(|(offset, _)| !self.level_after(first + offset))
            .map(|(_, &edge)| edge)
    }

    fn is_recessive_over(&self, start: u64, end: u64) -> bool {
        let end = end.min(self.sample_count);
        if start >= end {
            return true;
        }
        if !self.level(start) {
            return false;
        }
        let next = self.edges.partition_point(|&edge| edge <= start);
        self.edges.get(next).map_or(true, |&edge| edge >= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_round_trip() {
        let buffer = SampleBuffer::from_bit_string("1110 0011\n01").unwrap();
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.to_bit_string(), "1110001101");
        assert!(SampleBuffer::from_bit_string("10x1").is_err());
    }

    #[test]
    fn test_dense_falling_edges() {
        let buffer = SampleBuffer::from_bit_string("1110001101").unwrap();
        assert_eq!(buffer.next_falling_edge(0, 10), Some(3));
        assert_eq!(buffer.next_falling_edge(4, 10), Some(8));
        assert_eq!(buffer.next_falling_edge(4, 8), None);
        assert_eq!(buffer.next_falling_edge(9, 3), None);
        assert!(buffer.is_recessive_over(0, 3));
        assert!(!buffer.is_recessive_over(0, 4));
        assert!(buffer.is_recessive_over(5, 5));
    }

    #[test]
    fn test_edge_capture_matches_dense() {
        let dense = SampleBuffer::from_bit_string("1110001101").unwrap();
        let edges = EdgeCapture::new(true, vec![3, 6, 8, 9], 10).unwrap();

        for index in 0..10 {
            assert_eq!(edges.level(index), dense.level(index), "level at {}", index);
        }
        for from in 0..10 {
            for until in from..=10 {
                assert_eq!(
                    edges.next_falling_edge(from, until),
                    dense.next_falling_edge(from, until),
                    "edge search in [{}, {})",
                    from,
                    until
                );
                assert_eq!(
                    edges.is_recessive_over(from, until),
                    dense.is_recessive_over(from, until),
                    "recessive run over [{}, {})",
                    from,
                    until
                );
            }
        }
    }

    #[test]
    fn test_edge_capture_from_transitions() {
        let capture =
            EdgeCapture::from_transitions(true, vec![(3, false), (5, false), (6, true)], 10).unwrap();
        assert_eq!(capture.edges(), &[3, 6]);
        assert!(capture.initial_level());
    }

    #[test]
    fn test_sub_sample_pulses_vanish() {
        let transitions = vec![
            (0, false),
            (5, true),
            (5, false),
            (8, true),
            (9, false),
            (9, true),
            (9, false),
        ];
        let capture = EdgeCapture::from_transitions(true, transitions, 12).unwrap();
        assert!(!capture.initial_level());
        assert_eq!(capture.edges(), &[8, 9]);
        assert!(!capture.level(5));
        assert!(capture.level(8));
        assert!(!capture.level(9));
    }

    #[test]
    fn test_edge_capture_validation() {
        assert!(EdgeCapture::new(true, vec![5, 5], 10).is_err());
        assert!(EdgeCapture::new(true, vec![12], 10).is_err());
        assert!(EdgeCapture::new(true, vec![0, 4], 10).is_err());
    }
}
