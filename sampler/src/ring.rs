//! Ring slot indices and trigger sequence numbers.
//!
//! Slot positions wrap modulo the ring capacity while trigger counts grow
//! monotonically. Keeping them as distinct types stops the two from being
//! mixed up in cursor arithmetic.

use std::fmt;

/// Slot index within a ring of fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RingIndex(u32);

impl RingIndex {
    pub const ZERO: Self = Self(0);

    /// Create an index, checking it against the ring capacity.
    pub fn new(index: usize, capacity: usize) -> Option<Self> {
        if index < capacity {
            u32::try_from(index).ok().map(Self)
        } else {
            None
        }
    }

    /// Index of the `position`-th slot after slot 0, wrapped to the capacity.
    pub fn wrapping(position: u64, capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self((position % capacity as u64) as u32)
    }

    /// The index as a `usize` suitable for slicing.
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic trigger count stamped on each produced range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Number of triggers from `earlier` to `self`, `None` if `earlier` is newer.
    pub fn distance_from(self, earlier: SequenceNumber) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// Sequence number `n` triggers later.
    pub fn advance(self, n: u64) -> Option<SequenceNumber> {
        self.0.checked_add(n).map(SequenceNumber)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(index + n) mod capacity`.
pub fn circular_increment(index: RingIndex, n: usize, capacity: usize) -> RingIndex {
    let n = (n % capacity) as u64;
    RingIndex::wrapping(index.0 as u64 + n, capacity)
}

/// `(b - a) mod capacity`: slots to walk forward from `a` to reach `b`.
pub fn distance(a: RingIndex, b: RingIndex, capacity: usize) -> usize {
    (b.get() + capacity - a.get()) % capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> RingIndex {
        RingIndex::new(i, 10).unwrap()
    }

    #[test]
    fn test_ring_index_bounds() {
        assert_eq!(RingIndex::new(9, 10), Some(idx(9)));
        assert_eq!(RingIndex::new(10, 10), None);
        assert_eq!(RingIndex::wrapping(23, 10), idx(3));
    }

    #[test]
    fn test_circular_increment() {
        assert_eq!(circular_increment(idx(5), 0, 10), idx(5));
        assert_eq!(circular_increment(idx(5), 4, 10), idx(9));
        assert_eq!(circular_increment(idx(5), 6, 10), idx(1));
        assert_eq!(circular_increment(idx(5), 14, 10), idx(9));
        assert_eq!(circular_increment(idx(5), 16, 10), idx(1));
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(idx(5), idx(5), 10), 0);
        assert_eq!(distance(idx(5), idx(9), 10), 4);
        assert_eq!(distance(idx(5), idx(1), 10), 6);
    }

    #[test]
    fn test_sequence_number() {
        let a = SequenceNumber(8);
        let b = SequenceNumber(11);
        assert_eq!(b.distance_from(a), Some(3));
        assert_eq!(a.distance_from(b), None);
        assert_eq!(a.advance(3), Some(b));
        assert_eq!(SequenceNumber(u64::MAX).advance(1), None);
    }
}
