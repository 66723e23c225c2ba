use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A set of named, monotonically increasing counters.
///
/// Sequences have no knowledge of identifiers; [`SequenceGenerator`] decides
/// which counter names to use.
///
/// All methods take `&self` to support sequences with internal locking
/// (e.g., RocksDB).
///
/// [`SequenceGenerator`]: crate::SequenceGenerator
pub trait Sequence {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issues the next value for `name`.
    ///
    /// The value is strictly greater than both the last value issued under
    /// `name` and `floor`.
    fn next(&self, name: &str, floor: u64) -> Result<u64, Self::Error>;
}

/// The counter cannot advance past `u64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sequence {0:?} is exhausted")]
pub struct SequenceExhausted(pub String);

/// An in-memory sequence backed by a HashMap.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemorySequence {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last value issued under `name`, if any.
    pub fn current(&self, name: &str) -> Option<u64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }
}

impl Sequence for MemorySequence {
    type Error = SequenceExhausted;

    fn next(&self, name: &str, floor: u64) -> Result<u64, Self::Error> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let last = counters.get(name).copied().unwrap_or(0);
        let value = last
            .max(floor)
            .checked_add(1)
            .ok_or_else(|| SequenceExhausted(name.to_string()))?;
        counters.insert(name.to_string(), value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sequence_counts_from_one() {
        let seq = MemorySequence::new();
        assert_eq!(seq.next("Patient", 0).unwrap(), 1);
        assert_eq!(seq.next("Patient", 0).unwrap(), 2);
        assert_eq!(seq.current("Patient"), Some(2));
    }

    #[test]
    fn memory_sequence_names_are_independent() {
        let seq = MemorySequence::new();
        seq.next("Patient", 0).unwrap();
        seq.next("Patient", 0).unwrap();
        assert_eq!(seq.next("Observation", 0).unwrap(), 1);
        assert_eq!(seq.current("Encounter"), None);
    }

    #[test]
    fn memory_sequence_respects_floor() {
        let seq = MemorySequence::new();
        assert_eq!(seq.next("Patient/1/_history", 5).unwrap(), 6);
        // A lower floor never moves the counter backwards.
        assert_eq!(seq.next("Patient/1/_history", 2).unwrap(), 7);
    }

    #[test]
    fn memory_sequence_refuses_to_wrap() {
        let seq = MemorySequence::new();
        let err = seq.next("Patient/1/_history", u64::MAX).unwrap_err();
        assert_eq!(err, SequenceExhausted("Patient/1/_history".to_string()));
        assert_eq!(seq.current("Patient/1/_history"), None);
    }
}
