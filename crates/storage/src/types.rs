//! Common types used across storage operations.

use std::ops::Range;

use bytes::Bytes;

/// Key-value pair returned from range queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }

    /// The key as UTF-8, lossily.
    #[must_use]
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Returns the half-open range containing exactly the keys that start with
/// `prefix`.
///
/// The end bound is the prefix with its last non-`0xFF` byte incremented and
/// everything after it dropped. A prefix made only of `0xFF` bytes (or an
/// empty prefix) has no finite successor, so the end becomes one byte past
/// the longest possible key of that shape.
///
/// ```
/// use pigeon_storage::prefix_range;
///
/// let range = prefix_range(b"USER_INFO_CACHE:");
/// assert_eq!(range.start, b"USER_INFO_CACHE:".to_vec());
/// assert_eq!(range.end, b"USER_INFO_CACHE;".to_vec());
/// ```
#[must_use]
pub fn prefix_range(prefix: &[u8]) -> Range<Vec<u8>> {
    let start = prefix.to_vec();
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return start..end;
        }
    }
    // No successor exists; fall back to a bound above any realistic key.
    let mut end = prefix.to_vec();
    end.extend(std::iter::repeat_n(u8::MAX, 64));
    start..end
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn prefix_range_increments_last_byte() {
        let range = prefix_range(b"abc");
        assert_eq!(range.start, b"abc".to_vec());
        assert_eq!(range.end, b"abd".to_vec());
    }

    #[test]
    fn prefix_range_carries_over_max_bytes() {
        let range = prefix_range(&[b'a', 0xFF, 0xFF]);
        assert_eq!(range.end, vec![b'b']);
    }

    proptest! {
        #[test]
        fn prefix_range_contains_exactly_prefixed_keys(
            prefix in proptest::collection::vec(any::<u8>(), 1..6),
            suffix in proptest::collection::vec(any::<u8>(), 0..6),
            other in proptest::collection::vec(any::<u8>(), 0..12),
        ) {
            let range = prefix_range(&prefix);
            let mut key = prefix.clone();
            key.extend(&suffix);
            prop_assert!(range.contains(&key));
            if !other.starts_with(&prefix) && other.len() < 64 {
                prop_assert!(!range.contains(&other));
            }
        }
    }
}
