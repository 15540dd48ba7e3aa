//! In-memory paging over a resolved ID list.

use std::ops::Range;

/// Most items returned when a caller asks for `count == 0`.
pub const MAX_UNBOUNDED_PAGE: usize = 1000;

/// Index range of the page `(offset, count)` over a list of `len` items.
///
/// Negative arguments and offsets past the end produce an empty range.
/// `count == 0` means "up to the first [`MAX_UNBOUNDED_PAGE`] IDs": the page
/// runs from `offset` to `min(len, MAX_UNBOUNDED_PAGE)`, so an offset at or
/// past that cap yields nothing.
#[must_use]
pub fn page_bounds(len: usize, offset: i32, count: i32) -> Range<usize> {
    let (Ok(offset), Ok(count)) = (usize::try_from(offset), usize::try_from(count)) else {
        return 0..0;
    };
    if offset >= len {
        return 0..0;
    }
    let stop = if count == 0 {
        len.min(MAX_UNBOUNDED_PAGE)
    } else {
        offset.saturating_add(count).min(len)
    };
    if offset >= stop { 0..0 } else { offset..stop }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn boundaries_over_five_items() {
        assert_eq!(page_bounds(5, 3, 10).len(), 2);
        assert_eq!(page_bounds(5, 10, 1).len(), 0);
        assert_eq!(page_bounds(5, -1, 2).len(), 0);
        assert_eq!(page_bounds(5, 1, -2).len(), 0);
        assert_eq!(page_bounds(5, 5, 1).len(), 0);
        assert_eq!(page_bounds(5, 1, 2), 1..3);
    }

    #[test]
    fn zero_count_is_capped() {
        assert_eq!(page_bounds(5, 0, 0), 0..5);
        assert_eq!(page_bounds(2500, 0, 0), 0..1000);
        assert_eq!(page_bounds(2500, 200, 0), 200..1000);
        assert!(page_bounds(2500, 1000, 0).is_empty());
        assert!(page_bounds(2500, 2000, 0).is_empty());
    }

    #[test]
    fn huge_count_does_not_overflow() {
        assert_eq!(page_bounds(5, 2, i32::MAX), 2..5);
    }

    proptest! {
        #[test]
        fn page_stays_in_bounds(len in 0usize..3000, offset in -5i32..3500, count in -5i32..1500) {
            let range = page_bounds(len, offset, count);
            prop_assert!(range.end <= len);
            prop_assert!(range.start <= range.end);
            prop_assert!(range.len() <= MAX_UNBOUNDED_PAGE.max(count.max(0) as usize));
            if count == 0 {
                prop_assert!(range.end <= MAX_UNBOUNDED_PAGE);
            }
        }
    }
}
