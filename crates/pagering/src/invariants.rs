//! Debug assertion macros for the page-ring invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! in release builds. A failed assertion here means the single-threaded
//! producer/consumer contract was broken or the ring state is corrupt; the
//! ring cannot safely continue.

// =============================================================================
// Per-page cursor ordering: 0 <= read <= commit <= write <= data_size
// =============================================================================

/// Assert the cursor ordering on a single page.
///
/// Used after every producer and consumer step that moves a cursor.
macro_rules! debug_assert_page_cursors {
    ($read:expr, $commit:expr, $write:expr, $data_size:expr) => {
        debug_assert!(
            $read <= $commit && $commit <= $write && ($write as usize) <= $data_size,
            "page cursor ordering violated: read {} commit {} write {} data_size {}",
            $read,
            $commit,
            $write,
            $data_size
        )
    };
}

// =============================================================================
// Counter ordering: nr_entry >= nr_read, difference is the unread count
// =============================================================================

/// Assert the ring-level counters never cross.
///
/// Used in: `consume()` after bumping `nr_read`.
macro_rules! debug_assert_counters {
    ($nr_entry:expr, $nr_read:expr) => {
        debug_assert!(
            $nr_entry >= $nr_read,
            "counter ordering violated: nr_entry {} < nr_read {}",
            $nr_entry,
            $nr_read
        )
    };
}

// =============================================================================
// Reader cursor never passes the commit watermark
// =============================================================================

/// Assert the reader page cursor is within the committed region.
///
/// Used in: the reader-page rotation before deciding whether to swap.
macro_rules! debug_assert_reader_in_bounds {
    ($read:expr, $commit:expr) => {
        debug_assert!(
            $read <= $commit,
            "reader cursor {} passed commit watermark {}",
            $read,
            $commit
        )
    };
}

// =============================================================================
// Head replacement CAS must succeed under the serial contract
// =============================================================================

/// Assert the head-replacement compare-and-swap observed the value it
/// expected. With a single thread driving the ring the edge cannot change
/// underneath the swap; a mismatch means the head flag drifted.
macro_rules! debug_assert_head_replaced {
    ($ok:expr) => {
        debug_assert!($ok, "head replacement CAS lost: head flag drifted off the head edge")
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_counters;
pub(crate) use debug_assert_head_replaced;
pub(crate) use debug_assert_page_cursors;
pub(crate) use debug_assert_reader_in_bounds;
