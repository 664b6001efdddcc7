//! Error types for ring buffer operations.

use thiserror::Error;

/// Errors that can occur while constructing or writing to a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// No page can accept the record: the next candidate tail page still
    /// holds unread data (or the record is larger than a page).
    #[error("ring is full: no page can take {requested} more bytes")]
    Full {
        /// Aligned on-page size of the refused record, header included.
        requested: usize,
    },

    /// The page allocator refused a slab during construction.
    #[error("page allocation failed after {allocated} of {requested} pages")]
    Alloc {
        /// Pages the ring asked for (producer pages plus the reader page).
        requested: usize,
        /// Pages the allocator handed out before refusing.
        allocated: usize,
    },
}

impl RingError {
    /// Returns `true` if the caller can recover by draining the ring (or by
    /// retrying with a bigger backing store) and trying again.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}
