//! pagering - Page-Based Circular Ring Buffer for Record Logging
//!
//! A producer deposits variable-length binary records into fixed-size pages
//! linked into a ring; a consumer drains them in FIFO order. The consumer
//! never shares a page with the producer: it holds a dedicated *reader page*
//! detached from the ring, and swaps it for the head page when spent — the
//! reader-page-swap technique of kernel trace buffers, with the head marker
//! carried in the low bits of the forward link.
//!
//! # Key Features
//!
//! - O(1), allocation-free reserve/commit and consume hot paths
//! - Zero-copy reserve/commit API with rollback on drop
//! - Head-flag migration by a single compare-and-swap on a packed link word
//! - Injected page-allocator capability (heap or fixed pool)
//! - Refuses rather than overwrites: a full ring surfaces a recoverable error
//!
//! # Example
//!
//! ```
//! use pagering::{RingBuffer, RingError};
//!
//! let mut ring = RingBuffer::new(8192);
//!
//! // Simple API: write() copies the payload in and commits
//! ring.write(b"hello").unwrap();
//!
//! // Zero-copy API: reserve, fill in place, commit
//! let mut reservation = ring.reserve(5)?;
//! reservation.payload_mut().copy_from_slice(b"world");
//! reservation.commit();
//!
//! // Drain in FIFO order
//! assert_eq!(ring.consume().unwrap().payload(), b"hello");
//! assert_eq!(ring.consume().unwrap().payload(), b"world");
//! assert!(ring.consume().is_none());
//! # Ok::<(), RingError>(())
//! ```

mod alloc;
mod config;
mod error;
mod invariants;
mod item;
mod link;
mod page;
mod reservation;
mod ring;
mod state;

pub use alloc::{FixedPool, HeapPages, PageAllocator};
pub use config::{RingConfig, COMPACT_CONFIG, PAGE_HEADER_SIZE, STATIC_PAGES};
pub use error::RingError;
pub use item::{Item, ITEM_HEADER_SIZE, MAX_ITEM_LEN};
pub use ring::{Items, RingBuffer};
pub use state::{PageState, RingState};
