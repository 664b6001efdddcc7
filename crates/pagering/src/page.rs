//! Page slabs and their per-page metadata nodes.

use std::sync::atomic::AtomicU32;

use crate::link::{self, FLAG_NORMAL};

/// A fixed-size storage slab: packed items plus the commit watermark.
///
/// `commit` counts the bytes of fully published items from the start of the
/// data area; bytes between `commit` and the write cursor are reserved but
/// not yet visible to the consumer, bytes past the write cursor are
/// undefined padding.
#[derive(Debug)]
pub(crate) struct Page {
    pub(crate) commit: u32,
    pub(crate) data: Box<[u8]>,
}

impl Page {
    pub(crate) fn new(slab: Box<[u8]>) -> Self {
        Self { commit: 0, data: slab }
    }
}

/// Per-page metadata: cursors, entry count and the circular list links.
///
/// `next` is the packed `(index, flag)` word from [`crate::link`]; reading
/// the neighbour requires masking the flag bits off. `prev` is a bare index
/// (the backward edge never carries flags).
#[derive(Debug)]
pub(crate) struct PageNode {
    pub(crate) next: AtomicU32,
    pub(crate) prev: u32,
    /// Next free byte offset into the data area. May exceed `commit` while a
    /// reservation is outstanding, and is pinned to the full data size when
    /// the page is closed with trailing padding.
    pub(crate) write: u32,
    /// Next byte offset to hand to the consumer.
    pub(crate) read: u32,
    /// Items currently resident on the page.
    pub(crate) nr_entry: u32,
    pub(crate) page: Page,
}

impl PageNode {
    pub(crate) fn new(slab: Box<[u8]>) -> Self {
        Self {
            next: AtomicU32::new(link::pack(0, FLAG_NORMAL)),
            prev: 0,
            write: 0,
            read: 0,
            nr_entry: 0,
            page: Page::new(slab),
        }
    }

    /// Resets the node to the free state, links untouched.
    pub(crate) fn recycle(&mut self) {
        self.write = 0;
        self.read = 0;
        self.nr_entry = 0;
        self.page.commit = 0;
    }
}
