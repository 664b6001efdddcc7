//! Diagnostic snapshot of ring and per-page state.
//!
//! [`RingBuffer::state`](crate::RingBuffer::state) is a pure observation: it
//! walks the producer ring by masked links and copies counters and cursors
//! out. The snapshot carries enough topology (node indices, which incoming
//! edge holds the head marker) for tests and post-mortems to check the ring
//! invariants from outside.

use std::fmt;

/// Cursors and counters of a single page node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    /// Arena index of the node.
    pub index: u32,
    /// Write cursor (next free byte).
    pub write: u32,
    /// Read cursor (next byte for the consumer).
    pub read: u32,
    /// Commit watermark (bytes of published items).
    pub commit: u32,
    /// Items resident on the page.
    pub nr_entry: u32,
    /// Whether this node's incoming edge carries the head marker.
    pub head_edge: bool,
}

/// Snapshot of the whole ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingState {
    /// Producer pages in the ring (the reader page is not counted).
    pub nr_pages: u32,
    /// Records committed since construction.
    pub nr_entry: u64,
    /// Records consumed since construction.
    pub nr_read: u64,
    /// Arena index of the head page.
    pub head: u32,
    /// Arena index of the tail page.
    pub tail: u32,
    /// Arena index of the detached reader page.
    pub reader: u32,
    /// State of the detached reader page.
    pub reader_page: PageState,
    /// Producer pages walked forward from the head.
    pub pages: Vec<PageState>,
}

impl RingState {
    /// Unread record count at snapshot time.
    #[inline]
    pub fn unread(&self) -> u64 {
        self.nr_entry - self.nr_read
    }

    /// Number of ring edges carrying the head marker; the ring invariant
    /// pins this to exactly one.
    pub fn head_edges(&self) -> usize {
        self.pages.iter().filter(|p| p.head_edge).count()
            + usize::from(self.reader_page.head_edge)
    }
}

impl fmt::Display for RingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ring state:")?;
        writeln!(f, "- nr_page: {}", self.nr_pages)?;
        writeln!(f, "- nr_entry: {}", self.nr_entry)?;
        writeln!(f, "- nr_read: {}", self.nr_read)?;
        writeln!(f, "- reader_page: <{}>", self.reader)?;
        writeln!(f, "- head_page: <{}>", self.head)?;
        writeln!(f, "- tail_page: <{}>", self.tail)?;
        let r = &self.reader_page;
        writeln!(
            f,
            "   <{}> write: {:#x}, read: {:#x}, commit: {:#x} (reader)",
            r.index, r.write, r.read, r.commit
        )?;
        for p in &self.pages {
            writeln!(
                f,
                "   <{}> write: {:#x}, read: {:#x}, commit: {:#x}{}",
                p.index,
                p.write,
                p.read,
                p.commit,
                if p.head_edge { " (head)" } else { "" }
            )?;
        }
        Ok(())
    }
}
