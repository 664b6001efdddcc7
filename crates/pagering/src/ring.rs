use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use crate::alloc::{HeapPages, PageAllocator};
use crate::config::RingConfig;
use crate::error::RingError;
use crate::invariants::{
    debug_assert_counters, debug_assert_head_replaced, debug_assert_page_cursors,
    debug_assert_reader_in_bounds,
};
use crate::item::{self, Item, ITEM_HEADER_SIZE};
use crate::link::{self, EdgeState, FLAG_HEAD, FLAG_MASK, FLAG_NORMAL, FLAG_UPDATE};
use crate::page::PageNode;
use crate::reservation::Reservation;
use crate::state::{PageState, RingState};

// =============================================================================
// HEAD-FLAG PROTOCOL & SYNCHRONIZATION NOTES
// =============================================================================
//
// The producer pages form a circular doubly-linked list of arena nodes. The
// forward link of each node is one packed word, `(index << 2) | flag`, and
// exactly one edge in the ring carries the HEAD flag: the edge pointing at
// the oldest unread page. The flag rides on the *incoming* edge so that a
// single compare-and-swap on that word can substitute a different node at
// the head position and retire the flag in the same step.
//
// ## Reader-page swap
//
// The consumer never reads a page that producers can still touch. It owns a
// dedicated reader page outside the ring; when that page is spent, the swap
// 1. readies the spent page for reuse (cursors and watermark to zero),
// 2. copies the head page's links onto it and stamps HEAD on its outgoing
//    edge (which points at the head's successor, the next head),
// 3. CASes the head's incoming edge from `(head | HEAD)` to the spent page,
//    splicing it in and clearing the old flag in one shot,
// 4. fixes the backward link, advances `head` one node, and hands the
//    detached ex-head to the consumer.
//
// The ring keeps constant length and the flag migrates forward exactly one
// node per swap.
//
// ## Threading contract
//
// This is a single-producer single-consumer structure driven from one
// thread: every operation takes `&mut self` and the handle is neither `Send`
// nor `Sync`. The CAS in step 3 is kept as a real atomic operation so the
// protocol stays honest for a future lock-free variant, but under the serial
// contract it cannot lose; a miss is a debug-asserted invariant violation.
// Link words use Relaxed loads and Release stores; nothing else is shared.
//
// =============================================================================

/// Page-based circular ring buffer for variable-length records.
///
/// A producer deposits length-prefixed records through
/// [`reserve`](Self::reserve)/[`Reservation::commit`] or [`write`](Self::write);
/// a consumer drains them in FIFO order with [`consume`](Self::consume).
/// Storage is a fixed set of pages claimed at construction and cycled through
/// the ring; the hot paths never allocate.
///
/// # Example
///
/// ```
/// use pagering::RingBuffer;
///
/// let mut ring = RingBuffer::new(8192);
/// ring.write(b"first").unwrap();
/// ring.write(b"second").unwrap();
///
/// assert_eq!(ring.consume().unwrap().payload(), b"first");
/// assert_eq!(ring.consume().unwrap().payload(), b"second");
/// assert!(ring.consume().is_none());
/// ```
pub struct RingBuffer {
    /// Node arena; index 0 starts life as the detached reader page.
    nodes: Vec<PageNode>,
    /// Oldest page still in the ring; next to be handed to the reader.
    head: u32,
    /// Page currently receiving writes.
    tail: u32,
    /// Detached page the consumer reads from; outside the producer ring.
    reader: u32,
    nr_pages: u32,
    pub(crate) nr_entry: u64,
    nr_read: u64,
    data_size: u32,
    align: u32,
    /// Single-thread discipline at the type level: not Send, not Sync.
    _not_send: PhantomData<*mut ()>,
}

impl RingBuffer {
    // ---------------------------------------------------------------------
    // CONSTRUCTION
    // ---------------------------------------------------------------------

    /// Creates a ring with enough heap-backed pages for `size` bytes of
    /// records (at least two producer pages; `0` means the minimum).
    pub fn new(size: usize) -> Self {
        Self::with_config(size, RingConfig::default())
    }

    /// Creates a heap-backed ring with a custom page geometry.
    pub fn with_config(size: usize, config: RingConfig) -> Self {
        match Self::with_allocator(size, config, &mut HeapPages) {
            Ok(ring) => ring,
            Err(_) => unreachable!("heap page allocation does not refuse"),
        }
    }

    /// Creates a ring whose page slabs come from the given allocator.
    ///
    /// Asks for `max(2, ceil(size / data_size))` producer pages plus one
    /// reader page; fails with [`RingError::Alloc`] if the allocator's
    /// budget runs out first.
    pub fn with_allocator(
        size: usize,
        config: RingConfig,
        alloc: &mut dyn PageAllocator,
    ) -> Result<Self, RingError> {
        let data_size = config.data_size();
        let nr_pages = size.div_ceil(data_size).max(2);
        let requested = nr_pages + 1;

        let mut nodes = Vec::with_capacity(requested);
        for allocated in 0..requested {
            let slab = alloc.alloc_page(data_size).ok_or(RingError::Alloc {
                requested,
                allocated,
            })?;
            nodes.push(PageNode::new(slab));
        }

        // Node 0 is the reader page, linked to itself while detached.
        nodes[0].next.store(link::pack(0, FLAG_NORMAL), Ordering::Relaxed);
        nodes[0].prev = 0;

        // Nodes 1..=nr_pages form the circular producer ring.
        for i in 1..=nr_pages {
            let next = if i == nr_pages { 1 } else { i + 1 };
            let prev = if i == 1 { nr_pages } else { i - 1 };
            nodes[i].next.store(link::pack(next as u32, FLAG_NORMAL), Ordering::Relaxed);
            nodes[i].prev = prev as u32;
        }

        let ring = Self {
            nodes,
            head: 1,
            tail: 1,
            reader: 0,
            nr_pages: nr_pages as u32,
            nr_entry: 0,
            nr_read: 0,
            data_size: data_size as u32,
            align: config.align as u32,
            _not_send: PhantomData,
        };
        ring.activate_head();
        log::trace!("ring up: {nr_pages} producer pages, {data_size} data bytes each");
        Ok(ring)
    }

    // ---------------------------------------------------------------------
    // COUNTERS & GEOMETRY
    // ---------------------------------------------------------------------

    /// Producer pages in the ring (the reader page is not counted).
    #[inline]
    pub fn nr_pages(&self) -> usize {
        self.nr_pages as usize
    }

    /// Usable data bytes per page.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size as usize
    }

    /// Item alignment in bytes.
    #[inline]
    pub fn align(&self) -> usize {
        self.align as usize
    }

    /// Records committed and not yet consumed.
    #[inline]
    pub fn unread(&self) -> u64 {
        self.nr_entry - self.nr_read
    }

    /// Returns `true` when nothing is waiting to be consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.unread() == 0
    }

    /// Records committed since construction (or the last reset).
    #[inline]
    pub fn entries_written(&self) -> u64 {
        self.nr_entry
    }

    /// Records consumed since construction (or the last reset).
    #[inline]
    pub fn entries_read(&self) -> u64 {
        self.nr_read
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, idx: u32) -> &mut PageNode {
        &mut self.nodes[idx as usize]
    }

    // ---------------------------------------------------------------------
    // TAGGED-LINK HELPERS
    // ---------------------------------------------------------------------

    /// Bare forward neighbour of `idx`, flags masked off.
    #[inline]
    fn bare_next(&self, idx: u32) -> u32 {
        link::bare(self.nodes[idx as usize].next.load(Ordering::Relaxed))
    }

    /// Stamps the head marker onto the outgoing edge of `idx`: OR in HEAD,
    /// AND out UPDATE.
    fn set_edge_to_head(&self, idx: u32) {
        let edge = &self.nodes[idx as usize].next;
        let word = edge.load(Ordering::Relaxed);
        edge.store((word | FLAG_HEAD) & !FLAG_UPDATE, Ordering::Release);
    }

    /// Masks all flag bits off the outgoing edge of `idx`.
    fn clear_edge_flags(&self, idx: u32) {
        let edge = &self.nodes[idx as usize].next;
        let word = edge.load(Ordering::Relaxed);
        edge.store(word & !FLAG_MASK, Ordering::Release);
    }

    /// Probes the incoming edge of `idx` for the head marker.
    ///
    /// Returns the flag found there, or [`EdgeState::Moved`] when the edge
    /// no longer points at `idx` (the topology shifted between reading the
    /// backward and forward links).
    fn head_edge_state(&self, idx: u32) -> EdgeState {
        let prev = self.nodes[idx as usize].prev;
        let word = self.nodes[prev as usize].next.load(Ordering::Acquire);
        if link::bare(word) != idx {
            return EdgeState::Moved;
        }
        EdgeState::from_flag(link::flag(word))
    }

    /// Atomically retargets the incoming edge of `old` from
    /// `(old | HEAD)` to `new`, clearing the head flag in the same step.
    /// This is the sole point where the flag migrates.
    ///
    /// Returns `true` iff the observed value matched. The caller still has
    /// to fix `new`'s backward neighbour.
    fn replace_head(&self, old: u32, new: u32) -> bool {
        let prev = self.nodes[old as usize].prev;
        let edge = &self.nodes[prev as usize].next;
        edge.compare_exchange(
            link::pack(old, FLAG_HEAD),
            link::pack(new, FLAG_NORMAL),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
    }

    /// Stamps the head flag onto the incoming edge of the current head.
    fn activate_head(&self) {
        self.set_edge_to_head(self.nodes[self.head as usize].prev);
    }

    /// Clears the head flag from the incoming edge of the current head.
    fn deactivate_head(&self) {
        self.clear_edge_flags(self.nodes[self.head as usize].prev);
    }

    // ---------------------------------------------------------------------
    // PRODUCER PATH
    // ---------------------------------------------------------------------

    /// Reserves space on the tail page for a record of `len` payload bytes.
    ///
    /// Zero-length payloads reserve a single byte; the on-page footprint is
    /// the header plus payload rounded up to the configured alignment. The
    /// record becomes visible only once the returned [`Reservation`] is
    /// committed; dropping it instead rolls the tail page back.
    ///
    /// Fails with [`RingError::Full`] when no page can take the record.
    pub fn reserve(&mut self, len: usize) -> Result<Reservation<'_>, RingError> {
        let len = len.max(1);
        let total = item::occupied_size(len, self.align as usize);

        let tail = &self.nodes[self.tail as usize];
        if total + tail.write as usize > self.data_size as usize {
            if let Err(full) = self.move_tail(total) {
                log::debug!("reserve refused:\n{}", self.state());
                return Err(full);
            }
        }

        let tail = self.tail;
        let node = &mut self.nodes[tail as usize];
        let offset = node.write;
        node.write += total as u32;
        node.nr_entry += 1;
        item::write_header(
            &mut node.page.data,
            offset as usize,
            item::pack_header(0, len as u32),
        );
        log::trace!(
            "reserve {total} bytes at <{tail}>+{offset}, {} left",
            self.data_size - self.nodes[tail as usize].write
        );

        Ok(Reservation::new(self, tail, offset, total as u32, len as u32))
    }

    /// Reserves, copies `payload` in, and commits, as one call.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), RingError> {
        let mut reservation = self.reserve(payload.len())?;
        reservation.payload_mut()[..payload.len()].copy_from_slice(payload);
        reservation.commit();
        Ok(())
    }

    /// Advances the tail to the next producer page, or reports full.
    ///
    /// The current tail is closed unconditionally (its write cursor pinned
    /// to the page end) so no smaller record can land behind the one that
    /// did not fit. The next page is claimed only if it holds no unread
    /// data; otherwise it is closed too and the reservation fails.
    fn move_tail(&mut self, length: usize) -> Result<(), RingError> {
        let tail = self.tail;
        // While the swap has the tail detached as the reader page, the ring
        // is re-entered at the head.
        let next = if tail == self.reader {
            self.head
        } else {
            self.bare_next(tail)
        };

        self.nodes[tail as usize].write = self.data_size;

        let next_node = &self.nodes[next as usize];
        if length + next_node.page.commit as usize > self.data_size as usize
            || next_node.nr_entry > 0
        {
            self.nodes[next as usize].write = self.data_size;
            log::trace!("move tail: no page free for {length} bytes");
            return Err(RingError::Full { requested: length });
        }

        self.nodes[next as usize].recycle();
        self.tail = next;
        log::trace!("move tail: <{tail}> to <{next}>");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // CONSUMER PATH
    // ---------------------------------------------------------------------

    /// Returns the next unread record and marks it consumed, or `None` when
    /// the ring is empty. Repeated calls drain the ring in FIFO order.
    pub fn consume(&mut self) -> Option<Item<'_>> {
        let reader = self.reader_page()?;

        let node = &self.nodes[reader as usize];
        let offset = node.read as usize;
        let word = item::read_header(&node.page.data, offset);
        let len = item::header_len(word) as usize;
        let advance = item::occupied_size(len, self.align as usize) as u32;

        self.nr_read += 1;
        let node = &mut self.nodes[reader as usize];
        node.read += advance;
        debug_assert_page_cursors!(node.read, node.page.commit, node.write, node.page.data.len());
        debug_assert_counters!(self.nr_entry, self.nr_read);

        let node = &self.nodes[reader as usize];
        let payload = &node.page.data[offset + ITEM_HEADER_SIZE..offset + ITEM_HEADER_SIZE + len];
        Some(Item::new(item::header_tag(word), payload))
    }

    /// Returns the next unread record without consuming it.
    ///
    /// Takes `&mut self` because an exhausted reader page may be rotated out
    /// under the hood; the record itself is left unread.
    pub fn peek(&mut self) -> Option<Item<'_>> {
        let reader = self.reader_page()?;

        let node = &self.nodes[reader as usize];
        let offset = node.read as usize;
        let word = item::read_header(&node.page.data, offset);
        let len = item::header_len(word) as usize;
        let payload = &node.page.data[offset + ITEM_HEADER_SIZE..offset + ITEM_HEADER_SIZE + len];
        Some(Item::new(item::header_tag(word), payload))
    }

    /// Hands back a page the consumer can read from, swapping the spent
    /// reader page for the head page when needed. `None` means empty.
    fn reader_page(&mut self) -> Option<u32> {
        let node = &self.nodes[self.reader as usize];
        if node.read < node.page.commit {
            return Some(self.reader);
        }
        debug_assert_reader_in_bounds!(node.read, node.page.commit);

        if self.unread() == 0 {
            return None;
        }

        self.swap_reader();
        Some(self.reader)
    }

    /// The reader-page swap: exchanges the spent reader page for the current
    /// head page, migrating the head flag forward by one node.
    fn swap_reader(&mut self) {
        let old = self.reader;
        let target = self.head;

        // Spent by the swap precondition (read == commit), so the page can
        // be readied for another life in the producer ring.
        self.nodes[old as usize].recycle();

        // Give the old reader the head page's links.
        let target_next = self.bare_next(target);
        let target_prev = self.nodes[target as usize].prev;
        self.nodes[old as usize]
            .next
            .store(link::pack(target_next, FLAG_NORMAL), Ordering::Relaxed);
        self.nodes[old as usize].prev = target_prev;

        // Its outgoing edge points at the head's successor: the next head.
        self.set_edge_to_head(old);

        // Substitute it into the ring and retire the old flag in one CAS.
        let replaced = self.replace_head(target, old);
        debug_assert_head_replaced!(replaced);
        self.nodes[target_next as usize].prev = old;

        // The freshly stamped edge covers the advance.
        self.head = target_next;

        self.reader = target;
        self.nodes[target as usize].read = 0;
        log::trace!("reader page: <{old}> back to ring, <{target}> detached");
    }

    // ---------------------------------------------------------------------
    // OBSERVATION
    // ---------------------------------------------------------------------

    /// Non-destructive iteration over every unread record, in consumption
    /// order: the reader-page remainder first, then head page to tail page.
    /// Mutates nothing; commit watermarks bound what is visible.
    pub fn iter(&self) -> Items<'_> {
        Items {
            ring: self,
            node: self.reader,
            offset: self.nodes[self.reader as usize].read,
            done: false,
        }
    }

    /// Snapshot of ring counters and per-page cursors. Pure observation.
    pub fn state(&self) -> RingState {
        let mut pages = Vec::with_capacity(self.nr_pages as usize);
        let mut idx = self.head;
        for _ in 0..self.nr_pages {
            pages.push(self.page_state(idx));
            idx = self.bare_next(idx);
        }
        RingState {
            nr_pages: self.nr_pages,
            nr_entry: self.nr_entry,
            nr_read: self.nr_read,
            head: self.head,
            tail: self.tail,
            reader: self.reader,
            reader_page: self.page_state(self.reader),
            pages,
        }
    }

    fn page_state(&self, idx: u32) -> PageState {
        let node = &self.nodes[idx as usize];
        PageState {
            index: idx,
            write: node.write,
            read: node.read,
            commit: node.page.commit,
            nr_entry: node.nr_entry,
            head_edge: self.head_edge_state(idx) == EdgeState::Head,
        }
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Returns the ring to the freshly-constructed empty state: all pages
    /// recycled, counters zeroed, head flag re-armed. Page topology and the
    /// detached reader page are kept.
    pub fn reset(&mut self) {
        self.deactivate_head();
        for node in &mut self.nodes {
            node.recycle();
        }
        self.tail = self.head;
        self.nr_entry = 0;
        self.nr_read = 0;
        self.activate_head();
        log::trace!("ring reset");
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("nr_pages", &self.nr_pages)
            .field("nr_entry", &self.nr_entry)
            .field("nr_read", &self.nr_read)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

/// Non-destructive iterator over unread records; see [`RingBuffer::iter`].
pub struct Items<'a> {
    ring: &'a RingBuffer,
    node: u32,
    offset: u32,
    done: bool,
}

impl<'a> Iterator for Items<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Item<'a>> {
        let ring: &'a RingBuffer = self.ring;
        loop {
            if self.done {
                return None;
            }

            let node = &ring.nodes[self.node as usize];
            if self.offset < node.page.commit {
                let offset = self.offset as usize;
                let word = item::read_header(&node.page.data, offset);
                let len = item::header_len(word) as usize;
                self.offset += item::occupied_size(len, ring.align as usize) as u32;
                let payload =
                    &node.page.data[offset + ITEM_HEADER_SIZE..offset + ITEM_HEADER_SIZE + len];
                return Some(Item::new(item::header_tag(word), payload));
            }

            // Page exhausted: reader page first, then head towards tail.
            if self.node == ring.reader {
                if ring.reader == ring.tail {
                    // Tail is detached with the reader; the ring pages hold
                    // nothing newer.
                    self.done = true;
                    continue;
                }
                self.node = ring.head;
            } else if self.node == ring.tail {
                self.done = true;
                continue;
            } else {
                self.node = ring.bare_next(self.node);
            }
            self.offset = ring.nodes[self.node as usize].read;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::FixedPool;
    use crate::config::COMPACT_CONFIG;

    #[test]
    fn test_minimum_ring_geometry() {
        let ring = RingBuffer::new(0);
        assert_eq!(ring.nr_pages(), 2);
        assert_eq!(ring.unread(), 0);

        let state = ring.state();
        assert_eq!(state.head, state.tail);
        assert_eq!(state.head_edges(), 1);
        assert!(state.pages[0].head_edge);
    }

    #[test]
    fn test_page_count_scales_with_size() {
        let ring = RingBuffer::new(4 * 4088 + 1);
        assert_eq!(ring.nr_pages(), 5);
    }

    #[test]
    fn test_reserve_commit_consume() {
        let mut ring = RingBuffer::new(0);

        let mut r = ring.reserve(7).unwrap();
        assert_eq!(r.len(), 7);
        r.payload_mut().copy_from_slice(b"buffers");
        r.commit();

        assert_eq!(ring.unread(), 1);
        let item = ring.consume().unwrap();
        assert_eq!(item.payload(), b"buffers");
        assert_eq!(item.tag(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_dropped_reservation_publishes_nothing() {
        let mut ring = RingBuffer::new(0);

        {
            let mut r = ring.reserve(16).unwrap();
            r.payload_mut().fill(0xAA);
            // dropped uncommitted
        }
        assert!(ring.consume().is_none());

        // The rollback released the space: the page accepts the same bytes
        // again from offset zero.
        ring.write(b"kept").unwrap();
        let state = ring.state();
        assert_eq!(state.pages[0].nr_entry, 1);
        assert_eq!(ring.consume().unwrap().payload(), b"kept");
    }

    #[test]
    fn test_commit_publishes_up_to_write_cursor() {
        let mut ring = RingBuffer::new(0);
        ring.write(b"one").unwrap();
        ring.write(b"two").unwrap();

        let state = ring.state();
        let tail = &state.pages[0];
        assert_eq!(tail.commit, tail.write);
        assert_eq!(tail.nr_entry, 2);
    }

    #[test]
    fn test_move_tail_closes_old_page() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        let data_size = ring.data_size();

        // 100-byte payloads: header + payload -> 104 occupied; two fit in a
        // 248-byte page, the third moves the tail.
        ring.write(&[1u8; 100]).unwrap();
        ring.write(&[2u8; 100]).unwrap();
        let before = ring.state();
        assert_eq!(before.head, before.tail);

        ring.write(&[3u8; 100]).unwrap();
        let after = ring.state();
        assert_eq!(after.head, before.head, "head does not move on rollover");
        assert_ne!(after.tail, before.tail, "tail advanced by one page");
        assert_eq!(
            after.pages[0].write as usize, data_size,
            "the left-behind page is closed"
        );
    }

    #[test]
    fn test_exact_fit_does_not_move_tail() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        let data_size = ring.data_size();

        // One record that occupies the whole data area exactly.
        ring.write(&vec![7u8; data_size - ITEM_HEADER_SIZE]).unwrap();
        let state = ring.state();
        assert_eq!(state.head, state.tail);
        assert_eq!(state.pages[0].write as usize, data_size);

        // One byte more and the tail must move.
        ring.write(&[1u8; 1]).unwrap();
        assert_ne!(ring.state().tail, state.tail);
    }

    #[test]
    fn test_full_surfaces_recoverable_error() {
        let mut pool = FixedPool::new(3); // reader + 2 producer pages
        let mut ring = RingBuffer::with_allocator(0, COMPACT_CONFIG, &mut pool).unwrap();

        let mut written = 0u32;
        let err = loop {
            match ring.write(&[written as u8; 60]) {
                Ok(()) => written += 1,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, RingError::Full { .. }));
        assert!(err.is_recoverable());
        assert!(written >= 6, "two 248-byte pages hold at least six 64-byte records");

        // Everything committed before the refusal drains in FIFO order.
        for i in 0..written {
            let item = ring.consume().expect("committed records survive the refusal");
            assert_eq!(item.payload()[0], i as u8);
        }
        assert!(ring.consume().is_none());
    }

    #[test]
    fn test_oversized_record_is_full_not_panic() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        let err = ring.write(&[0u8; 4096]).unwrap_err();
        assert!(matches!(err, RingError::Full { .. }));
    }

    #[test]
    fn test_reader_swap_changes_page_identity() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);

        // Fill two pages.
        for i in 0..4 {
            ring.write(&[i; 100]).unwrap();
        }
        let reader_before = ring.state().reader;
        let head_before = ring.state().head;

        // First consume swaps the reader page in place of the head.
        assert_eq!(ring.consume().unwrap().payload(), &[0; 100]);
        let state = ring.state();
        assert_ne!(state.reader, reader_before, "reader page identity changed");
        assert_ne!(state.head, head_before, "head advanced by one");
        assert_eq!(state.head_edges(), 1, "the flag migrated, not duplicated");

        // The swapped-out page is a ring member again, not the reader.
        assert!(state.pages.iter().any(|p| p.index == reader_before));
        assert!(state.pages.iter().all(|p| p.index != state.reader));
    }

    #[test]
    fn test_steady_state_cycling() {
        // Write/drain across many ring revolutions; recycled pages must be
        // claimable again.
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        let mut seq = 0u32;
        for _round in 0..64 {
            for _ in 0..3 {
                ring.write(&seq.to_le_bytes()).unwrap();
                seq += 1;
            }
            let mut expect = seq - 3;
            while let Some(item) = ring.consume() {
                assert_eq!(item.payload(), &expect.to_le_bytes());
                expect += 1;
            }
            assert_eq!(expect, seq);
        }
        assert_eq!(ring.entries_written(), u64::from(seq));
        assert_eq!(ring.entries_read(), u64::from(seq));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::new(0);
        ring.write(b"stay").unwrap();

        assert_eq!(ring.peek().unwrap().payload(), b"stay");
        assert_eq!(ring.peek().unwrap().payload(), b"stay");
        assert_eq!(ring.unread(), 1);
        assert_eq!(ring.consume().unwrap().payload(), b"stay");
        assert!(ring.peek().is_none());
    }

    #[test]
    fn test_iter_sees_unread_in_order() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        for i in 0u8..5 {
            ring.write(&[i; 40]).unwrap();
        }
        ring.consume().unwrap(); // drop the first

        let seen: Vec<u8> = ring.iter().map(|item| item.payload()[0]).collect();
        assert_eq!(seen, vec![1, 2, 3, 4]);
        // Pure observation: nothing consumed, nothing moved.
        assert_eq!(ring.unread(), 4);
        let seen_again: Vec<u8> = ring.iter().map(|item| item.payload()[0]).collect();
        assert_eq!(seen_again, seen);
    }

    #[test]
    fn test_iter_on_empty_ring() {
        let ring = RingBuffer::new(0);
        assert_eq!(ring.iter().count(), 0);
    }

    #[test]
    fn test_reset_rearms_head_flag() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        for i in 0u8..6 {
            ring.write(&[i; 80]).unwrap();
        }
        ring.consume().unwrap();

        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.entries_written(), 0);
        let state = ring.state();
        assert_eq!(state.head, state.tail);
        assert_eq!(state.head_edges(), 1);
        assert!(state.pages.iter().all(|p| p.write == 0 && p.commit == 0));

        // Fully usable again.
        ring.write(b"fresh").unwrap();
        assert_eq!(ring.consume().unwrap().payload(), b"fresh");
    }

    #[test]
    fn test_alloc_failure_is_surfaced() {
        let mut pool = FixedPool::new(2); // one short: 2 producers + reader need 3
        let err = RingBuffer::with_allocator(0, COMPACT_CONFIG, &mut pool).unwrap_err();
        assert_eq!(
            err,
            RingError::Alloc {
                requested: 3,
                allocated: 2
            }
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_head_probe_tracks_topology() {
        let mut ring = RingBuffer::with_config(0, COMPACT_CONFIG);
        assert_eq!(ring.head_edge_state(ring.head), EdgeState::Head);

        // A non-head ring member probes Normal.
        let other = ring.bare_next(ring.head);
        assert_eq!(ring.head_edge_state(other), EdgeState::Normal);

        // After a swap the old head is detached; its stale backward link no
        // longer points back, so the probe reports Moved.
        for i in 0..4 {
            ring.write(&[i; 100]).unwrap();
        }
        let old_head = ring.head;
        ring.consume().unwrap();
        assert_eq!(ring.head_edge_state(old_head), EdgeState::Moved);
        assert_eq!(ring.head_edge_state(ring.head), EdgeState::Head);
    }

    #[test]
    fn test_zero_length_write_stores_one_byte() {
        let mut ring = RingBuffer::new(0);
        ring.write(b"").unwrap();
        let item = ring.consume().unwrap();
        assert_eq!(item.payload_len(), 1);
        assert_eq!(item.payload(), &[0]);
    }
}
