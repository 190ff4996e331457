//! # Descriptor Chain
//!
//! The host-side bookkeeping for the descriptors of one transfer. Records
//! live in a vector in chain order and are addressed by index; a virtual
//! sentinel closes the ring:
//!
//! ```text
//!     ┌────────────────────────────────────────────────┐
//!     ▼                                                │
//! Sentinel ──► Record(0) ──► Record(1) ──► … ──► Record(n-1)
//!     ▲                                                │
//!     └────────────────── prev / next ─────────────────┘
//! ```
//!
//! Growing the chain happens through a [`StagedChain`], which is appended in
//! one step or dropped as a whole.

use alloc::vec::Vec;
use dma_addresses::{ArenaOffset, PhysicalAddress};

/// One hardware descriptor before it is written to descriptor memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DescriptorRecord {
    /// Slot of this descriptor in the descriptor arena.
    pub descriptor_offset: ArenaOffset,
    /// Start of the payload in the data arena.
    pub data_offset: ArenaOffset,
    /// Physical address of the payload, resolved when the record was staged.
    pub buffer_address: PhysicalAddress,
    /// Payload length in bytes.
    pub len: u32,
    /// First descriptor of a logical buffer.
    pub sof: bool,
    /// Last descriptor of a logical buffer.
    pub eof: bool,
}

/// A position in the circular chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeRef {
    Sentinel,
    Record(usize),
}

#[derive(Debug, Default, Clone)]
pub struct DescriptorChain {
    records: Vec<DescriptorRecord>,
}

impl DescriptorChain {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[DescriptorRecord] {
        &self.records
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DescriptorRecord> {
        self.records.get(index)
    }

    /// First record, or the sentinel if the chain is empty.
    #[must_use]
    pub const fn head(&self) -> NodeRef {
        if self.records.is_empty() {
            NodeRef::Sentinel
        } else {
            NodeRef::Record(0)
        }
    }

    /// Last record, or the sentinel if the chain is empty.
    #[must_use]
    pub const fn tail(&self) -> NodeRef {
        match self.records.len() {
            0 => NodeRef::Sentinel,
            n => NodeRef::Record(n - 1),
        }
    }

    #[must_use]
    pub const fn next(&self, node: NodeRef) -> NodeRef {
        match node {
            NodeRef::Sentinel => self.head(),
            NodeRef::Record(i) if i + 1 < self.records.len() => NodeRef::Record(i + 1),
            NodeRef::Record(_) => NodeRef::Sentinel,
        }
    }

    #[must_use]
    pub const fn prev(&self, node: NodeRef) -> NodeRef {
        match node {
            NodeRef::Sentinel => self.tail(),
            NodeRef::Record(0) => NodeRef::Sentinel,
            NodeRef::Record(i) => NodeRef::Record(i - 1),
        }
    }

    /// Number of records that close a logical buffer.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.records.iter().filter(|r| r.eof).count()
    }

    /// Link every staged record in before the sentinel.
    pub fn splice(&mut self, staged: StagedChain) {
        self.records.extend(staged.records);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[cfg(test)]
    pub(crate) fn records_mut(&mut self) -> &mut [DescriptorRecord] {
        &mut self.records
    }
}

/// Records of one logical buffer that are not yet part of the chain.
#[derive(Debug, Default)]
pub struct StagedChain {
    records: Vec<DescriptorRecord>,
}

impl StagedChain {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: DescriptorRecord) {
        self.records.push(record);
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flag the first record as start and the last one as end of frame.
    pub fn mark_frame(&mut self) {
        if let Some(first) = self.records.first_mut() {
            first.sof = true;
        }
        if let Some(last) = self.records.last_mut() {
            last.eof = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> DescriptorRecord {
        DescriptorRecord {
            descriptor_offset: ArenaOffset::new(n * 64),
            data_offset: ArenaOffset::new(n * 100),
            buffer_address: PhysicalAddress::new(0x1000 + n as u64 * 100),
            len: 100,
            sof: false,
            eof: false,
        }
    }

    fn staged(range: core::ops::Range<usize>) -> StagedChain {
        let mut s = StagedChain::new();
        for n in range {
            s.push(record(n));
        }
        s.mark_frame();
        s
    }

    #[test]
    fn empty_chain_is_just_the_sentinel() {
        let c = DescriptorChain::new();
        assert_eq!(c.head(), NodeRef::Sentinel);
        assert_eq!(c.tail(), NodeRef::Sentinel);
        assert_eq!(c.next(NodeRef::Sentinel), NodeRef::Sentinel);
        assert_eq!(c.prev(NodeRef::Sentinel), NodeRef::Sentinel);
    }

    #[test]
    fn links_are_circular_through_the_sentinel() {
        let mut c = DescriptorChain::new();
        c.splice(staged(0..3));
        assert_eq!(c.next(NodeRef::Sentinel), NodeRef::Record(0));
        assert_eq!(c.next(NodeRef::Record(2)), NodeRef::Sentinel);
        assert_eq!(c.prev(NodeRef::Record(0)), NodeRef::Sentinel);
        assert_eq!(c.prev(NodeRef::Sentinel), NodeRef::Record(2));
        assert_eq!(c.prev(NodeRef::Record(2)), NodeRef::Record(1));
    }

    #[test]
    fn marking_sets_sof_and_eof_on_the_ends() {
        let mut c = DescriptorChain::new();
        c.splice(staged(0..3));
        c.splice(staged(3..4));
        let flags: Vec<_> = c.records().iter().map(|r| (r.sof, r.eof)).collect();
        assert_eq!(
            flags,
            [(true, false), (false, false), (false, true), (true, true)]
        );
        assert_eq!(c.frame_count(), 2);
    }

    #[test]
    fn dropping_a_staged_chain_leaves_the_chain_alone() {
        let mut c = DescriptorChain::new();
        c.splice(staged(0..2));
        drop(staged(2..5));
        assert_eq!(c.len(), 2);
        c.clear();
        assert!(c.is_empty());
    }
}
