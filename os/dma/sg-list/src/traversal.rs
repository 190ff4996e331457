//! # Completion Traversal
//!
//! After the engine has run, the chain is walked again to turn retired
//! descriptors back into logical buffers. The walk is driven by a cursor with
//! three states:
//!
//! | Cursor | `dequeue_next` |
//! |--------|----------------|
//! | `Exhausted` | end of list |
//! | `At(Sentinel)` | becomes `Exhausted`, end of list |
//! | `At(Record(i))` | coalesces the buffer starting at `i`, moves past it |
//!
//! A buffer ends at the record that carried EOF when it was built, or at the
//! last record of the chain, whichever comes first. The hardware's own EOF
//! bit plays no part in grouping.

use crate::chain::NodeRef;
use crate::list::SgList;
use crate::memory::DescriptorMemory;
use axi_dma_registers::DescriptorStatus;
use bitfield_struct::bitfield;
use dma_addresses::ArenaOffset;
use dma_pinning::{CacheMaintenance, PinError};
use log::{debug, trace};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TraversalCursor {
    Exhausted,
    At(NodeRef),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferStatus {
    Success,
    Failed,
}

/// Faults accumulated over the descriptors of one returned buffer.
#[bitfield(u8, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct DescriptorFaults {
    /// At least one descriptor was not marked complete.
    pub incomplete: bool,
    /// `DMAIntErr` on at least one descriptor.
    pub internal_error: bool,
    /// `DMASlvErr` on at least one descriptor.
    pub slave_error: bool,
    /// `DMADecErr` on at least one descriptor.
    pub decode_error: bool,
    /// A descriptor slot could not be read back.
    pub unreadable: bool,
    #[bits(3, default = 0)]
    _reserved: u8,
}

impl DescriptorFaults {
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.into_bits() == 0
    }

    /// Fold one descriptor's status word into the accumulated faults.
    #[must_use]
    pub const fn with_status(self, status: DescriptorStatus) -> Self {
        self.with_incomplete(self.incomplete() || !status.complete())
            .with_internal_error(self.internal_error() || status.internal_error())
            .with_slave_error(self.slave_error() || status.slave_error())
            .with_decode_error(self.decode_error() || status.decode_error())
    }
}

/// One logical buffer read back from a completed chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CompletedBuffer {
    /// Start of the buffer in the data arena.
    pub offset: ArenaOffset,
    /// Sum of the lengths the engine reported for each descriptor.
    pub len: usize,
    pub status: BufferStatus,
    pub faults: DescriptorFaults,
    /// Number of descriptors the buffer spans.
    pub descriptors: usize,
}

impl CompletedBuffer {
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, BufferStatus::Success)
    }

    /// The byte range this buffer covers in the data arena.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> core::ops::Range<usize> {
        self.offset.as_usize()..self.offset.as_usize() + self.len
    }
}

impl<M: DescriptorMemory> SgList<'_, M> {
    /// Make the status words written by the engine visible to the CPU.
    ///
    /// Needed before reading back a chain on memory that is not coherent
    /// with the device; [`completed_with`](Self::completed_with) does it for
    /// you.
    ///
    /// # Errors
    /// [`PinError`] from the cache flush.
    pub fn sync_for_cpu<C>(&self, cache: &C) -> Result<(), PinError>
    where
        C: CacheMaintenance + ?Sized,
    {
        cache.flush_for_cpu()?;
        debug!("descriptor memory synchronised for the CPU");
        Ok(())
    }

    /// Read back the next logical buffer, or `None` at the end of the list.
    ///
    /// Does not touch the cache; see [`sync_for_cpu`](Self::sync_for_cpu).
    pub fn dequeue_next(&mut self) -> Option<CompletedBuffer> {
        let TraversalCursor::At(NodeRef::Record(first)) = self.cursor else {
            self.cursor = TraversalCursor::Exhausted;
            return None;
        };

        let offset = self.chain.get(first)?.data_offset;
        let mut len = 0usize;
        let mut faults = DescriptorFaults::new();
        let mut descriptors = 0usize;
        let mut index = first;

        let next = loop {
            let Some(record) = self.chain.get(index) else {
                break NodeRef::Sentinel;
            };
            match self.memory.load(record.descriptor_offset) {
                Ok(descriptor) => {
                    trace!(
                        "descriptor {index} status {:#010X}",
                        descriptor.status.into_bits()
                    );
                    faults = faults.with_status(descriptor.status);
                    len += descriptor.status.transferred_len() as usize;
                }
                Err(_) => faults.set_unreadable(true),
            }
            descriptors += 1;

            match self.chain.next(NodeRef::Record(index)) {
                NodeRef::Record(i) if !record.eof => index = i,
                next => break next,
            }
        };
        self.cursor = TraversalCursor::At(next);

        let status = if faults.is_empty() {
            BufferStatus::Success
        } else {
            BufferStatus::Failed
        };
        Some(CompletedBuffer {
            offset,
            len,
            status,
            faults,
            descriptors,
        })
    }

    /// Point the traversal back at the head of the chain.
    pub const fn reset_traversal(&mut self) {
        self.cursor = TraversalCursor::At(self.chain.head());
    }

    /// Drain the remaining buffers.
    pub fn completed(&mut self) -> impl Iterator<Item = CompletedBuffer> + '_ {
        core::iter::from_fn(move || self.dequeue_next())
    }

    /// Flush `cache` for the CPU, then drain the remaining buffers.
    ///
    /// # Errors
    /// [`PinError`] from the cache flush; nothing is read in that case.
    pub fn completed_with<C>(
        &mut self,
        cache: &C,
    ) -> Result<impl Iterator<Item = CompletedBuffer> + '_, PinError>
    where
        C: CacheMaintenance + ?Sized,
    {
        self.sync_for_cpu(cache)?;
        Ok(self.completed())
    }
}
