use crate::error::MaterializeError;
use crate::list::SgList;
use crate::memory::DescriptorMemory;
use crate::traversal::TraversalCursor;
use alloc::vec::Vec;
use axi_dma_registers::{DescriptorControl, SgDescriptor};
use dma_addresses::PhysicalAddress;
use dma_pinning::CacheMaintenance;
use log::{debug, trace};

/// What the engine needs to know about a chain written to descriptor memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MaterializedChain {
    /// Physical address of the first descriptor (`CURDESC`).
    pub head: PhysicalAddress,
    /// Physical address of the last descriptor (`TAILDESC`).
    pub tail: PhysicalAddress,
    /// Number of descriptors written.
    pub descriptors: usize,
    /// Number of logical buffers, i.e. descriptors carrying EOF.
    pub frames: usize,
}

impl<M: DescriptorMemory> SgList<'_, M> {
    /// Write every record of the chain into descriptor memory and flush it
    /// towards the device.
    ///
    /// Each descriptor links to the physical slot of the next one; the last
    /// links back to the first. Status words are zeroed. Afterwards the
    /// traversal cursor points at the head of the chain.
    ///
    /// Any earlier materialization is dropped before the first slot is
    /// rewritten, so a failed call leaves the list unmaterialized.
    ///
    /// # Errors
    /// - [`MaterializeError::EmptyChain`] if nothing was added.
    /// - [`MaterializeError::UnresolvedSlot`] / [`MaterializeError::Memory`]
    ///   if a slot falls outside the descriptor region or its memory.
    /// - [`MaterializeError::Flush`] if the cache flush fails.
    pub fn materialize<C>(&mut self, cache: &C) -> Result<MaterializedChain, MaterializeError>
    where
        C: CacheMaintenance + ?Sized,
    {
        let records = self.chain.records();
        if records.is_empty() {
            return Err(MaterializeError::EmptyChain);
        }

        let region = self.descriptors.region();
        let slots = records
            .iter()
            .map(|r| {
                region
                    .resolve(r.descriptor_offset)
                    .ok_or(MaterializeError::UnresolvedSlot(r.descriptor_offset))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.invalidate();
        self.cursor = TraversalCursor::Exhausted;
        let records = self.chain.records();
        for (i, record) in records.iter().enumerate() {
            let next = slots[(i + 1) % slots.len()];
            let control = DescriptorControl::new()
                .with_buffer_len(record.len)
                .with_sof(record.sof)
                .with_eof(record.eof);
            let descriptor = SgDescriptor::new(next, record.buffer_address, control);
            self.memory.store(record.descriptor_offset, &descriptor)?;
            trace!(
                "descriptor {i} @ {}: next {}, buffer {}, len {}, sof {}, eof {}",
                slots[i], next, record.buffer_address, record.len, record.sof, record.eof
            );
        }

        cache.flush_for_device().map_err(MaterializeError::Flush)?;

        let materialized = MaterializedChain {
            head: slots[0],
            tail: slots[slots.len() - 1],
            descriptors: records.len(),
            frames: self.chain.frame_count(),
        };
        self.materialized = Some(materialized);
        self.cursor = TraversalCursor::At(self.chain.head());

        debug!(
            "materialized {} descriptor(s) for {} buffer(s), head {}, tail {}",
            materialized.descriptors, materialized.frames, materialized.head, materialized.tail
        );
        Ok(materialized)
    }
}
