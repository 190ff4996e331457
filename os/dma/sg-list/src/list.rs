use crate::arena::{Arena, find_span};
use crate::chain::{DescriptorChain, DescriptorRecord, StagedChain};
use crate::config::SgListConfig;
use crate::error::{AddBufferError, ListError};
use crate::materialize::MaterializedChain;
use crate::memory::DescriptorMemory;
use crate::traversal::TraversalCursor;
use axi_dma_registers::info;
use dma_addresses::ArenaOffset;
use dma_pinning::{PhysicalRegion, SpanPosition};
use log::{debug, warn};

/// A scatter-gather list over two pinned arenas.
///
/// The data arena holds payload bytes; the descriptor arena holds hardware
/// descriptors and is backed by `M`, the host's mapping of that memory.
/// Both regions are borrowed from whoever pinned them and must outlive the
/// list.
#[derive(Debug)]
pub struct SgList<'r, M> {
    pub(crate) descriptors: Arena<'r>,
    pub(crate) data: Arena<'r>,
    pub(crate) memory: M,
    pub(crate) chain: DescriptorChain,
    pub(crate) config: SgListConfig,
    pub(crate) materialized: Option<MaterializedChain>,
    pub(crate) cursor: TraversalCursor,
    pub(crate) buffers: usize,
}

/// The outcome of staging one logical buffer, ready to commit.
struct Staged {
    records: StagedChain,
    descriptor_cursor: ArenaOffset,
    data_cursor: ArenaOffset,
}

impl<'r, M: DescriptorMemory> SgList<'r, M> {
    /// Create an empty list with the default configuration.
    ///
    /// # Errors
    /// See [`with_config`](Self::with_config).
    pub fn new(
        data_region: &'r PhysicalRegion,
        descriptor_region: &'r PhysicalRegion,
        descriptor_memory: M,
    ) -> Result<Self, ListError> {
        Self::with_config(
            data_region,
            descriptor_region,
            descriptor_memory,
            SgListConfig::default(),
        )
    }

    /// Create an empty list.
    ///
    /// # Errors
    /// - [`ListError::MemoryTooSmall`] if `descriptor_memory` is shorter than
    ///   `descriptor_region`.
    /// - [`ListError::DescriptorAlignment`] / [`ListError::DescriptorLength`]
    ///   for an unusable configuration.
    pub fn with_config(
        data_region: &'r PhysicalRegion,
        descriptor_region: &'r PhysicalRegion,
        descriptor_memory: M,
        config: SgListConfig,
    ) -> Result<Self, ListError> {
        if descriptor_memory.size() < descriptor_region.len() {
            return Err(ListError::MemoryTooSmall {
                memory: descriptor_memory.size(),
                region: descriptor_region.len(),
            });
        }
        if config.descriptor_alignment.as_u64() < 4 {
            return Err(ListError::DescriptorAlignment(config.descriptor_alignment));
        }
        if config.max_descriptor_len == 0 || config.max_descriptor_len > info::MAX_DESCRIPTOR_LEN {
            return Err(ListError::DescriptorLength(config.max_descriptor_len));
        }

        debug!(
            "new scatter-gather list: {} data bytes in {} span(s), {} descriptor bytes in {} span(s)",
            data_region.len(),
            data_region.spans().len(),
            descriptor_region.len(),
            descriptor_region.spans().len()
        );

        Ok(Self {
            descriptors: Arena::new(descriptor_region),
            data: Arena::new(data_region),
            memory: descriptor_memory,
            chain: DescriptorChain::new(),
            config,
            materialized: None,
            cursor: TraversalCursor::Exhausted,
            buffers: 0,
        })
    }

    /// Append one logical buffer of `size` payload bytes.
    ///
    /// The buffer is described by as few descriptors as the physical layout
    /// of the data arena allows: one per physical span it touches, further
    /// split at `max_descriptor_len`. The first descriptor carries SOF, the
    /// last EOF.
    ///
    /// Either the whole buffer is added or nothing changes. Adding to a
    /// materialized list invalidates the materialized state.
    ///
    /// # Errors
    /// - [`AddBufferError::InvalidArgument`] if `size` is zero.
    /// - [`AddBufferError::DataArenaExhausted`] if the data arena cannot hold
    ///   `size` more bytes.
    /// - [`AddBufferError::DescriptorArenaExhausted`] if the descriptor arena
    ///   runs out of aligned slots.
    pub fn add_logical_buffer(&mut self, size: usize) -> Result<(), AddBufferError> {
        if size == 0 {
            return Err(AddBufferError::InvalidArgument);
        }

        let staged = self.stage(size).inspect_err(|e| {
            warn!("cannot add a {size}-byte buffer: {e}");
        })?;

        let descriptors = staged.records.len();
        self.chain.splice(staged.records);
        self.descriptors.commit(staged.descriptor_cursor);
        self.data.commit(staged.data_cursor);
        self.buffers += 1;
        self.invalidate();

        debug!(
            "added {size}-byte buffer #{} over {descriptors} descriptor(s); cursors: data {}, descriptors {}",
            self.buffers,
            self.data.cursor(),
            self.descriptors.cursor()
        );
        Ok(())
    }

    /// Build the records for one buffer without touching the live state.
    fn stage(&self, size: usize) -> Result<Staged, AddBufferError> {
        let data_region = self.data.region();
        let spans = data_region.spans();
        let max_len = self.config.max_descriptor_len as usize;

        let mut pos = data_region
            .locate(self.data.cursor())
            .ok_or(AddBufferError::DataArenaExhausted)?;
        let mut descriptor_cursor = self.descriptors.cursor();
        let mut records = StagedChain::new();
        let mut remaining = size;

        while remaining > 0 {
            let slot = find_span(
                self.descriptors.region(),
                descriptor_cursor,
                info::DESCRIPTOR_SIZE,
                self.config.descriptor_alignment,
            )
            .ok_or(AddBufferError::DescriptorArenaExhausted)?;

            let span = spans.get(pos.index).ok_or(AddBufferError::DataArenaExhausted)?;
            let buffer_address = data_region
                .address_at(&pos)
                .ok_or(AddBufferError::DataArenaExhausted)?;
            let len = remaining
                .min(span.size() - pos.offset_in_span)
                .min(max_len);

            records.push(DescriptorRecord {
                descriptor_offset: slot,
                data_offset: pos.offset(),
                buffer_address,
                // Bounded by `max_descriptor_len`.
                len: u32::try_from(len).map_err(|_| AddBufferError::InvalidArgument)?,
                sof: false,
                eof: false,
            });

            descriptor_cursor = slot + info::DESCRIPTOR_SIZE;
            remaining -= len;
            pos.offset_in_span += len;

            if pos.offset_in_span == span.size() {
                if remaining > 0 && pos.index + 1 >= spans.len() {
                    return Err(AddBufferError::DataArenaExhausted);
                }
                pos = SpanPosition {
                    index: pos.index + 1,
                    span_start: pos.span_start + span.size(),
                    offset_in_span: 0,
                };
            }
        }

        records.mark_frame();
        Ok(Staged {
            records,
            descriptor_cursor,
            data_cursor: pos.offset(),
        })
    }

    /// Drop every descriptor and rewind both arenas.
    pub fn clear(&mut self) {
        self.chain.clear();
        self.descriptors.reset();
        self.data.reset();
        self.buffers = 0;
        self.cursor = TraversalCursor::Exhausted;
        self.invalidate();
        debug!("scatter-gather list cleared");
    }

    pub(crate) fn invalidate(&mut self) {
        if self.materialized.take().is_some() {
            debug!("materialized descriptors invalidated");
        }
    }

    /// Number of logical buffers added.
    #[inline]
    #[must_use]
    pub const fn buffer_count(&self) -> usize {
        self.buffers
    }

    /// Number of hardware descriptors in the chain.
    #[inline]
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        self.chain.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[DescriptorRecord] {
        self.chain.records()
    }

    #[inline]
    #[must_use]
    pub const fn chain(&self) -> &DescriptorChain {
        &self.chain
    }

    #[inline]
    #[must_use]
    pub const fn data_cursor(&self) -> ArenaOffset {
        self.data.cursor()
    }

    #[inline]
    #[must_use]
    pub const fn descriptor_cursor(&self) -> ArenaOffset {
        self.descriptors.cursor()
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SgListConfig {
        &self.config
    }

    /// The state written by the last [`materialize`](Self::materialize), if
    /// still current.
    #[inline]
    #[must_use]
    pub const fn materialized(&self) -> Option<&MaterializedChain> {
        self.materialized.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    /// Mutable access to descriptor memory. Writing here behind the list's
    /// back only makes sense for whoever plays the device.
    #[inline]
    pub const fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Give back the descriptor memory.
    #[must_use]
    pub fn into_memory(self) -> M {
        self.memory
    }
}
