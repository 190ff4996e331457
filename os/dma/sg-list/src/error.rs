use crate::memory::SlotOutOfBounds;
use dma_addresses::{Alignment, ArenaOffset};
use dma_pinning::PinError;

/// Failure to create a list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("descriptor memory holds {memory} bytes but its region describes {region}")]
    MemoryTooSmall { memory: usize, region: usize },
    #[error("descriptor alignment {0} is below the 4-byte word size")]
    DescriptorAlignment(Alignment),
    #[error("maximum descriptor length {0} is zero or exceeds the hardware limit")]
    DescriptorLength(u32),
}

/// Failure of [`SgList::add_logical_buffer`](crate::SgList::add_logical_buffer).
///
/// On any of these the list is exactly as it was before the call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddBufferError {
    #[error("buffer size must be non-zero")]
    InvalidArgument,
    #[error("no aligned descriptor slot left in the descriptor arena")]
    DescriptorArenaExhausted,
    #[error("not enough space left in the data arena")]
    DataArenaExhausted,
}

/// Failure of [`SgList::materialize`](crate::SgList::materialize).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaterializeError {
    #[error("the chain has no descriptors")]
    EmptyChain,
    #[error("descriptor slot at {0} does not resolve to a physical address")]
    UnresolvedSlot(ArenaOffset),
    #[error(transparent)]
    Memory(#[from] SlotOutOfBounds),
    #[error("cache flush for the device failed")]
    Flush(#[source] PinError),
}
