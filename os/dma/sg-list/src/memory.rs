use alloc::vec::Vec;
use axi_dma_registers::SgDescriptor;
use dma_addresses::ArenaOffset;
use dma_pinning::DmaBuffer;

/// The host's view of the memory backing the descriptor arena.
///
/// Offsets are the same [`ArenaOffset`]s the arena allocator hands out.
pub trait DescriptorMemory {
    /// Number of addressable bytes.
    fn size(&self) -> usize;

    /// Write one descriptor slot.
    ///
    /// # Errors
    /// [`SlotOutOfBounds`] if the slot does not fit.
    fn store(&mut self, offset: ArenaOffset, descriptor: &SgDescriptor) -> Result<(), SlotOutOfBounds>;

    /// Read one descriptor slot.
    ///
    /// # Errors
    /// [`SlotOutOfBounds`] if the slot does not fit.
    fn load(&self, offset: ArenaOffset) -> Result<SgDescriptor, SlotOutOfBounds>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("descriptor slot at {offset} does not fit into {size} bytes of descriptor memory")]
pub struct SlotOutOfBounds {
    pub offset: ArenaOffset,
    pub size: usize,
}

impl DescriptorMemory for [u8] {
    fn size(&self) -> usize {
        self.len()
    }

    fn store(&mut self, offset: ArenaOffset, descriptor: &SgDescriptor) -> Result<(), SlotOutOfBounds> {
        let size = self.len();
        let slot = slot_range(offset, size)?;
        self[slot].copy_from_slice(&descriptor.to_le_bytes());
        Ok(())
    }

    fn load(&self, offset: ArenaOffset) -> Result<SgDescriptor, SlotOutOfBounds> {
        let slot = slot_range(offset, self.len())?;
        let bytes: &[u8; SgDescriptor::SIZE] = self[slot]
            .try_into()
            .map_err(|_| SlotOutOfBounds { offset, size: self.len() })?;
        Ok(SgDescriptor::from_le_bytes(bytes))
    }
}

impl DescriptorMemory for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn store(&mut self, offset: ArenaOffset, descriptor: &SgDescriptor) -> Result<(), SlotOutOfBounds> {
        self.as_mut_slice().store(offset, descriptor)
    }

    fn load(&self, offset: ArenaOffset) -> Result<SgDescriptor, SlotOutOfBounds> {
        self.as_slice().load(offset)
    }
}

impl<T: DescriptorMemory + ?Sized> DescriptorMemory for &mut T {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn store(&mut self, offset: ArenaOffset, descriptor: &SgDescriptor) -> Result<(), SlotOutOfBounds> {
        (**self).store(offset, descriptor)
    }

    fn load(&self, offset: ArenaOffset) -> Result<SgDescriptor, SlotOutOfBounds> {
        (**self).load(offset)
    }
}

/// Word-wise volatile access; the device writes status words concurrently.
impl DescriptorMemory for DmaBuffer {
    fn size(&self) -> usize {
        self.len()
    }

    fn store(&mut self, offset: ArenaOffset, descriptor: &SgDescriptor) -> Result<(), SlotOutOfBounds> {
        let size = self.len();
        let base = slot_range(offset, size)?.start;
        for (i, word) in descriptor.to_words().into_iter().enumerate() {
            self.write_u32_le(base + i * 4, word)
                .ok_or(SlotOutOfBounds { offset, size })?;
        }
        Ok(())
    }

    fn load(&self, offset: ArenaOffset) -> Result<SgDescriptor, SlotOutOfBounds> {
        let size = self.len();
        let base = slot_range(offset, size)?.start;
        let mut words = [0u32; SgDescriptor::WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self
                .read_u32_le(base + i * 4)
                .ok_or(SlotOutOfBounds { offset, size })?;
        }
        Ok(SgDescriptor::from_words(&words))
    }
}

fn slot_range(offset: ArenaOffset, size: usize) -> Result<core::ops::Range<usize>, SlotOutOfBounds> {
    let start = offset.as_usize();
    match start.checked_add(SgDescriptor::SIZE) {
        Some(end) if end <= size => Ok(start..end),
        _ => Err(SlotOutOfBounds { offset, size }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axi_dma_registers::{DescriptorControl, DescriptorStatus};
    use dma_addresses::PhysicalAddress;

    fn sample() -> SgDescriptor {
        let mut d = SgDescriptor::new(
            PhysicalAddress::new(0x1F00_0040),
            PhysicalAddress::new(0x2000_0000),
            DescriptorControl::new().with_buffer_len(512).with_eof(true),
        );
        d.status = DescriptorStatus::new().with_complete(true).with_transferred_len(512);
        d
    }

    #[test]
    fn byte_and_volatile_views_agree() {
        let mut bytes = vec![0u8; 256];
        let mut dma = DmaBuffer::zeroed(256).unwrap();
        bytes.store(ArenaOffset::new(64), &sample()).unwrap();
        dma.store(ArenaOffset::new(64), &sample()).unwrap();
        assert_eq!(&bytes[..], dma.as_bytes());
        assert_eq!(dma.load(ArenaOffset::new(64)).unwrap(), sample());
        assert_eq!(bytes.load(ArenaOffset::new(64)).unwrap(), sample());
    }

    #[test]
    fn slots_must_fit() {
        let mut bytes = vec![0u8; 100];
        let err = bytes.store(ArenaOffset::new(64), &sample()).unwrap_err();
        assert_eq!(err.size, 100);
        assert!(bytes.load(ArenaOffset::new(36)).is_ok());
        assert!(bytes.load(ArenaOffset::new(usize::MAX)).is_err());
    }
}
