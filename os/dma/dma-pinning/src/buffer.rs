use alloc::alloc::{Layout, alloc_zeroed, dealloc};
use core::fmt;
use core::ptr::NonNull;

/// Alignment of every [`DmaBuffer`]; one page.
pub const DMA_BUFFER_ALIGN: usize = 4096;

/// A zero-initialized, page-aligned heap buffer shared with a DMA engine.
///
/// The device writes into this memory behind the compiler's back, so word
/// access goes through volatile reads and writes. Byte views via
/// [`as_bytes`](Self::as_bytes) are only meaningful after the matching
/// cache flush.
pub struct DmaBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: The buffer is uniquely owned heap memory with no thread affinity.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    /// Allocate `len` zeroed bytes aligned to [`DMA_BUFFER_ALIGN`].
    ///
    /// # Errors
    /// [`AllocError`] if `len` is zero, too large for a layout, or the
    /// allocator is out of memory.
    pub fn zeroed(len: usize) -> Result<Self, AllocError> {
        if len == 0 {
            return Err(AllocError { len });
        }
        let layout = Layout::from_size_align(len, DMA_BUFFER_ALIGN).map_err(|_| AllocError { len })?;

        // SAFETY: The layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AllocError { len })?;
        Ok(Self { ptr, len })
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialized bytes for our lifetime.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Volatile read of the little-endian word at `offset`.
    ///
    /// Returns `None` if `offset` is unaligned or the word runs past the end.
    #[must_use]
    pub fn read_u32_le(&self, offset: usize) -> Option<u32> {
        let ptr = self.word_ptr(offset)?;
        // SAFETY: In bounds and 4-byte aligned, checked by `word_ptr`.
        Some(u32::from_le(unsafe { ptr.read_volatile() }))
    }

    /// Volatile write of `value` as a little-endian word at `offset`.
    ///
    /// Returns `None` if `offset` is unaligned or the word runs past the end.
    pub fn write_u32_le(&mut self, offset: usize, value: u32) -> Option<()> {
        let ptr = self.word_ptr(offset)?;
        // SAFETY: In bounds and 4-byte aligned, checked by `word_ptr`.
        unsafe { ptr.write_volatile(value.to_le()) };
        Some(())
    }

    #[allow(clippy::cast_ptr_alignment)]
    fn word_ptr(&self, offset: usize) -> Option<*mut u32> {
        let end = offset.checked_add(size_of::<u32>())?;
        if end > self.len || offset % size_of::<u32>() != 0 {
            return None;
        }
        // SAFETY: `offset` is within the allocation; the base is page aligned.
        Some(unsafe { self.ptr.as_ptr().add(offset) }.cast::<u32>())
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        // The layout was valid at allocation time and `len` never changes.
        if let Ok(layout) = Layout::from_size_align(self.len, DMA_BUFFER_ALIGN) {
            // SAFETY: Allocated in `zeroed` with exactly this layout.
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not allocate a DMA buffer of {len} bytes")]
pub struct AllocError {
    pub len: usize,
}
