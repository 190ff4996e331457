use crate::region::{PhysicalRegion, RegionError};
use core::fmt;
use log::warn;

/// The platform service that locks a virtual buffer in memory and reports
/// its physical layout.
///
/// Implementations talk to whatever the platform offers (a character device,
/// an IOMMU driver, a bare-metal identity map). The scatter-gather core only
/// ever sees the resulting [`PhysicalRegion`] and the cache-maintenance calls.
pub trait Pinner {
    /// Opaque token identifying one pinning.
    type Handle: Copy + fmt::Debug;

    /// Pin `buffer` and report the physical spans backing it.
    ///
    /// # Errors
    /// Any [`PinError`]; the buffer is not pinned when this fails.
    fn pin(&self, buffer: &[u8]) -> Result<Pinning<Self::Handle>, PinError>;

    /// Release a pinning previously returned by [`pin`](Self::pin).
    ///
    /// # Errors
    /// [`PinError::UnknownHandle`] or a platform failure.
    fn unpin(&self, handle: Self::Handle) -> Result<(), PinError>;

    /// Make CPU writes to the pinned buffer visible to the device.
    ///
    /// # Errors
    /// Platform failure of the cache operation.
    fn flush_for_device(&self, handle: &Self::Handle) -> Result<(), PinError>;

    /// Make device writes to the pinned buffer visible to the CPU.
    ///
    /// # Errors
    /// Platform failure of the cache operation.
    fn flush_for_cpu(&self, handle: &Self::Handle) -> Result<(), PinError>;
}

/// The raw result of a successful [`Pinner::pin`] call.
#[derive(Debug, Clone)]
pub struct Pinning<H> {
    pub handle: H,
    pub region: PhysicalRegion,
}

/// Cache coherence operations for one pinned buffer.
///
/// Split from [`Pinner`] so the materializer and the traversal only need to
/// know about flushing, not about who pinned the memory.
pub trait CacheMaintenance {
    /// # Errors
    /// Platform failure of the cache operation.
    fn flush_for_device(&self) -> Result<(), PinError>;

    /// # Errors
    /// Platform failure of the cache operation.
    fn flush_for_cpu(&self) -> Result<(), PinError>;
}

/// Memory that is cache coherent with the device; flushing is a no-op.
#[derive(Debug, Default, Copy, Clone)]
pub struct CoherentMemory;

impl CacheMaintenance for CoherentMemory {
    #[inline]
    fn flush_for_device(&self) -> Result<(), PinError> {
        Ok(())
    }

    #[inline]
    fn flush_for_cpu(&self) -> Result<(), PinError> {
        Ok(())
    }
}

impl<T: CacheMaintenance + ?Sized> CacheMaintenance for &T {
    #[inline]
    fn flush_for_device(&self) -> Result<(), PinError> {
        (**self).flush_for_device()
    }

    #[inline]
    fn flush_for_cpu(&self) -> Result<(), PinError> {
        (**self).flush_for_cpu()
    }
}

/// A pinned buffer that is unpinned when dropped.
///
/// Unpinning at drop is best effort: a failure is logged and otherwise
/// ignored so host-side memory can still be freed. Use
/// [`release`](Self::release) to observe the error.
///
/// The guard does not borrow the buffer it pinned. The host keeps writing
/// descriptors into that memory while it is pinned, which a shared borrow
/// held here would forbid. See [`new`](Self::new) for what the caller owes
/// in return.
pub struct Pinned<'p, P: Pinner> {
    pinner: &'p P,
    handle: Option<P::Handle>,
    region: PhysicalRegion,
}

impl<'p, P: Pinner> Pinned<'p, P> {
    /// Pin `buffer` through `pinner`.
    ///
    /// # Contract
    /// `buffer` must stay allocated, and must not move, until this guard is
    /// dropped or [released](Self::release). Freeing it earlier leaves the
    /// device writing into memory the allocator may hand out again. Declare
    /// the backing storage before the guard so it is dropped after it.
    ///
    /// # Errors
    /// Whatever [`Pinner::pin`] reports.
    pub fn new(pinner: &'p P, buffer: &[u8]) -> Result<Self, PinError> {
        let Pinning { handle, region } = pinner.pin(buffer)?;
        log::debug!(
            "pinned {} bytes as {handle:?} over {} span(s)",
            region.len(),
            region.spans().len()
        );
        Ok(Self {
            pinner,
            handle: Some(handle),
            region,
        })
    }

    /// Physical layout of the pinned buffer.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> &PhysicalRegion {
        &self.region
    }

    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<P::Handle> {
        self.handle
    }

    /// Unpin now and report the outcome.
    ///
    /// # Errors
    /// Whatever [`Pinner::unpin`] reports.
    pub fn release(mut self) -> Result<(), PinError> {
        match self.handle.take() {
            Some(handle) => self.pinner.unpin(handle),
            None => Ok(()),
        }
    }

    fn live_handle(&self) -> Result<&P::Handle, PinError> {
        self.handle.as_ref().ok_or(PinError::UnknownHandle)
    }
}

impl<P: Pinner> CacheMaintenance for Pinned<'_, P> {
    fn flush_for_device(&self) -> Result<(), PinError> {
        self.pinner.flush_for_device(self.live_handle()?)
    }

    fn flush_for_cpu(&self) -> Result<(), PinError> {
        self.pinner.flush_for_cpu(self.live_handle()?)
    }
}

impl<P: Pinner> Drop for Pinned<'_, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = self.pinner.unpin(handle)
        {
            warn!("failed to unpin {handle:?}: {e}");
        }
    }
}

impl<P: Pinner> fmt::Debug for Pinned<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pinned")
            .field("handle", &self.handle)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("the pinning service is not available")]
    Unavailable,
    #[error("cannot pin an empty buffer")]
    EmptyBuffer,
    #[error("buffer of {len} bytes exceeds the pinning limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("the pinning service failed with OS error {0}")]
    Os(i32),
    #[error("the pinning service reported a malformed region")]
    Region(#[from] RegionError),
    #[error("the pinning handle is unknown or already released")]
    UnknownHandle,
}
