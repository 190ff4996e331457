//! AXI DMA engine behind the generic UIO platform driver.

use crate::errno;
use axi_dma_registers::info::REGISTER_WINDOW_SIZE;
use axi_dma_registers::{RegisterBus, RegisterError, check_offset};
use core::ptr::NonNull;
use log::{debug, trace};
use rustix::event::{PollFd, PollFlags};
use rustix::fd::OwnedFd;
use rustix::fs::{Mode, OFlags};
use rustix::io::Errno;
use rustix::mm::{MapFlags, ProtFlags};
use sg_list::{CompletionEvent, CompletionNotifier, NotifyError};
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UioError {
    #[error("cannot open the UIO device: OS error {0}")]
    Open(i32),
    #[error("cannot map the register window: OS error {0}")]
    Map(i32),
}

/// An open `/dev/uioN`; delivers the engine's interrupts.
#[derive(Debug)]
pub struct UioDevice {
    fd: OwnedFd,
}

impl UioDevice {
    /// # Errors
    /// [`UioError::Open`] if the device cannot be opened read-write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UioError> {
        let path = path.as_ref();
        let fd = rustix::fs::open(
            path,
            OFlags::RDWR | OFlags::CLOEXEC | OFlags::SYNC,
            Mode::empty(),
        )
        .map_err(|e| UioError::Open(errno(e)))?;
        debug!("opened UIO device {}", path.display());
        Ok(Self { fd })
    }

    /// Map the engine's register window (map 0).
    ///
    /// The mapping stays valid after the device is dropped.
    ///
    /// # Errors
    /// [`UioError::Map`] if `mmap` fails.
    pub fn map_registers(&self) -> Result<UioRegisters, UioError> {
        // SAFETY: a fresh shared mapping of the device; nothing else in this
        // process aliases it.
        let base = unsafe {
            rustix::mm::mmap(
                core::ptr::null_mut(),
                REGISTER_WINDOW_SIZE,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &self.fd,
                0,
            )
        }
        .map_err(|e| UioError::Map(errno(e)))?;
        let base = NonNull::new(base.cast::<u8>()).ok_or(UioError::Map(errno(Errno::FAULT)))?;
        debug!("mapped {REGISTER_WINDOW_SIZE:#x}-byte register window at {base:p}");
        Ok(UioRegisters {
            base,
            len: REGISTER_WINDOW_SIZE,
        })
    }

    /// Enable the interrupt again after one was delivered.
    ///
    /// # Errors
    /// [`NotifyError::Os`] if the device rejects the write.
    pub fn rearm(&self) -> Result<(), NotifyError> {
        let written = rustix::io::write(&self.fd, &1u32.to_ne_bytes())
            .map_err(|e| NotifyError::Os(errno(e)))?;
        if written != size_of::<u32>() {
            return Err(NotifyError::Os(errno(Errno::IO)));
        }
        Ok(())
    }

    fn is_ready(&self) -> Result<bool, NotifyError> {
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];
        let ready = rustix::event::poll(&mut fds, 0).map_err(|e| NotifyError::Os(errno(e)))?;
        Ok(ready > 0)
    }

    fn read_count(&self) -> Result<u32, NotifyError> {
        let mut count = [0u8; 4];
        let n = loop {
            match rustix::io::read(&self.fd, &mut count) {
                Err(Errno::INTR) => {}
                other => break other.map_err(|e| NotifyError::Os(errno(e)))?,
            }
        };
        match n {
            0 => Err(NotifyError::Closed),
            4 => Ok(u32::from_ne_bytes(count)),
            n => Err(NotifyError::ShortRead(n)),
        }
    }
}

impl CompletionNotifier for UioDevice {
    fn wait_for_completion(&mut self, blocking: bool) -> Result<CompletionEvent, NotifyError> {
        if !blocking && !self.is_ready()? {
            return Ok(CompletionEvent::Pending);
        }
        let count = self.read_count()?;
        trace!("interrupt #{count}");
        self.rearm()?;
        Ok(CompletionEvent::Interrupt { count })
    }
}

/// The memory-mapped register window of one engine.
#[derive(Debug)]
pub struct UioRegisters {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is owned exclusively; register accesses are volatile.
unsafe impl Send for UioRegisters {}

impl UioRegisters {
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
}

impl RegisterBus for UioRegisters {
    fn read_register(&self, offset: usize) -> Result<u32, RegisterError> {
        check_offset(offset, self.len)?;
        // SAFETY: in bounds and word aligned per `check_offset`.
        Ok(unsafe { self.base.add(offset).cast::<u32>().read_volatile() })
    }

    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), RegisterError> {
        check_offset(offset, self.len)?;
        // SAFETY: in bounds and word aligned per `check_offset`.
        unsafe { self.base.add(offset).cast::<u32>().write_volatile(value) };
        Ok(())
    }
}

impl Drop for UioRegisters {
    fn drop(&mut self) {
        // SAFETY: unmaps exactly the mapping created in `map_registers`.
        if let Err(e) = unsafe { rustix::mm::munmap(self.base.as_ptr().cast(), self.len) } {
            log::warn!("failed to unmap register window: {e}");
        }
    }
}
