//! Client for the `/dev/pinner` character device.

use crate::errno;
use core::ffi::{c_uint, c_ulong, c_void};
use core::mem::{offset_of, size_of};
use dma_addresses::PhysicalAddress;
use dma_pinning::{
    MAX_SPANS, PhysicalRegion, PhysicalSpan, PinError, Pinner, Pinning, RegionError,
};
use log::{debug, trace};
use rustix::fd::OwnedFd;
use rustix::fs::{Mode, OFlags};
use rustix::io::Errno;
use std::path::Path;

/// Where the pinner device usually lives.
pub const PINNER_PATH: &str = "/dev/pinner";

const PINNER_PIN: c_uint = 1;
const PINNER_UNPIN: c_uint = 2;
const PINNER_FLUSH: c_uint = 3;

const PAGE_SIZE: usize = 4096;

/// Largest buffer the device can describe with [`MAX_SPANS`] pages.
const MAX_PIN_LEN: usize = MAX_SPANS * PAGE_SIZE;

/// Cache synchronisation requested by a flush command.
///
/// The device reads the directions from the size field: bit 0 clear
/// syncs for the CPU, bit 1 clear syncs for the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlushDirection {
    ForDevice,
    ForCpu,
    Both,
}

impl FlushDirection {
    #[inline]
    #[must_use]
    const fn into_bits(self) -> c_uint {
        match self {
            Self::ForDevice => 0b01,
            Self::ForCpu => 0b10,
            Self::Both => 0b00,
        }
    }
}

/// Identifies one pinning to the device. Opaque to the caller.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PinnerHandle {
    user_magic: c_uint,
    pin_magic: c_uint,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct PhysEntry {
    addr: c_ulong,
    len: c_uint,
}

/// Page list filled in by the device on a pin command.
#[repr(C)]
struct PhysList {
    num_entries: c_uint,
    entries: [PhysEntry; MAX_SPANS],
}

impl PhysList {
    fn boxed() -> Box<Self> {
        Box::new(Self {
            num_entries: 0,
            entries: [PhysEntry { addr: 0, len: 0 }; MAX_SPANS],
        })
    }

    #[allow(clippy::useless_conversion)] // c_ulong is u32 on 32-bit targets
    fn to_region(&self) -> Result<PhysicalRegion, PinError> {
        let count = self.num_entries as usize;
        let entries = self
            .entries
            .get(..count)
            .ok_or(RegionError::TooManySpans {
                count,
                max: MAX_SPANS,
            })?;
        let spans = entries
            .iter()
            .map(|e| PhysicalSpan::new(PhysicalAddress::new(u64::from(e.addr)), e.len))
            .collect();
        Ok(PhysicalRegion::new(spans)?)
    }
}

/// The command record the device expects on every write.
#[repr(C)]
struct PinnerCmd {
    cmd: c_uint,
    usr_buf: *mut c_void,
    usr_buf_sz: c_uint,
    handle: *mut PinnerHandle,
    physlist: *mut PhysList,
}

const CMD_SIZE: usize = size_of::<PinnerCmd>();

impl PinnerCmd {
    const fn control(cmd: c_uint, usr_buf_sz: c_uint, handle: *mut PinnerHandle) -> Self {
        Self {
            cmd,
            usr_buf: core::ptr::null_mut(),
            usr_buf_sz,
            handle,
            physlist: core::ptr::null_mut(),
        }
    }

    /// Field by field, so padding goes out as zeros.
    fn to_bytes(&self) -> [u8; CMD_SIZE] {
        let mut raw = [0u8; CMD_SIZE];
        put(&mut raw, offset_of!(Self, cmd), &self.cmd.to_ne_bytes());
        put(
            &mut raw,
            offset_of!(Self, usr_buf),
            &self.usr_buf.expose_provenance().to_ne_bytes(),
        );
        put(
            &mut raw,
            offset_of!(Self, usr_buf_sz),
            &self.usr_buf_sz.to_ne_bytes(),
        );
        put(
            &mut raw,
            offset_of!(Self, handle),
            &self.handle.expose_provenance().to_ne_bytes(),
        );
        put(
            &mut raw,
            offset_of!(Self, physlist),
            &self.physlist.expose_provenance().to_ne_bytes(),
        );
        raw
    }
}

fn put(raw: &mut [u8], at: usize, bytes: &[u8]) {
    raw[at..at + bytes.len()].copy_from_slice(bytes);
}

/// An open `/dev/pinner`.
#[derive(Debug)]
pub struct PinnerDevice {
    fd: OwnedFd,
}

impl PinnerDevice {
    /// Open [`PINNER_PATH`].
    ///
    /// # Errors
    /// [`PinError::Unavailable`] if the device does not exist, otherwise
    /// [`PinError::Os`].
    pub fn open() -> Result<Self, PinError> {
        Self::open_path(PINNER_PATH)
    }

    /// Open a pinner device at a non-standard path.
    ///
    /// # Errors
    /// See [`open`](Self::open).
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, PinError> {
        let path = path.as_ref();
        let fd = rustix::fs::open(path, OFlags::RDWR | OFlags::CLOEXEC, Mode::empty()).map_err(
            |e| match e {
                Errno::NOENT | Errno::NODEV | Errno::NXIO => PinError::Unavailable,
                e => PinError::Os(errno(e)),
            },
        )?;
        debug!("opened pinner device {}", path.display());
        Ok(Self { fd })
    }

    fn send(&self, cmd: &PinnerCmd) -> Result<(), PinError> {
        let raw = cmd.to_bytes();
        let written = rustix::io::write(&self.fd, &raw).map_err(|e| PinError::Os(errno(e)))?;
        if written != CMD_SIZE {
            return Err(PinError::Os(errno(Errno::IO)));
        }
        Ok(())
    }

    /// Synchronise caches for a pinned buffer in the given direction.
    ///
    /// # Errors
    /// [`PinError::Os`] if the device rejects the request.
    pub fn flush(&self, handle: &PinnerHandle, direction: FlushDirection) -> Result<(), PinError> {
        let mut handle = *handle;
        trace!("flush {handle:?} {direction:?}");
        self.send(&PinnerCmd::control(
            PINNER_FLUSH,
            direction.into_bits(),
            &raw mut handle,
        ))
    }
}

impl Pinner for PinnerDevice {
    type Handle = PinnerHandle;

    fn pin(&self, buffer: &[u8]) -> Result<Pinning<PinnerHandle>, PinError> {
        if buffer.is_empty() {
            return Err(PinError::EmptyBuffer);
        }
        let too_large = PinError::TooLarge {
            len: buffer.len(),
            max: MAX_PIN_LEN,
        };
        if buffer.len() > MAX_PIN_LEN {
            return Err(too_large);
        }
        let len = c_uint::try_from(buffer.len()).map_err(|_| too_large)?;

        let mut handle = PinnerHandle::default();
        let mut physlist = PhysList::boxed();
        self.send(&PinnerCmd {
            cmd: PINNER_PIN,
            usr_buf: buffer.as_ptr().cast_mut().cast(),
            usr_buf_sz: len,
            handle: &raw mut handle,
            physlist: &raw mut *physlist,
        })?;

        let region = physlist.to_region()?;
        for (offset, span) in region.iter() {
            trace!("{handle:?} {offset}: {} bytes at {}", span.len(), span.address());
        }
        Ok(Pinning { handle, region })
    }

    fn unpin(&self, handle: PinnerHandle) -> Result<(), PinError> {
        let mut handle = handle;
        self.send(&PinnerCmd::control(PINNER_UNPIN, 0, &raw mut handle))?;
        debug!("unpinned {handle:?}");
        Ok(())
    }

    fn flush_for_device(&self, handle: &PinnerHandle) -> Result<(), PinError> {
        self.flush(handle, FlushDirection::ForDevice)
    }

    fn flush_for_cpu(&self, handle: &PinnerHandle) -> Result<(), PinError> {
        self.flush(handle, FlushDirection::ForCpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn command_layout_matches_the_device() {
        assert_eq!(CMD_SIZE, 40);
        assert_eq!(offset_of!(PinnerCmd, usr_buf), 8);
        assert_eq!(offset_of!(PinnerCmd, usr_buf_sz), 16);
        assert_eq!(offset_of!(PinnerCmd, handle), 24);
        assert_eq!(offset_of!(PinnerCmd, physlist), 32);
        assert_eq!(size_of::<PhysEntry>(), 16);
        assert_eq!(size_of::<PhysList>(), 8 + 16 * MAX_SPANS);
    }

    #[test]
    fn handle_is_two_words() {
        assert_eq!(size_of::<PinnerHandle>(), 8);
    }

    #[test]
    fn flush_directions_clear_the_bit_to_sync() {
        assert_eq!(FlushDirection::ForDevice.into_bits(), 0b01);
        assert_eq!(FlushDirection::ForCpu.into_bits(), 0b10);
        assert_eq!(FlushDirection::Both.into_bits(), 0b00);
    }

    #[test]
    fn encoded_flush_command() {
        let mut handle = PinnerHandle {
            user_magic: 0xAA,
            pin_magic: 0xBB,
        };
        let cmd = PinnerCmd::control(
            PINNER_FLUSH,
            FlushDirection::ForCpu.into_bits(),
            &raw mut handle,
        );
        let raw = cmd.to_bytes();

        assert_eq!(raw.len(), CMD_SIZE);
        assert_eq!(raw[..4], 3u32.to_ne_bytes());
        let sz = offset_of!(PinnerCmd, usr_buf_sz);
        assert_eq!(raw[sz..sz + 4], 0b10u32.to_ne_bytes());
        let ptr = offset_of!(PinnerCmd, handle);
        let expected = (&raw mut handle).expose_provenance().to_ne_bytes();
        assert_eq!(raw[ptr..ptr + expected.len()], expected);
        let buf = offset_of!(PinnerCmd, usr_buf);
        assert!(raw[buf..sz].iter().all(|&b| b == 0));
    }

    #[test]
    fn page_list_becomes_a_region() {
        let mut list = PhysList::boxed();
        list.num_entries = 2;
        list.entries[0] = PhysEntry {
            addr: 0x1F00_0E00,
            len: 512,
        };
        list.entries[1] = PhysEntry {
            addr: 0x0A00_0000,
            len: 4096,
        };
        let region = list.to_region().unwrap();
        assert_eq!(region.spans().len(), 2);
        assert_eq!(region.len(), 4608);
        assert_eq!(
            region.resolve(dma_addresses::ArenaOffset::new(512)),
            Some(PhysicalAddress::new(0x0A00_0000))
        );
    }

    #[test]
    fn malformed_page_lists_are_rejected() {
        let mut list = PhysList::boxed();
        list.num_entries = 1;
        assert_eq!(
            list.to_region().unwrap_err(),
            PinError::Region(RegionError::EmptySpan { index: 0 })
        );

        list.num_entries = 5000;
        assert!(matches!(
            list.to_region(),
            Err(PinError::Region(RegionError::TooManySpans { count: 5000, .. }))
        ));
    }

    #[test]
    fn missing_device_is_unavailable() {
        assert_eq!(
            PinnerDevice::open_path("/nonexistent/pinner").unwrap_err(),
            PinError::Unavailable
        );
    }
}
