//! # Typed AXI DMA Registers and Descriptors
//!
//! Bit-exact layouts for the Xilinx AXI DMA engine in scatter-gather mode,
//! plus the register-access boundary the driver talks through.
//!
//! - [`SgDescriptor`] with [`DescriptorControl`] / [`DescriptorStatus`]: the
//!   64-byte in-memory descriptor.
//! - [`S2mmControl`] / [`S2mmStatus`]: the stream-to-memory channel's
//!   control and status registers.
//! - [`RegisterBus`]: 32-bit reads and writes at byte offsets into the
//!   register window. Implemented by whatever maps the device (a UIO mapping,
//!   a bare-metal pointer, a test double).
//! - [`Register`]: typed load/store of a register at a fixed offset.
//!
//! All multi-byte values are little-endian.

#![cfg_attr(not(any(test, doctest)), no_std)]

#[cfg(feature = "descriptor")]
mod descriptor;
pub mod info;
#[cfg(feature = "s2mm")]
pub mod s2mm;

#[cfg(feature = "descriptor")]
pub use descriptor::{DescriptorControl, DescriptorStatus, SgDescriptor};
#[cfg(feature = "s2mm")]
pub use s2mm::{S2mmControl, S2mmStatus};

/// 32-bit register access into the engine's register window.
pub trait RegisterBus {
    /// # Errors
    /// [`RegisterError::OutOfWindow`] for an offset outside the mapping, or
    /// a platform failure.
    fn read_register(&self, offset: usize) -> Result<u32, RegisterError>;

    /// # Errors
    /// [`RegisterError::OutOfWindow`] for an offset outside the mapping, or
    /// a platform failure.
    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), RegisterError>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    #[inline]
    fn read_register(&self, offset: usize) -> Result<u32, RegisterError> {
        (**self).read_register(offset)
    }

    #[inline]
    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), RegisterError> {
        (**self).write_register(offset, value)
    }
}

/// A register with a fixed offset and a typed value.
pub trait Register: Sized {
    const OFFSET: usize;

    fn from_raw(value: u32) -> Self;

    fn into_raw(self) -> u32;

    /// # Errors
    /// Propagates the bus failure.
    #[inline]
    fn load<B: RegisterBus + ?Sized>(bus: &B) -> Result<Self, RegisterError> {
        bus.read_register(Self::OFFSET).map(Self::from_raw)
    }

    /// # Errors
    /// Propagates the bus failure.
    #[inline]
    fn store<B: RegisterBus + ?Sized>(self, bus: &mut B) -> Result<(), RegisterError> {
        bus.write_register(Self::OFFSET, self.into_raw())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("register offset {offset:#x} is outside the {window:#x}-byte window")]
    OutOfWindow { offset: usize, window: usize },
    #[error("register offset {0:#x} is not word aligned")]
    Unaligned(usize),
    #[error("register access failed with OS error {0}")]
    Os(i32),
}

/// Check `offset` for a 32-bit access into a `window`-byte mapping.
///
/// # Errors
/// [`RegisterError::Unaligned`] or [`RegisterError::OutOfWindow`].
pub const fn check_offset(offset: usize, window: usize) -> Result<(), RegisterError> {
    if offset % 4 != 0 {
        return Err(RegisterError::Unaligned(offset));
    }
    if offset > window || window - offset < 4 {
        return Err(RegisterError::OutOfWindow { offset, window });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapBus(BTreeMap<usize, u32>);

    impl RegisterBus for MapBus {
        fn read_register(&self, offset: usize) -> Result<u32, RegisterError> {
            check_offset(offset, info::REGISTER_WINDOW_SIZE)?;
            Ok(self.0.get(&offset).copied().unwrap_or(0))
        }

        fn write_register(&mut self, offset: usize, value: u32) -> Result<(), RegisterError> {
            check_offset(offset, info::REGISTER_WINDOW_SIZE)?;
            self.0.insert(offset, value);
            Ok(())
        }
    }

    #[test]
    fn typed_registers_round_through_the_bus() {
        let mut bus = MapBus::default();
        S2mmControl::new().with_run(true).store(&mut bus).unwrap();
        assert_eq!(bus.0[&0x30], 1);
        assert!(S2mmControl::load(&bus).unwrap().run());
    }

    #[test]
    fn descriptor_pointers_are_split() {
        let mut bus = MapBus::default();
        let pa = dma_addresses::PhysicalAddress::new(0x0000_0002_1000_0040);
        s2mm::write_current_descriptor(&mut bus, pa).unwrap();
        s2mm::write_tail_descriptor(&mut &mut bus, pa + 0x40).unwrap();
        assert_eq!(bus.0[&0x38], 0x1000_0040);
        assert_eq!(bus.0[&0x3C], 2);
        assert_eq!(bus.0[&0x40], 0x1000_0080);
        assert_eq!(bus.0[&0x44], 2);
    }

    #[test]
    fn offsets_are_checked() {
        assert_eq!(check_offset(0x34, 0x1000), Ok(()));
        assert_eq!(check_offset(0x35, 0x1000), Err(RegisterError::Unaligned(0x35)));
        assert_eq!(
            check_offset(0x1000, 0x1000),
            Err(RegisterError::OutOfWindow {
                offset: 0x1000,
                window: 0x1000
            })
        );
    }
}
