//! # S2MM Channel Registers
//!
//! The stream-to-memory-mapped half of the AXI DMA register window.
//!
//! | Offset | Name | Type |
//! |--------|------|------|
//! | `0x30` | `S2MM_DMACR` | [`S2mmControl`] |
//! | `0x34` | `S2MM_DMASR` | [`S2mmStatus`] |
//! | `0x38` | `S2MM_CURDESC` | lower half of the current descriptor pointer |
//! | `0x3C` | `S2MM_CURDESC_MSB` | upper half |
//! | `0x40` | `S2MM_TAILDESC` | lower half of the tail descriptor pointer |
//! | `0x44` | `S2MM_TAILDESC_MSB` | upper half |
//!
//! Writing the tail descriptor pointer while the channel is running is what
//! makes the engine start fetching descriptors.

use crate::{Register, RegisterBus, RegisterError};
use bitfield_struct::bitfield;
use dma_addresses::PhysicalAddress;

pub const S2MM_DMACR: usize = 0x30;
pub const S2MM_DMASR: usize = 0x34;
pub const S2MM_CURDESC: usize = 0x38;
pub const S2MM_CURDESC_MSB: usize = 0x3C;
pub const S2MM_TAILDESC: usize = 0x40;
pub const S2MM_TAILDESC_MSB: usize = 0x44;

/// `S2MM_DMACR`: S2MM DMA Control Register (offset `0x30`).
#[bitfield(u32, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct S2mmControl {
    /// Bit 0, RS: Run/Stop.
    pub run: bool,

    /// Bit 1: Reserved.
    #[bits(1, default = false)]
    _reserved_1: bool,

    /// Bit 2, Reset: soft reset of the whole engine; self-clearing.
    pub reset: bool,

    /// Bit 3, Keyhole: write to a fixed address.
    pub keyhole: bool,

    /// Bit 4, Cyclic BD Enable: ignore the tail pointer and loop.
    pub cyclic: bool,

    /// Bits 5–11: Reserved.
    #[bits(7, default = 0)]
    _reserved_5_11: u8,

    /// Bit 12, `IOC_IrqEn`: interrupt on complete.
    pub ioc_irq_enable: bool,

    /// Bit 13, `Dly_IrqEn`: interrupt on delay timer expiry.
    pub delay_irq_enable: bool,

    /// Bit 14, `Err_IrqEn`: interrupt on error.
    pub error_irq_enable: bool,

    /// Bit 15: Reserved.
    #[bits(1, default = false)]
    _reserved_15: bool,

    /// Bits 16–23, `IRQThreshold`: completed frames per interrupt.
    pub irq_threshold: u8,

    /// Bits 24–31, `IRQDelay`: delay timer in units of 125 stream clocks.
    pub irq_delay: u8,
}

impl Register for S2mmControl {
    const OFFSET: usize = S2MM_DMACR;

    #[inline]
    fn from_raw(value: u32) -> Self {
        Self::from_bits(value)
    }

    #[inline]
    fn into_raw(self) -> u32 {
        self.into_bits()
    }
}

/// `S2MM_DMASR`: S2MM DMA Status Register (offset `0x34`).
///
/// Bits 12–14 are write-one-to-clear; everything else is read-only.
#[bitfield(u32, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct S2mmStatus {
    /// Bit 0: Halted.
    pub halted: bool,

    /// Bit 1, Idle: the tail descriptor has been processed.
    pub idle: bool,

    /// Bit 2: Reserved.
    #[bits(1, default = false)]
    _reserved_2: bool,

    /// Bit 3, `SGIncld`: the engine was built with scatter-gather.
    pub sg_included: bool,

    /// Bit 4: `DMAIntErr`.
    pub dma_internal_error: bool,

    /// Bit 5: `DMASlvErr`.
    pub dma_slave_error: bool,

    /// Bit 6: `DMADecErr`.
    pub dma_decode_error: bool,

    /// Bit 7: Reserved.
    #[bits(1, default = false)]
    _reserved_7: bool,

    /// Bit 8: `SGIntErr`.
    pub sg_internal_error: bool,

    /// Bit 9: `SGSlvErr`.
    pub sg_slave_error: bool,

    /// Bit 10: `SGDecErr`.
    pub sg_decode_error: bool,

    /// Bit 11: Reserved.
    #[bits(1, default = false)]
    _reserved_11: bool,

    /// Bit 12: `IOC_Irq` (W1C).
    pub ioc_irq: bool,

    /// Bit 13: `Dly_Irq` (W1C).
    pub delay_irq: bool,

    /// Bit 14: `Err_Irq` (W1C).
    pub error_irq: bool,

    /// Bit 15: Reserved.
    #[bits(1, default = false)]
    _reserved_15: bool,

    /// Bits 16–23: `IRQThresholdSts`.
    pub irq_threshold_status: u8,

    /// Bits 24–31: `IRQDelaySts`.
    pub irq_delay_status: u8,
}

impl S2mmStatus {
    /// `true` if any DMA or scatter-gather error bit is set.
    #[inline]
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.dma_internal_error()
            || self.dma_slave_error()
            || self.dma_decode_error()
            || self.sg_internal_error()
            || self.sg_slave_error()
            || self.sg_decode_error()
    }

    /// The value that, written back, clears exactly the pending interrupts.
    #[inline]
    #[must_use]
    pub const fn interrupt_ack(&self) -> Self {
        Self::new()
            .with_ioc_irq(self.ioc_irq())
            .with_delay_irq(self.delay_irq())
            .with_error_irq(self.error_irq())
    }

    #[inline]
    #[must_use]
    pub const fn has_pending_interrupt(&self) -> bool {
        self.ioc_irq() || self.delay_irq() || self.error_irq()
    }
}

impl Register for S2mmStatus {
    const OFFSET: usize = S2MM_DMASR;

    #[inline]
    fn from_raw(value: u32) -> Self {
        Self::from_bits(value)
    }

    #[inline]
    fn into_raw(self) -> u32 {
        self.into_bits()
    }
}

/// Write the current descriptor pointer, lower half first.
///
/// # Errors
/// Propagates the bus failure.
pub fn write_current_descriptor<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: PhysicalAddress,
) -> Result<(), RegisterError> {
    bus.write_register(S2MM_CURDESC, address.lsb())?;
    bus.write_register(S2MM_CURDESC_MSB, address.msb())
}

/// Write the tail descriptor pointer, lower half first. On a running
/// channel this starts the transfer.
///
/// # Errors
/// Propagates the bus failure.
pub fn write_tail_descriptor<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: PhysicalAddress,
) -> Result<(), RegisterError> {
    bus.write_register(S2MM_TAILDESC, address.lsb())?;
    bus.write_register(S2MM_TAILDESC_MSB, address.msb())
}
