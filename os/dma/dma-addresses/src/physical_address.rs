use crate::Alignment;
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical (bus) memory address as seen by the DMA engine.
///
/// A thin wrapper around a raw `u64` that denotes addresses the **device**
/// dereferences: descriptor slots, payload spans and register pointers. The
/// host never dereferences these; it only computes and forwards them. Keeping
/// them in their own type prevents accidentally handing a host pointer or an
/// [`ArenaOffset`](crate::ArenaOffset) to the hardware.
///
/// ### Examples
/// ```rust
/// # use dma_addresses::*;
/// let pa = PhysicalAddress::new(0x1F00_0010);
/// let align = Alignment::new(64).unwrap();
/// assert!(!pa.is_aligned(align));
/// assert_eq!(pa.align_up(align), PhysicalAddress::new(0x1F00_0040));
/// assert_eq!(pa.lsb(), 0x1F00_0010);
/// assert_eq!(pa.msb(), 0);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Lower 32 bits, as written into `*_LSB` register and descriptor words.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn lsb(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Upper 32 bits, as written into `*_MSB` register and descriptor words.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn msb(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Reassemble an address from its `LSB`/`MSB` halves.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn from_halves(lsb: u32, msb: u32) -> Self {
        Self(((msb as u64) << 32) | lsb as u64)
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: Alignment) -> bool {
        align.padding_for(self.0) == 0
    }

    /// Number of bytes to add to reach the next `align` boundary (0 if aligned).
    #[inline]
    #[must_use]
    pub const fn padding_to(self, align: Alignment) -> u64 {
        align.padding_for(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn align_up(self, align: Alignment) -> Self {
        Self(self.0 + align.padding_for(self.0))
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(a: PhysicalAddress) -> Self {
        a.as_u64()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
