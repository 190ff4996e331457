use core::fmt;

/// A power-of-two byte alignment.
///
/// Alignments are always checked against **physical** addresses: the DMA
/// engine fetches descriptors by bus address, so a slot that is aligned in
/// the host's virtual view may still be misaligned for the device.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Alignment(u64);

impl Alignment {
    /// No alignment constraint.
    pub const BYTE: Self = Self(1);

    /// Create an alignment of `bytes`, which must be a non-zero power of two.
    #[inline]
    #[must_use]
    pub const fn new(bytes: u64) -> Option<Self> {
        if bytes.is_power_of_two() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Bytes needed to move `addr` up to the next multiple of this alignment.
    #[inline]
    #[must_use]
    pub const fn padding_for(self, addr: u64) -> u64 {
        addr.wrapping_neg() & (self.0 - 1)
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::BYTE
    }
}

impl fmt::Debug for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alignment({:#X})", self.0)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
