use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Byte offset into the host's (virtual) view of a pinned arena.
///
/// Offsets are what the allocator hands out and what the host uses to index
/// its own mapping of a buffer. They only become meaningful to the device
/// after resolving them through the arena's physical region.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ArenaOffset(usize);

impl ArenaOffset {
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(v: usize) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: usize) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for ArenaOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaOffset({:#X})", self.0)
    }
}

impl fmt::Display for ArenaOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#X}", self.0)
    }
}

impl From<usize> for ArenaOffset {
    #[inline]
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<ArenaOffset> for usize {
    #[inline]
    fn from(o: ArenaOffset) -> Self {
        o.0
    }
}

impl Add<usize> for ArenaOffset {
    type Output = Self;
    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<usize> for ArenaOffset {
    #[inline]
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

/// Distance in bytes between two offsets (`self - rhs`).
impl Sub for ArenaOffset {
    type Output = usize;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}
