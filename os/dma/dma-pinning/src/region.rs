//! # Physical Region Descriptors
//!
//! A pinned virtual buffer is physically fragmented: it is backed by an
//! ordered list of physically contiguous [`PhysicalSpan`]s. Span `i` backs the
//! virtual bytes `[start_i, start_i + len_i)` where `start_i` is the sum of the
//! lengths of all spans before it:
//!
//! ```text
//! virtual  | span 0 (1000) | span 1 (600) |
//!          0              1000           1600
//!             │                │
//! physical  0x8000_0018      0x9F00_0000
//! ```
//!
//! The region is produced once by the pinning service and then only read.

use alloc::vec::Vec;
use dma_addresses::{ArenaOffset, PhysicalAddress};

/// Maximum number of spans a single pinning may report.
pub const MAX_SPANS: usize = 1024;

/// One physically contiguous run of memory backing part of a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PhysicalSpan {
    address: PhysicalAddress,
    len: u32,
}

impl PhysicalSpan {
    #[inline]
    #[must_use]
    pub const fn new(address: PhysicalAddress, len: u32) -> Self {
        Self { address, len }
    }

    #[inline]
    #[must_use]
    pub const fn address(&self) -> PhysicalAddress {
        self.address
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Span length as a host size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.len as usize
    }
}

/// Where a virtual offset lands inside a [`PhysicalRegion`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpanPosition {
    /// Index of the containing span.
    pub index: usize,
    /// Virtual offset of the containing span's first byte.
    pub span_start: ArenaOffset,
    /// Byte offset of the position within the span.
    pub offset_in_span: usize,
}

impl SpanPosition {
    /// The virtual offset this position describes.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> ArenaOffset {
        ArenaOffset::new(self.span_start.as_usize() + self.offset_in_span)
    }
}

/// Physical layout of one pinned virtual buffer.
///
/// # Invariants
/// - At most [`MAX_SPANS`] spans.
/// - No span is empty.
/// - The last byte of every span has a representable physical address.
/// - The total length fits a `usize`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PhysicalRegion {
    spans: Vec<PhysicalSpan>,
    len: usize,
}

impl PhysicalRegion {
    /// Validate and wrap a span list.
    ///
    /// # Errors
    /// - [`RegionError::TooManySpans`] if more than [`MAX_SPANS`] spans are given.
    /// - [`RegionError::EmptySpan`] if any span has zero length.
    /// - [`RegionError::AddressOverflow`] if a span runs past the top of the
    ///   physical address space.
    /// - [`RegionError::LengthOverflow`] if the total length overflows.
    pub fn new(spans: Vec<PhysicalSpan>) -> Result<Self, RegionError> {
        if spans.len() > MAX_SPANS {
            return Err(RegionError::TooManySpans {
                count: spans.len(),
                max: MAX_SPANS,
            });
        }

        let mut len = 0usize;
        for (index, span) in spans.iter().enumerate() {
            if span.is_empty() {
                return Err(RegionError::EmptySpan { index });
            }
            if span.address().checked_add(u64::from(span.len() - 1)).is_none() {
                return Err(RegionError::AddressOverflow { index });
            }
            len = len
                .checked_add(span.size())
                .ok_or(RegionError::LengthOverflow)?;
        }

        Ok(Self { spans, len })
    }

    /// A region consisting of one physically contiguous span.
    ///
    /// # Errors
    /// [`RegionError::EmptySpan`] if `len` is zero.
    pub fn contiguous(address: PhysicalAddress, len: u32) -> Result<Self, RegionError> {
        Self::new(alloc::vec![PhysicalSpan::new(address, len)])
    }

    #[inline]
    #[must_use]
    pub fn spans(&self) -> &[PhysicalSpan] {
        &self.spans
    }

    /// Total number of bytes described.
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

    /// Find the span containing the byte at `offset`.
    ///
    /// Linear scan; span counts are small and bounded by [`MAX_SPANS`].
    /// Returns `None` if `offset` is at or past the end of the region.
    #[must_use]
    pub fn locate(&self, offset: ArenaOffset) -> Option<SpanPosition> {
        let mut span_start = 0usize;
        for (index, span) in self.spans.iter().enumerate() {
            let span_end = span_start + span.size();
            if offset.as_usize() < span_end {
                return Some(SpanPosition {
                    index,
                    span_start: ArenaOffset::new(span_start),
                    offset_in_span: offset.as_usize() - span_start,
                });
            }
            span_start = span_end;
        }
        None
    }

    /// Translate a virtual offset into the physical address backing it.
    #[must_use]
    pub fn resolve(&self, offset: ArenaOffset) -> Option<PhysicalAddress> {
        let pos = self.locate(offset)?;
        Some(self.spans[pos.index].address() + pos.offset_in_span as u64)
    }

    /// Translate a position previously returned by [`locate`](Self::locate).
    #[must_use]
    pub fn address_at(&self, pos: &SpanPosition) -> Option<PhysicalAddress> {
        let span = self.spans.get(pos.index)?;
        (pos.offset_in_span < span.size())
            .then(|| span.address() + pos.offset_in_span as u64)
    }

    /// Iterate spans together with the virtual offset each one starts at.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaOffset, &PhysicalSpan)> {
        self.spans.iter().scan(0usize, |start, span| {
            let at = ArenaOffset::new(*start);
            *start += span.size();
            Some((at, span))
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("region lists {count} spans, at most {max} are supported")]
    TooManySpans { count: usize, max: usize },
    #[error("span {index} has zero length")]
    EmptySpan { index: usize },
    #[error("span {index} runs past the end of the physical address space")]
    AddressOverflow { index: usize },
    #[error("total region length overflows")]
    LengthOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_spans() -> PhysicalRegion {
        PhysicalRegion::new(alloc::vec![
            PhysicalSpan::new(PhysicalAddress::new(0x8000_0018), 1000),
            PhysicalSpan::new(PhysicalAddress::new(0x9F00_0000), 600),
        ])
        .unwrap()
    }

    #[test]
    fn total_length_is_sum_of_spans() {
        let r = two_spans();
        assert_eq!(r.len(), 1600);
        assert_eq!(r.spans().len(), 2);
        assert!(!r.is_empty());
    }

    #[test]
    fn locate_walks_span_boundaries() {
        let r = two_spans();
        let p = r.locate(ArenaOffset::new(999)).unwrap();
        assert_eq!((p.index, p.offset_in_span), (0, 999));

        let p = r.locate(ArenaOffset::new(1000)).unwrap();
        assert_eq!((p.index, p.offset_in_span), (1, 0));
        assert_eq!(p.span_start, ArenaOffset::new(1000));
        assert_eq!(p.offset(), ArenaOffset::new(1000));

        assert!(r.locate(ArenaOffset::new(1600)).is_none());
    }

    #[test]
    fn resolve_translates_into_the_right_span() {
        let r = two_spans();
        assert_eq!(
            r.resolve(ArenaOffset::new(0)),
            Some(PhysicalAddress::new(0x8000_0018))
        );
        assert_eq!(
            r.resolve(ArenaOffset::new(1010)),
            Some(PhysicalAddress::new(0x9F00_000A))
        );
        assert_eq!(r.resolve(ArenaOffset::new(5000)), None);
    }

    #[test]
    fn iter_reports_span_starts() {
        let r = two_spans();
        let starts: Vec<_> = r.iter().map(|(at, _)| at.as_usize()).collect();
        assert_eq!(starts, [0, 1000]);
    }

    #[test]
    fn rejects_malformed_span_lists() {
        let empty = PhysicalRegion::new(alloc::vec![
            PhysicalSpan::new(PhysicalAddress::new(0x1000), 16),
            PhysicalSpan::new(PhysicalAddress::new(0x2000), 0),
        ]);
        assert_eq!(empty, Err(RegionError::EmptySpan { index: 1 }));

        let many = alloc::vec![PhysicalSpan::new(PhysicalAddress::new(0x1000), 1); MAX_SPANS + 1];
        assert!(matches!(
            PhysicalRegion::new(many),
            Err(RegionError::TooManySpans { count, .. }) if count == MAX_SPANS + 1
        ));

        assert_eq!(
            PhysicalRegion::contiguous(PhysicalAddress::new(0x1000), 0),
            Err(RegionError::EmptySpan { index: 0 })
        );
    }

    #[test]
    fn spans_must_fit_the_address_space() {
        let wrapping = PhysicalRegion::new(alloc::vec![
            PhysicalSpan::new(PhysicalAddress::new(0x1000), 16),
            PhysicalSpan::new(PhysicalAddress::new(u64::MAX - 7), 16),
        ]);
        assert_eq!(wrapping, Err(RegionError::AddressOverflow { index: 1 }));

        // Ending exactly on the last address is fine.
        let top = PhysicalRegion::contiguous(PhysicalAddress::new(u64::MAX - 15), 16).unwrap();
        assert_eq!(
            top.resolve(ArenaOffset::new(15)),
            Some(PhysicalAddress::new(u64::MAX))
        );
        assert_eq!(top.resolve(ArenaOffset::new(16)), None);
    }
}
