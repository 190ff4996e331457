//! # Arena Allocator
//!
//! A bump allocator over a [`PhysicalRegion`]. It never frees and never
//! crosses a physical span boundary within one allocation:
//!
//! ```text
//! span 0 ───────────────┐ span 1 ─────────────────────┐
//! | used |pad| slot |  ✗ |  slot  |        ...        |
//!        ^cursor      ^ does not fit, skip to span 1
//! ```
//!
//! Alignment is checked against the **physical** address of a candidate,
//! since that is what the device sees.

use dma_addresses::{Alignment, ArenaOffset};
use dma_pinning::{PhysicalRegion, SpanPosition};

/// Find the first offset at or after `start` where `size` bytes fit inside a
/// single physical span of `region` and the physical address is aligned to
/// `alignment`.
///
/// Returns `None` when the spans are exhausted or `size` is zero.
#[must_use]
pub fn find_span(
    region: &PhysicalRegion,
    start: ArenaOffset,
    size: usize,
    alignment: Alignment,
) -> Option<ArenaOffset> {
    if size == 0 {
        return None;
    }

    let spans = region.spans();
    let mut pos = region.locate(start)?;
    loop {
        let span = spans.get(pos.index)?;
        let here = span.address() + pos.offset_in_span as u64;
        let padding = usize::try_from(here.padding_to(alignment)).ok()?;

        if let Some(aligned) = pos.offset_in_span.checked_add(padding)
            && aligned <= span.size()
            && span.size() - aligned >= size
        {
            return Some(pos.span_start + aligned);
        }

        if pos.index + 1 >= spans.len() {
            return None;
        }
        pos = SpanPosition {
            index: pos.index + 1,
            span_start: pos.span_start + span.size(),
            offset_in_span: 0,
        };
    }
}

/// One arena: a region plus a monotonically increasing cursor.
#[derive(Debug, Clone)]
pub struct Arena<'r> {
    region: &'r PhysicalRegion,
    cursor: ArenaOffset,
}

impl<'r> Arena<'r> {
    #[must_use]
    pub const fn new(region: &'r PhysicalRegion) -> Self {
        Self {
            region,
            cursor: ArenaOffset::ZERO,
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> &'r PhysicalRegion {
        self.region
    }

    /// Next unallocated offset.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> ArenaOffset {
        self.cursor
    }

    /// Bytes between the cursor and the end of the region, ignoring span
    /// boundaries and alignment.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.region.len().saturating_sub(self.cursor.as_usize())
    }

    /// Where `size` aligned bytes would go next, without allocating.
    #[must_use]
    pub fn peek(&self, size: usize, alignment: Alignment) -> Option<ArenaOffset> {
        find_span(self.region, self.cursor, size, alignment)
    }

    pub(crate) fn commit(&mut self, cursor: ArenaOffset) {
        debug_assert!(cursor >= self.cursor, "arena cursor only moves forward");
        debug_assert!(cursor.as_usize() <= self.region.len());
        self.cursor = cursor;
    }

    pub(crate) const fn reset(&mut self) {
        self.cursor = ArenaOffset::ZERO;
    }
}
