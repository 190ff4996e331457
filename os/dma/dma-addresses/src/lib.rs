//! # DMA Address Types
//!
//! Strongly typed wrappers for the three kinds of numbers that scatter-gather
//! bookkeeping juggles, so that they can never be mixed up at compile time:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A bus address the DMA engine dereferences. |
//! | [`ArenaOffset`] | A byte offset into the host's virtual view of a pinned arena. |
//! | [`Alignment`] | A power-of-two alignment requirement on physical addresses. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use dma_addresses::*;
//! // A descriptor slot must start on a 64-byte physical boundary.
//! let align = Alignment::new(64).unwrap();
//! let span_start = PhysicalAddress::new(0x3E00_0FD0);
//!
//! let padding = span_start.padding_to(align);
//! assert_eq!(padding, 0x30);
//!
//! // The same padding moves the virtual offset forward.
//! let slot = ArenaOffset::new(0x10) + padding as usize;
//! assert_eq!(slot, ArenaOffset::new(0x40));
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`
//!   and `Hash`.
//! - Alignment arithmetic is `const fn`.
//! - An [`ArenaOffset`] never converts into a [`PhysicalAddress`] directly;
//!   the only way across is resolving it through the arena's physical region.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod alignment;
mod arena_offset;
mod physical_address;

pub use alignment::Alignment;
pub use arena_offset::ArenaOffset;
pub use physical_address::PhysicalAddress;
