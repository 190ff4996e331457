//! # DMA Memory Pinning
//!
//! Everything the scatter-gather core needs to know about the memory it hands
//! to the device, without knowing how that memory was obtained:
//!
//! | Item | Role |
//! |------|------|
//! | [`PhysicalRegion`] | Ordered physical spans backing one virtual buffer. |
//! | [`Pinner`] | Platform service that pins, unpins and flushes buffers. |
//! | [`Pinned`] | RAII pinning; unpins on drop. |
//! | [`CacheMaintenance`] | Device/CPU cache flushes for one buffer. |
//! | [`DmaBuffer`] | Page-aligned, zeroed host buffer with volatile word access. |
//!
//! ## Lifecycle
//!
//! ```text
//! DmaBuffer::zeroed ──► Pinned::new ──► region() ──► scatter-gather list
//!                             │
//!                             ├─ flush_for_device (after descriptors are written)
//!                             ├─ flush_for_cpu    (before completions are read)
//!                             ▼
//!                        drop / release ──► unpin
//! ```
//!
//! The buffer must outlive its pinning. Dropping the [`Pinned`] guard before
//! the buffer is what the borrow order of the usual setup code gives you.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod buffer;
mod pinner;
mod region;

pub use buffer::{AllocError, DMA_BUFFER_ALIGN, DmaBuffer};
pub use pinner::{CacheMaintenance, CoherentMemory, PinError, Pinned, Pinner, Pinning};
pub use region::{MAX_SPANS, PhysicalRegion, PhysicalSpan, RegionError, SpanPosition};
