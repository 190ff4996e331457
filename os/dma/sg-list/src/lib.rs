//! # Scatter-Gather Lists over Pinned Memory
//!
//! Builds AXI DMA descriptor chains in memory that is only physically
//! contiguous in pieces, runs them, and reads the results back.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐
//! │ data region  │  │ descr region │   PhysicalRegion (from the pinner)
//! └──────┬───────┘  └──────┬───────┘
//!        │                 │
//! ┌──────▼─────────────────▼───────┐
//! │ Arena allocator (find_span)    │   bump cursors, physical alignment
//! └──────────────┬─────────────────┘
//!                │
//! ┌──────────────▼─────────────────┐
//! │ SgList::add_logical_buffer     │   staged, all-or-nothing
//! └──────────────┬─────────────────┘
//!                │
//! ┌──────────────▼─────────────────┐
//! │ SgList::materialize            │   writes SgDescriptors, flushes
//! └──────────────┬─────────────────┘
//!                │
//! ┌──────────────▼─────────────────┐
//! │ AxiDma::start_transfer         │   CURDESC, DMACR, TAILDESC, wait
//! └──────────────┬─────────────────┘
//!                │
//! ┌──────────────▼─────────────────┐
//! │ SgList::completed_with         │   flush for CPU, coalesce SOF..EOF
//! └────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let data = Pinned::new(&pinner, data_buf.as_bytes())?;
//! let desc = Pinned::new(&pinner, desc_buf.as_bytes())?;
//!
//! let mut list = SgList::new(data.region(), desc.region(), &mut desc_buf)?;
//! for _ in 0..10 {
//!     list.add_logical_buffer(1600)?;
//! }
//! list.materialize(&desc)?;
//!
//! let mut dma = AxiDma::new(uio_regs, uio_irq, TransferConfig::default());
//! dma.start_transfer(&list, true, false)?;
//!
//! data.flush_for_cpu()?;
//! for buffer in list.completed_with(&desc)? {
//!     println!("{:?} {} bytes at {}", buffer.status, buffer.len, buffer.offset);
//! }
//! ```
//!
//! ## Ownership
//!
//! A list borrows both regions and owns (or mutably borrows) the memory
//! behind the descriptor region. Records are kept in a vector and linked by
//! index; see [`chain`]. Nothing is shared, nothing is locked: one list has
//! one owner.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod arena;
pub mod chain;
mod config;
mod error;
mod list;
mod materialize;
mod memory;
mod transfer;
mod traversal;

pub use arena::{Arena, find_span};
pub use chain::{DescriptorChain, DescriptorRecord, NodeRef};
pub use config::{SgListConfig, TransferConfig, WaitStrategy};
pub use error::{AddBufferError, ListError, MaterializeError};
pub use list::SgList;
pub use materialize::MaterializedChain;
pub use memory::{DescriptorMemory, SlotOutOfBounds};
pub use transfer::{
    AxiDma, CompletionEvent, CompletionNotifier, NotifyError, PendingTransfer, RESET_POLLS,
    TransferError, TransferOutcome,
};
pub use traversal::{BufferStatus, CompletedBuffer, DescriptorFaults};
