//! # Linux Backends for AXI DMA Scatter-Gather
//!
//! The scatter-gather core in `sg-list` talks to the outside world through
//! three small traits. This crate implements them on a Linux host:
//!
//! | Trait | Implementation | Device |
//! |-------|----------------|--------|
//! | [`dma_pinning::Pinner`] | [`PinnerDevice`] | `/dev/pinner` character device |
//! | [`axi_dma_registers::RegisterBus`] | [`UioRegisters`] | map 0 of `/dev/uioN` |
//! | [`sg_list::CompletionNotifier`] | [`UioDevice`] | interrupt count of `/dev/uioN` |
//!
//! plus [`StderrLogger`], a `log::Log` sink for tools.
//!
//! ## The pinner device
//!
//! `/dev/pinner` locks a user buffer in memory and reports the physical
//! pages behind it. Every request is a single `write(2)` of a fixed-size
//! command record:
//!
//! ```text
//! ┌─────┬─────────┬────────────┬──────────┬────────────┐
//! │ cmd │ usr_buf │ usr_buf_sz │ *handle  │ *physlist  │
//! └─────┴─────────┴────────────┴──────────┴────────────┘
//!   1 = pin     buffer, length, handle out, page list out
//!   2 = unpin   handle in
//!   3 = flush   handle in, usr_buf_sz carries the sync directions
//! ```
//!
//! The device writes the handle and the page list back through the
//! pointers. A write of any other size is rejected.
//!
//! ## The UIO device
//!
//! The AXI DMA engine is exposed through the generic UIO platform driver:
//!
//! * **Registers**: `mmap` of map 0 gives the 4 KiB register window.
//! * **Interrupts**: `read(2)` of 4 bytes blocks until the next interrupt
//!   and returns the running interrupt count. `poll(2)` with a zero timeout
//!   checks without blocking.
//! * **Re-arm**: writing the 32-bit value `1` enables the interrupt again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dma_linux::{PinnerDevice, StderrLogger, UioDevice};
//! use log::LevelFilter;
//! use sg_list::{AxiDma, TransferConfig};
//!
//! StderrLogger::new(LevelFilter::Info).init().expect("logger");
//!
//! let pinner = PinnerDevice::open().expect("pinner");
//! let uio = UioDevice::open("/dev/uio0").expect("uio");
//! let registers = uio.map_registers().expect("registers");
//! let mut dma = AxiDma::new(registers, uio, TransferConfig::default());
//! dma.reset().expect("reset");
//! # let _ = pinner;
//! ```
//!
//! ## Features
//!
//! * `pinner` (default): [`PinnerDevice`].
//! * `uio` (default): [`UioDevice`] and [`UioRegisters`].

#![allow(unsafe_code)]

mod logger;
#[cfg(feature = "pinner")]
mod pinner;
#[cfg(feature = "uio")]
mod uio;

pub use logger::StderrLogger;
#[cfg(feature = "pinner")]
pub use pinner::{FlushDirection, PINNER_PATH, PinnerDevice, PinnerHandle};
#[cfg(feature = "uio")]
pub use uio::{UioDevice, UioError, UioRegisters};

/// Map an OS error into the numeric code the core error types carry.
#[cfg(any(feature = "pinner", feature = "uio"))]
#[inline]
fn errno(e: rustix::io::Errno) -> i32 {
    e.raw_os_error()
}
