//! # Transfer Driver
//!
//! Starts an S2MM transfer over a materialized chain and waits for it:
//!
//! ```text
//! S2MM_CURDESC  ◄── head of chain
//! S2MM_DMACR    ◄── run | IOC/Dly/Err IRQ enable | threshold = buffers | delay
//! S2MM_TAILDESC ◄── tail of chain        (engine starts fetching here)
//!        │
//!        ▼
//! CompletionNotifier::wait_for_completion
//!        │
//!        ▼
//! S2MM_DMASR    ──► log errors, write back pending W1C interrupt bits
//! ```

use crate::config::{TransferConfig, WaitStrategy};
use crate::list::SgList;
use crate::materialize::MaterializedChain;
use crate::memory::DescriptorMemory;
use axi_dma_registers::s2mm::{write_current_descriptor, write_tail_descriptor};
use axi_dma_registers::{Register, RegisterBus, RegisterError, S2mmControl, S2mmStatus, info};
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use log::{debug, error, warn};

/// How many times [`AxiDma::reset`] polls for the reset bit to clear.
pub const RESET_POLLS: usize = 1000;

/// What a completion wait observed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompletionEvent {
    /// An interrupt arrived; `count` is the platform's running total.
    Interrupt { count: u32 },
    /// A bounded wait expired.
    TimedOut,
    /// Nothing yet (non-blocking checks only).
    Pending,
}

/// The platform's interrupt delivery.
pub trait CompletionNotifier {
    /// Wait for the next completion interrupt. With `blocking == false`
    /// return [`CompletionEvent::Pending`] instead of waiting.
    ///
    /// # Errors
    /// Platform failure of the interrupt device.
    fn wait_for_completion(&mut self, blocking: bool) -> Result<CompletionEvent, NotifyError>;
}

impl<T: CompletionNotifier + ?Sized> CompletionNotifier for &mut T {
    fn wait_for_completion(&mut self, blocking: bool) -> Result<CompletionEvent, NotifyError> {
        (**self).wait_for_completion(blocking)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("the interrupt device failed with OS error {0}")]
    Os(i32),
    #[error("short read of {0} bytes from the interrupt device")]
    ShortRead(usize),
    #[error("the interrupt device is closed")]
    Closed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("the descriptor list has not been materialized")]
    NotMaterialized,
    #[error("the descriptor list holds no complete logical buffers")]
    NoCompleteBuffers,
    #[error("register access failed")]
    Register(#[from] RegisterError),
    #[error("waiting for completion failed")]
    Notify(#[from] NotifyError),
    #[error("the engine did not leave reset after {0} polls")]
    ResetTimeout(usize),
    #[error("the transfer was already observed to complete")]
    AlreadyCompleted,
}

/// Result of [`AxiDma::start_transfer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferOutcome {
    /// The engine was started; nobody waited for it.
    Started(MaterializedChain),
    /// The engine was started and signalled completion.
    Completed {
        event: CompletionEvent,
        status: S2mmStatus,
    },
}

/// Driver for the S2MM channel of one AXI DMA engine.
#[derive(Debug)]
pub struct AxiDma<B, N> {
    bus: B,
    notifier: N,
    config: TransferConfig,
}

impl<B: RegisterBus, N: CompletionNotifier> AxiDma<B, N> {
    pub const fn new(bus: B, notifier: N, config: TransferConfig) -> Self {
        Self {
            bus,
            notifier,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TransferConfig {
        &self.config
    }

    #[must_use]
    pub fn into_parts(self) -> (B, N) {
        (self.bus, self.notifier)
    }

    /// Start the engine on `list` and optionally wait for completion.
    ///
    /// With `enable_timeout` the interrupt delay timer is armed with
    /// [`TransferConfig::irq_delay`], so a partial batch still interrupts.
    ///
    /// # Errors
    /// - [`TransferError::NotMaterialized`] if `list` was never materialized
    ///   or changed since.
    /// - [`TransferError::NoCompleteBuffers`] if no descriptor carries EOF.
    /// - [`TransferError::Register`] / [`TransferError::Notify`] on platform
    ///   failures.
    pub fn start_transfer<M: DescriptorMemory>(
        &mut self,
        list: &SgList<'_, M>,
        wait: bool,
        enable_timeout: bool,
    ) -> Result<TransferOutcome, TransferError> {
        let chain = self.launch(list, enable_timeout)?;
        if !wait {
            return Ok(TransferOutcome::Started(chain));
        }

        let event = match self.config.wait_strategy {
            WaitStrategy::Blocking => self.notifier.wait_for_completion(true)?,
            WaitStrategy::Polling => loop {
                match self.notifier.wait_for_completion(false)? {
                    CompletionEvent::Pending => core::hint::spin_loop(),
                    event => break event,
                }
            },
        };
        let status = self.acknowledge()?;
        Ok(TransferOutcome::Completed { event, status })
    }

    /// Start the engine on `list` and return a future that resolves on
    /// completion. The registers are programmed before this returns;
    /// dropping the future abandons the wait, not the transfer.
    ///
    /// # Errors
    /// Same as [`start_transfer`](Self::start_transfer) up to the wait.
    pub fn start_transfer_async<M: DescriptorMemory>(
        &mut self,
        list: &SgList<'_, M>,
        enable_timeout: bool,
    ) -> Result<PendingTransfer<'_, B, N>, TransferError> {
        self.launch(list, enable_timeout)?;
        Ok(PendingTransfer {
            dma: self,
            finished: false,
        })
    }

    fn launch<M: DescriptorMemory>(
        &mut self,
        list: &SgList<'_, M>,
        enable_timeout: bool,
    ) -> Result<MaterializedChain, TransferError> {
        let Some(&chain) = list.materialized() else {
            error!("cannot start transfer: descriptor list is not materialized");
            return Err(TransferError::NotMaterialized);
        };
        if chain.frames == 0 {
            error!("cannot start transfer: no complete logical buffers");
            return Err(TransferError::NoCompleteBuffers);
        }

        let threshold = u8::try_from(chain.frames).unwrap_or_else(|_| {
            warn!(
                "{} buffers exceed the IRQ threshold field; clamping to {}",
                chain.frames,
                info::MAX_IRQ_THRESHOLD
            );
            info::MAX_IRQ_THRESHOLD
        });
        let delay = if enable_timeout { self.config.irq_delay } else { 0 };

        write_current_descriptor(&mut self.bus, chain.head)?;
        S2mmControl::new()
            .with_run(true)
            .with_ioc_irq_enable(true)
            .with_delay_irq_enable(true)
            .with_error_irq_enable(true)
            .with_irq_threshold(threshold)
            .with_irq_delay(delay)
            .store(&mut self.bus)?;
        write_tail_descriptor(&mut self.bus, chain.tail)?;

        debug!(
            "transfer started: {} descriptor(s), {} buffer(s), head {}, tail {}",
            chain.descriptors, chain.frames, chain.head, chain.tail
        );
        Ok(chain)
    }

    /// Read `S2MM_DMASR`, report engine errors and clear pending interrupts.
    fn acknowledge(&mut self) -> Result<S2mmStatus, TransferError> {
        let status = S2mmStatus::load(&self.bus)?;
        if status.has_error() {
            error!("S2MM engine reported errors: {status:?}");
        }
        let ack = status.interrupt_ack();
        if ack.has_pending_interrupt() {
            ack.store(&mut self.bus)?;
        }
        Ok(status)
    }

    /// Current `S2MM_DMASR`.
    ///
    /// # Errors
    /// [`TransferError::Register`] on a bus failure.
    pub fn status(&self) -> Result<S2mmStatus, TransferError> {
        Ok(S2mmStatus::load(&self.bus)?)
    }

    /// Soft-reset the engine and wait for the reset bit to clear.
    ///
    /// # Errors
    /// [`TransferError::ResetTimeout`] if the bit stays set, or a bus failure.
    pub fn reset(&mut self) -> Result<(), TransferError> {
        S2mmControl::new().with_reset(true).store(&mut self.bus)?;
        for _ in 0..RESET_POLLS {
            if !S2mmControl::load(&self.bus)?.reset() {
                debug!("S2MM engine reset");
                return Ok(());
            }
            core::hint::spin_loop();
        }
        error!("S2MM engine stuck in reset");
        Err(TransferError::ResetTimeout(RESET_POLLS))
    }
}

/// A started transfer whose completion has not been observed yet.
///
/// There is no interrupt-driven waker: every poll that finds nothing
/// pending wakes the task again right away, so the executor busy-polls the
/// notifier until the interrupt shows up. Once the future has resolved,
/// further polls return [`TransferError::AlreadyCompleted`] without
/// touching the engine.
#[must_use = "dropping a pending transfer abandons the wait"]
#[derive(Debug)]
pub struct PendingTransfer<'a, B, N> {
    dma: &'a mut AxiDma<B, N>,
    finished: bool,
}

impl<B: RegisterBus, N: CompletionNotifier> Future for PendingTransfer<'_, B, N> {
    type Output = Result<TransferOutcome, TransferError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(Err(TransferError::AlreadyCompleted));
        }
        match this.dma.notifier.wait_for_completion(false) {
            Ok(CompletionEvent::Pending) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Ok(event) => {
                this.finished = true;
                Poll::Ready(
                    this.dma
                        .acknowledge()
                        .map(|status| TransferOutcome::Completed { event, status }),
                )
            }
            Err(e) => {
                this.finished = true;
                Poll::Ready(Err(e.into()))
            }
        }
    }
}

impl<B, N> Drop for PendingTransfer<'_, B, N> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("transfer wait cancelled");
        }
    }
}
