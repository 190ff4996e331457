use axi_dma_registers::info;
use dma_addresses::Alignment;

const DESCRIPTOR_ALIGNMENT: Alignment = match Alignment::new(info::DESCRIPTOR_ALIGNMENT) {
    Some(a) => a,
    None => panic!("descriptor alignment must be a power of two"),
};

/// Layout parameters of a scatter-gather list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SgListConfig {
    /// Physical alignment of every descriptor slot. At least 4 bytes.
    pub descriptor_alignment: Alignment,
    /// Largest payload a single descriptor may carry. Physical spans larger
    /// than this are split over several descriptors.
    pub max_descriptor_len: u32,
}

impl Default for SgListConfig {
    fn default() -> Self {
        Self {
            descriptor_alignment: DESCRIPTOR_ALIGNMENT,
            max_descriptor_len: info::MAX_DESCRIPTOR_LEN,
        }
    }
}

/// How [`AxiDma::start_transfer`](crate::AxiDma::start_transfer) waits for
/// completion when asked to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WaitStrategy {
    /// Block inside the completion notifier.
    #[default]
    Blocking,
    /// Spin on the notifier's non-blocking check.
    Polling,
}

/// Transfer driver parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferConfig {
    /// Delay timer written to `S2MM_DMACR.IRQDelay` when a timeout is
    /// requested.
    pub irq_delay: u8,
    pub wait_strategy: WaitStrategy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            irq_delay: info::DEFAULT_IRQ_DELAY,
            wait_strategy: WaitStrategy::default(),
        }
    }
}
