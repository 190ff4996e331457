//! Simulated hardware shared by the integration tests.

#![allow(dead_code)]

use axi_dma_registers::{DescriptorStatus, RegisterBus, RegisterError, SgDescriptor, s2mm};
use dma_addresses::PhysicalAddress;
use dma_pinning::{CacheMaintenance, PhysicalRegion, PhysicalSpan, PinError};
use sg_list::{CompletionEvent, CompletionNotifier, DescriptorMemory, NotifyError, SgList};
use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};

pub fn region(spans: &[(u64, u32)]) -> PhysicalRegion {
    PhysicalRegion::new(
        spans
            .iter()
            .map(|&(a, l)| PhysicalSpan::new(PhysicalAddress::new(a), l))
            .collect(),
    )
    .unwrap()
}

/// Register file that remembers every write in order.
#[derive(Default, Debug)]
pub struct RecordingBus {
    pub registers: BTreeMap<usize, u32>,
    pub writes: Vec<(usize, u32)>,
    /// Keep `DMACR.Reset` set forever instead of self-clearing.
    pub stuck_in_reset: bool,
}

impl RecordingBus {
    pub fn with_status(status: u32) -> Self {
        let mut bus = Self::default();
        bus.registers.insert(s2mm::S2MM_DMASR, status);
        bus
    }

    pub fn written_offsets(&self) -> Vec<usize> {
        self.writes.iter().map(|&(o, _)| o).collect()
    }

    pub fn last_write_to(&self, offset: usize) -> Option<u32> {
        self.writes
            .iter()
            .rev()
            .find(|&&(o, _)| o == offset)
            .map(|&(_, v)| v)
    }
}

impl RegisterBus for RecordingBus {
    fn read_register(&self, offset: usize) -> Result<u32, RegisterError> {
        axi_dma_registers::check_offset(offset, axi_dma_registers::info::REGISTER_WINDOW_SIZE)?;
        let value = self.registers.get(&offset).copied().unwrap_or(0);
        if offset == s2mm::S2MM_DMACR && !self.stuck_in_reset {
            return Ok(value & !(1 << 2));
        }
        Ok(value)
    }

    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), RegisterError> {
        axi_dma_registers::check_offset(offset, axi_dma_registers::info::REGISTER_WINDOW_SIZE)?;
        self.writes.push((offset, value));
        if offset == s2mm::S2MM_DMASR {
            // Write-one-to-clear interrupt bits.
            let cleared = value & (0b111 << 12);
            let current = self.registers.get(&offset).copied().unwrap_or(0);
            self.registers.insert(offset, current & !cleared);
        } else {
            self.registers.insert(offset, value);
        }
        Ok(())
    }
}

/// Hands out a fixed sequence of completion events.
#[derive(Default, Debug)]
pub struct ScriptedNotifier {
    pub events: VecDeque<Result<CompletionEvent, NotifyError>>,
    pub calls: Vec<bool>,
}

impl ScriptedNotifier {
    pub fn new(events: impl IntoIterator<Item = Result<CompletionEvent, NotifyError>>) -> Self {
        Self {
            events: events.into_iter().collect(),
            calls: Vec::new(),
        }
    }

    pub fn interrupt() -> Self {
        Self::new([Ok(CompletionEvent::Interrupt { count: 1 })])
    }
}

impl CompletionNotifier for ScriptedNotifier {
    fn wait_for_completion(&mut self, blocking: bool) -> Result<CompletionEvent, NotifyError> {
        self.calls.push(blocking);
        self.events.pop_front().unwrap_or(Err(NotifyError::Closed))
    }
}

/// Counts cache flushes per direction.
#[derive(Default, Debug)]
pub struct RecordingCache {
    pub device: Cell<usize>,
    pub cpu: Cell<usize>,
}

impl CacheMaintenance for RecordingCache {
    fn flush_for_device(&self) -> Result<(), PinError> {
        self.device.set(self.device.get() + 1);
        Ok(())
    }

    fn flush_for_cpu(&self) -> Result<(), PinError> {
        self.cpu.set(self.cpu.get() + 1);
        Ok(())
    }
}

/// Plays the DMA engine: writes a status word into every descriptor slot
/// of `list`, as computed by `status_for(index, descriptor)`.
pub fn retire_with<M, F>(list: &mut SgList<'_, M>, mut status_for: F)
where
    M: DescriptorMemory,
    F: FnMut(usize, &SgDescriptor) -> DescriptorStatus,
{
    let offsets: Vec<_> = list.records().iter().map(|r| r.descriptor_offset).collect();
    for (i, offset) in offsets.into_iter().enumerate() {
        let mut d = list.memory().load(offset).unwrap();
        d.status = status_for(i, &d);
        list.memory_mut().store(offset, &d).unwrap();
    }
}

/// Completes every descriptor with exactly the bytes it asked for.
pub fn retire_all<M: DescriptorMemory>(list: &mut SgList<'_, M>) {
    retire_with(list, |_, d| {
        DescriptorStatus::new()
            .with_complete(true)
            .with_transferred_len(d.control.buffer_len())
            .with_sof(d.control.sof())
            .with_eof(d.control.eof())
    });
}
