//! Fixed properties of the AXI DMA engine and its descriptor format.

/// Size of the memory-mapped register window.
pub const REGISTER_WINDOW_SIZE: usize = 0x1000;

/// Bytes per scatter-gather descriptor slot.
pub const DESCRIPTOR_SIZE: usize = 64;

/// Physical alignment the engine requires of every descriptor.
pub const DESCRIPTOR_ALIGNMENT: u64 = 64;

/// Largest payload one descriptor can carry (26-bit length field).
pub const MAX_DESCRIPTOR_LEN: u32 = (1 << 26) - 1;

/// Largest value of the 8-bit interrupt coalescing threshold.
pub const MAX_IRQ_THRESHOLD: u8 = u8::MAX;

/// Delay timer value used when a completion timeout is requested.
pub const DEFAULT_IRQ_DELAY: u8 = 200;

const _: () = assert!(DESCRIPTOR_SIZE as u64 % DESCRIPTOR_ALIGNMENT == 0);
const _: () = assert!(DESCRIPTOR_ALIGNMENT.is_power_of_two());
