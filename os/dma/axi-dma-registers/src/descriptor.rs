use bitfield_struct::bitfield;
use dma_addresses::PhysicalAddress;

/// Descriptor `CONTROL` word (offset `0x18`).
///
/// Written by software before the transfer; never modified by the engine.
#[bitfield(u32, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct DescriptorControl {
    /// Bits 0–25, Buffer Length: bytes the engine may write to this buffer.
    #[bits(26)]
    pub buffer_len: u32,

    /// Bit 26, EOF: last descriptor of a logical buffer.
    pub eof: bool,

    /// Bit 27, SOF: first descriptor of a logical buffer.
    pub sof: bool,

    /// Bits 28–31: Reserved.
    #[bits(4, default = 0)]
    _reserved_28_31: u8,
}

/// Descriptor `STATUS` word (offset `0x1C`).
///
/// Zeroed by software when the descriptor is written; filled in by the
/// engine when it retires the descriptor.
#[bitfield(u32, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct DescriptorStatus {
    /// Bits 0–25: Transferred Bytes.
    #[bits(26)]
    pub transferred_len: u32,

    /// Bit 26, RXEOF: the stream's `TLAST` landed in this buffer.
    pub eof: bool,

    /// Bit 27, RXSOF: the stream's first beat landed in this buffer.
    pub sof: bool,

    /// Bit 28, `DMAIntErr`: internal error (e.g. zero buffer length).
    pub internal_error: bool,

    /// Bit 29, `DMASlvErr`: slave error on the memory-mapped write.
    pub slave_error: bool,

    /// Bit 30, `DMADecErr`: decode error (invalid buffer address).
    pub decode_error: bool,

    /// Bit 31, Cmplt: the engine has finished with this descriptor.
    pub complete: bool,
}

impl DescriptorStatus {
    /// `true` if any of the three error bits is set.
    #[inline]
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.internal_error() || self.slave_error() || self.decode_error()
    }
}

/// One scatter-gather descriptor, as laid out in descriptor memory.
///
/// ```text
/// 0x00 NXTDESC        0x04 NXTDESC_MSB
/// 0x08 BUFFER_ADDRESS 0x0C BUFFER_ADDRESS_MSB
/// 0x10 reserved       0x14 reserved
/// 0x18 CONTROL        0x1C STATUS
/// 0x20 APP0 .. 0x30 APP4
/// 0x34 .. 0x3F padding up to the 64-byte slot
/// ```
///
/// Every word is stored little-endian. The struct itself is the host view;
/// [`to_words`](Self::to_words) and [`from_words`](Self::from_words) produce
/// and consume the device view.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SgDescriptor {
    pub next: PhysicalAddress,
    pub buffer: PhysicalAddress,
    pub control: DescriptorControl,
    pub status: DescriptorStatus,
    pub app: [u32; 5],
}

impl SgDescriptor {
    /// Size of one descriptor slot in bytes.
    pub const SIZE: usize = 64;

    /// Number of 32-bit words in one slot.
    pub const WORDS: usize = Self::SIZE / 4;

    pub const NXTDESC: usize = 0x00;
    pub const NXTDESC_MSB: usize = 0x04;
    pub const BUFFER_ADDRESS: usize = 0x08;
    pub const BUFFER_ADDRESS_MSB: usize = 0x0C;
    pub const CONTROL: usize = 0x18;
    pub const STATUS: usize = 0x1C;
    pub const APP0: usize = 0x20;

    /// Descriptor pointing at `buffer`, linked to `next`, with a zeroed status.
    #[inline]
    #[must_use]
    pub const fn new(next: PhysicalAddress, buffer: PhysicalAddress, control: DescriptorControl) -> Self {
        Self {
            next,
            buffer,
            control,
            status: DescriptorStatus::new(),
            app: [0; 5],
        }
    }

    /// Device view as sixteen host-order words; the caller stores them
    /// little-endian.
    #[must_use]
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        let mut w = [0u32; Self::WORDS];
        w[Self::NXTDESC / 4] = self.next.lsb();
        w[Self::NXTDESC_MSB / 4] = self.next.msb();
        w[Self::BUFFER_ADDRESS / 4] = self.buffer.lsb();
        w[Self::BUFFER_ADDRESS_MSB / 4] = self.buffer.msb();
        w[Self::CONTROL / 4] = self.control.into_bits();
        w[Self::STATUS / 4] = self.status.into_bits();
        let mut i = 0;
        while i < self.app.len() {
            w[Self::APP0 / 4 + i] = self.app[i];
            i += 1;
        }
        w
    }

    /// Parse sixteen host-order words. Reserved words are ignored.
    #[must_use]
    pub const fn from_words(w: &[u32; Self::WORDS]) -> Self {
        let mut app = [0u32; 5];
        let mut i = 0;
        while i < app.len() {
            app[i] = w[Self::APP0 / 4 + i];
            i += 1;
        }
        Self {
            next: PhysicalAddress::from_halves(w[Self::NXTDESC / 4], w[Self::NXTDESC_MSB / 4]),
            buffer: PhysicalAddress::from_halves(
                w[Self::BUFFER_ADDRESS / 4],
                w[Self::BUFFER_ADDRESS_MSB / 4],
            ),
            control: DescriptorControl::from_bits(w[Self::CONTROL / 4]),
            status: DescriptorStatus::from_bits(w[Self::STATUS / 4]),
            app,
        }
    }

    /// Serialize into the 64-byte little-endian slot image.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.to_words()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Parse a 64-byte little-endian slot image.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut words = [0u32; Self::WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::from_words(&words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bits_are_where_the_engine_expects_them() {
        let c = DescriptorControl::new()
            .with_buffer_len(1000)
            .with_sof(true)
            .with_eof(false);
        assert_eq!(c.into_bits(), (1 << 27) | 1000);

        let c = DescriptorControl::new().with_buffer_len(600).with_eof(true);
        assert_eq!(c.into_bits(), (1 << 26) | 600);
    }

    #[test]
    fn status_flags_decode() {
        let s = DescriptorStatus::from_bits(0x8000_0000 | (1 << 26) | 1600);
        assert!(s.complete());
        assert!(s.eof());
        assert!(!s.has_error());
        assert_eq!(s.transferred_len(), 1600);

        let s = DescriptorStatus::from_bits(0x8000_0000 | (1 << 30));
        assert!(s.decode_error());
        assert!(s.has_error());
    }

    #[test]
    fn layout_places_words_at_fixed_offsets() {
        let d = SgDescriptor::new(
            PhysicalAddress::new(0x0000_0001_3E00_0040),
            PhysicalAddress::new(0x8000_0018),
            DescriptorControl::new().with_buffer_len(0x3E8).with_sof(true),
        );
        let bytes = d.to_le_bytes();
        assert_eq!(&bytes[0x00..0x04], &[0x40, 0x00, 0x00, 0x3E]);
        assert_eq!(&bytes[0x04..0x08], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[0x08..0x0C], &[0x18, 0x00, 0x00, 0x80]);
        assert_eq!(&bytes[0x18..0x1C], &[0xE8, 0x03, 0x00, 0x08]);
        assert_eq!(&bytes[0x1C..0x20], &[0; 4]);
        assert!(bytes[0x34..].iter().all(|&b| b == 0));

        assert_eq!(SgDescriptor::from_le_bytes(&bytes), d);
    }
}
