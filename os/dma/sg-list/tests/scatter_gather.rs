mod common;

use common::{RecordingCache, region, retire_all};
use dma_addresses::{Alignment, ArenaOffset, PhysicalAddress};
use dma_pinning::DmaBuffer;
use sg_list::{AddBufferError, BufferStatus, SgList, find_span};

#[test]
fn two_span_data_arena_example() {
    let data = region(&[(0x8000_0000, 1000), (0x9F00_0000, 600)]);
    let desc = region(&[(0x3E00_0000, 4096)]);
    let mut list = SgList::new(&data, &desc, vec![0u8; 4096]).unwrap();

    list.add_logical_buffer(1600).unwrap();

    let records = list.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].buffer_address, PhysicalAddress::new(0x8000_0000));
    assert_eq!(records[0].len, 1000);
    assert!(records[0].sof && !records[0].eof);
    assert_eq!(records[1].buffer_address, PhysicalAddress::new(0x9F00_0000));
    assert_eq!(records[1].len, 600);
    assert!(!records[1].sof && records[1].eof);
    assert_eq!(list.descriptor_cursor(), ArenaOffset::new(128));
    assert_eq!(list.data_cursor(), ArenaOffset::new(1600));

    assert_eq!(
        list.add_logical_buffer(1),
        Err(AddBufferError::DataArenaExhausted)
    );
}

#[test]
fn failed_add_leaves_the_list_untouched() {
    let data = region(&[(0x8000_0000, 1000), (0x9F00_0000, 600)]);
    let desc = region(&[(0x3E00_0000, 4096)]);
    let mut list = SgList::new(&data, &desc, vec![0u8; 4096]).unwrap();
    list.add_logical_buffer(700).unwrap();

    let snapshot = (
        list.records().to_vec(),
        list.descriptor_cursor(),
        list.data_cursor(),
        list.buffer_count(),
    );

    // 300 left in span 0 and 600 in span 1: 901 does not fit.
    assert_eq!(
        list.add_logical_buffer(901),
        Err(AddBufferError::DataArenaExhausted)
    );
    assert_eq!(
        (
            list.records().to_vec(),
            list.descriptor_cursor(),
            list.data_cursor(),
            list.buffer_count()
        ),
        snapshot
    );
}

#[test]
fn exact_fit_in_the_last_span_then_one_byte_more() {
    let data = region(&[(0x8000_0000, 1000), (0x9F00_0000, 600)]);
    let desc = region(&[(0x3E00_0000, 4096)]);

    let mut list = SgList::new(&data, &desc, vec![0u8; 4096]).unwrap();
    list.add_logical_buffer(1000).unwrap();
    let before = (list.descriptor_count(), list.descriptor_cursor(), list.data_cursor());
    assert_eq!(
        list.add_logical_buffer(601),
        Err(AddBufferError::DataArenaExhausted)
    );
    assert_eq!(
        (list.descriptor_count(), list.descriptor_cursor(), list.data_cursor()),
        before
    );

    list.add_logical_buffer(600).unwrap();
    assert_eq!(list.descriptor_count(), 2);
    assert_eq!(list.records()[1].len, 600);
    assert!(list.records()[1].sof && list.records()[1].eof);
}

#[test]
fn buffers_come_back_in_order_with_their_sizes() {
    let data = region(&[(0x8000_0000, 4096), (0x8800_0000, 4096), (0x9000_0000, 4096)]);
    let desc = region(&[(0x3E00_0010, 2048)]);
    let mut list = SgList::new(&data, &desc, vec![0u8; 2048]).unwrap();

    let sizes = [1600, 1600, 3000, 1, 4000, 100];
    for size in sizes {
        list.add_logical_buffer(size).unwrap();
    }

    let cache = RecordingCache::default();
    list.materialize(&cache).unwrap();
    assert_eq!(cache.device.get(), 1);
    retire_all(&mut list);

    let completed: Vec<_> = list.completed_with(&cache).unwrap().collect();
    assert_eq!(cache.cpu.get(), 1);
    assert_eq!(completed.len(), sizes.len());

    let mut expected_offset = 0;
    for (buffer, size) in completed.into_iter().zip(sizes) {
        assert_eq!(buffer.status, BufferStatus::Success);
        assert_eq!(buffer.offset, ArenaOffset::new(expected_offset));
        assert_eq!(buffer.len, size);
        expected_offset += size;
    }
    assert!(list.dequeue_next().is_none());
    assert_eq!(cache.device.get(), 1);
}

#[test]
fn reset_traversal_replays_identically() {
    let data = region(&[(0x8000_0000, 1000), (0x9F00_0000, 600)]);
    let desc = region(&[(0x3E00_0000, 4096)]);
    let mut list = SgList::new(&data, &desc, vec![0u8; 4096]).unwrap();
    for _ in 0..4 {
        list.add_logical_buffer(400).unwrap();
    }
    list.materialize(&RecordingCache::default()).unwrap();
    retire_all(&mut list);

    let first: Vec<_> = list.completed().collect();
    assert_eq!(first.len(), 4);
    assert!(list.dequeue_next().is_none());

    list.reset_traversal();
    let second: Vec<_> = list.completed().collect();
    assert_eq!(first, second);

    // The buffer straddling the span boundary took two descriptors.
    assert_eq!(first[2].descriptors, 2);
    assert_eq!(first[2].len, 400);
}

#[test]
fn descriptor_slots_respect_physical_alignment() {
    // Neither descriptor span starts on a 64-byte boundary.
    let data = region(&[(0x8000_0000, 8192)]);
    let desc = region(&[(0x3E00_0008, 100), (0x3F00_0024, 300)]);
    let mut list = SgList::new(&data, &desc, vec![0u8; 400]).unwrap();

    let mut added = 0;
    while list.add_logical_buffer(10).is_ok() {
        added += 1;
    }
    assert_eq!(
        list.add_logical_buffer(10),
        Err(AddBufferError::DescriptorArenaExhausted)
    );
    assert!(added > 0);

    let align = Alignment::new(64).unwrap();
    for record in list.records() {
        let first = desc.locate(record.descriptor_offset).unwrap();
        let last = desc.locate(record.descriptor_offset + 63).unwrap();
        assert_eq!(first.index, last.index, "slot crosses a span");
        assert!(desc.resolve(record.descriptor_offset).unwrap().is_aligned(align));
    }
}

#[test]
fn find_span_never_crosses_a_span() {
    let spans: Vec<(u64, u32)> = (0..40u32)
        .map(|i| {
            let base = 0x1000_0000 + u64::from(i) * 0x10_0000 + u64::from(i * 24 % 64);
            (base, 32 + i * 37 % 500)
        })
        .collect();
    let r = region(&spans);
    let align = Alignment::new(64).unwrap();
    let largest = r.spans().iter().map(|s| s.size()).max().unwrap();

    for size in [1, 16, 64, 100, 200, largest] {
        for start in (0..r.len()).step_by(97) {
            let Some(at) = find_span(&r, ArenaOffset::new(start), size, align) else {
                continue;
            };
            assert!(at.as_usize() >= start);
            let first = r.locate(at).unwrap();
            let last = r.locate(at + (size - 1)).unwrap();
            assert_eq!(first.index, last.index);
            assert!(r.resolve(at).unwrap().is_aligned(align));
        }
    }
}

#[test]
fn volatile_dma_buffer_backs_a_list() {
    let data = region(&[(0x8000_0000, 1000), (0x9F00_0000, 600)]);
    let desc = region(&[(0x3E00_0000, 4096)]);
    let mut memory = DmaBuffer::zeroed(4096).unwrap();

    let mut list = SgList::new(&data, &desc, &mut memory).unwrap();
    list.add_logical_buffer(1600).unwrap();
    list.materialize(&RecordingCache::default()).unwrap();
    retire_all(&mut list);
    let buffer = list.dequeue_next().unwrap();
    assert!(buffer.is_success());
    assert_eq!(buffer.len, 1600);
    drop(list);

    // CONTROL word of the first descriptor: SOF | 1000.
    assert_eq!(memory.read_u32_le(0x18), Some((1 << 27) | 1000));
}
