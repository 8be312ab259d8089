#![no_main]
use libfuzzer_sys::fuzz_target;

use tagheap_core::heap::Heap;
use tagheap_core::region::HeapConfig;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a stream of alloc/free/resize operations.
    if data.len() < 4 {
        return;
    }

    let Ok(mut heap) = Heap::with_config(HeapConfig {
        chunk_size: 4096,
        max_heap: 4 * 1024 * 1024,
        lifecycle_log: false,
    }) else {
        return;
    };
    let mut live: Vec<usize> = Vec::new();

    for chunk in data.chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let op = chunk[0] % 3;
        let size = u16::from_le_bytes([chunk[1], chunk[2]]) as usize;

        match op {
            0 => {
                if let Some(ptr) = heap.allocate(size) {
                    live.push(ptr);
                }
            }
            1 => {
                if let Some(ptr) = live.pop() {
                    heap.free(ptr);
                }
            }
            _ => {
                if let Some(ptr) = live.pop() {
                    match heap.resize(ptr, size) {
                        Some(new_ptr) => live.push(new_ptr),
                        None if size > 0 => live.push(ptr),
                        None => {}
                    }
                }
            }
        }
    }

    assert!(heap.check_heap().is_empty());

    for ptr in live {
        heap.free(ptr);
    }
    assert!(heap.check_heap().is_empty());
});
