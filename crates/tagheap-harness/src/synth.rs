//! Deterministic synthetic workload generation.
//!
//! Produces traces without touching the filesystem: a seeded xorshift64*
//! stream drives a slot-table model of alloc/free/resize pressure, so the
//! same seed always yields the same trace.

use crate::trace::{Trace, TraceEvent};

/// Seeded xorshift64* generator.
#[derive(Clone, Copy, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Creates a generator; a zero seed is remapped to a fixed nonzero one.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform value in `[low, high_inclusive]`.
    pub fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

/// Generates a deterministic alloc/free/resize trace.
///
/// `slots` bounds the number of simultaneously live allocations; `max_size`
/// bounds individual request sizes. Slots still live at the end of the
/// stream are freed so replays finish with an empty slot table.
pub fn synth_trace(seed: u64, ops: usize, slots: usize, max_size: usize) -> Trace {
    let mut rng = XorShift64::new(seed);
    let mut live = vec![false; slots];
    let mut events = Vec::with_capacity(ops + slots);

    while events.len() < ops {
        let id = rng.gen_range_usize(0, slots - 1);
        if !live[id] {
            let size = rng.gen_range_usize(1, max_size);
            events.push(TraceEvent::Alloc { id, size });
            live[id] = true;
        } else if rng.gen_range_usize(0, 2) == 0 {
            let size = rng.gen_range_usize(1, max_size);
            events.push(TraceEvent::Realloc { id, size });
        } else {
            events.push(TraceEvent::Free { id });
            live[id] = false;
        }
    }
    for (id, alive) in live.iter().enumerate() {
        if *alive {
            events.push(TraceEvent::Free { id });
        }
    }

    Trace {
        suggested_heap: 0,
        num_ids: slots,
        declared_ops: events.len(),
        weight: 1,
        events,
    }
}
