//! Trace replay against a live heap.
//!
//! Each replay builds a fresh [`Heap`], drives it with the trace events
//! through a slot table (trace id -> live payload offset), and verifies as
//! it goes: every live payload holds a deterministic per-id byte pattern,
//! resize must preserve the common prefix, and the heap validator can be
//! invoked on a configurable cadence. The outcome is a serializable
//! [`TraceReport`].

use serde::{Deserialize, Serialize};

use tagheap_core::error::AllocError;
use tagheap_core::heap::Heap;
use tagheap_core::layout::NULL;
use tagheap_core::region::HeapConfig;

use crate::trace::{Trace, TraceEvent};

/// Replay tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Heap configuration for the replayed instance.
    pub config: HeapConfig,
    /// Run the heap validator after every N events (and once at the end).
    pub check_every: Option<usize>,
    /// Write and verify payload byte patterns.
    pub verify_payload: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            config: HeapConfig {
                lifecycle_log: false,
                ..HeapConfig::default()
            },
            check_every: None,
            verify_payload: true,
        }
    }
}

/// Result of replaying one trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    /// Trace label (file path or synthetic descriptor).
    pub source: String,
    /// SHA-256 of the trace file contents, when replayed from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Events executed.
    pub events: usize,
    /// Events the allocator could not honor (out of memory) or that were
    /// inconsistent with the slot table.
    pub failed_events: usize,
    /// Payload bytes that lost their expected pattern.
    pub corruptions: usize,
    /// Invariant violations reported by the heap validator.
    pub violations: usize,
    /// Final heap region size in bytes.
    pub heap_bytes: usize,
    /// High-water mark of allocated payload capacity.
    pub peak_live_bytes: usize,
    /// Peak payload over final heap size, in permille.
    pub utilization_permille: u16,
    /// True when nothing failed, corrupted, or violated an invariant.
    pub passed: bool,
}

impl TraceReport {
    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a report from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Deterministic per-id payload pattern.
fn pattern_byte(id: usize, i: usize) -> u8 {
    (id.wrapping_mul(31).wrapping_add(i) & 0xFF) as u8
}

fn fill_pattern(heap: &mut Heap, ptr: usize, id: usize, len: usize) {
    for (i, byte) in heap.payload_mut(ptr)[..len].iter_mut().enumerate() {
        *byte = pattern_byte(id, i);
    }
}

fn count_mismatches(heap: &Heap, ptr: usize, id: usize, len: usize) -> usize {
    let mut mismatches = 0;
    for (i, &byte) in heap.payload(ptr)[..len].iter().enumerate() {
        if byte != pattern_byte(id, i) {
            mismatches += 1;
        }
    }
    mismatches
}

/// Replays `trace` against a fresh heap and reports what happened.
///
/// Fails only when the heap itself cannot be constructed; workload-level
/// problems are counted in the report instead.
pub fn replay(label: &str, trace: &Trace, opts: &ReplayOptions) -> Result<TraceReport, AllocError> {
    let mut heap = Heap::with_config(opts.config)?;
    // Slot table: trace id -> (payload offset, patterned length).
    let mut slots: Vec<Option<(usize, usize)>> = vec![None; trace.num_ids];

    let mut failed_events = 0usize;
    let mut corruptions = 0usize;
    let mut violations = 0usize;

    for (n, event) in trace.events.iter().enumerate() {
        match *event {
            TraceEvent::Alloc { id, size } => {
                if slots[id].is_some() {
                    failed_events += 1;
                    continue;
                }
                match heap.allocate(size) {
                    Some(ptr) => {
                        if opts.verify_payload {
                            fill_pattern(&mut heap, ptr, id, size);
                        }
                        slots[id] = Some((ptr, size));
                    }
                    None => {
                        if size != 0 {
                            failed_events += 1;
                        }
                    }
                }
            }
            TraceEvent::Realloc { id, size } => {
                let Some((ptr, old_len)) = slots[id] else {
                    failed_events += 1;
                    continue;
                };
                match heap.resize(ptr, size) {
                    Some(new_ptr) => {
                        if opts.verify_payload {
                            corruptions +=
                                count_mismatches(&heap, new_ptr, id, old_len.min(size));
                            fill_pattern(&mut heap, new_ptr, id, size);
                        }
                        slots[id] = Some((new_ptr, size));
                    }
                    None => {
                        if size == 0 {
                            // resize(ptr, 0) freed the block.
                            slots[id] = None;
                        } else {
                            // Failed resize leaves the original block live.
                            failed_events += 1;
                        }
                    }
                }
            }
            TraceEvent::Free { id } => match slots[id].take() {
                Some((ptr, len)) => {
                    if opts.verify_payload {
                        corruptions += count_mismatches(&heap, ptr, id, len);
                    }
                    heap.free(ptr);
                }
                None => {
                    heap.free(NULL);
                    failed_events += 1;
                }
            },
        }

        if let Some(every) = opts.check_every {
            if every > 0 && (n + 1) % every == 0 {
                violations += heap.check_heap().len();
            }
        }
    }

    violations += heap.check_heap().len();

    Ok(TraceReport {
        source: label.to_string(),
        sha256: None,
        events: trace.events.len(),
        failed_events,
        corruptions,
        violations,
        heap_bytes: heap.heap_size(),
        peak_live_bytes: heap.peak_live_bytes(),
        utilization_permille: heap.utilization_permille(),
        passed: failed_events == 0 && corruptions == 0 && violations == 0,
    })
}
