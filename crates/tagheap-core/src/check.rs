//! Heap validator.
//!
//! A full traversal of the block sequence and every free list, reporting
//! invariant violations as structured values instead of failing. This is a
//! diagnostic aid invoked explicitly; it never runs on the hot path and
//! never mutates the heap.

use std::collections::BTreeSet;
use std::fmt;

use crate::heap::Heap;
use crate::layout::{
    ALIGNMENT, DSIZE, MIN_BLOCK, block_size, header_off, is_alloc, pred_off, read_link, read_word,
    succ_off, word_alloc, word_prev_free, word_size,
};
use crate::seglist::{BOOT_BYTES, NUM_CLASSES, SENTINEL_BLOCK, class_of, sentinel_bp};

/// One invariant violation found by [`Heap::check_heap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A per-class sentinel node lost its size or allocated tag.
    BadSentinel { class: usize, ptr: usize },
    /// The terminating epilogue marker is malformed or misplaced.
    BadEpilogue { offset: usize },
    /// A block payload offset is not aligned to the alignment unit.
    MisalignedBlock { ptr: usize },
    /// A block's size field is below the minimum or not an alignment multiple.
    BadBlockSize { ptr: usize, size: usize },
    /// A block extends past the end of the region.
    BlockOutOfBounds { ptr: usize, size: usize },
    /// A free block's header and footer words disagree.
    HeaderFooterMismatch { ptr: usize, header: u32, footer: u32 },
    /// Two physically adjacent blocks are both free (missed coalesce).
    AdjacentFreeBlocks { first: usize, second: usize },
    /// A header's prev-free bit contradicts the actual predecessor state.
    PrevFreeBitMismatch { ptr: usize, expected: bool },
    /// A free-list node's neighbor links are not mutually consistent.
    ListLinkBroken { ptr: usize },
    /// A block on a free list is tagged allocated.
    AllocatedOnFreeList { class: usize, ptr: usize },
    /// A free block sits on a list that does not match its size class.
    WrongClassList { ptr: usize, listed: usize, expected: usize },
    /// A free block is missing from every free list.
    FreeBlockNotListed { ptr: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSentinel { class, ptr } => {
                write!(f, "sentinel for class {class} at {ptr:#x} is malformed")
            }
            Self::BadEpilogue { offset } => write!(f, "bad epilogue at {offset:#x}"),
            Self::MisalignedBlock { ptr } => write!(f, "block {ptr:#x} is not 8-byte aligned"),
            Self::BadBlockSize { ptr, size } => {
                write!(f, "block {ptr:#x} has illegal size {size}")
            }
            Self::BlockOutOfBounds { ptr, size } => {
                write!(f, "block {ptr:#x} of size {size} extends past the region end")
            }
            Self::HeaderFooterMismatch {
                ptr,
                header,
                footer,
            } => write!(
                f,
                "free block {ptr:#x} header {header:#010x} != footer {footer:#010x}"
            ),
            Self::AdjacentFreeBlocks { first, second } => {
                write!(f, "adjacent free blocks {first:#x} and {second:#x}")
            }
            Self::PrevFreeBitMismatch { ptr, expected } => write!(
                f,
                "block {ptr:#x} prev-free bit should be {expected}"
            ),
            Self::ListLinkBroken { ptr } => {
                write!(f, "free-list links around {ptr:#x} are inconsistent")
            }
            Self::AllocatedOnFreeList { class, ptr } => {
                write!(f, "allocated block {ptr:#x} found on class {class} list")
            }
            Self::WrongClassList {
                ptr,
                listed,
                expected,
            } => write!(
                f,
                "free block {ptr:#x} listed in class {listed}, belongs in {expected}"
            ),
            Self::FreeBlockNotListed { ptr } => {
                write!(f, "free block {ptr:#x} is on no free list")
            }
        }
    }
}

impl Heap {
    /// Verifies every heap invariant and reports all violations found.
    ///
    /// An empty result means the heap is consistent: sentinels and epilogue
    /// well-formed, every block aligned and in bounds, free headers matching
    /// footers, no two adjacent free blocks, prev-free bits in sync, and
    /// every free list a consistent cycle holding exactly the free blocks
    /// of its class.
    pub fn check_heap(&self) -> Vec<Violation> {
        let buf = self.region.bytes();
        let len = self.region.len();
        let mut violations = Vec::new();

        // Sentinel nodes: permanently allocated, fixed size.
        for class in 0..NUM_CLASSES {
            let bp = sentinel_bp(class);
            let word = read_word(buf, header_off(bp));
            if word_size(word) != SENTINEL_BLOCK || !word_alloc(word) {
                violations.push(Violation::BadSentinel { class, ptr: bp });
            }
        }

        // Free lists: consistent cycles of free blocks in the right class.
        let mut listed = BTreeSet::new();
        let step_budget = len / MIN_BLOCK + NUM_CLASSES + 1;
        for class in 0..NUM_CLASSES {
            let sent = sentinel_bp(class);
            let mut cur = read_link(buf, succ_off(sent));
            let mut steps = 0;
            while cur != sent {
                if steps > step_budget || cur < DSIZE || cur.saturating_add(DSIZE * 2) > len {
                    violations.push(Violation::ListLinkBroken { ptr: cur });
                    break;
                }
                let pred = read_link(buf, pred_off(cur));
                let succ = read_link(buf, succ_off(cur));
                if pred < DSIZE
                    || pred.saturating_add(DSIZE * 2) > len
                    || succ < DSIZE
                    || succ.saturating_add(DSIZE * 2) > len
                {
                    violations.push(Violation::ListLinkBroken { ptr: cur });
                    break;
                }
                if read_link(buf, succ_off(pred)) != cur || read_link(buf, pred_off(succ)) != cur {
                    violations.push(Violation::ListLinkBroken { ptr: cur });
                }
                if is_alloc(buf, cur) {
                    violations.push(Violation::AllocatedOnFreeList { class, ptr: cur });
                } else {
                    let expected = class_of(block_size(buf, cur));
                    if expected != class {
                        violations.push(Violation::WrongClassList {
                            ptr: cur,
                            listed: class,
                            expected,
                        });
                    }
                }
                listed.insert(cur);
                cur = succ;
                steps += 1;
            }
        }

        // Physical block sequence, bootstrap end to epilogue.
        let mut bp = BOOT_BYTES;
        let mut prev_bp = 0usize;
        let mut prev_was_free = false;
        loop {
            if bp > len {
                violations.push(Violation::BadEpilogue { offset: len });
                break;
            }
            let word = read_word(buf, header_off(bp));
            let size = word_size(word);
            if size == 0 {
                // Epilogue: allocated, occupying the last header slot.
                if !word_alloc(word) || bp != len {
                    violations.push(Violation::BadEpilogue {
                        offset: header_off(bp),
                    });
                }
                if word_prev_free(word) != prev_was_free {
                    violations.push(Violation::PrevFreeBitMismatch {
                        ptr: bp,
                        expected: prev_was_free,
                    });
                }
                break;
            }
            if bp % ALIGNMENT != 0 {
                violations.push(Violation::MisalignedBlock { ptr: bp });
            }
            if size < MIN_BLOCK || size % ALIGNMENT != 0 {
                violations.push(Violation::BadBlockSize { ptr: bp, size });
                break;
            }
            if bp + size > len {
                violations.push(Violation::BlockOutOfBounds { ptr: bp, size });
                break;
            }
            if word_prev_free(word) != prev_was_free {
                violations.push(Violation::PrevFreeBitMismatch {
                    ptr: bp,
                    expected: prev_was_free,
                });
            }
            let alloc = word_alloc(word);
            if !alloc {
                let footer = read_word(buf, bp + size - DSIZE);
                if footer != word {
                    violations.push(Violation::HeaderFooterMismatch {
                        ptr: bp,
                        header: word,
                        footer,
                    });
                }
                if prev_was_free {
                    violations.push(Violation::AdjacentFreeBlocks {
                        first: prev_bp,
                        second: bp,
                    });
                }
                if !listed.contains(&bp) {
                    violations.push(Violation::FreeBlockNotListed { ptr: bp });
                }
            }
            prev_was_free = !alloc;
            prev_bp = bp;
            bp += size;
        }

        violations
    }
}
