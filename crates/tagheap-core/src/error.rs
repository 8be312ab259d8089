//! Allocator error taxonomy.
//!
//! Failures on the hot allocation path are reported as `None` from
//! [`crate::heap::Heap::allocate`] and friends; `AllocError` carries the
//! structured cause for the fallible construction and growth paths.

use thiserror::Error;

/// Errors surfaced by heap construction and region growth.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The backing region cannot be extended without exceeding its limit.
    #[error("out of memory: growing by {requested} bytes would exceed the {limit}-byte heap limit")]
    OutOfMemory { requested: usize, limit: usize },
    /// Bootstrap could not materialize the initial bookkeeping region.
    #[error("heap initialization failed: {reason}")]
    InitFailed { reason: String },
}
