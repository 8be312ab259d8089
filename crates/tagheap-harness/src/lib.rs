//! Trace-driven driver and conformance tooling for the tagheap allocator.
//!
//! Provides:
//! - [`trace`]: the workload trace model and its line-oriented parser.
//! - [`runner`]: trace replay with payload verification and validator
//!   cadence, producing serializable reports.
//! - [`synth`]: deterministic synthetic workload generation.

pub mod runner;
pub mod synth;
pub mod trace;

pub use runner::{ReplayOptions, TraceReport, replay};
pub use synth::synth_trace;
pub use trace::{Trace, TraceError, TraceEvent};
