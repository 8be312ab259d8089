//! Allocation trace model and parser.
//!
//! A trace file drives the allocator with a recorded workload. The format
//! is line-oriented: four integer header lines (suggested heap size, number
//! of distinct allocation ids, declared event count, weight), then one
//! event per line:
//!
//! ```text
//! a <id> <size>    allocate
//! r <id> <size>    resize
//! f <id>           free
//! ```
//!
//! Blank lines are ignored. Ids index a slot table maintained by the
//! replayer; every id must be below the declared id count.

use std::path::Path;

use thiserror::Error;

/// Errors produced while loading or parsing a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace header is incomplete (need 4 integer lines)")]
    MissingHeader,
    #[error("line {line}: malformed record '{content}'")]
    Malformed { line: usize, content: String },
    #[error("line {line}: unknown op '{op}'")]
    UnknownOp { line: usize, op: String },
    #[error("line {line}: id {id} out of range (num_ids = {num_ids})")]
    IdOutOfRange {
        line: usize,
        id: usize,
        num_ids: usize,
    },
}

/// One recorded allocator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Alloc { id: usize, size: usize },
    Realloc { id: usize, size: usize },
    Free { id: usize },
}

/// A parsed workload trace.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Heap size hint from the header; informational only.
    pub suggested_heap: usize,
    /// Number of distinct allocation ids the events may reference.
    pub num_ids: usize,
    /// Event count declared by the header.
    pub declared_ops: usize,
    /// Scoring weight from the header; informational only.
    pub weight: usize,
    /// The recorded events, in order.
    pub events: Vec<TraceEvent>,
}

impl Trace {
    /// Parses a trace from its textual form.
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let mut header = [0usize; 4];
        let mut header_seen = 0;
        let mut events = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if header_seen < 4 {
                header[header_seen] =
                    trimmed
                        .parse::<usize>()
                        .map_err(|_| TraceError::Malformed {
                            line,
                            content: trimmed.to_string(),
                        })?;
                header_seen += 1;
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            let op = fields.next().unwrap_or_default();
            let event = match op {
                "a" | "r" => {
                    let id = parse_field(fields.next(), line, trimmed)?;
                    let size = parse_field(fields.next(), line, trimmed)?;
                    if op == "a" {
                        TraceEvent::Alloc { id, size }
                    } else {
                        TraceEvent::Realloc { id, size }
                    }
                }
                "f" => {
                    let id = parse_field(fields.next(), line, trimmed)?;
                    TraceEvent::Free { id }
                }
                other => {
                    return Err(TraceError::UnknownOp {
                        line,
                        op: other.to_string(),
                    });
                }
            };
            let id = match event {
                TraceEvent::Alloc { id, .. }
                | TraceEvent::Realloc { id, .. }
                | TraceEvent::Free { id } => id,
            };
            if id >= header[1] {
                return Err(TraceError::IdOutOfRange {
                    line,
                    id,
                    num_ids: header[1],
                });
            }
            events.push(event);
        }

        if header_seen < 4 {
            return Err(TraceError::MissingHeader);
        }
        Ok(Self {
            suggested_heap: header[0],
            num_ids: header[1],
            declared_ops: header[2],
            weight: header[3],
            events,
        })
    }

    /// Loads and parses a trace file.
    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

fn parse_field(field: Option<&str>, line: usize, content: &str) -> Result<usize, TraceError> {
    field
        .and_then(|f| f.parse::<usize>().ok())
        .ok_or_else(|| TraceError::Malformed {
            line,
            content: content.to_string(),
        })
}
