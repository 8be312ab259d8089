//! CLI entrypoint for the tagheap trace harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tagheap_core::region::HeapConfig;
use tagheap_harness::runner::{ReplayOptions, TraceReport, replay};
use tagheap_harness::synth::synth_trace;
use tagheap_harness::trace::Trace;

/// Trace tooling for the tagheap allocator.
#[derive(Debug, Parser)]
#[command(name = "tagheap-harness")]
#[command(about = "Trace-driven driver for the tagheap allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay trace files and report utilization and failures.
    Run {
        /// Trace file(s) to replay.
        #[arg(long = "trace", required = true)]
        traces: Vec<PathBuf>,
        /// Run the heap validator after every N events.
        #[arg(long)]
        check_every: Option<usize>,
        /// Emit reports as pretty JSON instead of a summary line.
        #[arg(long)]
        json: bool,
        /// Heap size limit in bytes.
        #[arg(long)]
        max_heap: Option<usize>,
        /// Growth chunk size in bytes.
        #[arg(long)]
        chunk: Option<usize>,
    },
    /// Replay one trace with the validator after every event.
    Check {
        /// Trace file to replay.
        #[arg(long)]
        trace: PathBuf,
        /// Emit the report as pretty JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replay a deterministic synthetic workload.
    Synth {
        /// Workload seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Number of generated events.
        #[arg(long, default_value_t = 5000)]
        ops: usize,
        /// Bound on simultaneously live allocations.
        #[arg(long, default_value_t = 32)]
        slots: usize,
        /// Bound on individual request sizes.
        #[arg(long, default_value_t = 4096)]
        max_size: usize,
        /// Run the heap validator after every N events.
        #[arg(long)]
        check_every: Option<usize>,
        /// Emit the report as pretty JSON.
        #[arg(long)]
        json: bool,
    },
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn sha256_hex(data: &[u8]) -> String {
    use sha2::Digest;
    hex_lower(&sha2::Sha256::digest(data))
}

fn options_with(
    check_every: Option<usize>,
    max_heap: Option<usize>,
    chunk: Option<usize>,
) -> ReplayOptions {
    let mut config = HeapConfig {
        lifecycle_log: false,
        ..HeapConfig::default()
    };
    if let Some(max_heap) = max_heap {
        config.max_heap = max_heap;
    }
    if let Some(chunk) = chunk {
        config.chunk_size = chunk;
    }
    ReplayOptions {
        config,
        check_every,
        verify_payload: true,
    }
}

fn replay_file(path: &PathBuf, opts: &ReplayOptions) -> Result<TraceReport, String> {
    let data = std::fs::read(path)
        .map_err(|err| format!("failed reading '{}': {err}", path.display()))?;
    let text = String::from_utf8_lossy(&data);
    let trace = Trace::parse(&text).map_err(|err| format!("{}: {err}", path.display()))?;
    let mut report = replay(&path.display().to_string(), &trace, opts)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    report.sha256 = Some(sha256_hex(&data));
    Ok(report)
}

fn print_reports(reports: &[TraceReport], json: bool) -> Result<(), String> {
    if json {
        let rendered = if reports.len() == 1 {
            reports[0].to_json()
        } else {
            serde_json::to_string_pretty(reports)
        }
        .map_err(|err| format!("report serialization failed: {err}"))?;
        println!("{rendered}");
    } else {
        for report in reports {
            println!(
                "{}: events={} failed={} corruptions={} violations={} heap={}B util={}.{}% -> {}",
                report.source,
                report.events,
                report.failed_events,
                report.corruptions,
                report.violations,
                report.heap_bytes,
                report.utilization_permille / 10,
                report.utilization_permille % 10,
                if report.passed { "PASS" } else { "FAIL" },
            );
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<bool, String> {
    match cli.command {
        Command::Run {
            traces,
            check_every,
            json,
            max_heap,
            chunk,
        } => {
            let opts = options_with(check_every, max_heap, chunk);
            let mut reports = Vec::with_capacity(traces.len());
            for path in &traces {
                reports.push(replay_file(path, &opts)?);
            }
            print_reports(&reports, json)?;
            Ok(reports.iter().all(|report| report.passed))
        }
        Command::Check { trace, json } => {
            let opts = options_with(Some(1), None, None);
            let report = replay_file(&trace, &opts)?;
            print_reports(std::slice::from_ref(&report), json)?;
            Ok(report.passed)
        }
        Command::Synth {
            seed,
            ops,
            slots,
            max_size,
            check_every,
            json,
        } => {
            if slots == 0 {
                return Err("--slots must be at least 1".to_string());
            }
            let trace = synth_trace(seed, ops, slots, max_size.max(1));
            let opts = options_with(check_every, None, None);
            let label = format!("synth(seed={seed},ops={ops},slots={slots})");
            let report =
                replay(&label, &trace, &opts).map_err(|err| format!("{label}: {err}"))?;
            print_reports(std::slice::from_ref(&report), json)?;
            Ok(report.passed)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
