//! tvlai - Three-valued bit-level analysis of p-code listings
//!
//! Usage:
//!   tvlai <listing>                                 Sweep the listing and dump registers
//!   tvlai <listing> --seed register:0x10:4=0x1000   Start with a known value
//!   tvlai <listing> --report register:0x0:1         Print one varnode at the end

mod args;

use anyhow::{Context, Result};
use args::{OperandArg, Seed};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tvlai_core::{parse_listing, AddressSpace, Endianness, Varnode};
use tvlai_emulate::{
    AbstractState, Analyzer, AnalyzerConfig, BitVector, ControlFlowPolicy, DestinationPolicy,
    EmulationResult, SweepResult, UnimplementedPolicy,
};

#[derive(Parser)]
#[command(name = "tvlai")]
#[command(about = "Three-valued bit-level analysis of p-code listings", long_about = None)]
struct Cli {
    /// Path to the p-code listing
    listing: PathBuf,

    /// Treat registers and memory as big-endian
    #[arg(long)]
    big_endian: bool,

    /// Initial value, as <space>:<offset>:<size>=<value> (value may be 0b01?...)
    #[arg(short, long = "seed", value_name = "OPERAND=VALUE")]
    seeds: Vec<Seed>,

    /// Varnode to print after the sweep, as <space>:<offset>:<size>
    #[arg(short, long = "report", value_name = "OPERAND")]
    reports: Vec<OperandArg>,

    /// What to do with ops that have no transfer function
    #[arg(long, value_enum, default_value_t = OnUnimplemented::Halt)]
    on_unimplemented: OnUnimplemented,

    /// Continue past branches, calls and returns
    #[arg(long)]
    fall_through: bool,

    /// Fail on writes to constants and memory-space varnodes
    #[arg(long)]
    strict_destinations: bool,

    /// Keep temporaries alive across instructions
    #[arg(long)]
    keep_temporaries: bool,

    /// Maximum number of instructions to process
    #[arg(long, default_value = "10000")]
    max_instructions: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnUnimplemented {
    Halt,
    Skip,
    Havoc,
}

impl From<OnUnimplemented> for UnimplementedPolicy {
    fn from(value: OnUnimplemented) -> Self {
        match value {
            OnUnimplemented::Halt => Self::Halt,
            OnUnimplemented::Skip => Self::Skip,
            OnUnimplemented::Havoc => Self::Havoc,
        }
    }
}

impl Cli {
    fn config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            endianness: if self.big_endian {
                Endianness::Big
            } else {
                Endianness::Little
            },
            on_unimplemented: self.on_unimplemented.into(),
            on_control_flow: if self.fall_through {
                ControlFlowPolicy::FallThrough
            } else {
                ControlFlowPolicy::Halt
            },
            destinations: if self.strict_destinations {
                DestinationPolicy::Reject
            } else {
                DestinationPolicy::Warn
            },
            scope_temporaries: !self.keep_temporaries,
            max_instructions: self.max_instructions,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let text = fs::read_to_string(&cli.listing)
        .with_context(|| format!("Failed to read listing: {}", cli.listing.display()))?;
    let instructions = parse_listing(&text)
        .with_context(|| format!("Failed to parse listing: {}", cli.listing.display()))?;
    tracing::info!(
        "loaded {} instructions from {}",
        instructions.len(),
        cli.listing.display()
    );

    let mut analyzer = Analyzer::new(cli.config());
    for seed in &cli.seeds {
        analyzer
            .state_mut()
            .associate(&seed.target, &seed.value)
            .with_context(|| format!("Failed to seed {}", seed.target))?;
    }

    let result = analyzer.run(&instructions).context("Analysis aborted")?;
    print_result(&result, &cli.reports)
}

fn print_result(result: &SweepResult, reports: &[OperandArg]) -> Result<()> {
    println!("stop: {}", result.stop_reason);
    println!(
        "instructions: {}, ops: {}",
        result.instruction_count, result.op_count
    );

    for diagnostic in &result.diagnostics {
        println!("note: {}", diagnostic);
    }

    if reports.is_empty() {
        for vn in register_runs(&result.state) {
            let value = read(&result.state, &vn)?;
            println!("{} = {}", vn, value);
        }
        for (id, memory) in result.state.spaces() {
            println!("{}: {} bytes written", id, memory.len());
        }
    } else {
        for OperandArg(vn) in reports {
            let value = read(&result.state, vn).with_context(|| format!("Failed to read {}", vn))?;
            println!("{} = {}", vn, value);
        }
    }

    Ok(())
}

/// Read a varnode, including ones that live in a memory space.
fn read(state: &AbstractState, vn: &Varnode) -> EmulationResult<BitVector> {
    match vn.space {
        AddressSpace::Other(id) => Ok(state.load(id, vn.offset, vn.bits())),
        _ => state.lookup(vn),
    }
}

/// Contiguous runs of written register bytes.
fn register_runs(state: &AbstractState) -> Vec<Varnode> {
    let mut runs: Vec<Varnode> = Vec::new();
    for (addr, _) in state.registers().iter() {
        match runs.last_mut() {
            Some(run) if run.offset.wrapping_add(run.size as u64) == addr => run.size += 1,
            _ => runs.push(Varnode::register(addr, 1)),
        }
    }
    runs
}
