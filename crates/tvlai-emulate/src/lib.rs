//! # tvlai-emulate
//!
//! Three-valued abstract interpretation of p-code.
//!
//! This crate provides:
//! - `Trit` and `BitVector`, a packed three-valued (0/1/?) bit-vector domain
//! - Sound transfer functions for logic, arithmetic, comparisons, shifts and
//!   multiplication
//! - `AbstractMemory` and `AbstractState` on persistent maps, so forking a
//!   state is cheap
//! - A generic opcode dispatcher (`PcodeVisitor`) and the interpreter that
//!   binds it to the domain (`TvlInterpreter`)
//! - A sweep driver (`Analyzer`) that walks instruction blocks in order
//!
//! # Example
//!
//! ```ignore
//! use tvlai_core::{parse_listing, Varnode};
//! use tvlai_emulate::{Analyzer, AnalyzerConfig};
//!
//! let blocks = parse_listing(text)?;
//! let mut analyzer = Analyzer::new(AnalyzerConfig::default());
//!
//! // esp = 0x1000
//! analyzer.set_concrete(&Varnode::register(0x10, 4), 0x1000)?;
//!
//! let result = analyzer.run(&blocks)?;
//! println!("al = {}", result.state.lookup(&Varnode::register(0, 1))?);
//! ```

pub mod bitvec;
pub mod executor;
pub mod interpreter;
pub mod memory;
pub mod ops;
pub mod state;
pub mod tvl;
pub mod visitor;

pub use bitvec::{BitVector, ParseBitVectorError};
pub use executor::{
    Analyzer, AnalyzerConfig, ControlFlowPolicy, Diagnostic, StopReason, SweepResult,
    UnimplementedPolicy,
};
pub use interpreter::TvlInterpreter;
pub use memory::AbstractMemory;
pub use state::{AbstractState, DestinationPolicy};
pub use tvl::Trit;
pub use visitor::{
    semantics, BinaryOp, ControlTransfer, Extension, HavocShape, PcodeVisitor, Semantics,
    UnaryOp,
};

use thiserror::Error;
use tvlai_core::Varnode;

/// Errors that can occur during abstract interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulationError {
    /// No handler exists for an opcode or operand kind. Recoverable: the
    /// caller decides whether to halt, skip or havoc.
    #[error("Unimplemented: {capability}")]
    Unimplemented { capability: String },

    /// A write targeted a varnode that is neither a register nor a temporary.
    #[error("Unrecognized destination {0}")]
    UnrecognizedDestination(Varnode),

    /// A read named a varnode that cannot be looked up directly.
    #[error("Unrecognized source {0}")]
    UnrecognizedSource(Varnode),

    /// The op is missing an operand or its operand sizes disagree.
    #[error("Malformed op: {0}")]
    Malformed(#[from] tvlai_core::Error),
}

impl EmulationError {
    /// Creates an unimplemented-capability error.
    pub fn unimplemented(capability: impl Into<String>) -> Self {
        Self::Unimplemented {
            capability: capability.into(),
        }
    }

    /// Returns true for the recoverable unimplemented-capability condition.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

/// Result type for emulation operations.
pub type EmulationResult<T> = Result<T, EmulationError>;
