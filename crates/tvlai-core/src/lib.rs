//! # tvlai-core
//!
//! Core abstractions for the tvlai abstract interpreter. This crate defines
//! the p-code IR consumed by the engine: opcodes, varnodes, address spaces,
//! p-code ops grouped into instruction blocks, and a textual listing format
//! for feeding the engine without a disassembler.

pub mod arch;
pub mod error;
pub mod listing;
pub mod opcode;
pub mod pcode;
pub mod varnode;

pub use arch::Endianness;
pub use error::{Error, Result};
pub use listing::parse_listing;
pub use opcode::Opcode;
pub use pcode::{Instruction, PcodeOp};
pub use varnode::{AddressSpace, SpaceId, Varnode};
