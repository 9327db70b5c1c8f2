//! P-code ops and the instruction blocks that group them.

use crate::{Error, Opcode, Result, Varnode};
use std::fmt;

/// A single three-address p-code operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcodeOp {
    /// Operation kind.
    pub opcode: Opcode,
    /// Inputs in operand order.
    pub inputs: Vec<Varnode>,
    /// Output, for ops that produce a value.
    pub output: Option<Varnode>,
}

impl PcodeOp {
    /// Creates an op with no operands.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            inputs: Vec::new(),
            output: None,
        }
    }

    /// Adds an input.
    pub fn with_input(mut self, input: Varnode) -> Self {
        self.inputs.push(input);
        self
    }

    /// Sets the inputs.
    pub fn with_inputs(mut self, inputs: Vec<Varnode>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the output.
    pub fn with_output(mut self, output: Varnode) -> Self {
        self.output = Some(output);
        self
    }

    /// Returns input `index`, or an error naming the op if it is absent.
    pub fn input(&self, index: usize) -> Result<&Varnode> {
        self.inputs.get(index).ok_or(Error::MissingInput {
            opcode: self.opcode,
            index,
        })
    }

    /// Returns the output, or an error if the op has none.
    pub fn output(&self) -> Result<&Varnode> {
        self.output.as_ref().ok_or(Error::MissingOutput(self.opcode))
    }
}

impl fmt::Display for PcodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(out) => write!(f, "{} {}", out, self.opcode)?,
            None => write!(f, "--- {}", self.opcode)?,
        }
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, " ,")?;
            }
            write!(f, " {}", input)?;
        }
        Ok(())
    }
}

/// One machine instruction and its p-code translation.
///
/// Temporaries written by the ops of one block are assumed not to be read by
/// any other block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the machine instruction.
    pub address: u64,
    /// Disassembly text, if known.
    pub mnemonic: String,
    /// P-code, in execution order.
    pub ops: Vec<PcodeOp>,
}

impl Instruction {
    /// Creates an empty block at `address`.
    pub fn new(address: u64, mnemonic: impl Into<String>) -> Self {
        Self {
            address,
            mnemonic: mnemonic.into(),
            ops: Vec::new(),
        }
    }

    /// Adds an op.
    pub fn with_op(mut self, op: PcodeOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Sets the ops.
    pub fn with_ops(mut self, ops: Vec<PcodeOp>) -> Self {
        self.ops = ops;
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:", self.address)?;
        if !self.mnemonic.is_empty() {
            write!(f, " {}", self.mnemonic)?;
        }
        for op in &self.ops {
            write!(f, "\n    {}", op)?;
        }
        Ok(())
    }
}
