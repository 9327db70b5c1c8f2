//! Sweep driver - main interface for running an analysis.

use crate::bitvec::BitVector;
use crate::interpreter::TvlInterpreter;
use crate::state::{AbstractState, DestinationPolicy};
use crate::visitor::{semantics, HavocShape, PcodeVisitor, Semantics};
use crate::{EmulationError, EmulationResult};
use std::fmt;
use tvlai_core::{Endianness, Instruction, Opcode, PcodeOp, Varnode};

/// What to do when an op has no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnimplementedPolicy {
    /// Report and stop the sweep, keeping the state accumulated so far.
    #[default]
    Halt,
    /// Report, leave the state alone and continue.
    Skip,
    /// Report, bind the op's output to Unknown and continue.
    Havoc,
}

/// What to do with branches, calls and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlowPolicy {
    /// Treat them as unimplemented.
    #[default]
    Halt,
    /// Record them and continue with the next op (straight-line analysis).
    FallThrough,
}

/// Configuration for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Byte order of registers and memory.
    pub endianness: Endianness,
    /// Handling of ops without a transfer function.
    pub on_unimplemented: UnimplementedPolicy,
    /// Handling of control transfers.
    pub on_control_flow: ControlFlowPolicy,
    /// Handling of writes to constants and memory-space varnodes.
    pub destinations: DestinationPolicy,
    /// Drop temporaries at the end of every instruction block.
    pub scope_temporaries: bool,
    /// Maximum number of instruction blocks per run.
    pub max_instructions: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endianness: Endianness::Little,
            on_unimplemented: UnimplementedPolicy::Halt,
            on_control_flow: ControlFlowPolicy::Halt,
            destinations: DestinationPolicy::Warn,
            scope_temporaries: true,
            max_instructions: 10000,
        }
    }
}

/// A reported occurrence during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Address of the instruction block.
    pub address: u64,
    /// Position of the op within its block.
    pub op_index: usize,
    pub opcode: Opcode,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x}[{}] {}: {}",
            self.address, self.op_index, self.opcode, self.message
        )
    }
}

/// Reason why a sweep stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every instruction was processed.
    EndOfInstructions,
    /// Processed the maximum number of instructions.
    MaxInstructions,
    /// Halted on an op with no handler.
    Unimplemented { address: u64, capability: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfInstructions => write!(f, "end of instructions"),
            Self::MaxInstructions => write!(f, "instruction limit reached"),
            Self::Unimplemented {
                address,
                capability,
            } => write!(f, "unimplemented {capability} at {address:#x}"),
        }
    }
}

/// Result of a sweep.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// Final abstract state.
    pub state: AbstractState,
    /// Why the sweep stopped.
    pub stop_reason: StopReason,
    /// Number of instruction blocks entered.
    pub instruction_count: usize,
    /// Number of ops dispatched.
    pub op_count: usize,
    /// Everything reported along the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks instruction blocks in order over one abstract state.
#[derive(Debug, Clone)]
pub struct Analyzer {
    interpreter: TvlInterpreter,
    config: AnalyzerConfig,
    instruction_count: usize,
    op_count: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Analyzer {
    /// Create an analyzer over a fully Unknown state.
    pub fn new(config: AnalyzerConfig) -> Self {
        let state = AbstractState::new(config.endianness);
        Self::from_state(config, state)
    }

    /// Continue from an existing state. The configured destination policy
    /// replaces the state's.
    pub fn from_state(config: AnalyzerConfig, state: AbstractState) -> Self {
        let state = state.with_destination_policy(config.destinations);
        Self {
            interpreter: TvlInterpreter::from_state(state),
            config,
            instruction_count: 0,
            op_count: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Get the current abstract state.
    pub fn state(&self) -> &AbstractState {
        self.interpreter.state()
    }

    /// Get a mutable reference to the abstract state.
    pub fn state_mut(&mut self) -> &mut AbstractState {
        self.interpreter.state_mut()
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Seed a known value.
    pub fn set_concrete(&mut self, vn: &Varnode, value: u64) -> EmulationResult<()> {
        self.interpreter.set_concrete(vn, value)
    }

    /// Get the current value of an operand.
    pub fn value_of(&self, vn: &Varnode) -> EmulationResult<BitVector> {
        self.interpreter.value_of(vn)
    }

    /// An independent analyzer for exploring another path.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Reset to a fully Unknown state.
    pub fn reset(&mut self) {
        self.state_mut().clear();
        self.instruction_count = 0;
        self.op_count = 0;
        self.diagnostics.clear();
    }

    /// Process one instruction block.
    ///
    /// Returns `Some` if the sweep must stop. Unimplemented capabilities are
    /// handled by policy; any other error aborts.
    pub fn step(&mut self, inst: &Instruction) -> EmulationResult<Option<StopReason>> {
        tracing::debug!("step {:#x} {}", inst.address, inst.mnemonic);
        self.instruction_count += 1;

        for (index, op) in inst.ops.iter().enumerate() {
            self.op_count += 1;

            if op.opcode.is_control_transfer()
                && self.config.on_control_flow == ControlFlowPolicy::FallThrough
            {
                self.report(inst, index, op, "control transfer not followed".to_string());
                continue;
            }

            match self.interpreter.visit(op) {
                Ok(()) => {}
                Err(EmulationError::Unimplemented { capability }) => {
                    tracing::warn!(%op, %capability, "unimplemented at {:#x}", inst.address);
                    self.report(inst, index, op, format!("unimplemented {capability}"));
                    match self.config.on_unimplemented {
                        UnimplementedPolicy::Halt => {
                            return Ok(Some(StopReason::Unimplemented {
                                address: inst.address,
                                capability,
                            }));
                        }
                        UnimplementedPolicy::Skip => {}
                        UnimplementedPolicy::Havoc => {
                            self.interpreter.havoc(op, havoc_shape(op.opcode))?;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if self.config.scope_temporaries {
            self.state_mut().clear_temporaries();
        }
        Ok(None)
    }

    /// Process instruction blocks strictly in order until one stops the
    /// sweep or the instruction limit is reached.
    pub fn run(&mut self, instructions: &[Instruction]) -> EmulationResult<SweepResult> {
        let mut stop_reason = StopReason::EndOfInstructions;
        let mut executed = 0;

        for inst in instructions {
            if executed >= self.config.max_instructions {
                stop_reason = StopReason::MaxInstructions;
                break;
            }
            executed += 1;
            if let Some(reason) = self.step(inst)? {
                stop_reason = reason;
                break;
            }
        }

        tracing::debug!(
            instructions = self.instruction_count,
            ops = self.op_count,
            %stop_reason,
            "sweep finished"
        );

        Ok(SweepResult {
            state: self.state().clone(),
            stop_reason,
            instruction_count: self.instruction_count,
            op_count: self.op_count,
            diagnostics: self.diagnostics.clone(),
        })
    }

    fn report(&mut self, inst: &Instruction, op_index: usize, op: &PcodeOp, message: String) {
        self.diagnostics.push(Diagnostic {
            address: inst.address,
            op_index,
            opcode: op.opcode,
            message,
        });
    }
}

fn havoc_shape(opcode: Opcode) -> HavocShape {
    match semantics(opcode) {
        Semantics::Havoc(shape) => shape,
        _ => HavocShape::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvlai_core::{AddressSpace, SpaceId};

    const EAX: Varnode = Varnode {
        space: AddressSpace::Register,
        offset: 0,
        size: 4,
    };
    const TMP: Varnode = Varnode {
        space: AddressSpace::Unique,
        offset: 0x100,
        size: 4,
    };

    fn make_inst(addr: u64, ops: Vec<PcodeOp>) -> Instruction {
        Instruction::new(addr, "").with_ops(ops)
    }

    fn copy(out: Varnode, input: Varnode) -> PcodeOp {
        PcodeOp::new(Opcode::Copy).with_output(out).with_input(input)
    }

    fn add(out: Varnode, a: Varnode, b: Varnode) -> PcodeOp {
        PcodeOp::new(Opcode::IntAdd)
            .with_output(out)
            .with_input(a)
            .with_input(b)
    }

    fn branch() -> PcodeOp {
        PcodeOp::new(Opcode::Branch).with_input(Varnode::constant(0x2000, 8))
    }

    fn callother(out: Varnode) -> PcodeOp {
        PcodeOp::new(Opcode::CallOther)
            .with_output(out)
            .with_input(Varnode::constant(0, 4))
    }

    #[test]
    fn test_simple_sweep() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        analyzer.set_concrete(&EAX, 10).unwrap();

        let instructions = vec![
            make_inst(0x1000, vec![add(EAX, EAX, Varnode::constant(5, 4))]),
            make_inst(0x1003, vec![add(EAX, EAX, Varnode::constant(1, 4))]),
        ];
        let result = analyzer.run(&instructions).unwrap();

        assert_eq!(result.stop_reason, StopReason::EndOfInstructions);
        assert_eq!(result.instruction_count, 2);
        assert_eq!(result.op_count, 2);
        assert_eq!(result.state.lookup(&EAX).unwrap().as_u64(), Some(16));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_temporaries_are_scoped_to_a_block() {
        let instructions = vec![
            make_inst(0x1000, vec![copy(TMP, Varnode::constant(7, 4))]),
            make_inst(0x1001, vec![copy(EAX, TMP)]),
        ];

        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        analyzer.run(&instructions).unwrap();
        assert_eq!(analyzer.value_of(&EAX).unwrap(), BitVector::unknown(32));

        let mut analyzer = Analyzer::new(AnalyzerConfig {
            scope_temporaries: false,
            ..Default::default()
        });
        analyzer.run(&instructions).unwrap();
        assert_eq!(analyzer.value_of(&EAX).unwrap().as_u64(), Some(7));
    }

    #[test]
    fn test_halt_keeps_accumulated_state() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        let instructions = vec![
            make_inst(0x1000, vec![copy(EAX, Varnode::constant(1, 4)), branch()]),
            make_inst(0x1004, vec![copy(EAX, Varnode::constant(2, 4))]),
        ];
        let result = analyzer.run(&instructions).unwrap();

        assert_eq!(
            result.stop_reason,
            StopReason::Unimplemented {
                address: 0x1000,
                capability: "BRANCH".to_string()
            }
        );
        assert_eq!(result.state.lookup(&EAX).unwrap().as_u64(), Some(1));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].op_index, 1);
        assert_eq!(result.stop_reason.to_string(), "unimplemented BRANCH at 0x1000");
    }

    #[test]
    fn test_skip_and_havoc() {
        let instructions = vec![make_inst(
            0x1000,
            vec![callother(EAX), add(EAX, EAX, Varnode::constant(1, 4))],
        )];

        let mut analyzer = Analyzer::new(AnalyzerConfig {
            on_unimplemented: UnimplementedPolicy::Skip,
            ..Default::default()
        });
        analyzer.set_concrete(&EAX, 1).unwrap();
        let result = analyzer.run(&instructions).unwrap();
        assert_eq!(result.stop_reason, StopReason::EndOfInstructions);
        assert_eq!(result.state.lookup(&EAX).unwrap().as_u64(), Some(2));
        assert_eq!(result.diagnostics[0].message, "unimplemented CALLOTHER");

        let mut analyzer = Analyzer::new(AnalyzerConfig {
            on_unimplemented: UnimplementedPolicy::Havoc,
            ..Default::default()
        });
        analyzer.set_concrete(&EAX, 1).unwrap();
        let result = analyzer.run(&instructions).unwrap();
        assert_eq!(result.state.lookup(&EAX).unwrap(), BitVector::unknown(32));
        assert_eq!(analyzer.diagnostics(), result.diagnostics.as_slice());
    }

    #[test]
    fn test_reset() {
        let mut analyzer = Analyzer::new(AnalyzerConfig {
            on_unimplemented: UnimplementedPolicy::Skip,
            ..Default::default()
        });
        analyzer.set_concrete(&EAX, 1).unwrap();
        analyzer
            .run(&[make_inst(0x1000, vec![callother(TMP)])])
            .unwrap();
        assert_eq!(analyzer.diagnostics().len(), 1);

        analyzer.reset();
        assert!(analyzer.diagnostics().is_empty());
        assert_eq!(analyzer.value_of(&EAX).unwrap(), BitVector::unknown(32));

        let result = analyzer.run(&[]).unwrap();
        assert_eq!(result.instruction_count, 0);
        assert_eq!(result.op_count, 0);
    }

    #[test]
    fn test_fall_through_control_flow() {
        let mut analyzer = Analyzer::new(AnalyzerConfig {
            on_control_flow: ControlFlowPolicy::FallThrough,
            ..Default::default()
        });
        let instructions = vec![
            make_inst(0x1000, vec![branch()]),
            make_inst(0x1004, vec![copy(EAX, Varnode::constant(2, 4))]),
        ];
        let result = analyzer.run(&instructions).unwrap();
        assert_eq!(result.stop_reason, StopReason::EndOfInstructions);
        assert_eq!(result.state.lookup(&EAX).unwrap().as_u64(), Some(2));
        assert_eq!(result.diagnostics[0].opcode, Opcode::Branch);
    }

    #[test]
    fn test_max_instructions() {
        let mut analyzer = Analyzer::new(AnalyzerConfig {
            max_instructions: 2,
            ..Default::default()
        });
        let instructions: Vec<_> = (0..5)
            .map(|i| make_inst(0x1000 + i, vec![add(EAX, EAX, Varnode::constant(1, 4))]))
            .collect();
        analyzer.set_concrete(&EAX, 0).unwrap();
        let result = analyzer.run(&instructions).unwrap();
        assert_eq!(result.stop_reason, StopReason::MaxInstructions);
        assert_eq!(result.state.lookup(&EAX).unwrap().as_u64(), Some(2));
    }

    #[test]
    fn test_strict_destinations_abort() {
        let mut analyzer = Analyzer::new(AnalyzerConfig {
            destinations: DestinationPolicy::Reject,
            ..Default::default()
        });
        let ram = Varnode::new(AddressSpace::Other(SpaceId(0x1b1)), 0, 4);
        let instructions = vec![make_inst(0x1000, vec![copy(ram, Varnode::constant(1, 4))])];
        assert_eq!(
            analyzer.run(&instructions).unwrap_err(),
            EmulationError::UnrecognizedDestination(ram)
        );
    }

    #[test]
    fn test_fork_explores_independently() {
        let mut base = Analyzer::new(AnalyzerConfig::default());
        base.set_concrete(&EAX, 1).unwrap();

        let mut fork = base.fork();
        fork.run(&[make_inst(0x1000, vec![add(EAX, EAX, EAX)])])
            .unwrap();

        assert_eq!(base.value_of(&EAX).unwrap().as_u64(), Some(1));
        assert_eq!(fork.value_of(&EAX).unwrap().as_u64(), Some(2));
    }
}
