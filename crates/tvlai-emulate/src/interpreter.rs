//! The three-valued interpreter: binds the dispatcher to the bit-vector
//! domain and the abstract state.

use crate::bitvec::BitVector;
use crate::state::AbstractState;
use crate::tvl::Trit;
use crate::visitor::{BinaryOp, Extension, HavocShape, PcodeVisitor, UnaryOp};
use crate::{EmulationError, EmulationResult};
use tvlai_core::{Endianness, PcodeOp, SpaceId, Varnode};

/// Evaluates p-code ops over an [`AbstractState`].
///
/// Control transfers and the ops classified `Unsupported` are left to the
/// default handlers, so they surface as unimplemented capabilities.
#[derive(Debug, Clone, Default)]
pub struct TvlInterpreter {
    state: AbstractState,
}

impl TvlInterpreter {
    /// Create an interpreter over a fully Unknown state.
    pub fn new(endianness: Endianness) -> Self {
        Self::from_state(AbstractState::new(endianness))
    }

    /// Continue from an existing state.
    pub fn from_state(state: AbstractState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AbstractState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AbstractState {
        &mut self.state
    }

    pub fn into_state(self) -> AbstractState {
        self.state
    }

    /// Seed a known value before a sweep (a stack pointer, a flag).
    pub fn set_concrete(&mut self, vn: &Varnode, value: u64) -> EmulationResult<()> {
        self.state.set_concrete(vn, value)
    }

    /// The current abstract value of an operand.
    pub fn value_of(&self, vn: &Varnode) -> EmulationResult<BitVector> {
        self.state.lookup(vn)
    }

    /// Bind the op's output, if any, to Unknown.
    pub fn havoc(&mut self, op: &PcodeOp, shape: HavocShape) -> EmulationResult<()> {
        match &op.output {
            Some(out) => self.state.associate(out, &unknown_of(out, shape)),
            None => Ok(()),
        }
    }

    fn write(&mut self, op: &PcodeOp, value: BitVector) -> EmulationResult<()> {
        let out = op.output()?;
        self.state.associate(out, &value)
    }

    fn operand(&mut self, op: &PcodeOp, index: usize) -> EmulationResult<BitVector> {
        let vn = *op.input(index)?;
        self.visit_varnode(&vn)
    }

    /// The target space and concrete address of a LOAD or STORE, if the
    /// address is known.
    fn memory_target(&mut self, op: &PcodeOp) -> EmulationResult<(SpaceId, Option<u64>)> {
        let space = SpaceId(op.input(0)?.offset);
        let address = self.operand(op, 1)?.as_u64();
        Ok((space, address))
    }
}

fn size_mismatch(op: &PcodeOp, expected: usize, found: usize) -> EmulationError {
    tvlai_core::Error::SizeMismatch {
        opcode: op.opcode,
        expected,
        found,
    }
    .into()
}

fn expect_size(op: &PcodeOp, expected: usize, vn: &Varnode) -> EmulationResult<()> {
    if vn.size == expected {
        Ok(())
    } else {
        Err(size_mismatch(op, expected, vn.size))
    }
}

/// Arithmetic and logic need all three sizes equal, shifts only the value
/// and output, comparisons only the two inputs. Boolean ops read bit 0.
fn check_binary_sizes(op: &PcodeOp, kind: BinaryOp) -> EmulationResult<()> {
    match kind {
        BinaryOp::BoolAnd | BinaryOp::BoolOr | BinaryOp::BoolXor => Ok(()),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight | BinaryOp::ShiftRightSigned => {
            expect_size(op, op.output()?.size, op.input(0)?)
        }
        _ if kind.is_predicate() => expect_size(op, op.input(0)?.size, op.input(1)?),
        _ => {
            let size = op.output()?.size;
            expect_size(op, size, op.input(0)?)?;
            expect_size(op, size, op.input(1)?)
        }
    }
}

fn unknown_of(out: &Varnode, shape: HavocShape) -> BitVector {
    match shape {
        HavocShape::Full => BitVector::unknown(out.bits()),
        HavocShape::Boolean => BitVector::truth(out.bits(), Trit::Unknown),
    }
}

impl PcodeVisitor for TvlInterpreter {
    type Value = BitVector;

    fn before(&mut self, op: &PcodeOp) {
        tracing::debug!(%op, "dispatch");
    }

    fn visit_constant(&mut self, vn: &Varnode) -> EmulationResult<BitVector> {
        Ok(BitVector::constant(vn.bits(), vn.offset))
    }

    fn visit_register(&mut self, vn: &Varnode) -> EmulationResult<BitVector> {
        self.state.lookup(vn)
    }

    fn visit_unique(&mut self, vn: &Varnode) -> EmulationResult<BitVector> {
        self.state.lookup(vn)
    }

    fn visit_copy(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        expect_size(op, op.output()?.size, op.input(0)?)?;
        let value = self.operand(op, 0)?;
        self.write(op, value)
    }

    fn visit_unary(&mut self, op: &PcodeOp, kind: UnaryOp) -> EmulationResult<()> {
        if kind != UnaryOp::BoolNot {
            expect_size(op, op.output()?.size, op.input(0)?)?;
        }
        let x = self.operand(op, 0)?;
        let value = match kind {
            UnaryOp::Not => x.not(),
            UnaryOp::Neg => x.neg(),
            UnaryOp::BoolNot => BitVector::truth(op.output()?.bits(), x.get(0).not()),
        };
        self.write(op, value)
    }

    fn visit_binary(&mut self, op: &PcodeOp, kind: BinaryOp) -> EmulationResult<()> {
        check_binary_sizes(op, kind)?;
        let x = self.operand(op, 0)?;
        let y = self.operand(op, 1)?;
        let bits = op.output()?.bits();
        let truth = |t: Trit| BitVector::truth(bits, t);

        let value = match kind {
            BinaryOp::Add => x.add(&y),
            BinaryOp::Sub => x.sub(&y),
            BinaryOp::Mul => x.mul(&y),
            BinaryOp::And => x.and(&y),
            BinaryOp::Or => x.or(&y),
            BinaryOp::Xor => x.xor(&y),
            BinaryOp::ShiftLeft => x.shl(&y),
            BinaryOp::ShiftRight => x.shr(&y),
            BinaryOp::ShiftRightSigned => x.sar(&y),
            BinaryOp::Equal => truth(x.equals(&y)),
            BinaryOp::NotEqual => truth(x.not_equals(&y)),
            BinaryOp::Less => truth(x.ult(&y)),
            BinaryOp::LessEqual => truth(x.ule(&y)),
            BinaryOp::SignedLess => truth(x.slt(&y)),
            BinaryOp::SignedLessEqual => truth(x.sle(&y)),
            BinaryOp::Carry => truth(x.carry(&y)),
            BinaryOp::SignedCarry => truth(x.scarry(&y)),
            BinaryOp::SignedBorrow => truth(x.sborrow(&y)),
            BinaryOp::BoolAnd => truth(x.get(0).and(y.get(0))),
            BinaryOp::BoolOr => truth(x.get(0).or(y.get(0))),
            BinaryOp::BoolXor => truth(x.get(0).xor(y.get(0))),
        };
        self.write(op, value)
    }

    fn visit_extend(&mut self, op: &PcodeOp, kind: Extension) -> EmulationResult<()> {
        let out = op.output()?.size;
        let input = op.input(0)?.size;
        if input > out {
            return Err(size_mismatch(op, out, input));
        }
        let x = self.operand(op, 0)?;
        let bits = op.output()?.bits();
        let value = match kind {
            Extension::Zero => x.zero_extend(bits),
            Extension::Sign => x.sign_extend(bits),
        };
        self.write(op, value)
    }

    fn visit_load(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        let bits = op.output()?.bits();
        let value = match self.memory_target(op)? {
            (space, Some(address)) => self.state.load(space, address, bits),
            (space, None) => {
                tracing::debug!(%space, "load from unknown address");
                BitVector::unknown(bits)
            }
        };
        self.write(op, value)
    }

    fn visit_store(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        let value = self.operand(op, 2)?;
        match self.memory_target(op)? {
            (space, Some(address)) => self.state.store(space, address, &value),
            (space, None) => {
                tracing::debug!(%space, "store to unknown address, invalidating space");
                self.state.invalidate_space(space);
            }
        }
        Ok(())
    }

    fn visit_havoc(&mut self, op: &PcodeOp, shape: HavocShape) -> EmulationResult<()> {
        let out = op.output()?;
        let value = unknown_of(out, shape);
        self.write(op, value)
    }
}
