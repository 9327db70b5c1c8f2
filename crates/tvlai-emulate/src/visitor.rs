//! Generic p-code dispatch.
//!
//! [`semantics`] binds every opcode to exactly one family. The match has no
//! wildcard arm, so a new opcode does not compile until it is classified.
//! [`PcodeVisitor`] routes ops to one handler per family; every handler it
//! does not override reports an unimplemented capability naming the opcode
//! or operand kind, which the caller may treat as recoverable.

use crate::{EmulationError, EmulationResult};
use tvlai_core::{AddressSpace, Opcode, PcodeOp, Varnode};

/// Single-input operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Bitwise complement (INT_NEGATE).
    Not,
    /// Two's-complement negation (INT_2COMP).
    Neg,
    /// Logical not of bit 0 (BOOL_NEGATE).
    BoolNot,
}

/// Two-input operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
    ShiftRightSigned,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    SignedLess,
    SignedLessEqual,
    Carry,
    SignedCarry,
    SignedBorrow,
    BoolAnd,
    BoolOr,
    BoolXor,
}

impl BinaryOp {
    /// Returns true if the output is boolean-shaped (only bit 0 carries
    /// information).
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::SignedLess
                | Self::SignedLessEqual
                | Self::Carry
                | Self::SignedCarry
                | Self::SignedBorrow
                | Self::BoolAnd
                | Self::BoolOr
                | Self::BoolXor
        )
    }
}

/// How the new high bits of a widening are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Zero,
    Sign,
}

/// Control transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTransfer {
    Branch,
    BranchInd,
    Call,
    CallInd,
    CBranch,
    Return,
}

/// Shape of the Unknown value bound by a havoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HavocShape {
    /// Every output bit is Unknown.
    Full,
    /// Bit 0 is Unknown, the rest are Zero.
    Boolean,
}

/// The family an opcode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantics {
    Copy,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Extend(Extension),
    Load,
    Store,
    Control(ControlTransfer),
    /// No precise transfer function: the output becomes Unknown.
    Havoc(HavocShape),
    /// Never handled.
    Unsupported,
}

/// Classify an opcode.
pub fn semantics(opcode: Opcode) -> Semantics {
    use Semantics::*;
    match opcode {
        Opcode::Copy | Opcode::Cast => Copy,

        Opcode::IntNegate => Unary(UnaryOp::Not),
        Opcode::Int2Comp => Unary(UnaryOp::Neg),
        Opcode::BoolNegate => Unary(UnaryOp::BoolNot),

        Opcode::IntAdd => Binary(BinaryOp::Add),
        Opcode::IntSub => Binary(BinaryOp::Sub),
        Opcode::IntMult => Binary(BinaryOp::Mul),
        Opcode::IntAnd => Binary(BinaryOp::And),
        Opcode::IntOr => Binary(BinaryOp::Or),
        Opcode::IntXor => Binary(BinaryOp::Xor),
        Opcode::IntLeft => Binary(BinaryOp::ShiftLeft),
        Opcode::IntRight => Binary(BinaryOp::ShiftRight),
        Opcode::IntSRight => Binary(BinaryOp::ShiftRightSigned),
        Opcode::IntEqual => Binary(BinaryOp::Equal),
        Opcode::IntNotEqual => Binary(BinaryOp::NotEqual),
        Opcode::IntLess => Binary(BinaryOp::Less),
        Opcode::IntLessEqual => Binary(BinaryOp::LessEqual),
        Opcode::IntSLess => Binary(BinaryOp::SignedLess),
        Opcode::IntSLessEqual => Binary(BinaryOp::SignedLessEqual),
        Opcode::IntCarry => Binary(BinaryOp::Carry),
        Opcode::IntSCarry => Binary(BinaryOp::SignedCarry),
        Opcode::IntSBorrow => Binary(BinaryOp::SignedBorrow),
        Opcode::BoolAnd => Binary(BinaryOp::BoolAnd),
        Opcode::BoolOr => Binary(BinaryOp::BoolOr),
        Opcode::BoolXor => Binary(BinaryOp::BoolXor),

        Opcode::IntZext => Extend(Extension::Zero),
        Opcode::IntSext => Extend(Extension::Sign),

        Opcode::Load => Load,
        Opcode::Store => Store,

        Opcode::Branch => Control(ControlTransfer::Branch),
        Opcode::BranchInd => Control(ControlTransfer::BranchInd),
        Opcode::Call => Control(ControlTransfer::Call),
        Opcode::CallInd => Control(ControlTransfer::CallInd),
        Opcode::CBranch => Control(ControlTransfer::CBranch),
        Opcode::Return => Control(ControlTransfer::Return),

        Opcode::FloatEqual
        | Opcode::FloatNotEqual
        | Opcode::FloatLess
        | Opcode::FloatLessEqual
        | Opcode::FloatNan => Havoc(HavocShape::Boolean),

        Opcode::FloatAbs
        | Opcode::FloatAdd
        | Opcode::FloatCeil
        | Opcode::FloatDiv
        | Opcode::FloatFloat2Float
        | Opcode::FloatFloor
        | Opcode::FloatInt2Float
        | Opcode::FloatMult
        | Opcode::FloatNeg
        | Opcode::FloatRound
        | Opcode::FloatSqrt
        | Opcode::FloatSub
        | Opcode::FloatTrunc
        | Opcode::IntDiv
        | Opcode::IntRem
        | Opcode::IntSDiv
        | Opcode::IntSRem
        | Opcode::Piece
        | Opcode::Subpiece
        | Opcode::PtrAdd
        | Opcode::PtrSub
        | Opcode::MultiEqual
        | Opcode::Indirect
        | Opcode::New
        | Opcode::CPoolRef => Havoc(HavocShape::Full),

        Opcode::CallOther | Opcode::SegmentOp | Opcode::Unimplemented => Unsupported,
    }
}

fn unimplemented_op(op: &PcodeOp) -> EmulationError {
    EmulationError::unimplemented(op.opcode.name())
}

/// Dispatches p-code ops to per-family handlers.
///
/// Implementors override the handlers they support. `before` and `after`
/// bracket every dispatch, including failed ones.
pub trait PcodeVisitor {
    /// What an operand evaluates to.
    type Value;

    fn before(&mut self, _op: &PcodeOp) {}

    fn after(&mut self, _op: &PcodeOp) {}

    /// Dispatch one op.
    fn visit(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        self.before(op);
        let result = match semantics(op.opcode) {
            Semantics::Copy => self.visit_copy(op),
            Semantics::Unary(kind) => self.visit_unary(op, kind),
            Semantics::Binary(kind) => self.visit_binary(op, kind),
            Semantics::Extend(kind) => self.visit_extend(op, kind),
            Semantics::Load => self.visit_load(op),
            Semantics::Store => self.visit_store(op),
            Semantics::Control(kind) => self.visit_control(op, kind),
            Semantics::Havoc(shape) => self.visit_havoc(op, shape),
            Semantics::Unsupported => Err(unimplemented_op(op)),
        };
        self.after(op);
        result
    }

    // ==================== Operands ====================

    /// Evaluate an operand by its space.
    fn visit_varnode(&mut self, vn: &Varnode) -> EmulationResult<Self::Value> {
        match vn.space {
            AddressSpace::Constant => self.visit_constant(vn),
            AddressSpace::Register => self.visit_register(vn),
            AddressSpace::Unique => self.visit_unique(vn),
            AddressSpace::Other(_) => self.visit_other(vn),
        }
    }

    fn visit_constant(&mut self, _vn: &Varnode) -> EmulationResult<Self::Value> {
        Err(EmulationError::unimplemented("constant varnode"))
    }

    fn visit_register(&mut self, _vn: &Varnode) -> EmulationResult<Self::Value> {
        Err(EmulationError::unimplemented("register varnode"))
    }

    fn visit_unique(&mut self, _vn: &Varnode) -> EmulationResult<Self::Value> {
        Err(EmulationError::unimplemented("unique varnode"))
    }

    fn visit_other(&mut self, vn: &Varnode) -> EmulationResult<Self::Value> {
        Err(EmulationError::unimplemented(format!(
            "{} varnode",
            vn.space.name()
        )))
    }

    // ==================== Families ====================

    fn visit_copy(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_unary(&mut self, op: &PcodeOp, _kind: UnaryOp) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_binary(&mut self, op: &PcodeOp, _kind: BinaryOp) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_extend(&mut self, op: &PcodeOp, _kind: Extension) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_load(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_store(&mut self, op: &PcodeOp) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_control(&mut self, op: &PcodeOp, _kind: ControlTransfer) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }

    fn visit_havoc(&mut self, op: &PcodeOp, _shape: HavocShape) -> EmulationResult<()> {
        Err(unimplemented_op(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvlai_core::SpaceId;

    /// Handles copies only and records hook calls.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl PcodeVisitor for Recorder {
        type Value = u64;

        fn before(&mut self, op: &PcodeOp) {
            self.events.push(format!("before {}", op.opcode));
        }

        fn after(&mut self, op: &PcodeOp) {
            self.events.push(format!("after {}", op.opcode));
        }

        fn visit_constant(&mut self, vn: &Varnode) -> EmulationResult<u64> {
            Ok(vn.offset)
        }

        fn visit_copy(&mut self, op: &PcodeOp) -> EmulationResult<()> {
            let value = self.visit_varnode(op.input(0)?)?;
            self.events.push(format!("copy {value}"));
            Ok(())
        }
    }

    #[test]
    fn test_every_opcode_is_classified_consistently() {
        for &op in Opcode::ALL {
            let sem = semantics(op);
            assert_eq!(
                matches!(sem, Semantics::Control(_)),
                op.is_control_transfer(),
                "{op}"
            );
            if op.is_float() {
                assert!(matches!(sem, Semantics::Havoc(_)), "{op}");
            }
        }
        assert_eq!(semantics(Opcode::FloatNan), Semantics::Havoc(HavocShape::Boolean));
        assert_eq!(semantics(Opcode::CallOther), Semantics::Unsupported);
        assert!(BinaryOp::Carry.is_predicate());
        assert!(!BinaryOp::Mul.is_predicate());
    }

    #[test]
    fn test_hooks_bracket_dispatch() {
        let mut v = Recorder::default();
        let op = PcodeOp::new(Opcode::Copy)
            .with_output(Varnode::register(0, 4))
            .with_input(Varnode::constant(7, 4));
        v.visit(&op).unwrap();
        assert_eq!(v.events, vec!["before COPY", "copy 7", "after COPY"]);
    }

    #[test]
    fn test_defaults_name_the_missing_capability() {
        let mut v = Recorder::default();
        let add = PcodeOp::new(Opcode::IntAdd);
        assert_eq!(v.visit(&add), Err(EmulationError::unimplemented("INT_ADD")));
        // Hooks still run around a failed dispatch.
        assert_eq!(v.events, vec!["before INT_ADD", "after INT_ADD"]);

        let op = PcodeOp::new(Opcode::SegmentOp);
        assert_eq!(
            v.visit(&op),
            Err(EmulationError::unimplemented("SEGMENTOP"))
        );

        let copy_reg = PcodeOp::new(Opcode::Copy)
            .with_output(Varnode::register(0, 4))
            .with_input(Varnode::register(8, 4));
        assert_eq!(
            v.visit(&copy_reg),
            Err(EmulationError::unimplemented("register varnode"))
        );

        let other = Varnode::new(AddressSpace::Other(SpaceId(3)), 0, 4);
        assert_eq!(
            v.visit_varnode(&other),
            Err(EmulationError::unimplemented("space:0x3 varnode"))
        );
    }
}
