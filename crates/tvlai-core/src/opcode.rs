//! The p-code opcode vocabulary.

use std::fmt;
use std::str::FromStr;

macro_rules! opcodes {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)*) => {
        /// A p-code operation kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $($(#[$meta])* $variant,)*
        }

        impl Opcode {
            /// Every opcode, in declaration order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Returns the canonical upper-case name (e.g. `INT_ADD`).
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Looks an opcode up by its canonical name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Boolean
    BoolAnd => "BOOL_AND",
    BoolNegate => "BOOL_NEGATE",
    BoolOr => "BOOL_OR",
    BoolXor => "BOOL_XOR",

    // Control transfer
    Branch => "BRANCH",
    BranchInd => "BRANCHIND",
    Call => "CALL",
    CallInd => "CALLIND",
    CallOther => "CALLOTHER",
    CBranch => "CBRANCH",
    Return => "RETURN",

    // Data movement
    Cast => "CAST",
    Copy => "COPY",
    Load => "LOAD",
    Store => "STORE",
    Piece => "PIECE",
    Subpiece => "SUBPIECE",

    // Floating point
    FloatAbs => "FLOAT_ABS",
    FloatAdd => "FLOAT_ADD",
    FloatCeil => "FLOAT_CEIL",
    FloatDiv => "FLOAT_DIV",
    FloatEqual => "FLOAT_EQUAL",
    FloatFloat2Float => "FLOAT_FLOAT2FLOAT",
    FloatFloor => "FLOAT_FLOOR",
    FloatInt2Float => "FLOAT_INT2FLOAT",
    FloatLess => "FLOAT_LESS",
    FloatLessEqual => "FLOAT_LESSEQUAL",
    FloatMult => "FLOAT_MULT",
    FloatNan => "FLOAT_NAN",
    FloatNeg => "FLOAT_NEG",
    FloatNotEqual => "FLOAT_NOTEQUAL",
    FloatRound => "FLOAT_ROUND",
    FloatSqrt => "FLOAT_SQRT",
    FloatSub => "FLOAT_SUB",
    FloatTrunc => "FLOAT_TRUNC",

    // Integer
    Int2Comp => "INT_2COMP",
    IntAdd => "INT_ADD",
    IntAnd => "INT_AND",
    IntCarry => "INT_CARRY",
    IntDiv => "INT_DIV",
    IntEqual => "INT_EQUAL",
    IntLeft => "INT_LEFT",
    IntLess => "INT_LESS",
    IntLessEqual => "INT_LESSEQUAL",
    IntMult => "INT_MULT",
    IntNegate => "INT_NEGATE",
    IntNotEqual => "INT_NOTEQUAL",
    IntOr => "INT_OR",
    IntRem => "INT_REM",
    IntRight => "INT_RIGHT",
    IntSBorrow => "INT_SBORROW",
    IntSCarry => "INT_SCARRY",
    IntSDiv => "INT_SDIV",
    IntSext => "INT_SEXT",
    IntSLess => "INT_SLESS",
    IntSLessEqual => "INT_SLESSEQUAL",
    IntSRem => "INT_SREM",
    IntSRight => "INT_SRIGHT",
    IntSub => "INT_SUB",
    IntXor => "INT_XOR",
    IntZext => "INT_ZEXT",

    // Pseudo operations
    CPoolRef => "CPOOLREF",
    Indirect => "INDIRECT",
    MultiEqual => "MULTIEQUAL",
    New => "NEW",
    PtrAdd => "PTRADD",
    PtrSub => "PTRSUB",
    SegmentOp => "SEGMENTOP",
    /// Placeholder emitted for instructions the lifter could not translate.
    Unimplemented => "UNIMPLEMENTED",
}

impl Opcode {
    /// Returns true for the FLOAT_* family.
    pub fn is_float(&self) -> bool {
        self.name().starts_with("FLOAT_")
    }

    /// Returns true for ops that transfer control.
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            Self::Branch
                | Self::BranchInd
                | Self::Call
                | Self::CallInd
                | Self::CBranch
                | Self::Return
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown opcode `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_size() {
        assert_eq!(Opcode::ALL.len(), 69);
    }

    #[test]
    fn test_names_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_name(op.name()), Some(*op));
        }
        assert_eq!("INT_SRIGHT".parse::<Opcode>(), Ok(Opcode::IntSRight));
        assert!("INT_FROB".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_classification() {
        assert!(Opcode::FloatNan.is_float());
        assert!(!Opcode::IntAdd.is_float());
        assert!(Opcode::CBranch.is_control_transfer());
        assert!(!Opcode::CallOther.is_control_transfer());
    }
}
