//! Three-valued logic.
//!
//! A `Trit` is one abstract bit: definitely 0, definitely 1, or Unknown
//! (either value is possible). Each trit is encoded as the set of concrete
//! bits it admits: bit 0 means "may be 0", bit 1 means "may be 1". The empty
//! set `00` is never produced by any operation.

use std::fmt;

/// One three-valued bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Trit {
    /// Definitely 0.
    Zero = 0b01,
    /// Definitely 1.
    One = 0b10,
    /// Either 0 or 1.
    Unknown = 0b11,
}

use Trit::{One as O, Unknown as U, Zero as Z};

// Tables are indexed by `Trit::index`: Zero, Unknown, One.
const NOT: [Trit; 3] = [O, U, Z];

const AND: [[Trit; 3]; 3] = [[Z, Z, Z], [Z, U, U], [Z, U, O]];

const OR: [[Trit; 3]; 3] = [[Z, U, O], [U, U, O], [O, O, O]];

const XOR: [[Trit; 3]; 3] = [[Z, U, O], [U, U, U], [O, U, Z]];

/// Full-adder sum, indexed `[x][y][carry_in]`.
const SUM: [[[Trit; 3]; 3]; 3] = [
    [[Z, U, O], [U, U, U], [O, U, Z]],
    [[U, U, U], [U, U, U], [U, U, U]],
    [[O, U, Z], [U, U, U], [Z, U, O]],
];

/// Full-adder carry-out, indexed `[x][y][carry_in]`.
const CARRY: [[[Trit; 3]; 3]; 3] = [
    [[Z, Z, Z], [Z, U, U], [Z, U, O]],
    [[Z, U, U], [U, U, U], [U, U, O]],
    [[Z, U, O], [U, U, O], [O, O, O]],
];

impl Trit {
    /// All three values, in table order.
    pub const ALL: [Trit; 3] = [Z, U, O];

    /// Decodes a 2-bit pattern. The reserved pattern `00` yields `None`.
    #[inline]
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b01 => Some(Z),
            0b10 => Some(O),
            0b11 => Some(U),
            _ => None,
        }
    }

    /// The 2-bit encoding.
    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// A known trit for a concrete bit.
    #[inline]
    pub fn from_bool(bit: bool) -> Self {
        if bit {
            O
        } else {
            Z
        }
    }

    /// Row/column of this value in the operation tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Z => 0,
            U => 1,
            O => 2,
        }
    }

    /// Returns true for Zero and One.
    #[inline]
    pub fn is_known(self) -> bool {
        self != U
    }

    /// The concrete bit, if known.
    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Z => Some(false),
            O => Some(true),
            U => None,
        }
    }

    /// Returns true if the concrete `bit` is admitted.
    #[inline]
    pub fn contains(self, bit: bool) -> bool {
        self.bits() & (1 << bit as u8) != 0
    }

    #[inline]
    pub fn not(self) -> Self {
        NOT[self.index()]
    }

    #[inline]
    pub fn and(self, other: Self) -> Self {
        AND[self.index()][other.index()]
    }

    #[inline]
    pub fn or(self, other: Self) -> Self {
        OR[self.index()][other.index()]
    }

    #[inline]
    pub fn xor(self, other: Self) -> Self {
        XOR[self.index()][other.index()]
    }

    /// Least upper bound: equal values are kept, differing values become
    /// Unknown.
    #[inline]
    pub fn join(self, other: Self) -> Self {
        // Union of the admitted sets; never empty since neither input is.
        match Self::from_bits(self.bits() | other.bits()) {
            Some(t) => t,
            None => U,
        }
    }

    /// One step of a ripple-carry adder: returns `(sum, carry_out)`.
    #[inline]
    pub fn full_add(x: Self, y: Self, carry_in: Self) -> (Self, Self) {
        let (i, j, k) = (x.index(), y.index(), carry_in.index());
        (SUM[i][j][k], CARRY[i][j][k])
    }

    /// Rendering character: `0`, `1` or `?`.
    pub fn to_char(self) -> char {
        match self {
            Z => '0',
            O => '1',
            U => '?',
        }
    }

    /// Parses a rendering character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Z),
            '1' => Some(O),
            '?' => Some(U),
            _ => None,
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl From<bool> for Trit {
    fn from(bit: bool) -> Self {
        Self::from_bool(bit)
    }
}
