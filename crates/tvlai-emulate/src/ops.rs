//! Transfer functions for arithmetic, comparison, shift and multiply.
//!
//! Every function here is sound: for any concrete operands admitted by the
//! abstract inputs, the concrete result is admitted by the abstract output.
//! Comparisons and overflow tests return a single `Trit`; callers shape it
//! into an output with [`BitVector::truth`].

use crate::bitvec::BitVector;
use crate::tvl::Trit;

/// Result of a ripple-carry pass.
struct Ripple {
    sum: BitVector,
    /// Carry out of the most significant position.
    carry_out: Trit,
    /// Carry into the most significant position.
    carry_msb: Trit,
}

impl BitVector {
    fn ripple(&self, other: &Self, carry_in: Trit) -> Ripple {
        let mut carry = carry_in;
        let mut carry_msb = carry_in;
        let mut sum = Vec::with_capacity(self.len());
        for (x, y) in self.iter().zip(other.iter()) {
            carry_msb = carry;
            let (s, c) = Trit::full_add(x, y, carry);
            sum.push(s);
            carry = c;
        }
        Ripple {
            sum: BitVector::from_trits(&sum),
            carry_out: carry,
            carry_msb,
        }
    }

    /// `x + ¬y + 1`, the adder form of `x - y`.
    fn ripple_sub(&self, other: &Self) -> Ripple {
        self.ripple(&other.not(), Trit::One)
    }

    // ==================== Arithmetic ====================

    /// Wrapping addition (INT_ADD).
    pub fn add(&self, other: &Self) -> Self {
        self.check_width("add", other);
        self.ripple(other, Trit::Zero).sum
    }

    /// Wrapping subtraction (INT_SUB).
    pub fn sub(&self, other: &Self) -> Self {
        self.check_width("sub", other);
        self.ripple_sub(other).sum
    }

    /// Two's-complement negation (INT_2COMP).
    pub fn neg(&self) -> Self {
        BitVector::zero(self.len()).sub(self)
    }

    /// Unsigned overflow of `x + y` (INT_CARRY).
    pub fn carry(&self, other: &Self) -> Trit {
        self.check_width("carry", other);
        self.ripple(other, Trit::Zero).carry_out
    }

    /// Signed overflow of `x + y` (INT_SCARRY).
    pub fn scarry(&self, other: &Self) -> Trit {
        self.check_width("scarry", other);
        let r = self.ripple(other, Trit::Zero);
        r.carry_msb.xor(r.carry_out)
    }

    /// Signed overflow of `x - y` (INT_SBORROW).
    pub fn sborrow(&self, other: &Self) -> Trit {
        self.check_width("sborrow", other);
        let r = self.ripple_sub(other);
        r.carry_msb.xor(r.carry_out)
    }

    /// Truncating multiplication (INT_MULT).
    ///
    /// Shift-and-add at double width. A partial product selected by an
    /// Unknown multiplier bit is added with its One bits turned Unknown, since
    /// it may or may not be present.
    pub fn mul(&self, other: &Self) -> Self {
        self.check_width("mul", other);
        let width = self.len();
        let wide = self.zero_extend(2 * width);
        let maybe = wide.map(|t| if t == Trit::One { Trit::Unknown } else { t });

        let mut acc = BitVector::zero(2 * width);
        for (i, bit) in other.iter().enumerate() {
            match bit {
                Trit::Zero => {}
                Trit::One => acc = acc.add(&wide.shl_fixed(i)),
                Trit::Unknown => acc = acc.add(&maybe.shl_fixed(i)),
            }
        }
        acc.truncate(width)
    }

    // ==================== Comparison ====================

    /// INT_EQUAL. A known mismatch anywhere decides the result regardless of
    /// Unknown bits elsewhere.
    pub fn equals(&self, other: &Self) -> Trit {
        self.check_width("equals", other);
        let mut uncertain = false;
        for (x, y) in self.iter().zip(other.iter()) {
            match (x.as_bool(), y.as_bool()) {
                (Some(a), Some(b)) if a != b => return Trit::Zero,
                (Some(_), Some(_)) => {}
                _ => uncertain = true,
            }
        }
        if uncertain {
            Trit::Unknown
        } else {
            Trit::One
        }
    }

    /// INT_NOTEQUAL.
    pub fn not_equals(&self, other: &Self) -> Trit {
        self.equals(other).not()
    }

    /// Unsigned `x < y` (INT_LESS): no carry out of `x - y`.
    pub fn ult(&self, other: &Self) -> Trit {
        self.check_width("ult", other);
        self.ripple_sub(other).carry_out.not()
    }

    /// Unsigned `x <= y` (INT_LESSEQUAL).
    pub fn ule(&self, other: &Self) -> Trit {
        self.ult(other).or(self.equals(other))
    }

    /// Signed `x < y` (INT_SLESS).
    pub fn slt(&self, other: &Self) -> Trit {
        self.check_width("slt", other);
        self.sign().xor(other.sign()).xor(self.ult(other))
    }

    /// Signed `x <= y` (INT_SLESSEQUAL).
    pub fn sle(&self, other: &Self) -> Trit {
        self.slt(other).or(self.equals(other))
    }

    // ==================== Variable shifts ====================

    /// INT_LEFT by a possibly unknown amount.
    pub fn shl(&self, amount: &Self) -> Self {
        self.shift_by(amount, Trit::Zero, |v, k| v.shl_fixed(k))
    }

    /// INT_RIGHT by a possibly unknown amount.
    pub fn shr(&self, amount: &Self) -> Self {
        self.shift_by(amount, Trit::Zero, |v, k| v.shr_fixed(k, Trit::Zero))
    }

    /// INT_SRIGHT by a possibly unknown amount.
    pub fn sar(&self, amount: &Self) -> Self {
        let sign = self.sign();
        self.shift_by(amount, sign, move |v, k| v.shr_fixed(k, sign))
    }

    /// Shifts in power-of-two stages, one per amount bit below
    /// `ceil(log2(width))`. An Unknown stage joins the shifted and unshifted
    /// accumulator. Amount bits at or above that position can only push the
    /// result to all-`fill`: a One there gives all-`fill`, an Unknown joins
    /// all-`fill` into the result.
    fn shift_by(
        &self,
        amount: &Self,
        fill: Trit,
        stage: impl Fn(&BitVector, usize) -> BitVector,
    ) -> Self {
        let width = self.len();
        let all_fill = BitVector::filled(width, fill);
        let stages = if width <= 1 {
            0
        } else {
            (usize::BITS - (width - 1).leading_zeros()) as usize
        };

        let mut high_unknown = false;
        for bit in amount.iter().skip(stages) {
            match bit {
                Trit::Zero => {}
                Trit::One => return all_fill,
                Trit::Unknown => high_unknown = true,
            }
        }

        let mut acc = self.clone();
        for (i, bit) in amount.iter().take(stages).enumerate() {
            match bit {
                Trit::Zero => {}
                Trit::One => acc = stage(&acc, 1 << i),
                Trit::Unknown => acc = acc.join(&stage(&acc, 1 << i)),
            }
        }

        if high_unknown {
            acc.join(&all_fill)
        } else {
            acc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    fn c8(v: u64) -> BitVector {
        BitVector::constant(8, v)
    }

    #[test]
    fn test_concrete_add() {
        let sum = c8(0x12).add(&c8(0x34));
        assert_eq!(sum.as_u64(), Some(0x46));
        assert_eq!(sum.unknown_count(), 0);
        assert_eq!(c8(0xff).add(&c8(2)).as_u64(), Some(1));
    }

    #[test]
    fn test_sub_inverts_add() {
        for (a, b) in [(0x12, 0x34), (0xff, 0x01), (0x00, 0x80), (0x7f, 0x7f)] {
            assert_eq!(c8(a).add(&c8(b)).sub(&c8(b)), c8(a));
        }
        assert_eq!(c8(1).neg().as_u64(), Some(0xff));
        assert_eq!(c8(0).neg().as_u64(), Some(0));
    }

    #[test]
    fn test_add_unknown_low_bit() {
        // ???????? + 1 is fully unknown; 0000000? + 1 is 000000??
        assert_eq!(BitVector::unknown(8).add(&c8(1)), BitVector::unknown(8));
        assert_eq!(bv("0000000?").add(&c8(1)).to_string(), "000000??");
        assert_eq!(bv("0000000?").add(&c8(0)), bv("0000000?"));
    }

    #[test]
    fn test_overflow_flags() {
        assert_eq!(c8(0xff).carry(&c8(1)), Trit::One);
        assert_eq!(c8(0xfe).carry(&c8(1)), Trit::Zero);
        assert_eq!(c8(0x7f).scarry(&c8(1)), Trit::One);
        assert_eq!(c8(0x7e).scarry(&c8(1)), Trit::Zero);
        assert_eq!(c8(0x80).sborrow(&c8(1)), Trit::One);
        assert_eq!(c8(0x81).sborrow(&c8(1)), Trit::Zero);
        assert_eq!(bv("0???????").carry(&c8(1)), Trit::Zero);
        assert_eq!(BitVector::unknown(8).carry(&c8(1)), Trit::Unknown);
    }

    #[test]
    fn test_equality_short_circuit() {
        // Bit 0 differs definitely, so the Unknown bits do not matter.
        assert_eq!(bv("???????1").equals(&bv("???????0")), Trit::Zero);
        assert_eq!(bv("???????1").not_equals(&bv("???????0")), Trit::One);
        assert_eq!(bv("???????1").equals(&bv("00000001")), Trit::Unknown);
        assert_eq!(c8(7).equals(&c8(7)), Trit::One);
        assert_eq!(c8(7).not_equals(&c8(7)), Trit::Zero);
    }

    #[test]
    fn test_orderings() {
        assert_eq!(c8(1).ult(&c8(2)), Trit::One);
        assert_eq!(c8(2).ult(&c8(1)), Trit::Zero);
        assert_eq!(c8(2).ule(&c8(2)), Trit::One);
        assert_eq!(c8(0xff).slt(&c8(0)), Trit::One);
        assert_eq!(c8(0).slt(&c8(0xff)), Trit::Zero);
        assert_eq!(c8(0x80).sle(&c8(0x80)), Trit::One);
        // 0??????? < 1??????? unsigned, regardless of the low bits.
        assert_eq!(bv("0???????").ult(&bv("1???????")), Trit::One);
        assert_eq!(bv("0???????").slt(&bv("1???????")), Trit::Zero);
    }

    #[test]
    fn test_variable_shift_concrete() {
        let v = c8(0b1001_0110);
        assert_eq!(v.shl(&c8(0)), v);
        assert_eq!(v.shl(&c8(3)).as_u64(), Some(0b1011_0000));
        assert_eq!(v.shr(&c8(3)).as_u64(), Some(0b0001_0010));
        assert_eq!(v.sar(&c8(3)).as_u64(), Some(0b1111_0010));
        assert_eq!(v.shl(&c8(8)), BitVector::zero(8));
        assert_eq!(v.shr(&c8(200)), BitVector::zero(8));
        assert_eq!(v.sar(&c8(9)), BitVector::filled(8, Trit::One));
    }

    #[test]
    fn test_variable_shift_unknown_amount() {
        let v = c8(1);
        // Shift by 0 or 1.
        assert_eq!(v.shl(&bv("0000000?")).to_string(), "000000??");
        // Shift by 0 or 8: either 1 or 0, the rest stays zero.
        assert_eq!(v.shl(&bv("0000?000")).to_string(), "0000000?");
        // Amount could be anything.
        let any = v.shl(&BitVector::unknown(8));
        for k in 0..8 {
            assert!(any.admits(1 << k));
        }
        assert!(any.admits(0));
    }

    #[test]
    fn test_shift_non_power_of_two_width() {
        let v = BitVector::constant(24, 0x80_0001);
        assert_eq!(v.shl(&BitVector::constant(24, 4)).as_u64(), Some(0x10));
        assert_eq!(v.shr(&BitVector::constant(24, 23)).as_u64(), Some(1));
        assert_eq!(v.shl(&BitVector::constant(24, 24)), BitVector::zero(24));
    }

    #[test]
    fn test_mul() {
        assert_eq!(c8(7).mul(&c8(6)).as_u64(), Some(42));
        assert_eq!(c8(0x10).mul(&c8(0x10)).as_u64(), Some(0));
        // x * 2 always has a zero low bit.
        assert_eq!(BitVector::unknown(8).mul(&c8(2)).get(0), Trit::Zero);
        // 3 * (0 or 1) is 0 or 3.
        let r = c8(3).mul(&bv("0000000?"));
        assert!(r.admits(0));
        assert!(r.admits(3));
        assert_eq!(r.to_string(), "000000??");
    }
}
