//! Packed three-valued bit-vectors.
//!
//! A `BitVector` is a fixed-length sequence of trits, index 0 being the least
//! significant. Trits are packed two bits each, 32 to a `u64`, using the
//! encoding of [`Trit`]. Positions past `len` hold the reserved pattern `00`,
//! so two vectors with the same trits always have the same words.

use crate::tvl::Trit;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const TRITS_PER_WORD: usize = 32;

/// The "may be 0" bit of every packed trit.
const LOW: u64 = 0x5555_5555_5555_5555;

/// Number of words needed for `len` trits.
fn words_for(len: usize) -> usize {
    len.div_ceil(TRITS_PER_WORD)
}

/// A word with every slot set to `trit`.
fn splat(trit: Trit) -> u64 {
    LOW * u64::from(trit.bits())
}

/// Bits of `word` covering trit positions `[start, end)`.
fn span_mask(word: usize, start: usize, end: usize) -> u64 {
    let base = word * TRITS_PER_WORD;
    let lo = base.max(start);
    let hi = (base + TRITS_PER_WORD).min(end);
    if lo >= hi {
        return 0;
    }
    let lo_bit = 2 * (lo - base);
    let hi_bit = 2 * (hi - base);
    let upper = if hi_bit == 64 {
        u64::MAX
    } else {
        (1u64 << hi_bit) - 1
    };
    upper & !((1u64 << lo_bit) - 1)
}

fn shift_words_left(words: &[u64], bits: usize) -> Vec<u64> {
    let n = words.len();
    let (ws, bs) = (bits / 64, bits % 64);
    let mut out = vec![0u64; n];
    for i in ws..n {
        let src = i - ws;
        let mut w = words[src] << bs;
        if bs > 0 && src > 0 {
            w |= words[src - 1] >> (64 - bs);
        }
        out[i] = w;
    }
    out
}

fn shift_words_right(words: &[u64], bits: usize) -> Vec<u64> {
    let n = words.len();
    let (ws, bs) = (bits / 64, bits % 64);
    let mut out = vec![0u64; n];
    for i in 0..n.saturating_sub(ws) {
        let src = i + ws;
        let mut w = words[src] >> bs;
        if bs > 0 && src + 1 < n {
            w |= words[src + 1] << (64 - bs);
        }
        out[i] = w;
    }
    out
}

/// An immutable, fixed-length vector of trits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    len: usize,
    words: Vec<u64>,
}

impl BitVector {
    // ==================== Construction ====================

    /// A vector with every position set to `trit`.
    pub fn filled(len: usize, trit: Trit) -> Self {
        let mut bv = Self {
            len,
            words: vec![splat(trit); words_for(len)],
        };
        bv.clear_padding();
        bv
    }

    /// The fully unknown vector (top) of `len` bits.
    pub fn unknown(len: usize) -> Self {
        Self::filled(len, Trit::Unknown)
    }

    /// The all-zero vector of `len` bits.
    pub fn zero(len: usize) -> Self {
        Self::filled(len, Trit::Zero)
    }

    /// A fully known vector holding the low `len` bits of `value`. Bits past
    /// 64 are zero.
    pub fn constant(len: usize, value: u64) -> Self {
        let mut bv = Self::zero(len);
        for i in 0..len.min(64) {
            if (value >> i) & 1 == 1 {
                bv.set(i, Trit::One);
            }
        }
        bv
    }

    /// A boolean-shaped value: bit 0 carries `trit`, the rest are zero.
    pub fn truth(len: usize, trit: Trit) -> Self {
        let mut bv = Self::zero(len);
        if len > 0 {
            bv.set(0, trit);
        }
        bv
    }

    /// Builds a vector from trits, least significant first.
    pub fn from_trits(trits: &[Trit]) -> Self {
        trits.iter().copied().collect()
    }

    /// Concatenates packed bytes, least significant first.
    pub fn from_bytes(bytes: &[u16]) -> Self {
        let len = bytes.len() * 8;
        let mut words = vec![0u64; words_for(len)];
        for (k, &byte) in bytes.iter().enumerate() {
            words[k / 4] |= u64::from(byte) << ((k % 4) * 16);
        }
        Self { len, words }
    }

    // ==================== Queries ====================

    /// Width in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The trit at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn get(&self, i: usize) -> Trit {
        assert!(i < self.len, "bit {} out of range for width {}", i, self.len);
        let bits = (self.words[i / TRITS_PER_WORD] >> (2 * (i % TRITS_PER_WORD))) & 0b11;
        Trit::from_bits(bits as u8).unwrap_or(Trit::Unknown)
    }

    /// Iterates trits from least to most significant.
    pub fn iter(&self) -> impl Iterator<Item = Trit> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// The most significant trit.
    ///
    /// # Panics
    ///
    /// Panics if the vector is empty.
    pub fn sign(&self) -> Trit {
        assert!(self.len > 0, "sign: empty bit-vector has no sign bit");
        self.get(self.len - 1)
    }

    /// Packed trits of byte `k` (bits `8k..8k+8`).
    pub fn byte(&self, k: usize) -> u16 {
        assert!(8 * k + 8 <= self.len, "byte {} out of range for width {}", k, self.len);
        ((self.words[k / 4] >> ((k % 4) * 16)) & 0xFFFF) as u16
    }

    /// Number of Unknown positions.
    pub fn unknown_count(&self) -> usize {
        self.words
            .iter()
            .map(|w| (w & (w >> 1) & LOW).count_ones() as usize)
            .sum()
    }

    /// Returns true if no position is Unknown.
    pub fn is_fully_known(&self) -> bool {
        self.unknown_count() == 0
    }

    /// The scalar value, if every bit is known and the width is at most 64.
    pub fn as_u64(&self) -> Option<u64> {
        if self.len > 64 {
            return None;
        }
        let mut value = 0u64;
        for (i, t) in self.iter().enumerate() {
            if t.as_bool()? {
                value |= 1 << i;
            }
        }
        Some(value)
    }

    /// Returns true if the concrete `value` is one of the values this vector
    /// describes. Positions past 64 must admit 0.
    pub fn admits(&self, value: u64) -> bool {
        self.iter()
            .enumerate()
            .all(|(i, t)| t.contains(i < 64 && (value >> i) & 1 == 1))
    }

    // ==================== Pointwise operations ====================

    /// Applies `f` to every trit.
    pub fn map(&self, f: impl Fn(Trit) -> Trit) -> Self {
        self.iter().map(f).collect()
    }

    /// Applies `f` to every pair of trits.
    ///
    /// # Panics
    ///
    /// Panics if the widths differ.
    pub fn map2(&self, other: &Self, f: impl Fn(Trit, Trit) -> Trit) -> Self {
        self.check_width("map2", other);
        self.iter().zip(other.iter()).map(|(a, b)| f(a, b)).collect()
    }

    pub fn not(&self) -> Self {
        let words = self
            .words
            .iter()
            .map(|&w| ((w & LOW) << 1) | ((w >> 1) & LOW))
            .collect();
        Self {
            len: self.len,
            words,
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        // may be 1 iff both may be 1; may be 0 iff either may be 0
        self.zip_words("and", other, |a, b| ((a | b) & LOW) | ((a & b) & !LOW))
    }

    pub fn or(&self, other: &Self) -> Self {
        self.zip_words("or", other, |a, b| ((a & b) & LOW) | ((a | b) & !LOW))
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.zip_words("xor", other, |a, b| {
            let (a0, a1) = (a & LOW, (a >> 1) & LOW);
            let (b0, b1) = (b & LOW, (b >> 1) & LOW);
            let r0 = (a0 & b0) | (a1 & b1);
            let r1 = (a1 & b0) | (a0 & b1);
            r0 | (r1 << 1)
        })
    }

    /// Least upper bound: equal positions are kept, differing positions
    /// become Unknown.
    pub fn join(&self, other: &Self) -> Self {
        self.zip_words("join", other, |a, b| a | b)
    }

    // ==================== Width changes ====================

    /// Widens to `len` bits, filling new high bits with Zero.
    ///
    /// # Panics
    ///
    /// Panics if `len` is smaller than the current width.
    pub fn zero_extend(&self, len: usize) -> Self {
        self.extend(len, Trit::Zero)
    }

    /// Widens to `len` bits, filling new high bits with the sign bit.
    ///
    /// # Panics
    ///
    /// Panics if `len` is smaller than the current width.
    pub fn sign_extend(&self, len: usize) -> Self {
        let fill = if self.is_empty() {
            Trit::Zero
        } else {
            self.sign()
        };
        self.extend(len, fill)
    }

    fn extend(&self, len: usize, fill: Trit) -> Self {
        assert!(
            len >= self.len,
            "cannot extend a {}-bit vector to {} bits",
            self.len,
            len
        );
        let mut words = self.words.clone();
        words.resize(words_for(len), 0);
        let mut bv = Self { len, words };
        bv.fill_span(self.len, len, fill);
        bv
    }

    /// Keeps the low `len` bits.
    ///
    /// # Panics
    ///
    /// Panics if `len` is larger than the current width.
    pub fn truncate(&self, len: usize) -> Self {
        self.slice(0, len)
    }

    /// Bits `start..start + len` as a new vector.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        assert!(
            start + len <= self.len,
            "slice {}..{} out of range for width {}",
            start,
            start + len,
            self.len
        );
        let mut words = shift_words_right(&self.words, 2 * start);
        words.truncate(words_for(len));
        let mut bv = Self { len, words };
        bv.clear_padding();
        bv
    }

    // ==================== Fixed shifts ====================

    /// Shifts toward the most significant end by `amount`, filling with
    /// Zero. Shifting by the width or more gives all Zero.
    pub fn shl_fixed(&self, amount: usize) -> Self {
        if amount >= self.len {
            return Self::zero(self.len);
        }
        let mut bv = Self {
            len: self.len,
            words: shift_words_left(&self.words, 2 * amount),
        };
        bv.clear_padding();
        bv.fill_span(0, amount, Trit::Zero);
        bv
    }

    /// Shifts toward the least significant end by `amount`, filling vacated
    /// high bits with `fill`. Shifting by the width or more gives all `fill`.
    pub fn shr_fixed(&self, amount: usize, fill: Trit) -> Self {
        if amount >= self.len {
            return Self::filled(self.len, fill);
        }
        let mut bv = Self {
            len: self.len,
            words: shift_words_right(&self.words, 2 * amount),
        };
        bv.fill_span(self.len - amount, self.len, fill);
        bv
    }

    // ==================== Internals ====================

    pub(crate) fn set(&mut self, i: usize, trit: Trit) {
        assert!(i < self.len, "bit {} out of range for width {}", i, self.len);
        let shift = 2 * (i % TRITS_PER_WORD);
        let w = &mut self.words[i / TRITS_PER_WORD];
        *w = (*w & !(0b11 << shift)) | (u64::from(trit.bits()) << shift);
    }

    pub(crate) fn check_width(&self, op: &str, other: &Self) {
        assert_eq!(
            self.len, other.len,
            "{op}: width mismatch ({} vs {} bits)",
            self.len, other.len
        );
    }

    fn zip_words(&self, op: &str, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        self.check_width(op, other);
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Self {
            len: self.len,
            words,
        }
    }

    fn fill_span(&mut self, start: usize, end: usize, trit: Trit) {
        if start >= end {
            return;
        }
        let pattern = splat(trit);
        for w in start / TRITS_PER_WORD..=(end - 1) / TRITS_PER_WORD {
            let mask = span_mask(w, start, end);
            self.words[w] = (self.words[w] & !mask) | (pattern & mask);
        }
    }

    fn clear_padding(&mut self) {
        let n = self.words.len();
        if n > 0 {
            self.words[n - 1] &= span_mask(n - 1, 0, self.len);
        }
    }
}

impl FromIterator<Trit> for BitVector {
    fn from_iter<I: IntoIterator<Item = Trit>>(iter: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for t in iter {
            if len % TRITS_PER_WORD == 0 {
                words.push(0);
            }
            if let Some(w) = words.last_mut() {
                *w |= u64::from(t.bits()) << (2 * (len % TRITS_PER_WORD));
            }
            len += 1;
        }
        Self { len, words }
    }
}

/// Renders most significant bit first, e.g. `0?10`.
impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.len).rev() {
            write!(f, "{}", self.get(i).to_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}: {})", self.len, self)
    }
}

/// Error parsing a `0`/`1`/`?` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseBitVectorError {
    #[error("empty bit-vector")]
    Empty,
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { position: usize, character: char },
}

/// Parses most significant bit first, the inverse of `Display`.
impl FromStr for BitVector {
    type Err = ParseBitVectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseBitVectorError::Empty);
        }
        let trits = s
            .chars()
            .enumerate()
            .map(|(position, character)| {
                Trit::from_char(character).ok_or(ParseBitVectorError::InvalidCharacter {
                    position,
                    character,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trits.into_iter().rev().collect())
    }
}
