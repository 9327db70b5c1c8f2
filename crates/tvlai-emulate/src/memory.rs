//! Byte-granular abstract memory.
//!
//! Each address maps to one abstract byte, stored packed. An absent address
//! reads as a fully Unknown byte, so absence and "definitely unknown" cannot
//! be told apart. The map is persistent: cloning is O(1) and clones share
//! structure until written.

use crate::bitvec::BitVector;
use im::OrdMap;
use tvlai_core::Endianness;

/// Packed form of a fully Unknown byte.
const UNKNOWN_BYTE: u16 = 0xFFFF;

/// Abstract contents of one address space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbstractMemory {
    bytes: OrdMap<u64, u16>,
    endianness: Endianness,
}

impl AbstractMemory {
    /// Create an empty (fully Unknown) memory.
    pub fn new(endianness: Endianness) -> Self {
        Self {
            bytes: OrdMap::new(),
            endianness,
        }
    }

    /// Byte order used by the wide accessors.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Number of addresses holding a value.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write one byte.
    ///
    /// # Panics
    ///
    /// Panics if `byte` is not 8 bits wide.
    pub fn store(&mut self, address: u64, byte: &BitVector) {
        assert_eq!(byte.len(), 8, "store: expected a byte, got {} bits", byte.len());
        self.bytes.insert(address, byte.byte(0));
    }

    /// Read one byte.
    pub fn load(&self, address: u64) -> BitVector {
        BitVector::from_bytes(&[self.load_packed(address)])
    }

    /// Write a multi-byte value. Little-endian puts byte `i` at
    /// `address + i`; big-endian puts the most significant byte at `address`.
    ///
    /// # Panics
    ///
    /// Panics if the width is not a multiple of 8.
    pub fn store_wide(&mut self, address: u64, value: &BitVector) {
        assert!(
            value.len() % 8 == 0,
            "store_wide: width {} is not a whole number of bytes",
            value.len()
        );
        let count = value.len() / 8;
        for i in 0..count {
            let addr = address.wrapping_add(i as u64);
            self.bytes.insert(addr, value.byte(self.chunk_index(i, count)));
        }
    }

    /// Read `bits` bits starting at `address`, using the same byte order as
    /// [`store_wide`](Self::store_wide).
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not a multiple of 8.
    pub fn load_wide(&self, address: u64, bits: usize) -> BitVector {
        assert!(
            bits % 8 == 0,
            "load_wide: width {bits} is not a whole number of bytes"
        );
        let count = bits / 8;
        let mut chunks = vec![UNKNOWN_BYTE; count];
        for i in 0..count {
            chunks[self.chunk_index(i, count)] = self.load_packed(address.wrapping_add(i as u64));
        }
        BitVector::from_bytes(&chunks)
    }

    /// Forget everything: every address reads Unknown afterwards.
    pub fn invalidate(&mut self) {
        self.bytes = OrdMap::new();
    }

    /// Stored bytes in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, BitVector)> + '_ {
        self.bytes
            .iter()
            .map(|(&addr, &byte)| (addr, BitVector::from_bytes(&[byte])))
    }

    fn load_packed(&self, address: u64) -> u16 {
        self.bytes.get(&address).copied().unwrap_or(UNKNOWN_BYTE)
    }

    /// Which byte of the value lives at offset `i` of a `count`-byte access.
    fn chunk_index(&self, i: usize, count: usize) -> usize {
        match self.endianness {
            Endianness::Little => i,
            Endianness::Big => count - 1 - i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_reads_unknown() {
        let mem = AbstractMemory::new(Endianness::Little);
        assert_eq!(mem.load(0x1000), BitVector::unknown(8));
        assert_eq!(mem.load_wide(0x1000, 32), BitVector::unknown(32));
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = AbstractMemory::new(Endianness::Little);
        mem.store_wide(0x100, &BitVector::constant(32, 0x1122_3344));
        assert_eq!(mem.load(0x100).as_u64(), Some(0x44));
        assert_eq!(mem.load(0x103).as_u64(), Some(0x11));
        assert_eq!(mem.load_wide(0x100, 32).as_u64(), Some(0x1122_3344));
        assert_eq!(mem.load_wide(0x101, 16).as_u64(), Some(0x2233));
    }

    #[test]
    fn test_big_endian_layout() {
        let mut mem = AbstractMemory::new(Endianness::Big);
        assert_eq!(mem.endianness(), Endianness::Big);
        mem.store_wide(0x100, &BitVector::constant(32, 0x1122_3344));
        assert_eq!(mem.load(0x100).as_u64(), Some(0x11));
        assert_eq!(mem.load(0x103).as_u64(), Some(0x44));
        assert_eq!(mem.load_wide(0x100, 32).as_u64(), Some(0x1122_3344));
        assert_eq!(mem.load_wide(0x102, 16).as_u64(), Some(0x3344));
    }

    #[test]
    fn test_partial_overlap_with_unknown() {
        let mut mem = AbstractMemory::new(Endianness::Little);
        mem.store(0x10, &BitVector::constant(8, 0xab));
        assert_eq!(mem.load_wide(0x10, 16).to_string(), "????????10101011");
    }

    #[test]
    fn test_invalidate() {
        let mut mem = AbstractMemory::new(Endianness::Little);
        mem.store_wide(0, &BitVector::constant(64, 42));
        assert_eq!(mem.len(), 8);
        mem.invalidate();
        assert!(mem.is_empty());
        assert_eq!(mem.load_wide(0, 64), BitVector::unknown(64));
    }

    #[test]
    fn test_clones_are_independent() {
        let mut a = AbstractMemory::new(Endianness::Little);
        a.store(1, &BitVector::constant(8, 1));
        let mut b = a.clone();
        b.store(1, &BitVector::constant(8, 2));
        assert_eq!(a.load(1).as_u64(), Some(1));
        assert_eq!(b.load(1).as_u64(), Some(2));
    }

    #[test]
    fn test_address_wraps() {
        let mut mem = AbstractMemory::new(Endianness::Little);
        mem.store_wide(u64::MAX, &BitVector::constant(16, 0xbeef));
        assert_eq!(mem.load(u64::MAX).as_u64(), Some(0xef));
        assert_eq!(mem.load(0).as_u64(), Some(0xbe));
        let bytes: Vec<u64> = mem.iter().map(|(addr, _)| addr).collect();
        assert_eq!(bytes, vec![0, u64::MAX]);
    }
}
