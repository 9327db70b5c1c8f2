//! Varnodes: the operands of p-code ops.

use std::fmt;

/// Identifier of a memory space (RAM, stack, constant pool, ...).
///
/// LOAD and STORE carry it as the offset of their first, constant input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(pub u64);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space:{:#x}", self.0)
    }
}

/// The space a varnode lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpace {
    /// The offset is the literal value.
    Constant,
    /// Processor register file, keyed by register offset.
    Register,
    /// Temporaries private to one instruction's p-code.
    Unique,
    /// Any other addressable space.
    Other(SpaceId),
}

impl AddressSpace {
    /// Returns the name used in listings.
    pub fn name(&self) -> String {
        match self {
            Self::Constant => "const".to_string(),
            Self::Register => "register".to_string(),
            Self::Unique => "unique".to_string(),
            Self::Other(id) => id.to_string(),
        }
    }
}

/// A sized location: `(space, offset, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Varnode {
    pub space: AddressSpace,
    /// Offset within the space, or the value for constants.
    pub offset: u64,
    /// Size in bytes.
    pub size: usize,
}

impl Varnode {
    /// Largest accepted varnode size in bytes.
    pub const MAX_SIZE: usize = 64;

    /// Creates a varnode.
    pub fn new(space: AddressSpace, offset: u64, size: usize) -> Self {
        Self {
            space,
            offset,
            size,
        }
    }

    /// Creates a constant varnode.
    pub fn constant(value: u64, size: usize) -> Self {
        Self::new(AddressSpace::Constant, value, size)
    }

    /// Creates a register varnode.
    pub fn register(offset: u64, size: usize) -> Self {
        Self::new(AddressSpace::Register, offset, size)
    }

    /// Creates a temporary (unique-space) varnode.
    pub fn unique(offset: u64, size: usize) -> Self {
        Self::new(AddressSpace::Unique, offset, size)
    }

    /// Size in bits.
    pub fn bits(&self) -> usize {
        self.size * 8
    }

    /// Returns true if this is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self.space, AddressSpace::Constant)
    }

    /// Returns true if this is a register.
    pub fn is_register(&self) -> bool {
        matches!(self.space, AddressSpace::Register)
    }

    /// Returns true if this is a temporary.
    pub fn is_unique(&self) -> bool {
        matches!(self.space, AddressSpace::Unique)
    }
}

impl fmt::Display for Varnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {:#x}, {})",
            self.space.name(),
            self.offset,
            self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Varnode::register(0x20, 4).to_string(), "(register, 0x20, 4)");
        assert_eq!(Varnode::constant(5, 1).to_string(), "(const, 0x5, 1)");
        assert_eq!(
            Varnode::new(AddressSpace::Other(SpaceId(0x1b1)), 0x1000, 8).to_string(),
            "(space:0x1b1, 0x1000, 8)"
        );
    }

    #[test]
    fn test_kinds() {
        let vn = Varnode::unique(0x100, 2);
        assert!(vn.is_unique());
        assert!(!vn.is_register());
        assert!(!vn.is_constant());
        assert!(Varnode::constant(3, 1).is_constant());
        assert_eq!(vn.bits(), 16);
    }
}
