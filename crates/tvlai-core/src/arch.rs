//! Target properties the engine depends on.

/// Byte order of multi-byte values in registers and memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Returns true for big-endian targets.
    pub fn is_big(&self) -> bool {
        matches!(self, Self::Big)
    }

    /// Returns the name of this byte order.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Little => "little",
            Self::Big => "big",
        }
    }
}

impl std::fmt::Display for Endianness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
