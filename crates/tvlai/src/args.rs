//! Operand and seed arguments.
//!
//! Operands are written `<space>:<offset>:<size>`, e.g. `register:0x10:4` or
//! `space:0x1b1:0x1000:8`. Seeds append `=<value>`, where the value is a
//! number or a `0b`-prefixed bit string that may contain `?`.

use std::fmt;
use std::str::FromStr;
use tvlai_core::listing::{parse_number, parse_space};
use tvlai_core::Varnode;
use tvlai_emulate::BitVector;

/// A varnode named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandArg(pub Varnode);

impl FromStr for OperandArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The space itself may contain a colon (`space:<id>`), so split from the right.
        let mut parts = s.rsplitn(3, ':');
        let (Some(size), Some(offset), Some(space)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!(
                "invalid operand `{s}`: expected <space>:<offset>:<size>"
            ));
        };

        let space = parse_space(space, 0).map_err(|_| format!("unknown space `{space}`"))?;
        let offset = parse_number(offset, 0).map_err(|_| format!("invalid offset `{offset}`"))?;
        let size = parse_number(size, 0)
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0 && n <= Varnode::MAX_SIZE)
            .ok_or_else(|| {
                format!(
                    "invalid size `{size}`: must be 1 to {} bytes",
                    Varnode::MAX_SIZE
                )
            })?;

        Ok(Self(Varnode::new(space, offset, size)))
    }
}

impl fmt::Display for OperandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An initial value for a register or temporary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub target: Varnode,
    pub value: BitVector,
}

impl FromStr for Seed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (operand, value) = s
            .split_once('=')
            .ok_or_else(|| format!("invalid seed `{s}`: expected <operand>=<value>"))?;
        let OperandArg(target) = operand.parse()?;

        if !(target.is_register() || target.is_unique()) {
            return Err(format!(
                "invalid seed `{s}`: only register and unique varnodes can be seeded"
            ));
        }

        let value = match value.strip_prefix("0b") {
            Some(bits) => {
                let bv: BitVector = bits
                    .parse()
                    .map_err(|e| format!("invalid bit string `{bits}`: {e}"))?;
                if bv.len() != target.bits() {
                    return Err(format!(
                        "bit string has {} bits, {} needs {}",
                        bv.len(),
                        target,
                        target.bits()
                    ));
                }
                bv
            }
            None => {
                let n = parse_number(value, 0).map_err(|_| format!("invalid value `{value}`"))?;
                BitVector::constant(target.bits(), n)
            }
        };

        Ok(Self { target, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvlai_core::{AddressSpace, SpaceId};

    #[test]
    fn test_parse_operand() {
        let OperandArg(vn) = "register:0x10:4".parse().unwrap();
        assert_eq!(vn, Varnode::register(0x10, 4));

        let OperandArg(vn) = "space:0x1b1:0x1000:8".parse().unwrap();
        assert_eq!(vn.space, AddressSpace::Other(SpaceId(0x1b1)));
        assert_eq!(vn.offset, 0x1000);
        assert_eq!(vn.size, 8);

        assert!("register:0x10".parse::<OperandArg>().is_err());
        assert!("heap:0:4".parse::<OperandArg>().is_err());
        assert!("register:0:0".parse::<OperandArg>().is_err());
        assert!("register:0:0x2000000000000000".parse::<OperandArg>().is_err());
        assert!("register:0:65".parse::<OperandArg>().is_err());
    }

    #[test]
    fn test_parse_seed() {
        let seed: Seed = "register:0x10:4=0x1000".parse().unwrap();
        assert_eq!(seed.target, Varnode::register(0x10, 4));
        assert_eq!(seed.value.as_u64(), Some(0x1000));

        let seed: Seed = "register:0x20a:1=0b0000000?".parse().unwrap();
        assert_eq!(seed.value.to_string(), "0000000?");

        assert!("register:0x20a:1=0b01".parse::<Seed>().is_err());
        assert!("const:0x1:4=5".parse::<Seed>().is_err());
        assert!("register:0x0:4".parse::<Seed>().is_err());
    }
}
