//! Abstract machine state.
//!
//! Contains registers, temporaries, and one abstract memory per address
//! space. Every region sits on persistent maps, so [`AbstractState::fork`]
//! is cheap and forks never observe each other's writes.

use crate::bitvec::BitVector;
use crate::memory::AbstractMemory;
use crate::{EmulationError, EmulationResult};
use im::OrdMap;
use tvlai_core::{AddressSpace, Endianness, SpaceId, Varnode};

/// What to do when a write targets a varnode that is neither a register nor
/// a temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationPolicy {
    /// Log a warning and leave the state unchanged.
    #[default]
    Warn,
    /// Fail with [`EmulationError::UnrecognizedDestination`].
    Reject,
}

/// Registers, temporaries and memory spaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbstractState {
    registers: AbstractMemory,
    temporaries: AbstractMemory,
    spaces: OrdMap<SpaceId, AbstractMemory>,
    endianness: Endianness,
    destinations: DestinationPolicy,
}

impl AbstractState {
    /// Create a fully Unknown state.
    pub fn new(endianness: Endianness) -> Self {
        Self {
            registers: AbstractMemory::new(endianness),
            temporaries: AbstractMemory::new(endianness),
            spaces: OrdMap::new(),
            endianness,
            destinations: DestinationPolicy::default(),
        }
    }

    /// Set the unrecognized-destination policy.
    pub fn with_destination_policy(mut self, policy: DestinationPolicy) -> Self {
        self.destinations = policy;
        self
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn destination_policy(&self) -> DestinationPolicy {
        self.destinations
    }

    /// An independent copy for exploring another path.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    // ==================== Varnode Access ====================

    /// Bind `value` to a register or temporary.
    ///
    /// # Panics
    ///
    /// Panics if the width of `value` differs from the varnode's.
    pub fn associate(&mut self, dest: &Varnode, value: &BitVector) -> EmulationResult<()> {
        assert_eq!(
            value.len(),
            dest.bits(),
            "associate: {} bits written to {}",
            value.len(),
            dest
        );
        match dest.space {
            AddressSpace::Register => self.registers.store_wide(dest.offset, value),
            AddressSpace::Unique => self.temporaries.store_wide(dest.offset, value),
            AddressSpace::Constant | AddressSpace::Other(_) => match self.destinations {
                DestinationPolicy::Warn => {
                    tracing::warn!(destination = %dest, "unrecognized destination, write dropped");
                }
                DestinationPolicy::Reject => {
                    return Err(EmulationError::UnrecognizedDestination(*dest));
                }
            },
        }
        Ok(())
    }

    /// The current value of a varnode. Constants become literals and are
    /// never stored.
    pub fn lookup(&self, src: &Varnode) -> EmulationResult<BitVector> {
        match src.space {
            AddressSpace::Constant => Ok(BitVector::constant(src.bits(), src.offset)),
            AddressSpace::Register => Ok(self.registers.load_wide(src.offset, src.bits())),
            AddressSpace::Unique => Ok(self.temporaries.load_wide(src.offset, src.bits())),
            AddressSpace::Other(_) => Err(EmulationError::UnrecognizedSource(*src)),
        }
    }

    /// Bind a known value to a register or temporary.
    pub fn set_concrete(&mut self, dest: &Varnode, value: u64) -> EmulationResult<()> {
        self.associate(dest, &BitVector::constant(dest.bits(), value))
    }

    // ==================== Memory Spaces ====================

    /// Write `value` at `address` in `space`, creating the space on first use.
    pub fn store(&mut self, space: SpaceId, address: u64, value: &BitVector) {
        match self.spaces.get_mut(&space) {
            Some(mem) => mem.store_wide(address, value),
            None => {
                let mut mem = AbstractMemory::new(self.endianness);
                mem.store_wide(address, value);
                self.spaces.insert(space, mem);
            }
        }
    }

    /// Read `bits` bits at `address` in `space`. A space never written reads
    /// Unknown.
    pub fn load(&self, space: SpaceId, address: u64, bits: usize) -> BitVector {
        match self.spaces.get(&space) {
            Some(mem) => mem.load_wide(address, bits),
            None => BitVector::unknown(bits),
        }
    }

    /// Forget everything known about `space`.
    pub fn invalidate_space(&mut self, space: SpaceId) {
        self.spaces.remove(&space);
    }

    pub fn space(&self, space: SpaceId) -> Option<&AbstractMemory> {
        self.spaces.get(&space)
    }

    /// Spaces with at least one write, in ascending id order.
    pub fn spaces(&self) -> impl Iterator<Item = (SpaceId, &AbstractMemory)> + '_ {
        self.spaces.iter().map(|(&id, mem)| (id, mem))
    }

    // ==================== Regions ====================

    pub fn registers(&self) -> &AbstractMemory {
        &self.registers
    }

    pub fn temporaries(&self) -> &AbstractMemory {
        &self.temporaries
    }

    /// Drop all temporaries, at the end of an instruction block.
    pub fn clear_temporaries(&mut self) {
        self.temporaries.invalidate();
    }

    /// Reset to the fully Unknown state.
    pub fn clear(&mut self) {
        self.registers.invalidate();
        self.temporaries.invalidate();
        self.spaces = OrdMap::new();
    }
}
