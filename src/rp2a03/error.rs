use thiserror::Error;

use super::addressing_mode::AddressingMode;

/// Every fault the core can raise. All of them are programmer or ROM errors:
/// the CPU does not attempt to recover and the host should treat the machine
/// as wedged.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The byte at `pc` is not a documented 6502 opcode.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// A read or write landed outside every mounted region.
    #[error("no device mounted at address {0:#06x}")]
    UnmappedAddress(u16),

    /// An attempted mount intersects a region that is already claimed.
    #[error("mount [{start:#06x}, {end:#06x}] overlaps an existing mount")]
    MountOverlap { start: u16, end: u16 },

    #[error("invalid attempt to read a value through {0} addressing")]
    InvalidOperandRead(AddressingMode),

    #[error("invalid attempt to write a value through {0} addressing")]
    InvalidOperandWrite(AddressingMode),

    #[error("{0} addressing does not resolve to an address")]
    InvalidAddressRead(AddressingMode),
}
