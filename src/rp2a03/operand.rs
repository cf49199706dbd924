use super::addressing_mode::AddressingMode;
use super::error::Error;
use super::register::Register;
use super::status::StatusFlag;
use super::{Address, Result, RP2A03};

/// A fully resolved addressing mode: somewhere a byte can be read from,
/// written to, or modified in place.
///
/// The mode is kept alongside the target so faults can name the addressing
/// mode that produced them.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Operand {
    pub mode: AddressingMode,
    pub target: OperandTarget,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OperandTarget {
    /// No operand at all (implied addressing). Every access is a fault.
    None,

    /// The operand is the accumulator rather than memory.
    Accumulator,

    /// A literal byte from the instruction stream.
    Immediate(u8),

    /// An effective address on the bus.
    Memory(Address),
}

impl Operand {
    /// The effective address, for instructions that jump to or store at the
    /// target rather than reading through it.
    pub fn address(&self) -> Result<Address> {
        match self.target {
            OperandTarget::Memory(address) => Ok(address),
            _ => Err(Error::InvalidAddressRead(self.mode)),
        }
    }

    pub fn read(&self, cpu: &mut RP2A03) -> Result<u8> {
        match self.target {
            OperandTarget::None => Err(Error::InvalidOperandRead(self.mode)),
            OperandTarget::Accumulator => Ok(cpu.a),
            OperandTarget::Immediate(value) => Ok(value),
            OperandTarget::Memory(address) => cpu.bus.read_u8(address),
        }
    }

    pub fn write(&self, cpu: &mut RP2A03, value: u8) -> Result<()> {
        match self.target {
            OperandTarget::None | OperandTarget::Immediate(_) => {
                Err(Error::InvalidOperandWrite(self.mode))
            }
            OperandTarget::Accumulator => {
                cpu.write_register(Register::A, value);
                Ok(())
            }
            OperandTarget::Memory(address) => cpu.bus.write_u8(address, value),
        }
    }

    /// Read, apply `f`, write back. The read and the write hit the bus in
    /// that order, which side-effectful devices can observe.
    ///
    /// Z and N reflect the written value even for memory targets. Returns
    /// `(input, output)` so the shift family can derive carry from the
    /// original value.
    pub fn modify(&self, cpu: &mut RP2A03, f: impl FnOnce(u8) -> u8) -> Result<(u8, u8)> {
        let (input, output) = match self.target {
            OperandTarget::None | OperandTarget::Immediate(_) => {
                return Err(Error::InvalidOperandWrite(self.mode));
            }
            OperandTarget::Accumulator => {
                let input = cpu.a;
                let output = f(input);
                cpu.a = output;
                (input, output)
            }
            OperandTarget::Memory(address) => {
                let input = cpu.bus.read_u8(address)?;
                let output = f(input);
                cpu.bus.write_u8(address, output)?;
                (input, output)
            }
        };

        cpu.p.set(StatusFlag::Zero, output == 0);
        cpu.p.set(StatusFlag::Negative, output & 0x80 != 0);

        Ok((input, output))
    }
}
