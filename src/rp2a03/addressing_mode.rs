use std::fmt;

use super::operand::{Operand, OperandTarget};
use super::{Result, RP2A03};

/// How an instruction turns the bytes following its opcode into a value or
/// an effective address.
///
/// A mode knows two things: how many operand bytes it consumes from the
/// instruction stream, and how to resolve those bytes against the CPU into
/// an [`Operand`]. The same mnemonic shows up at several opcode bytes with
/// different modes, which is the whole reason modes are first-class here.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AddressingMode {
    /// The instruction has no operand at all (`INX`, `CLC`, ...). Reading
    /// or writing through this mode is a fault.
    Implied,

    /// The operand is the accumulator itself (`ASL A`, `ROR A`, ...).
    /// Reads and writes touch `a`, never memory.
    Accumulator,

    /// The operand is a literal byte in the instruction stream: `LDA #$05`.
    Immediate,

    /// An 8-bit address into the first page of memory: `LDA $10`.
    ZeroPage,

    /// Zero page plus `x`, wrapping within the page: `LDA $10,X`.
    ZeroPageX,

    /// Zero page plus `y`, wrapping within the page: `LDX $10,Y`.
    ZeroPageY,

    /// A signed 8-bit displacement from the instruction after the branch.
    /// Offsets of `0x80` and above reach backwards.
    Relative,

    /// A full 16-bit address, low byte first: `LDA $1234`.
    Absolute,

    /// Absolute plus `x`: `LDA $1234,X`.
    AbsoluteX,

    /// Absolute plus `y`: `LDA $1234,Y`.
    AbsoluteY,

    /// The operand is a pointer to the real target. Only `JMP` uses this.
    Indirect,

    /// `LDA ($10,X)`: `x` offsets the zero-page pointer, then the word at
    /// the pointer is the effective address.
    IndexedIndirect,

    /// `LDA ($10),Y`: the word at the zero-page pointer plus `y` is the
    /// effective address.
    IndirectIndexed,
}

impl AddressingMode {
    /// Operand bytes following the opcode. `step` consumes the opcode byte
    /// itself; instruction bodies advance `pc` by this amount.
    pub fn operand_size(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndexedIndirect
            | AddressingMode::IndirectIndexed => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }

    /// Resolve this mode into an [`Operand`], reading operand bytes at the
    /// current `pc`. `pc` itself is not advanced here.
    ///
    /// Resolution goes through the bus, so an unmapped pointer fails the
    /// whole instruction.
    pub fn resolve(self, cpu: &mut RP2A03) -> Result<Operand> {
        let target = match self {
            AddressingMode::Implied => OperandTarget::None,

            AddressingMode::Accumulator => OperandTarget::Accumulator,

            AddressingMode::Immediate => OperandTarget::Immediate(cpu.bus.read_u8(cpu.pc)?),

            AddressingMode::ZeroPage => OperandTarget::Memory(cpu.bus.read_u8(cpu.pc)? as u16),

            AddressingMode::ZeroPageX => {
                let base = cpu.bus.read_u8(cpu.pc)?;
                OperandTarget::Memory(base.wrapping_add(cpu.x) as u16)
            }

            AddressingMode::ZeroPageY => {
                let base = cpu.bus.read_u8(cpu.pc)?;
                OperandTarget::Memory(base.wrapping_add(cpu.y) as u16)
            }

            AddressingMode::Relative => {
                let offset = cpu.bus.read_u8(cpu.pc)? as u16;
                let next = cpu.pc.wrapping_add(1);
                let target = if offset >= 0x80 {
                    next.wrapping_add(offset).wrapping_sub(0x100)
                } else {
                    next.wrapping_add(offset)
                };
                OperandTarget::Memory(target)
            }

            AddressingMode::Absolute => OperandTarget::Memory(cpu.bus.read_u16(cpu.pc)?),

            AddressingMode::AbsoluteX => {
                let base = cpu.bus.read_u16(cpu.pc)?;
                OperandTarget::Memory(base.wrapping_add(cpu.x as u16))
            }

            AddressingMode::AbsoluteY => {
                let base = cpu.bus.read_u16(cpu.pc)?;
                OperandTarget::Memory(base.wrapping_add(cpu.y as u16))
            }

            AddressingMode::Indirect => {
                let pointer = cpu.bus.read_u16(cpu.pc)?;
                // JMP ($xxFF) never reads past the pointer's own page: the
                // target word comes from the page base instead.
                let pointer = if pointer & 0x00FF == 0x00FF {
                    pointer & 0xFF00
                } else {
                    pointer
                };
                OperandTarget::Memory(cpu.bus.read_u16(pointer)?)
            }

            AddressingMode::IndexedIndirect => {
                let pointer = cpu.bus.read_u8(cpu.pc)?.wrapping_add(cpu.x) as u16;
                OperandTarget::Memory(cpu.bus.read_u16(pointer)?)
            }

            AddressingMode::IndirectIndexed => {
                let pointer = cpu.bus.read_u8(cpu.pc)? as u16;
                let base = cpu.bus.read_u16(pointer)?;
                OperandTarget::Memory(base.wrapping_add(cpu.y as u16))
            }
        };

        Ok(Operand { mode: self, target })
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
