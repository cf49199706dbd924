use super::addressing_mode::AddressingMode;
use super::error::Error;
use super::opcode::Opcode;
use super::Result;

/// One decoded instruction: a mnemonic plus the addressing mode this
/// particular opcode byte binds it to.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub mode: AddressingMode,
}

impl Instruction {
    /// Decode one opcode byte against the dispatch table.
    ///
    /// The table covers exactly the documented 6502 ISA; hitting one of the
    /// undocumented bytes is fatal to the step that fetched it.
    pub fn decode(byte: u8) -> Result<Instruction> {
        OPCODE_TABLE[byte as usize].ok_or(Error::UnknownOpcode(byte))
    }
}

const fn op(opcode: Opcode, mode: AddressingMode) -> Option<Instruction> {
    Some(Instruction { opcode, mode })
}

/// Dispatch table for the documented 6502 instruction set, indexed by
/// opcode byte.
static OPCODE_TABLE: [Option<Instruction>; 256] = [
    /*0x00*/ op(Opcode::BRK, AddressingMode::Implied),
    /*0x01*/ op(Opcode::ORA, AddressingMode::IndexedIndirect),
    /*0x02*/ None,
    /*0x03*/ None,
    /*0x04*/ None,
    /*0x05*/ op(Opcode::ORA, AddressingMode::ZeroPage),
    /*0x06*/ op(Opcode::ASL, AddressingMode::ZeroPage),
    /*0x07*/ None,
    /*0x08*/ op(Opcode::PHP, AddressingMode::Implied),
    /*0x09*/ op(Opcode::ORA, AddressingMode::Immediate),
    /*0x0A*/ op(Opcode::ASL, AddressingMode::Accumulator),
    /*0x0B*/ None,
    /*0x0C*/ None,
    /*0x0D*/ op(Opcode::ORA, AddressingMode::Absolute),
    /*0x0E*/ op(Opcode::ASL, AddressingMode::Absolute),
    /*0x0F*/ None,
    /*0x10*/ op(Opcode::BPL, AddressingMode::Relative),
    /*0x11*/ op(Opcode::ORA, AddressingMode::IndirectIndexed),
    /*0x12*/ None,
    /*0x13*/ None,
    /*0x14*/ None,
    /*0x15*/ op(Opcode::ORA, AddressingMode::ZeroPageX),
    /*0x16*/ op(Opcode::ASL, AddressingMode::ZeroPageX),
    /*0x17*/ None,
    /*0x18*/ op(Opcode::CLC, AddressingMode::Implied),
    /*0x19*/ op(Opcode::ORA, AddressingMode::AbsoluteY),
    /*0x1A*/ None,
    /*0x1B*/ None,
    /*0x1C*/ None,
    /*0x1D*/ op(Opcode::ORA, AddressingMode::AbsoluteX),
    /*0x1E*/ op(Opcode::ASL, AddressingMode::AbsoluteX),
    /*0x1F*/ None,
    /*0x20*/ op(Opcode::JSR, AddressingMode::Absolute),
    /*0x21*/ op(Opcode::AND, AddressingMode::IndexedIndirect),
    /*0x22*/ None,
    /*0x23*/ None,
    /*0x24*/ op(Opcode::BIT, AddressingMode::ZeroPage),
    /*0x25*/ op(Opcode::AND, AddressingMode::ZeroPage),
    /*0x26*/ op(Opcode::ROL, AddressingMode::ZeroPage),
    /*0x27*/ None,
    /*0x28*/ op(Opcode::PLP, AddressingMode::Implied),
    /*0x29*/ op(Opcode::AND, AddressingMode::Immediate),
    /*0x2A*/ op(Opcode::ROL, AddressingMode::Accumulator),
    /*0x2B*/ None,
    /*0x2C*/ op(Opcode::BIT, AddressingMode::Absolute),
    /*0x2D*/ op(Opcode::AND, AddressingMode::Absolute),
    /*0x2E*/ op(Opcode::ROL, AddressingMode::Absolute),
    /*0x2F*/ None,
    /*0x30*/ op(Opcode::BMI, AddressingMode::Relative),
    /*0x31*/ op(Opcode::AND, AddressingMode::IndirectIndexed),
    /*0x32*/ None,
    /*0x33*/ None,
    /*0x34*/ None,
    /*0x35*/ op(Opcode::AND, AddressingMode::ZeroPageX),
    /*0x36*/ op(Opcode::ROL, AddressingMode::ZeroPageX),
    /*0x37*/ None,
    /*0x38*/ op(Opcode::SEC, AddressingMode::Implied),
    /*0x39*/ op(Opcode::AND, AddressingMode::AbsoluteY),
    /*0x3A*/ None,
    /*0x3B*/ None,
    /*0x3C*/ None,
    /*0x3D*/ op(Opcode::AND, AddressingMode::AbsoluteX),
    /*0x3E*/ op(Opcode::ROL, AddressingMode::AbsoluteX),
    /*0x3F*/ None,
    /*0x40*/ op(Opcode::RTI, AddressingMode::Implied),
    /*0x41*/ op(Opcode::EOR, AddressingMode::IndexedIndirect),
    /*0x42*/ None,
    /*0x43*/ None,
    /*0x44*/ None,
    /*0x45*/ op(Opcode::EOR, AddressingMode::ZeroPage),
    /*0x46*/ op(Opcode::LSR, AddressingMode::ZeroPage),
    /*0x47*/ None,
    /*0x48*/ op(Opcode::PHA, AddressingMode::Implied),
    /*0x49*/ op(Opcode::EOR, AddressingMode::Immediate),
    /*0x4A*/ op(Opcode::LSR, AddressingMode::Accumulator),
    /*0x4B*/ None,
    /*0x4C*/ op(Opcode::JMP, AddressingMode::Absolute),
    /*0x4D*/ op(Opcode::EOR, AddressingMode::Absolute),
    /*0x4E*/ op(Opcode::LSR, AddressingMode::Absolute),
    /*0x4F*/ None,
    /*0x50*/ op(Opcode::BVC, AddressingMode::Relative),
    /*0x51*/ op(Opcode::EOR, AddressingMode::IndirectIndexed),
    /*0x52*/ None,
    /*0x53*/ None,
    /*0x54*/ None,
    /*0x55*/ op(Opcode::EOR, AddressingMode::ZeroPageX),
    /*0x56*/ op(Opcode::LSR, AddressingMode::ZeroPageX),
    /*0x57*/ None,
    /*0x58*/ op(Opcode::CLI, AddressingMode::Implied),
    /*0x59*/ op(Opcode::EOR, AddressingMode::AbsoluteY),
    /*0x5A*/ None,
    /*0x5B*/ None,
    /*0x5C*/ None,
    /*0x5D*/ op(Opcode::EOR, AddressingMode::AbsoluteX),
    /*0x5E*/ op(Opcode::LSR, AddressingMode::AbsoluteX),
    /*0x5F*/ None,
    /*0x60*/ op(Opcode::RTS, AddressingMode::Implied),
    /*0x61*/ op(Opcode::ADC, AddressingMode::IndexedIndirect),
    /*0x62*/ None,
    /*0x63*/ None,
    /*0x64*/ None,
    /*0x65*/ op(Opcode::ADC, AddressingMode::ZeroPage),
    /*0x66*/ op(Opcode::ROR, AddressingMode::ZeroPage),
    /*0x67*/ None,
    /*0x68*/ op(Opcode::PLA, AddressingMode::Implied),
    /*0x69*/ op(Opcode::ADC, AddressingMode::Immediate),
    /*0x6A*/ op(Opcode::ROR, AddressingMode::Accumulator),
    /*0x6B*/ None,
    /*0x6C*/ op(Opcode::JMP, AddressingMode::Indirect),
    /*0x6D*/ op(Opcode::ADC, AddressingMode::Absolute),
    /*0x6E*/ op(Opcode::ROR, AddressingMode::Absolute),
    /*0x6F*/ None,
    /*0x70*/ op(Opcode::BVS, AddressingMode::Relative),
    /*0x71*/ op(Opcode::ADC, AddressingMode::IndirectIndexed),
    /*0x72*/ None,
    /*0x73*/ None,
    /*0x74*/ None,
    /*0x75*/ op(Opcode::ADC, AddressingMode::ZeroPageX),
    /*0x76*/ op(Opcode::ROR, AddressingMode::ZeroPageX),
    /*0x77*/ None,
    /*0x78*/ op(Opcode::SEI, AddressingMode::Implied),
    /*0x79*/ op(Opcode::ADC, AddressingMode::AbsoluteY),
    /*0x7A*/ None,
    /*0x7B*/ None,
    /*0x7C*/ None,
    /*0x7D*/ op(Opcode::ADC, AddressingMode::AbsoluteX),
    /*0x7E*/ op(Opcode::ROR, AddressingMode::AbsoluteX),
    /*0x7F*/ None,
    /*0x80*/ None,
    /*0x81*/ op(Opcode::STA, AddressingMode::IndexedIndirect),
    /*0x82*/ None,
    /*0x83*/ None,
    /*0x84*/ op(Opcode::STY, AddressingMode::ZeroPage),
    /*0x85*/ op(Opcode::STA, AddressingMode::ZeroPage),
    /*0x86*/ op(Opcode::STX, AddressingMode::ZeroPage),
    /*0x87*/ None,
    /*0x88*/ op(Opcode::DEY, AddressingMode::Implied),
    /*0x89*/ None,
    /*0x8A*/ op(Opcode::TXA, AddressingMode::Implied),
    /*0x8B*/ None,
    /*0x8C*/ op(Opcode::STY, AddressingMode::Absolute),
    /*0x8D*/ op(Opcode::STA, AddressingMode::Absolute),
    /*0x8E*/ op(Opcode::STX, AddressingMode::Absolute),
    /*0x8F*/ None,
    /*0x90*/ op(Opcode::BCC, AddressingMode::Relative),
    /*0x91*/ op(Opcode::STA, AddressingMode::IndirectIndexed),
    /*0x92*/ None,
    /*0x93*/ None,
    /*0x94*/ op(Opcode::STY, AddressingMode::ZeroPageX),
    /*0x95*/ op(Opcode::STA, AddressingMode::ZeroPageX),
    /*0x96*/ op(Opcode::STX, AddressingMode::ZeroPageY),
    /*0x97*/ None,
    /*0x98*/ op(Opcode::TYA, AddressingMode::Implied),
    /*0x99*/ op(Opcode::STA, AddressingMode::AbsoluteY),
    /*0x9A*/ op(Opcode::TXS, AddressingMode::Implied),
    /*0x9B*/ None,
    /*0x9C*/ None,
    /*0x9D*/ op(Opcode::STA, AddressingMode::AbsoluteX),
    /*0x9E*/ None,
    /*0x9F*/ None,
    /*0xA0*/ op(Opcode::LDY, AddressingMode::Immediate),
    /*0xA1*/ op(Opcode::LDA, AddressingMode::IndexedIndirect),
    /*0xA2*/ op(Opcode::LDX, AddressingMode::Immediate),
    /*0xA3*/ None,
    /*0xA4*/ op(Opcode::LDY, AddressingMode::ZeroPage),
    /*0xA5*/ op(Opcode::LDA, AddressingMode::ZeroPage),
    /*0xA6*/ op(Opcode::LDX, AddressingMode::ZeroPage),
    /*0xA7*/ None,
    /*0xA8*/ op(Opcode::TAY, AddressingMode::Implied),
    /*0xA9*/ op(Opcode::LDA, AddressingMode::Immediate),
    /*0xAA*/ op(Opcode::TAX, AddressingMode::Implied),
    /*0xAB*/ None,
    /*0xAC*/ op(Opcode::LDY, AddressingMode::Absolute),
    /*0xAD*/ op(Opcode::LDA, AddressingMode::Absolute),
    /*0xAE*/ op(Opcode::LDX, AddressingMode::Absolute),
    /*0xAF*/ None,
    /*0xB0*/ op(Opcode::BCS, AddressingMode::Relative),
    /*0xB1*/ op(Opcode::LDA, AddressingMode::IndirectIndexed),
    /*0xB2*/ None,
    /*0xB3*/ None,
    /*0xB4*/ op(Opcode::LDY, AddressingMode::ZeroPageX),
    /*0xB5*/ op(Opcode::LDA, AddressingMode::ZeroPageX),
    /*0xB6*/ op(Opcode::LDX, AddressingMode::ZeroPageY),
    /*0xB7*/ None,
    /*0xB8*/ op(Opcode::CLV, AddressingMode::Implied),
    /*0xB9*/ op(Opcode::LDA, AddressingMode::AbsoluteY),
    /*0xBA*/ op(Opcode::TSX, AddressingMode::Implied),
    /*0xBB*/ None,
    /*0xBC*/ op(Opcode::LDY, AddressingMode::AbsoluteX),
    /*0xBD*/ op(Opcode::LDA, AddressingMode::AbsoluteX),
    /*0xBE*/ op(Opcode::LDX, AddressingMode::AbsoluteY),
    /*0xBF*/ None,
    /*0xC0*/ op(Opcode::CPY, AddressingMode::Immediate),
    /*0xC1*/ op(Opcode::CMP, AddressingMode::IndexedIndirect),
    /*0xC2*/ None,
    /*0xC3*/ None,
    /*0xC4*/ op(Opcode::CPY, AddressingMode::ZeroPage),
    /*0xC5*/ op(Opcode::CMP, AddressingMode::ZeroPage),
    /*0xC6*/ op(Opcode::DEC, AddressingMode::ZeroPage),
    /*0xC7*/ None,
    /*0xC8*/ op(Opcode::INY, AddressingMode::Implied),
    /*0xC9*/ op(Opcode::CMP, AddressingMode::Immediate),
    /*0xCA*/ op(Opcode::DEX, AddressingMode::Implied),
    /*0xCB*/ None,
    /*0xCC*/ op(Opcode::CPY, AddressingMode::Absolute),
    /*0xCD*/ op(Opcode::CMP, AddressingMode::Absolute),
    /*0xCE*/ op(Opcode::DEC, AddressingMode::Absolute),
    /*0xCF*/ None,
    /*0xD0*/ op(Opcode::BNE, AddressingMode::Relative),
    /*0xD1*/ op(Opcode::CMP, AddressingMode::IndirectIndexed),
    /*0xD2*/ None,
    /*0xD3*/ None,
    /*0xD4*/ None,
    /*0xD5*/ op(Opcode::CMP, AddressingMode::ZeroPageX),
    /*0xD6*/ op(Opcode::DEC, AddressingMode::ZeroPageX),
    /*0xD7*/ None,
    /*0xD8*/ op(Opcode::CLD, AddressingMode::Implied),
    /*0xD9*/ op(Opcode::CMP, AddressingMode::AbsoluteY),
    /*0xDA*/ None,
    /*0xDB*/ None,
    /*0xDC*/ None,
    /*0xDD*/ op(Opcode::CMP, AddressingMode::AbsoluteX),
    /*0xDE*/ op(Opcode::DEC, AddressingMode::AbsoluteX),
    /*0xDF*/ None,
    /*0xE0*/ op(Opcode::CPX, AddressingMode::Immediate),
    /*0xE1*/ op(Opcode::SBC, AddressingMode::IndexedIndirect),
    /*0xE2*/ None,
    /*0xE3*/ None,
    /*0xE4*/ op(Opcode::CPX, AddressingMode::ZeroPage),
    /*0xE5*/ op(Opcode::SBC, AddressingMode::ZeroPage),
    /*0xE6*/ op(Opcode::INC, AddressingMode::ZeroPage),
    /*0xE7*/ None,
    /*0xE8*/ op(Opcode::INX, AddressingMode::Implied),
    /*0xE9*/ op(Opcode::SBC, AddressingMode::Immediate),
    /*0xEA*/ op(Opcode::NOP, AddressingMode::Implied),
    /*0xEB*/ None,
    /*0xEC*/ op(Opcode::CPX, AddressingMode::Absolute),
    /*0xED*/ op(Opcode::SBC, AddressingMode::Absolute),
    /*0xEE*/ op(Opcode::INC, AddressingMode::Absolute),
    /*0xEF*/ None,
    /*0xF0*/ op(Opcode::BEQ, AddressingMode::Relative),
    /*0xF1*/ op(Opcode::SBC, AddressingMode::IndirectIndexed),
    /*0xF2*/ None,
    /*0xF3*/ None,
    /*0xF4*/ None,
    /*0xF5*/ op(Opcode::SBC, AddressingMode::ZeroPageX),
    /*0xF6*/ op(Opcode::INC, AddressingMode::ZeroPageX),
    /*0xF7*/ None,
    /*0xF8*/ op(Opcode::SED, AddressingMode::Implied),
    /*0xF9*/ op(Opcode::SBC, AddressingMode::AbsoluteY),
    /*0xFA*/ None,
    /*0xFB*/ None,
    /*0xFC*/ None,
    /*0xFD*/ op(Opcode::SBC, AddressingMode::AbsoluteX),
    /*0xFE*/ op(Opcode::INC, AddressingMode::AbsoluteX),
    /*0xFF*/ None,
];
