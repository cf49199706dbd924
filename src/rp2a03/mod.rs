mod addressing_mode;
mod bus;
mod error;
mod instruction;
mod opcode;
mod operand;
mod register;
mod status;

use std::fmt;

use log::trace;

use register::Register;

pub use addressing_mode::AddressingMode;
pub use bus::{Bus, Device, Ram};
pub use error::Error;
pub use instruction::Instruction;
pub use opcode::Opcode;
pub use operand::{Operand, OperandTarget};
pub use status::{Status, StatusFlag};

pub type Result<A> = std::result::Result<A, Error>;

pub type Address = u16;

/// Where BRK fetches its handler address from.
pub const IRQ_VECTOR_ADDRESS: Address = 0xFFFE;

/// Conventional 6502 vectors. The core never reads these itself (reset and
/// NMI are the host's job) but hosts routinely point `pc` through them.
pub const RESET_VECTOR_ADDRESS: Address = 0xFFFC;
pub const NMI_VECTOR_ADDRESS: Address = 0xFFFA;

/// The stack occupies page 1 and grows downwards from `0x01FF`.
const STACK_START_ADDRESS: Address = 0x0100;

const RAM_START: Address = 0x0000;
const RAM_END: Address = 0x1FFF;
const RAM_SIZE: usize = 0x2000;

/// `RP2A03` emulates the CPU die of the NES: a MOS Technology 6502 with the
/// decimal unit disconnected. The decimal flag can still be set and cleared,
/// it just never changes what ADC and SBC compute.
///
/// The core is instruction-accurate. `step` executes one whole instruction
/// and nothing in between is observable; cycle timing is not modeled at all.
///
/// The CPU owns its [`Bus`]. Hosts build a machine by mounting devices and
/// then drive it by calling [`RP2A03::step`] in a loop.
pub struct RP2A03 {
    /// The accumulator. Arithmetic, logic and shifts either operate on `a`
    /// or leave their result in it; it is the working register of the
    /// machine.
    pub a: u8,

    /// Index register, mostly used as a counter or memory offset.
    pub x: u8,

    /// Index register, mostly used as a counter or memory offset.
    pub y: u8,

    pub p: Status,

    /// `sp` is the low byte of the stack address `0x0100 + sp`. The stack
    /// descends: pushing decrements, pulling increments.
    pub sp: u8,

    /// The program counter.
    pub pc: u16,

    pub bus: Bus,
}

impl RP2A03 {
    /// Program origin used by [`RP2A03::with_program`].
    pub const PROGRAM_ORIGIN: Address = 0x0600;

    /// A CPU in its power-on state: registers cleared, `sp` at `0xFD`,
    /// interrupt-disable set, and 8 KiB of zeroed work RAM mounted at
    /// `[0x0000, 0x1FFF]`.
    ///
    /// `pc` starts at 0. Pointing it through the reset vector is the
    /// host's decision, not the core's.
    pub fn new() -> RP2A03 {
        let mut bus = Bus::new();
        bus.mount(RAM_START, RAM_END, Ram::new(RAM_SIZE))
            .expect("the default RAM mount cannot overlap an empty bus");

        RP2A03::with_bus(bus)
    }

    /// A CPU in its power-on state wired to a caller-supplied bus. Used by
    /// hosts that want full control over the memory map.
    pub fn with_bus(bus: Bus) -> RP2A03 {
        RP2A03 {
            a: 0,
            x: 0,
            y: 0,
            p: Status::default(),
            sp: 0xFD,
            pc: 0,
            bus,
        }
    }

    /// A CPU with `program` loaded into RAM at [`RP2A03::PROGRAM_ORIGIN`]
    /// and `pc` pointing at its first byte.
    pub fn with_program(program: &[u8]) -> Result<RP2A03> {
        let mut cpu = RP2A03::new();
        for (i, &byte) in program.iter().enumerate() {
            cpu.bus
                .write_u8(RP2A03::PROGRAM_ORIGIN.wrapping_add(i as u16), byte)?;
        }
        cpu.pc = RP2A03::PROGRAM_ORIGIN;

        Ok(cpu)
    }

    /// Execute the instruction at `pc`.
    ///
    /// On success the CPU has fully applied the instruction's effects. On
    /// failure (unmapped access, unknown opcode, illegal operand access) the
    /// machine should be considered wedged; the core never recovers.
    pub fn step(&mut self) -> Result<()> {
        let pc = self.pc;
        let byte = self.bus.read_u8(pc)?;
        self.pc = self.pc.wrapping_add(1);

        let instruction = Instruction::decode(byte)?;
        trace!("{:#06x}: {} {}", pc, instruction.opcode, instruction.mode);

        self.execute(instruction)
    }

    /// Step until the instruction at `pc` is BRK, leaving the BRK
    /// unexecuted. A convenient harness for short assembled programs, which
    /// hit a BRK as soon as they run off the end into zeroed RAM.
    pub fn run_until_brk(&mut self) -> Result<()> {
        loop {
            self.step()?;

            if self.bus.read_u8(self.pc)? == 0x00 {
                return Ok(());
            }
        }
    }

    fn execute(&mut self, instruction: Instruction) -> Result<()> {
        let mode = instruction.mode;

        match instruction.opcode {
            // Loads & stores
            Opcode::LDA => self.op_load(Register::A, mode),
            Opcode::LDX => self.op_load(Register::X, mode),
            Opcode::LDY => self.op_load(Register::Y, mode),
            Opcode::STA => self.op_store(Register::A, mode),
            Opcode::STX => self.op_store(Register::X, mode),
            Opcode::STY => self.op_store(Register::Y, mode),

            // Transfers
            Opcode::TAX => self.op_transfer(Register::A, Register::X),
            Opcode::TAY => self.op_transfer(Register::A, Register::Y),
            Opcode::TXA => self.op_transfer(Register::X, Register::A),
            Opcode::TYA => self.op_transfer(Register::Y, Register::A),
            Opcode::TSX => self.op_transfer(Register::SP, Register::X),
            Opcode::TXS => self.op_transfer(Register::X, Register::SP),

            // Stack
            Opcode::PHA => self.op_push(Register::A),
            Opcode::PHP => self.op_push(Register::P),
            Opcode::PLA => self.op_pull(Register::A),
            Opcode::PLP => self.op_pull(Register::P),

            // Logical
            Opcode::AND => self.op_logical(mode, |a, m| a & m),
            Opcode::ORA => self.op_logical(mode, |a, m| a | m),
            Opcode::EOR => self.op_logical(mode, |a, m| a ^ m),
            Opcode::BIT => self.op_bit(mode),

            // Arithmetic
            Opcode::ADC => self.op_add(mode),
            Opcode::SBC => self.op_subtract(mode),
            Opcode::CMP => self.op_compare(Register::A, mode),
            Opcode::CPX => self.op_compare(Register::X, mode),
            Opcode::CPY => self.op_compare(Register::Y, mode),

            // Increments & decrements
            Opcode::INC => self.op_modify_memory(mode, |v| v.wrapping_add(1)),
            Opcode::DEC => self.op_modify_memory(mode, |v| v.wrapping_sub(1)),
            Opcode::INX => Ok(self.modify_register(Register::X, |x| x.wrapping_add(1))),
            Opcode::INY => Ok(self.modify_register(Register::Y, |y| y.wrapping_add(1))),
            Opcode::DEX => Ok(self.modify_register(Register::X, |x| x.wrapping_sub(1))),
            Opcode::DEY => Ok(self.modify_register(Register::Y, |y| y.wrapping_sub(1))),

            // Shifts & rotates
            Opcode::ASL => self.op_shift_left(mode),
            Opcode::LSR => self.op_shift_right(mode),
            Opcode::ROL => self.op_rotate_left(mode),
            Opcode::ROR => self.op_rotate_right(mode),

            // Jumps & calls
            Opcode::JMP => self.op_jump(mode),
            Opcode::JSR => self.op_jump_subroutine(mode),
            Opcode::RTS => self.op_return(),
            Opcode::RTI => self.op_return_from_interrupt(),

            // Branches
            Opcode::BCS => self.op_branch_if(mode, self.p.get(StatusFlag::Carry)),
            Opcode::BCC => self.op_branch_if(mode, !self.p.get(StatusFlag::Carry)),
            Opcode::BEQ => self.op_branch_if(mode, self.p.get(StatusFlag::Zero)),
            Opcode::BNE => self.op_branch_if(mode, !self.p.get(StatusFlag::Zero)),
            Opcode::BMI => self.op_branch_if(mode, self.p.get(StatusFlag::Negative)),
            Opcode::BPL => self.op_branch_if(mode, !self.p.get(StatusFlag::Negative)),
            Opcode::BVS => self.op_branch_if(mode, self.p.get(StatusFlag::Overflow)),
            Opcode::BVC => self.op_branch_if(mode, !self.p.get(StatusFlag::Overflow)),

            // Flag operations
            Opcode::CLC => Ok(self.p.set(StatusFlag::Carry, false)),
            Opcode::SEC => Ok(self.p.set(StatusFlag::Carry, true)),
            Opcode::CLD => Ok(self.p.set(StatusFlag::DecimalMode, false)),
            Opcode::SED => Ok(self.p.set(StatusFlag::DecimalMode, true)),
            Opcode::CLI => Ok(self.p.set(StatusFlag::InterruptDisable, false)),
            Opcode::SEI => Ok(self.p.set(StatusFlag::InterruptDisable, true)),
            Opcode::CLV => Ok(self.p.set(StatusFlag::Overflow, false)),

            // System
            Opcode::NOP => Ok(()),
            Opcode::BRK => self.op_break(),
        }
    }

    /// Resolve `mode` against the current `pc`, then advance `pc` past the
    /// operand bytes. Control-flow instructions overwrite `pc` afterwards,
    /// which is what makes them "not advance".
    fn fetch_operand(&mut self, mode: AddressingMode) -> Result<Operand> {
        let operand = mode.resolve(self)?;
        self.pc = self.pc.wrapping_add(mode.operand_size());

        Ok(operand)
    }

    fn read_register(&self, register: Register) -> u8 {
        match register {
            Register::A => self.a,
            Register::X => self.x,
            Register::Y => self.y,
            Register::P => self.p.0,
            Register::SP => self.sp,
        }
    }

    /// Write `value` into `register`, applying the register's flag rules:
    /// Z and N track values written to `a`, `x` and `y`; `p` never stores B
    /// and always stores U; `sp` changes no flags at all.
    fn write_register(&mut self, register: Register, value: u8) {
        match register {
            Register::A => self.a = value,
            Register::X => self.x = value,
            Register::Y => self.y = value,
            Register::P => self.p = Status(value),
            Register::SP => self.sp = value,
        }

        match register {
            Register::A | Register::X | Register::Y => {
                self.p.set(StatusFlag::Zero, value == 0);
                self.p.set(StatusFlag::Negative, value & 0x80 != 0);
            }
            Register::P => {
                self.p.set(StatusFlag::Break, false);
                self.p.set(StatusFlag::Unused, true);
            }
            Register::SP => {}
        }
    }

    fn modify_register(&mut self, register: Register, f: impl FnOnce(u8) -> u8) {
        let value = self.read_register(register);
        self.write_register(register, f(value));
    }

    fn push_stack_u8(&mut self, value: u8) -> Result<()> {
        self.bus
            .write_u8(STACK_START_ADDRESS + self.sp as u16, value)?;
        self.sp = self.sp.wrapping_sub(1);

        Ok(())
    }

    fn pull_stack_u8(&mut self) -> Result<u8> {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read_u8(STACK_START_ADDRESS + self.sp as u16)
    }

    /// Addresses are pushed high byte first so they read back little-endian
    /// from the stack's point of view.
    fn push_stack_u16(&mut self, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.push_stack_u8(hi)?;
        self.push_stack_u8(lo)
    }

    fn pull_stack_u16(&mut self) -> Result<u16> {
        let lo = self.pull_stack_u8()?;
        let hi = self.pull_stack_u8()?;

        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn op_load(&mut self, register: Register, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let value = operand.read(self)?;
        self.write_register(register, value);

        Ok(())
    }

    fn op_store(&mut self, register: Register, mode: AddressingMode) -> Result<()> {
        let value = self.read_register(register);
        let operand = self.fetch_operand(mode)?;
        operand.write(self, value)
    }

    fn op_transfer(&mut self, source: Register, target: Register) -> Result<()> {
        let value = self.read_register(source);
        self.write_register(target, value);

        Ok(())
    }

    fn op_push(&mut self, source: Register) -> Result<()> {
        let value = match source {
            // Only the stacked copy of `p` carries the break flag.
            Register::P => self.p.with(StatusFlag::Break, true).0,
            _ => self.read_register(source),
        };

        self.push_stack_u8(value)
    }

    fn op_pull(&mut self, target: Register) -> Result<()> {
        let value = self.pull_stack_u8()?;
        self.write_register(target, value);

        Ok(())
    }

    fn op_logical(&mut self, mode: AddressingMode, f: fn(u8, u8) -> u8) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let value = operand.read(self)?;
        let result = f(self.a, value);
        self.write_register(Register::A, result);

        Ok(())
    }

    fn op_bit(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let value = operand.read(self)?;

        // `a` masks the operand but only the flags see the result.
        self.p.set(StatusFlag::Zero, self.a & value == 0);
        self.p.set(StatusFlag::Overflow, value & 0x40 != 0);
        self.p.set(StatusFlag::Negative, value & 0x80 != 0);

        Ok(())
    }

    fn op_add(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let rhs = operand.read(self)?;

        let lhs = self.a;
        let carry_in = u8::from(self.p.get(StatusFlag::Carry));

        let (result, wrapped) = lhs.overflowing_add(rhs);
        let (result, carry_wrapped) = result.overflowing_add(carry_in);
        self.p.set(StatusFlag::Carry, wrapped || carry_wrapped);

        // Signed overflow: both inputs share a sign bit the result doesn't.
        let overflow = (lhs ^ result) & (rhs ^ result) & 0x80 != 0;
        self.p.set(StatusFlag::Overflow, overflow);

        self.write_register(Register::A, result);

        Ok(())
    }

    fn op_subtract(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let rhs = operand.read(self)?;

        let lhs = self.a;
        let borrow_in = 1 - u8::from(self.p.get(StatusFlag::Carry));

        let (result, wrapped) = lhs.overflowing_sub(rhs);
        let (result, borrow_wrapped) = result.overflowing_sub(borrow_in);
        // Carry is the inverse borrow: set when the subtraction stayed
        // above zero.
        self.p
            .set(StatusFlag::Carry, !(wrapped || borrow_wrapped));

        // Signed overflow: the operands have different sign bits and the
        // result's sign left `lhs` behind.
        let overflow = (lhs ^ rhs) & (lhs ^ result) & 0x80 != 0;
        self.p.set(StatusFlag::Overflow, overflow);

        self.write_register(Register::A, result);

        Ok(())
    }

    fn op_compare(&mut self, register: Register, mode: AddressingMode) -> Result<()> {
        let lhs = self.read_register(register);
        let operand = self.fetch_operand(mode)?;
        let rhs = operand.read(self)?;
        let result = lhs.wrapping_sub(rhs);

        self.p.set(StatusFlag::Carry, lhs >= rhs);
        self.p.set(StatusFlag::Zero, lhs == rhs);
        self.p.set(StatusFlag::Negative, result & 0x80 != 0);

        Ok(())
    }

    fn op_modify_memory(&mut self, mode: AddressingMode, f: fn(u8) -> u8) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        operand.modify(self, f)?;

        Ok(())
    }

    fn op_shift_left(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let (input, _) = operand.modify(self, |v| v.wrapping_shl(1))?;
        self.p.set(StatusFlag::Carry, input & 0x80 != 0);

        Ok(())
    }

    fn op_shift_right(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let (input, _) = operand.modify(self, |v| v.wrapping_shr(1))?;
        self.p.set(StatusFlag::Carry, input & 0x01 != 0);

        Ok(())
    }

    fn op_rotate_left(&mut self, mode: AddressingMode) -> Result<()> {
        let carry_in = u8::from(self.p.get(StatusFlag::Carry));
        let operand = self.fetch_operand(mode)?;
        let (input, _) = operand.modify(self, |v| v.wrapping_shl(1) | carry_in)?;
        self.p.set(StatusFlag::Carry, input & 0x80 != 0);

        Ok(())
    }

    fn op_rotate_right(&mut self, mode: AddressingMode) -> Result<()> {
        let carry_in = u8::from(self.p.get(StatusFlag::Carry)) << 7;
        let operand = self.fetch_operand(mode)?;
        let (input, _) = operand.modify(self, |v| v.wrapping_shr(1) | carry_in)?;
        self.p.set(StatusFlag::Carry, input & 0x01 != 0);

        Ok(())
    }

    fn op_jump(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        self.pc = operand.address()?;

        Ok(())
    }

    fn op_jump_subroutine(&mut self, mode: AddressingMode) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        let target = operand.address()?;

        // The stacked return address is one short of the next instruction;
        // RTS compensates.
        let return_address = self.pc.wrapping_sub(1);
        self.push_stack_u16(return_address)?;

        self.pc = target;

        Ok(())
    }

    fn op_return(&mut self) -> Result<()> {
        let address = self.pull_stack_u16()?;
        self.pc = address.wrapping_add(1);

        Ok(())
    }

    fn op_return_from_interrupt(&mut self) -> Result<()> {
        let flags = self.pull_stack_u8()?;
        self.write_register(Register::P, flags);
        self.pc = self.pull_stack_u16()?;

        Ok(())
    }

    fn op_branch_if(&mut self, mode: AddressingMode, condition: bool) -> Result<()> {
        let operand = self.fetch_operand(mode)?;
        if condition {
            self.pc = operand.address()?;
        }

        Ok(())
    }

    fn op_break(&mut self) -> Result<()> {
        // The byte after BRK is padding; the stacked pc skips over it.
        self.pc = self.pc.wrapping_add(1);
        self.push_stack_u16(self.pc)?;
        self.push_stack_u8(self.p.with(StatusFlag::Break, true).0)?;
        self.pc = self.bus.read_u16(IRQ_VECTOR_ADDRESS)?;

        Ok(())
    }
}

impl fmt::Debug for RP2A03 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RP2A03")
            .field("a", &self.a)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("p", &self.p)
            .field("sp", &self.sp)
            .field("pc", &self.pc)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn flags(cpu: &RP2A03) -> (bool, bool, bool, bool) {
        (
            cpu.p.get(StatusFlag::Carry),
            cpu.p.get(StatusFlag::Zero),
            cpu.p.get(StatusFlag::Overflow),
            cpu.p.get(StatusFlag::Negative),
        )
    }

    #[test]
    fn power_on_state() {
        let mut cpu = RP2A03::new();

        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(cpu.p.0, 0x24);
        assert_eq!(cpu.pc, 0);

        // Work RAM covers exactly [0x0000, 0x1FFF].
        assert_eq!(cpu.bus.read_u8(0x0000), Ok(0));
        assert_eq!(cpu.bus.read_u8(0x1FFF), Ok(0));
        assert_eq!(cpu.bus.read_u8(0x2000), Err(Error::UnmappedAddress(0x2000)));
    }

    #[test]
    fn unknown_opcodes_are_fatal() {
        let mut cpu = RP2A03::with_program(&[0x02]).unwrap();

        assert_eq!(cpu.step(), Err(Error::UnknownOpcode(0x02)));
    }

    #[test]
    fn load_immediate_sets_registers_and_flags() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0xBB, // LDA #$BB
            0xA2, 0x55, // LDX #$55
            0xA0, 0x25, // LDY #$25
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!((cpu.a, cpu.x, cpu.y), (0xBB, 0x55, 0x25));

        let mut cpu = RP2A03::with_program(&[0xA9, 0x00]).unwrap(); // LDA #$00
        cpu.step().unwrap();
        assert!(cpu.p.get(StatusFlag::Zero));
        assert!(!cpu.p.get(StatusFlag::Negative));

        let mut cpu = RP2A03::with_program(&[0xA9, 0x80]).unwrap(); // LDA #$80
        cpu.step().unwrap();
        assert!(!cpu.p.get(StatusFlag::Zero));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn stores_write_registers_without_touching_flags() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0xBE, // LDA #$BE
            0xA2, 0x40, // LDX #$40
            0xA0, 0xFF, // LDY #$FF
            0x85, 0x10, // STA $10
            0x86, 0x11, // STX $11
            0x84, 0x12, // STY $12
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(
            cpu.bus.read_range(0x0010, 0x0013),
            Ok(vec![0xBE, 0x40, 0xFF])
        );
        // The last flag-setting instruction was LDY #$FF.
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn transfers_copy_and_set_flags_except_txs() {
        let mut cpu = RP2A03::with_program(&[
            0xA2, 0x42, // LDX #$42
            0x9A, // TXS
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.sp, 0x42);

        // TSX pulls sp back out and does set flags.
        let mut cpu = RP2A03::with_program(&[
            0xA2, 0x80, // LDX #$80
            0x9A, // TXS
            0xA9, 0x00, // LDA #$00     (forces Z=1, N=0)
            0xBA, // TSX
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.x, 0x80);
        assert!(!cpu.p.get(StatusFlag::Zero));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn txs_does_not_touch_flags() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x01, // LDA #$01     (Z=0, N=0)
            0xA2, 0x00, // LDX #$00     (Z=1)
            0x9A, // TXS
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.sp, 0x00);
        // Still the flags LDX left behind.
        assert!(cpu.p.get(StatusFlag::Zero));
        assert!(!cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn pha_pla_roundtrip_leaves_sp_unchanged() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0xE0, // LDA #$E0
            0x48, // PHA
            0xA9, 0x00, // LDA #$00
            0x68, // PLA
        ])
        .unwrap();
        let sp_before = cpu.sp;
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.a, 0xE0);
        assert_eq!(cpu.sp, sp_before);
        assert!(!cpu.p.get(StatusFlag::Zero));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn php_pushes_break_but_plp_never_pulls_it() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0x08, // PHP
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        // The stacked copy has B set on top of C, I and U.
        assert_eq!(cpu.bus.read_u8(0x01FD), Ok(0x35));

        let mut cpu = RP2A03::with_program(&[
            0xA9, 0xFF, // LDA #$FF
            0x48, // PHA          (stack a raw 0xFF)
            0x28, // PLP
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        // B comes back clear, U comes back set, everything else survives.
        assert_eq!(cpu.p.0, 0xEF);
    }

    #[test]
    fn compare_orders_the_flags() {
        // CMP with a smaller operand: carry set, zero clear.
        let mut cpu = RP2A03::with_program(&[0xA9, 0x40, 0xC9, 0x20]).unwrap();
        cpu.run_until_brk().unwrap();
        let (c, z, _, n) = flags(&cpu);
        assert_eq!((c, z, n), (true, false, false));
        assert_eq!(cpu.a, 0x40, "compare must not modify the register");

        // Equal operands: carry and zero both set.
        let mut cpu = RP2A03::with_program(&[0xA2, 0x20, 0xE0, 0x20]).unwrap(); // LDX/CPX
        cpu.run_until_brk().unwrap();
        let (c, z, _, _) = flags(&cpu);
        assert_eq!((c, z), (true, true));

        // Larger operand: borrow, and the wrapped difference is negative.
        let mut cpu = RP2A03::with_program(&[0xA0, 0x20, 0xC0, 0x40]).unwrap(); // LDY/CPY
        cpu.run_until_brk().unwrap();
        let (c, z, _, n) = flags(&cpu);
        assert_eq!((c, z, n), (false, false, true));
    }

    #[test]
    fn bit_reads_n_and_v_straight_from_the_operand() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x0F, // LDA #$0F
            0x24, 0x10, // BIT $10
        ])
        .unwrap();
        cpu.bus.write_u8(0x0010, 0xC0).unwrap();
        cpu.run_until_brk().unwrap();

        let (_, z, v, n) = flags(&cpu);
        assert_eq!((z, v, n), (true, true, true));
        assert_eq!(cpu.a, 0x0F, "BIT must not modify the accumulator");

        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x40, // LDA #$40
            0x24, 0x10, // BIT $10
        ])
        .unwrap();
        cpu.bus.write_u8(0x0010, 0x40).unwrap();
        cpu.run_until_brk().unwrap();

        let (_, z, v, n) = flags(&cpu);
        assert_eq!((z, v, n), (false, true, false));
    }

    #[test]
    fn adc_chains_the_carry() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xA9, 0xFF, // LDA #$FF
            0x69, 0x00, // ADC #$00
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, v, _) = flags(&cpu);
        assert_eq!(cpu.a, 0x00);
        assert_eq!((c, z, v), (true, true, false));
    }

    #[test]
    fn adc_signed_overflow_at_the_positive_edge() {
        let mut cpu = RP2A03::with_program(&[
            0x18, // CLC
            0xA9, 0x7F, // LDA #$7F
            0x69, 0x01, // ADC #$01
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, v, n) = flags(&cpu);
        assert_eq!(cpu.a, 0x80);
        assert_eq!((c, z, v, n), (false, false, true, true));
    }

    #[test]
    fn sbc_reports_borrow_through_carry() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xA9, 0x50, // LDA #$50
            0xE9, 0xF0, // SBC #$F0
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, v, n) = flags(&cpu);
        assert_eq!(cpu.a, 0x60);
        // 0x50 - 0xF0 borrows; signed it is 80 - (-16) = 96, no overflow.
        assert_eq!((c, z, v, n), (false, false, false, false));
    }

    #[test]
    fn sbc_signed_overflow() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xA9, 0xD0, // LDA #$D0
            0xE9, 0x70, // SBC #$70
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, v, n) = flags(&cpu);
        assert_eq!(cpu.a, 0x60);
        // -48 - 112 = -160 does not fit in a signed byte.
        assert_eq!((c, z, v, n), (true, false, true, false));
    }

    #[test]
    fn sbc_without_carry_borrows_one_more() {
        let mut cpu = RP2A03::with_program(&[
            0x18, // CLC
            0xA9, 0x10, // LDA #$10
            0xE9, 0x05, // SBC #$05
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.a, 0x0A);
        assert!(cpu.p.get(StatusFlag::Carry));
    }

    #[test]
    fn inc_and_dec_wrap_and_set_flags() {
        let mut cpu = RP2A03::with_program(&[0xE6, 0x10]).unwrap(); // INC $10
        cpu.bus.write_u8(0x0010, 0xFF).unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.bus.read_u8(0x0010), Ok(0x00));
        assert!(cpu.p.get(StatusFlag::Zero));

        let mut cpu = RP2A03::with_program(&[0xC6, 0x10]).unwrap(); // DEC $10
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.bus.read_u8(0x0010), Ok(0xFF));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn register_increments_wrap_and_set_flags() {
        let mut cpu = RP2A03::with_program(&[
            0xA2, 0xFF, // LDX #$FF
            0xE8, // INX
            0xA0, 0x00, // LDY #$00
            0x88, // DEY
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.x, 0x00);
        assert_eq!(cpu.y, 0xFF);
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn asl_moves_bit_7_into_carry() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x80, // LDA #$80
            0x0A, // ASL A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, _, n) = flags(&cpu);
        assert_eq!(cpu.a, 0x00);
        assert_eq!((c, z, n), (true, true, false));
    }

    #[test]
    fn lsr_moves_bit_0_into_carry_and_clears_n() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0xFF, // LDA #$FF
            0x4A, // LSR A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        let (c, z, _, n) = flags(&cpu);
        assert_eq!(cpu.a, 0x7F);
        assert_eq!((c, z, n), (true, false, false));
    }

    #[test]
    fn shift_pairs_drop_the_end_bits() {
        // LSR then ASL loses bit 0.
        let mut cpu = RP2A03::with_program(&[
            0x18, // CLC
            0xA9, 0xB7, // LDA #$B7
            0x4A, // LSR A
            0x0A, // ASL A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert_eq!(cpu.a, 0xB7 & 0xFE);

        // ASL then LSR loses bit 7.
        let mut cpu = RP2A03::with_program(&[
            0x18, // CLC
            0xA9, 0xB7, // LDA #$B7
            0x0A, // ASL A
            0x4A, // LSR A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert_eq!(cpu.a, 0xB7 & 0x7F);
    }

    #[test]
    fn rol_and_ror_rotate_through_carry() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xA9, 0x80, // LDA #$80
            0x2A, // ROL A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        // Carry in becomes bit 0; bit 7 becomes carry out.
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.p.get(StatusFlag::Carry));

        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xA9, 0x01, // LDA #$01
            0x6A, // ROR A
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        // Carry in becomes bit 7; bit 0 becomes carry out.
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    fn rotate_memory_sets_flags_from_the_result() {
        let mut cpu = RP2A03::with_program(&[0x26, 0x10]).unwrap(); // ROL $10
        cpu.bus.write_u8(0x0010, 0x40).unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.bus.read_u8(0x0010), Ok(0x80));
        assert!(cpu.p.get(StatusFlag::Negative));
        assert!(!cpu.p.get(StatusFlag::Carry));
    }

    #[test]
    fn jmp_absolute_sets_pc_exactly() {
        let mut cpu = RP2A03::with_program(&[0x4C, 0x00, 0x07]).unwrap(); // JMP $0700
        cpu.step().unwrap();

        assert_eq!(cpu.pc, 0x0700);
    }

    #[test]
    fn jmp_indirect_honors_the_page_wrap() {
        let mut cpu = RP2A03::with_program(&[0x6C, 0xFF, 0x02]).unwrap(); // JMP ($02FF)
        cpu.bus.write_u16(0x0200, 0x0700).unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.pc, 0x0700);
    }

    #[test]
    fn jsr_pushes_the_return_address_high_then_low() {
        // PROGRAM_ORIGIN is 0x0600, so the stacked return address is 0x0602.
        let mut cpu = RP2A03::with_program(&[0x20, 0x34, 0x12]).unwrap(); // JSR $1234
        cpu.step().unwrap();

        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(cpu.sp, 0xFB);
        assert_eq!(cpu.bus.read_u8(0x01FD), Ok(0x06));
        assert_eq!(cpu.bus.read_u8(0x01FC), Ok(0x02));
    }

    #[test]
    fn rts_resumes_after_the_jsr_operand() {
        let mut cpu = RP2A03::with_program(&[
            0x20, 0x00, 0x07, // JSR $0700
            0xA2, 0x77, // LDX #$77    (the return target)
        ])
        .unwrap();
        // The subroutine.
        cpu.bus.write_u8(0x0700, 0xA9).unwrap(); // LDA #$FF
        cpu.bus.write_u8(0x0701, 0xFF).unwrap();
        cpu.bus.write_u8(0x0702, 0x60).unwrap(); // RTS

        cpu.step().unwrap(); // JSR
        cpu.step().unwrap(); // LDA
        cpu.step().unwrap(); // RTS
        assert_eq!(cpu.pc, RP2A03::PROGRAM_ORIGIN + 3);

        cpu.step().unwrap(); // LDX
        assert_eq!(cpu.a, 0xFF);
        assert_eq!(cpu.x, 0x77);
    }

    #[test]
    fn rti_pulls_flags_then_address() {
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x06, // LDA #$06    (pch)
            0x48, // PHA
            0xA9, 0x10, // LDA #$10    (pcl)
            0x48, // PHA
            0xA9, 0xC3, // LDA #$C3    (flags)
            0x48, // PHA
            0x40, // RTI
        ])
        .unwrap();
        for _ in 0..7 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.pc, 0x0610);
        // 0xC3 with B forced clear and U forced set.
        assert_eq!(cpu.p.0, 0xE3);
    }

    #[test]
    fn branches_take_or_fall_through() {
        // BNE taken skips the LDA that would clobber `a`.
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x01, // LDA #$01
            0xD0, 0x02, // BNE +2
            0xA9, 0xFF, // LDA #$FF    (skipped)
            0xEA, // NOP
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert_eq!(cpu.a, 0x01);

        // BEQ not taken falls through to the next instruction.
        let mut cpu = RP2A03::with_program(&[
            0xA9, 0x01, // LDA #$01
            0xF0, 0x02, // BEQ +2      (not taken)
            0xA9, 0x42, // LDA #$42
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn backwards_branches_loop() {
        let mut cpu = RP2A03::with_program(&[
            0xA2, 0x03, // LDX #$03
            0xCA, // DEX
            0xD0, 0xFD, // BNE -3 (back to DEX)
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.x, 0x00);
        assert!(cpu.p.get(StatusFlag::Zero));
    }

    #[test]
    fn brk_pushes_state_and_jumps_through_the_vector() {
        let mut cpu = RP2A03::with_program(&[0x00]).unwrap(); // BRK
        cpu.bus.mount(0xFFFA, 0xFFFF, Ram::new(6)).unwrap();
        cpu.bus.write_u16(IRQ_VECTOR_ADDRESS, 0x0300).unwrap();

        cpu.step().unwrap();

        assert_eq!(cpu.pc, 0x0300);
        assert_eq!(cpu.sp, 0xFA);
        // Return address 0x0602 (opcode plus padding byte), then p with B.
        assert_eq!(cpu.bus.read_u8(0x01FD), Ok(0x06));
        assert_eq!(cpu.bus.read_u8(0x01FC), Ok(0x02));
        assert_eq!(cpu.bus.read_u8(0x01FB), Ok(0x34));
    }

    /// Records every access for asserting on instruction-internal ordering.
    struct Probe {
        events: Rc<RefCell<Vec<(char, u16, u8)>>>,
        value: u8,
    }

    impl Device for Probe {
        fn read(&mut self, offset: u16) -> u8 {
            self.events.borrow_mut().push(('r', offset, 0));
            self.value
        }

        fn write(&mut self, offset: u16, value: u8) {
            self.events.borrow_mut().push(('w', offset, value));
        }
    }

    #[test]
    fn inc_reads_then_writes_the_same_address() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let probe = Probe {
            events: Rc::clone(&events),
            value: 0x41,
        };

        let mut cpu = RP2A03::with_program(&[0xEE, 0x10, 0x80]).unwrap(); // INC $8010
        cpu.bus.mount(0x8000, 0x80FF, probe).unwrap();
        cpu.step().unwrap();

        assert_eq!(*events.borrow(), vec![('r', 0x10, 0), ('w', 0x10, 0x42)]);
    }

    #[test]
    fn jsr_pushes_are_visible_to_the_stack_device_in_order() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let probe = Probe {
            events: Rc::clone(&events),
            value: 0,
        };

        let mut bus = Bus::new();
        bus.mount(0x0000, 0x00FF, Ram::new(0x100)).unwrap();
        bus.mount(0x0100, 0x01FF, probe).unwrap();
        let mut cpu = RP2A03::with_bus(bus);

        // JSR $1234 at 0x0000: return address 0x0002, high byte first.
        cpu.bus.write_u8(0x0000, 0x20).unwrap();
        cpu.bus.write_u8(0x0001, 0x34).unwrap();
        cpu.bus.write_u8(0x0002, 0x12).unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(*events.borrow(), vec![('w', 0xFD, 0x00), ('w', 0xFC, 0x02)]);
    }

    #[test]
    fn nop_only_consumes_its_opcode() {
        let mut cpu = RP2A03::with_program(&[0xEA]).unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.pc, RP2A03::PROGRAM_ORIGIN + 1);
        assert_eq!((cpu.a, cpu.x, cpu.y, cpu.sp), (0, 0, 0, 0xFD));
        assert_eq!(cpu.p.0, 0x24);
    }

    #[test]
    fn flag_instructions_set_and_clear_their_bits() {
        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xF8, // SED
            0x78, // SEI
            0xEA, // NOP
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::DecimalMode));
        assert!(cpu.p.get(StatusFlag::InterruptDisable));

        let mut cpu = RP2A03::with_program(&[
            0x38, // SEC
            0xF8, // SED
            0x18, // CLC
            0xD8, // CLD
            0x58, // CLI
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();
        assert!(!cpu.p.get(StatusFlag::Carry));
        assert!(!cpu.p.get(StatusFlag::DecimalMode));
        assert!(!cpu.p.get(StatusFlag::InterruptDisable));
    }

    #[test]
    fn clv_clears_overflow() {
        let mut cpu = RP2A03::with_program(&[
            0x18, // CLC
            0xA9, 0x7F, // LDA #$7F
            0x69, 0x01, // ADC #$01    (sets V)
            0xB8, // CLV
        ])
        .unwrap();
        cpu.run_until_brk().unwrap();

        assert!(!cpu.p.get(StatusFlag::Overflow));
    }

    #[test]
    fn indexed_loads_and_stores_go_through_memory() {
        let mut cpu = RP2A03::with_program(&[
            0xA2, 0x03, // LDX #$03
            0xBD, 0x00, 0x07, // LDA $0700,X
            0xA0, 0x02, // LDY #$02
            0x99, 0x10, 0x07, // STA $0710,Y
        ])
        .unwrap();
        cpu.bus.write_u8(0x0703, 0x5A).unwrap();
        cpu.run_until_brk().unwrap();

        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.bus.read_u8(0x0712), Ok(0x5A));
    }
}
