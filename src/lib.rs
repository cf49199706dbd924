//! Instruction-accurate emulation of the RP2A03, the CPU die of the NES.
//!
//! The RP2A03 is a MOS 6502 with the decimal unit disconnected, which means
//! this crate is also a usable 6502 core for anything that doesn't rely on
//! decimal mode.

pub mod rp2a03;
