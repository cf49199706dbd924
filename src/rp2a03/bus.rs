use log::debug;

use super::error::Error;
use super::{Address, Result};

/// A memory-mapped device occupying one contiguous region of the address
/// space.
///
/// The bus translates absolute addresses before dispatching, so a device
/// only ever sees offsets relative to the start of its own region. A device
/// may be a plain value store like [`Ram`] or stateful hardware whose reads
/// have side effects; both operations take `&mut self` so the bus doesn't
/// care which it is talking to.
pub trait Device {
    fn read(&mut self, offset: u16) -> u8;

    fn write(&mut self, offset: u16, value: u8);
}

/// Flat byte memory. Backs the CPU work RAM and most test fixtures.
pub struct Ram {
    bytes: Vec<u8>,
}

impl Ram {
    pub fn new(size: usize) -> Ram {
        Ram {
            bytes: vec![0; size],
        }
    }

    /// Builder: this `Ram` with `bytes` copied in starting at `offset`.
    pub fn with_bytes_at(mut self, offset: usize, bytes: &[u8]) -> Ram {
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }
}

impl Device for Ram {
    fn read(&mut self, offset: u16) -> u8 {
        self.bytes[offset as usize]
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.bytes[offset as usize] = value;
    }
}

struct Mount {
    start: Address,
    end: Address,
    device: Box<dyn Device>,
}

impl Mount {
    fn contains(&self, address: Address) -> bool {
        self.start <= address && address <= self.end
    }
}

/// The CPU's view of memory: a set of non-overlapping device mounts.
///
/// Every read and write is routed to the unique mount whose inclusive
/// `[start, end]` region contains the address. An address outside every
/// mount is a fault, not open-bus behavior.
pub struct Bus {
    mounts: Vec<Mount>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus { mounts: Vec::new() }
    }

    /// Mount `device` over the inclusive region `[start, end]`.
    ///
    /// Fails if the region intersects an existing mount, in which case the
    /// existing mounts are left untouched.
    pub fn mount(
        &mut self,
        start: Address,
        end: Address,
        device: impl Device + 'static,
    ) -> Result<()> {
        if self.mounts.iter().any(|m| start <= m.end && m.start <= end) {
            return Err(Error::MountOverlap { start, end });
        }

        debug!("mounting device at [{:#06x}, {:#06x}]", start, end);
        self.mounts.push(Mount {
            start,
            end,
            device: Box::new(device),
        });

        Ok(())
    }

    fn mount_at(&mut self, address: Address) -> Result<&mut Mount> {
        self.mounts
            .iter_mut()
            .find(|m| m.contains(address))
            .ok_or(Error::UnmappedAddress(address))
    }

    pub fn read_u8(&mut self, address: Address) -> Result<u8> {
        let mount = self.mount_at(address)?;
        let offset = address - mount.start;
        Ok(mount.device.read(offset))
    }

    pub fn write_u8(&mut self, address: Address, value: u8) -> Result<()> {
        let mount = self.mount_at(address)?;
        let offset = address - mount.start;
        mount.device.write(offset, value);
        Ok(())
    }

    /// Read a little-endian `u16`: low byte at `address`, high byte at
    /// `address + 1`, read in that order.
    pub fn read_u16(&mut self, address: Address) -> Result<u16> {
        let lo = self.read_u8(address)?;
        let hi = self.read_u8(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Write a little-endian `u16` starting at `address`.
    pub fn write_u16(&mut self, address: Address, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.write_u8(address, lo)?;
        self.write_u8(address.wrapping_add(1), hi)
    }

    /// Copy out `[start, end)` for inspection. Reads go through the mounted
    /// devices, so peeking at side-effectful hardware is on the caller.
    pub fn read_range(&mut self, start: Address, end: Address) -> Result<Vec<u8>> {
        (start..end).map(|a| self.read_u8(a)).collect()
    }
}
