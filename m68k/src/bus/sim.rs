//! A simulated physical address space for exercising boot code on the host.
//!
//! The simulation knows three kinds of address:
//!
//! * RAM regions, decoded over a window that may be larger than the installed memory.
//!   Addresses past the installed size wrap around and alias the start of the region,
//!   the way incompletely decoded SIMM slots behave.
//! * Faulting ranges, which report a bus error to `FaultProbe`.
//! * Everything else, which reads as open bus (`0xff`) and ignores writes.
//!
//! RAM bytes that have never been written read back as a configurable fill pattern,
//! so tests can tell which table slots were never touched.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::PhysAddr;
use super::{FaultProbe, PhysMemory};

/// Value read from addresses nobody answers for.
pub const OPEN_BUS: u8 = 0xff;

#[derive(Debug, Clone)]
struct Region {
    base: u32,
    window: u32,
    size: u32,
}

impl Region {
    fn resolve(&self, addr: u32) -> Option<u32> {
        let offset = addr.checked_sub(self.base)?;
        if offset >= self.window || self.size == 0 {
            return None;
        }
        Some(self.base + offset % self.size)
    }
}

#[derive(Debug, Clone)]
pub struct SimBus {
    regions: Vec<Region>,
    faults: Vec<(u32, u32)>,
    bytes: BTreeMap<u32, u8>,
    fill: u8,
}

impl SimBus {
    /// An empty address space whose untouched RAM reads as `fill`.
    pub fn new(fill: u8) -> SimBus {
        SimBus {
            regions: Vec::new(),
            faults: Vec::new(),
            bytes: BTreeMap::new(),
            fill,
        }
    }

    /// Install `size` bytes of RAM at `base`, fully decoded.
    pub fn with_ram(self, base: u32, size: u32) -> SimBus {
        self.with_mirrored_ram(base, size, size)
    }

    /// Install `size` bytes of RAM at `base`, repeated over a decode window of `window` bytes.
    pub fn with_mirrored_ram(mut self, base: u32, size: u32, window: u32) -> SimBus {
        self.regions.push(Region { base, window, size });
        self
    }

    /// Make byte accesses to `[start, start + len)` raise bus errors.
    pub fn with_fault(mut self, start: u32, len: u32) -> SimBus {
        self.faults.push((start, len));
        self
    }

    /// Every RAM byte that was written and differs from `reference`.
    pub fn differences(&self, reference: &SimBus) -> Vec<u32> {
        self.bytes.keys()
            .chain(reference.bytes.keys())
            .filter(|&&a| self.read_u8(PhysAddr(a)) != reference.read_u8(PhysAddr(a)))
            .cloned()
            .collect()
    }

    fn resolve(&self, addr: u32) -> Option<u32> {
        self.regions.iter().find_map(|r| r.resolve(addr))
    }
}

impl PhysMemory for SimBus {
    fn read_u8(&self, addr: PhysAddr) -> u8 {
        match self.resolve(addr.0) {
            Some(cell) => self.bytes.get(&cell).cloned().unwrap_or(self.fill),
            None => OPEN_BUS,
        }
    }

    fn write_u8(&mut self, addr: PhysAddr, value: u8) {
        if let Some(cell) = self.resolve(addr.0) {
            self.bytes.insert(cell, value);
        }
    }

    fn read_u32(&self, addr: PhysAddr) -> u32 {
        (0..4).fold(0, |acc, i| (acc << 8) | self.read_u8(addr + i) as u32)
    }

    fn write_u32(&mut self, addr: PhysAddr, value: u32) {
        for (i, byte) in value.to_be_bytes().iter().enumerate() {
            self.write_u8(addr + i as u32, *byte);
        }
    }
}

impl FaultProbe for SimBus {
    fn bad_byte_addr(&self, addr: PhysAddr) -> bool {
        self.faults.iter().any(|&(start, len)| addr.0 >= start && addr.0 - start < len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mirrored_ram_aliases() {
        let mut bus = SimBus::new(0xa5)
            .with_mirrored_ram(0x1000_0000, 0x0100_0000, 0x0400_0000)
            .with_fault(0x2000_0000, 0x1000);

        assert_eq!(bus.read_u8(PhysAddr(0x1000_0010)), 0xa5, "untouched RAM must read the fill");
        bus.write_u8(PhysAddr(0x1100_0010), 0x42);
        assert_eq!(bus.read_u8(PhysAddr(0x1000_0010)), 0x42, "write through the mirror was lost");
        assert_eq!(bus.read_u8(PhysAddr(0x1400_0000)), OPEN_BUS);

        bus.write_u32(PhysAddr(0x1000_0100), 0xdead_beef);
        assert_eq!(bus.read_u8(PhysAddr(0x1000_0100)), 0xde, "not big endian");
        assert_eq!(bus.read_u32(PhysAddr(0x1300_0100)), 0xdead_beef);

        assert!(bus.bad_byte_addr(PhysAddr(0x2000_0fff)));
        assert!(!bus.bad_byte_addr(PhysAddr(0x2000_1000)));
    }
}
