//! Access to physical memory and device registers before translation is enabled.
//!
//! Everything that touches hardware does so through `PhysMemory` (plain volatile loads
//! and stores) and `FaultProbe` (asking whether an access would raise a bus error).
//! The kernel uses `RawBus`, host tests use the simulated bus from `sim`.

use core::ptr;

use crate::PhysAddr;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Uncached, unreordered access to physical addresses.
pub trait PhysMemory {
    fn read_u8(&self, addr: PhysAddr) -> u8;
    fn write_u8(&mut self, addr: PhysAddr, value: u8);
    /// Big endian 32 bit read, `addr` must be 2 byte aligned.
    fn read_u32(&self, addr: PhysAddr) -> u32;
    /// Big endian 32 bit write, `addr` must be 2 byte aligned.
    fn write_u32(&mut self, addr: PhysAddr, value: u32);
}

/// Side-effect free test whether a byte access would raise a bus error.
pub trait FaultProbe {
    /// Returns `true` if reading the byte at `addr` faults.
    fn bad_byte_addr(&self, addr: PhysAddr) -> bool;
}

/// The real bus, with physical addresses used directly as pointers.
#[derive(Debug)]
pub struct RawBus(());

impl RawBus {
    /// Creates a handle to physical memory.
    /// This is unsafe because it only works while PA == VA and hands out unchecked
    /// access to every address.
    pub const unsafe fn new() -> RawBus {
        RawBus(())
    }
}

impl PhysMemory for RawBus {
    #[inline]
    fn read_u8(&self, addr: PhysAddr) -> u8 {
        unsafe { ptr::read_volatile(addr.0 as usize as *const u8) }
    }

    #[inline]
    fn write_u8(&mut self, addr: PhysAddr, value: u8) {
        unsafe { ptr::write_volatile(addr.0 as usize as *mut u8, value) }
    }

    #[inline]
    fn read_u32(&self, addr: PhysAddr) -> u32 {
        unsafe { ptr::read_volatile(addr.0 as usize as *const u32) }
    }

    #[inline]
    fn write_u32(&mut self, addr: PhysAddr, value: u32) {
        unsafe { ptr::write_volatile(addr.0 as usize as *mut u32, value) }
    }
}

#[cfg(target_arch = "m68k")]
extern "C" {
    /// Bus error catching probe provided by the low level trap code.
    fn badbaddr(addr: *mut u8, size: i32) -> i32;
}

#[cfg(target_arch = "m68k")]
impl FaultProbe for RawBus {
    fn bad_byte_addr(&self, addr: PhysAddr) -> bool {
        unsafe { badbaddr(addr.0 as usize as *mut u8, 1) != 0 }
    }
}
