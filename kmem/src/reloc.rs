//! Moving the kernel to a different physical base before translation is enabled.
//!
//! The kernel is linked at virtual address zero. Without relocation it also runs at
//! physical zero, with relocation its physical address is `va + base`.

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::PhysMemory;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Relocation {
    base: PhysAddr,
}

impl Relocation {
    /// The kernel stays where it was loaded.
    pub const NONE: Relocation = Relocation { base: PhysAddr(0) };

    pub const fn new(base: PhysAddr) -> Relocation {
        Relocation { base }
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn is_active(&self) -> bool {
        self.base != PhysAddr(0)
    }

    /// The address a physical address of the loaded image will have after the move.
    pub fn apply(&self, pa: PhysAddr) -> PhysAddr {
        PhysAddr(self.base.0 + pa.0)
    }

    /// Physical address of a kernel virtual address after the move.
    pub fn virt_to_phys(&self, va: VirtAddr) -> PhysAddr {
        self.apply(va.identity())
    }

    /// Copy the first `len` bytes of physical memory (the image and everything built
    /// behind it) to the relocation base, one 32 bit word at a time.
    pub fn copy_image<M: PhysMemory>(&self, mem: &mut M, len: u32) {
        if !self.is_active() {
            return;
        }
        debug!("[kmem] copying {} bytes to {:p}", len, self.base);
        let mut offset = 0;
        while offset < len {
            let word = mem.read_u32(PhysAddr(offset));
            mem.write_u32(self.base + offset, word);
            offset += 4;
        }
    }
}
