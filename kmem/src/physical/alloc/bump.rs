//! A bump allocator that is meant for the early system startup.
//! Memory allocated with it can not be freed, every structure it hands out lives for
//! the whole up time of the kernel.

use m68k::{PhysAddr, VirtAddr};
use m68k::param::{round_page, trunc_page, PAGE_MASK};

use crate::reloc::Relocation;
use super::AllocError;

/// One allocation, addressed both physically and virtually.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Carve {
    pub phys: PhysAddr,
    pub virt: VirtAddr,
    /// Page rounded size in bytes.
    pub size: u32,
}

impl Carve {
    /// The physical address the carved structure will have once the kernel is relocated.
    pub fn relocated(&self, reloc: &Relocation) -> PhysAddr {
        reloc.apply(self.phys)
    }
}

/// A pair of cursors that only ever advance, in lock step, by whole pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootAllocator {
    phys: PhysAddr,
    virt: VirtAddr,
    /// Bytes left between the physical cursor and the end of the usable memory.
    remaining: u32,
}

impl BootAllocator {
    /// Start allocating at the first page behind the loaded image, which still runs with
    /// PA == VA. Memory ends at `limit`.
    pub fn behind_image(end_loaded: VirtAddr, limit: PhysAddr) -> Result<BootAllocator, AllocError> {
        let virt = VirtAddr(round_page(end_loaded.0));
        let phys = virt.identity();
        if limit < phys {
            return Err(AllocError::OutOfMemory { requested: phys - limit, remaining: 0 });
        }
        Ok(BootAllocator { phys, virt, remaining: limit - phys })
    }

    /// Allocate `size` bytes, rounded up to whole pages. On failure nothing changes.
    pub fn take(&mut self, size: u32) -> Result<Carve, AllocError> {
        let size = match size.checked_add(PAGE_MASK) {
            Some(padded) => trunc_page(padded),
            None => return Err(AllocError::OutOfMemory { requested: size, remaining: self.remaining }),
        };
        if size > self.remaining {
            return Err(AllocError::OutOfMemory { requested: size, remaining: self.remaining });
        }
        let carve = Carve { phys: self.phys, virt: self.virt, size };
        self.phys += size;
        self.virt += size;
        self.remaining -= size;
        trace!("[kmem] carved {} bytes at {:p}", size, carve.virt);
        Ok(carve)
    }

    /// Rebase the physical cursor once the kernel is known to move to `reloc`.
    pub fn relocate(&mut self, reloc: &Relocation) {
        self.phys = reloc.apply(self.phys);
    }

    /// Next free physical address.
    pub fn phys_cursor(&self) -> PhysAddr {
        self.phys
    }

    /// Next free virtual address.
    pub fn virt_cursor(&self) -> VirtAddr {
        self.virt
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Physical minus virtual cursor, modulo 2^32.
    pub fn offset(&self) -> u32 {
        self.phys.0.wrapping_sub(self.virt.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use m68k::param::PAGE_SIZE;

    #[test]
    fn cursors_advance_in_lock_step() {
        let mut alloc = BootAllocator::behind_image(VirtAddr(0x0004_1234), PhysAddr(0x0040_0000)).unwrap();
        assert_eq!(alloc.virt_cursor(), VirtAddr(0x0004_2000));
        assert_eq!(alloc.remaining(), 0x0040_0000 - 0x0004_2000);

        for &size in [2 * PAGE_SIZE, 1, PAGE_SIZE, 3 * PAGE_SIZE + 7].iter() {
            let before = alloc.virt_cursor();
            let carve = alloc.take(size).unwrap();
            assert_eq!(carve.virt, before);
            assert_eq!(carve.size % PAGE_SIZE, 0, "carve = {:?}", carve);
            assert!(carve.size >= size, "carve = {:?}", carve);
            assert_eq!(alloc.offset(), 0, "alloc = {:?}", alloc);
        }

        let reloc = Relocation::new(PhysAddr(0x0100_0000));
        alloc.relocate(&reloc);
        assert_eq!(alloc.offset(), 0x0100_0000, "alloc = {:?}", alloc);
        let carve = alloc.take(PAGE_SIZE).unwrap();
        assert_eq!(carve.phys - PhysAddr(carve.virt.0), 0x0100_0000);
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut alloc = BootAllocator::behind_image(VirtAddr(0x2000), PhysAddr(0x8000)).unwrap();
        let before = alloc.clone();
        assert_eq!(alloc.take(0x6001), Err(AllocError::OutOfMemory { requested: 0x8000, remaining: 0x6000 }));
        assert_eq!(alloc, before, "failed take moved the cursors");
        assert!(alloc.take(0x6000).is_ok());
        assert!(alloc.take(1).is_err());

        let mut alloc = BootAllocator::behind_image(VirtAddr(0x2000), PhysAddr(0x0040_0000)).unwrap();
        let before = alloc.clone();
        assert_eq!(alloc.take(0xffff_fff5), Err(AllocError::OutOfMemory { requested: 0xffff_fff5, remaining: 0x003f_e000 }));
        assert_eq!(alloc, before, "request near the top of the address space was truncated");

        assert!(BootAllocator::behind_image(VirtAddr(0x9000), PhysAddr(0x8000)).is_err());
    }
}
