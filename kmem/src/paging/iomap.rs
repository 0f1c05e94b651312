//! Device apertures at the top of the kernel page table.
//!
//! The slots past the kernel's own mappings are reserved up front (their number is
//! part of the page table size). Windows are handed out from the first reserved slot
//! upwards, every page read-write and cache inhibited.

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::PhysMemory;
use m68k::mmu::{PageFlags, Pte};
use m68k::param::{btoc, ctob};

use super::{Table, TableError};

/// A mapped device window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Aperture {
    pub virt: VirtAddr,
    /// Physical address of the first page. For chip select decoding, the base with the
    /// first select bit applied.
    pub phys: PhysAddr,
    pub size: u32,
}

impl Aperture {
    pub fn end(&self) -> VirtAddr {
        self.virt + self.size
    }

    pub fn overlaps(&self, other: &Aperture) -> bool {
        self.virt < other.end() && other.virt < self.end()
    }
}

/// How the pages of a window map to physical addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decode {
    /// Consecutive pages map consecutive physical pages.
    Linear(PhysAddr),
    /// Page `n` maps `base | (first_select << n)`, selecting one device per page.
    ChipSelect { base: PhysAddr, first_select: u32 },
}

impl Decode {
    fn phys(&self, page: u32) -> PhysAddr {
        match *self {
            Decode::Linear(start) => start + ctob(page),
            Decode::ChipSelect { base, first_select } => PhysAddr(base.0 | (first_select << page)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IoMapError {
    /// The reserved slots are exhausted.
    OutOfSlots { requested: u32, available: u32 },
    /// The reserved slots start below the end of the kernel's mappings.
    OverlapsKernel { kernel_end: VirtAddr, io_start: VirtAddr },
    Table(TableError),
}

impl From<TableError> for IoMapError {
    fn from(e: TableError) -> IoMapError {
        IoMapError::Table(e)
    }
}

/// Hands out windows from the reserved slots at the end of the kernel page table.
#[derive(Debug)]
pub struct ApertureMapper<'t> {
    pt: &'t Table<Pte>,
    next: u32,
}

impl<'t> ApertureMapper<'t> {
    /// Reserve the last `extra_pages` slots of `pt`, which must all lie at or above
    /// `kernel_end`.
    pub fn new(pt: &'t Table<Pte>, extra_pages: u32, kernel_end: VirtAddr) -> Result<ApertureMapper<'t>, IoMapError> {
        if extra_pages > pt.len() {
            return Err(IoMapError::OutOfSlots { requested: extra_pages, available: pt.len() });
        }
        let first = pt.len() - extra_pages;
        let io_start = VirtAddr(ctob(first));
        if kernel_end > io_start {
            return Err(IoMapError::OverlapsKernel { kernel_end, io_start });
        }
        Ok(ApertureMapper { pt, next: first })
    }

    /// Virtual address of the next window.
    pub fn next(&self) -> VirtAddr {
        VirtAddr(ctob(self.next))
    }

    /// Slots left.
    pub fn available(&self) -> u32 {
        self.pt.len() - self.next
    }

    /// Map a window of `size` bytes. `extra` is or-ed into every descriptor.
    pub fn map<M: PhysMemory>(
        &mut self, mem: &mut M, size: u32, decode: Decode, extra: PageFlags
    ) -> Result<Aperture, IoMapError> {
        let pages = self.claim(size)?;
        let flags = PageFlags::CACHE_INHIBIT | PageFlags::VALID | extra;
        for page in 0..pages {
            self.pt.write(mem, self.next + page, Pte::new(decode.phys(page), flags))?;
        }
        let aperture = Aperture { virt: self.next(), phys: decode.phys(0), size: ctob(pages) };
        self.next += pages;
        debug!("[iomap] {:p} -> {:p}, {} pages", aperture.virt, aperture.phys, pages);
        Ok(aperture)
    }

    /// Reserve `size` bytes of virtual space without mapping anything. Returns the
    /// virtual address and the physical address of the first (invalid) descriptor.
    pub fn reserve(&mut self, size: u32) -> Result<(VirtAddr, PhysAddr), IoMapError> {
        let pages = self.claim(size)?;
        let va = self.next();
        let first_pte = self.pt.entry_addr(self.next)?;
        self.next += pages;
        Ok((va, first_pte))
    }

    fn claim(&self, size: u32) -> Result<u32, IoMapError> {
        let pages = btoc(size);
        if pages > self.available() {
            return Err(IoMapError::OutOfSlots { requested: pages, available: self.available() });
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::paging::test_support::*;
    use m68k::mmu::Descriptor;
    use m68k::param::PAGE_SIZE;

    const PT: PhysAddr = PhysAddr(0x0020_0000);

    #[test]
    fn windows_are_disjoint_and_uncached() {
        let mut mem = bus();
        let pt: Table<Pte> = Table::new(PT, 4096);
        pt.fill(&mut mem, 0..4096, Pte::INVALID).unwrap();
        let kernel_end = VirtAddr(0x0010_0000);
        let mut io = ApertureMapper::new(&pt, 64, kernel_end).unwrap();
        assert_eq!(io.next(), VirtAddr(4032 * PAGE_SIZE));

        let stio = io.map(&mut mem, 0x8000, Decode::Linear(PhysAddr(0x00ff_8000)), PageFlags::empty()).unwrap();
        let conf = io.map(&mut mem, 4 * PAGE_SIZE,
            Decode::ChipSelect { base: PhysAddr(0xa000_0000), first_select: 0x0001_0000 }, PageFlags::empty()).unwrap();
        let mem_win = io.map(&mut mem, 0x0001_0000, Decode::Linear(PhysAddr(0x8000_0000)), PageFlags::USER_ATTR0).unwrap();
        let (pool, first_pte) = io.reserve(48 * PAGE_SIZE).unwrap();

        let windows = [stio, conf, mem_win];
        for (i, a) in windows.iter().enumerate() {
            assert!(a.virt >= kernel_end, "window {:?} overlaps the kernel", a);
            for b in windows[i + 1..].iter() {
                assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
            }
        }
        for slot in 4032..4032 + 16 {
            let pte = pt.read(&mem, slot).unwrap();
            assert!(pte.flags().contains(PageFlags::CACHE_INHIBIT | PageFlags::VALID), "pt[{}] = {:?}", slot, pte);
        }

        assert_eq!(pt.read(&mem, 4036).unwrap().raw(), 0xa001_0041);
        assert_eq!(pt.read(&mem, 4039).unwrap().raw(), 0xa008_0041);
        assert_eq!(pt.read(&mem, 4040).unwrap().raw(), 0x8000_0141);
        assert_eq!(pool, VirtAddr(4048 * PAGE_SIZE));
        assert_eq!(first_pte, PT + 4048 * 4);
        assert_eq!(io.available(), 0);
        assert_eq!(io.reserve(1), Err(IoMapError::OutOfSlots { requested: 1, available: 0 }));
    }

    #[test]
    fn reserved_slots_must_clear_the_kernel() {
        let pt: Table<Pte> = Table::new(PT, 4096);
        let err = ApertureMapper::new(&pt, 64, VirtAddr(4033 * PAGE_SIZE)).unwrap_err();
        assert_eq!(err, IoMapError::OverlapsKernel {
            kernel_end: VirtAddr(4033 * PAGE_SIZE),
            io_start: VirtAddr(4032 * PAGE_SIZE),
        });
    }
}
