//! This module builds the kernel's initial translation tables in physical memory.
//!
//! The boot code carves three structures behind the kernel image:
//!
//! * `Sysseg`, the segment table walked by the MMU (one page for the flat format,
//!   `mmu040::SYSSEG_PAGES` holding both table levels for the hierarchical one),
//! * `Sysptmap`, a page mapping the kernel page table pages, kept in sync with
//!   `Sysseg` for the software side of the pmap,
//! * the kernel page table itself, mapping the image, the boot structures and the
//!   I/O apertures at its top.
//!
//! Relocation: all addresses written into descriptors are post-relocation addresses,
//! while the tables are built at their pre-relocation location.

pub mod iomap;
pub mod kernel;
pub mod mmu030;
pub mod mmu040;

use core::marker::PhantomData;
use core::ops::Range;

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::PhysMemory;
use m68k::mmu::{Descriptor, PageFlags, Pte};
use m68k::param::{NBSEG, NPTEPG, PAGE_SIZE, PGSHIFT, SEGSHIFT, TIB_SIZE};

use crate::reloc::Relocation;

/// Virtual address of the kernel page table map, the last segment of the address space.
pub const SYSMAP_VA: u32 = 0_u32.wrapping_sub(NBSEG);
/// Slot of `SYSMAP_VA` in the flat segment table and in the page table map.
pub const SYSMAP_SLOT: u32 = SYSMAP_VA >> SEGSHIFT;

const_assert!(SYSMAP_VA == 0xff00_0000);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableError {
    /// An entry beyond the end of a table was addressed.
    Overflow { index: u32, capacity: u32 },
    /// The kernel page table is larger than the segment tables can describe.
    TooManyPageTables { pages: u32, limit: u32 },
}

/// A table of `len` hardware descriptors starting at physical address `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<D> {
    base: PhysAddr,
    len: u32,
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> Table<D> {
    pub const fn new(base: PhysAddr, len: u32) -> Table<D> {
        Table { base, len, _descriptor: PhantomData }
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    /// Physical address of the slot `index`.
    pub fn entry_addr(&self, index: u32) -> Result<PhysAddr, TableError> {
        if index >= self.len {
            return Err(TableError::Overflow { index, capacity: self.len });
        }
        Ok(self.base + index * 4)
    }

    pub fn read<M: PhysMemory>(&self, mem: &M, index: u32) -> Result<D, TableError> {
        Ok(D::from_raw(mem.read_u32(self.entry_addr(index)?)))
    }

    pub fn write<M: PhysMemory>(&self, mem: &mut M, index: u32, entry: D) -> Result<(), TableError> {
        mem.write_u32(self.entry_addr(index)?, entry.raw());
        Ok(())
    }

    /// Write `entry` to every slot in `slots`.
    pub fn fill<M: PhysMemory>(&self, mem: &mut M, slots: Range<u32>, entry: D) -> Result<(), TableError> {
        self.check_range(&slots)?;
        for index in slots {
            self.write(mem, index, entry)?;
        }
        Ok(())
    }

    /// Write `first` to the first slot in `slots`, and each following slot with the
    /// address of the previous one advanced by `step` bytes.
    pub fn fill_incrementing<M: PhysMemory>(
        &self, mem: &mut M, slots: Range<u32>, first: D, step: u32
    ) -> Result<D, TableError> {
        self.check_range(&slots)?;
        let mut entry = first;
        for index in slots {
            self.write(mem, index, entry)?;
            entry = entry.offset(step);
        }
        Ok(entry)
    }

    fn check_range(&self, slots: &Range<u32>) -> Result<(), TableError> {
        if slots.end > self.len {
            Err(TableError::Overflow { index: slots.end - 1, capacity: self.len })
        } else {
            Ok(())
        }
    }
}

impl Table<Pte> {
    /// Map `size` bytes at `virt` linearly to physical memory starting at `phys`.
    /// The table is indexed by virtual page number.
    pub fn map_linear<M: PhysMemory>(
        &self, mem: &mut M, virt: VirtAddr, phys: PhysAddr, size: u32, flags: PageFlags
    ) -> Result<(), TableError> {
        let first = virt.0 >> PGSHIFT;
        let pages = m68k::param::btoc(size);
        self.fill_incrementing(mem, first..first + pages, Pte::new(phys, flags), PAGE_SIZE)?;
        Ok(())
    }
}

/// Where the translation structures were carved, at their pre-relocation addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub sysseg: PhysAddr,
    pub sysseg_pages: u32,
    pub sysptmap: PhysAddr,
    pub pt: PhysAddr,
    /// Size of the kernel page table in bytes.
    pub pt_size: u32,
}

impl TableLayout {
    pub fn pt_pages(&self) -> u32 {
        self.pt_size >> PGSHIFT
    }

    /// The kernel page table, indexed by kernel virtual page number.
    pub fn pt_table(&self) -> Table<Pte> {
        Table::new(self.pt, self.pt_size / 4)
    }

    pub fn sysptmap_table(&self) -> Table<Pte> {
        Table::new(self.sysptmap, TIB_SIZE)
    }

    /// Map the kernel page table pages into `Sysptmap` and invalidate its other slots,
    /// except for the slot mapping `Sysptmap` itself.
    fn init_sysptmap<M: PhysMemory>(&self, mem: &mut M, reloc: &Relocation) -> Result<(), TableError> {
        let ptmap = self.sysptmap_table();
        let pages = self.pt_pages();
        let flags = PageFlags::CACHE_INHIBIT | PageFlags::VALID;

        ptmap.fill_incrementing(mem, 0..pages, Pte::new(reloc.apply(self.pt), flags), PAGE_SIZE)?;
        ptmap.fill(mem, pages..TIB_SIZE, Pte::INVALID)?;
        ptmap.write(mem, SYSMAP_SLOT, Pte::new(reloc.apply(self.sysptmap), flags))
    }

    /// The kernel page table must leave the `SYSMAP_SLOT` segment free.
    fn check_pt_pages(&self) -> Result<(), TableError> {
        let pages = self.pt_pages();
        if pages > SYSMAP_SLOT || pages > NPTEPG {
            return Err(TableError::TooManyPageTables { pages, limit: SYSMAP_SLOT });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use m68k::bus::sim::SimBus;

    /// Fill pattern of never written table memory. Never a value the builders write.
    pub const UNTOUCHED: u32 = 0xa5a5_a5a5;

    pub fn bus() -> SimBus {
        SimBus::new(0xa5).with_ram(0, 0x0040_0000).with_ram(0x0100_0000, 0x0100_0000)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::test_support::*;

    #[test]
    fn table_bounds_are_checked() {
        let mut mem = bus();
        let table: Table<Pte> = Table::new(PhysAddr(0x4000), 16);

        table.fill(&mut mem, 0..16, Pte::INVALID).unwrap();
        assert_eq!(table.write(&mut mem, 16, Pte::INVALID), Err(TableError::Overflow { index: 16, capacity: 16 }));
        assert_eq!(table.fill(&mut mem, 8..17, Pte::INVALID), Err(TableError::Overflow { index: 16, capacity: 16 }));
        assert_eq!(mem.read_u32(PhysAddr(0x4040)), UNTOUCHED, "overflowing fill wrote past the table");
    }

    #[test]
    fn linear_mapping() {
        let mut mem = bus();
        let table: Table<Pte> = Table::new(PhysAddr(0x4000), 64);
        let flags = PageFlags::CACHE_INHIBIT | PageFlags::VALID;

        table.map_linear(&mut mem, VirtAddr(4 * PAGE_SIZE), PhysAddr(0x00ff_8000), 0x8000, flags).unwrap();
        for i in 0..4 {
            let pte = table.read(&mem, 4 + i).unwrap();
            assert_eq!(pte.frame(), PhysAddr(0x00ff_8000 + i * PAGE_SIZE), "pte = {:?}", pte);
            assert_eq!(pte.flags(), flags);
        }
        assert_eq!(table.read(&mem, 8).unwrap().raw(), UNTOUCHED);
    }
}
