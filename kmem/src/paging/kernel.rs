//! Filling the kernel page table for the kernel's own image and boot structures.

use m68k::VirtAddr;
use m68k::bus::PhysMemory;
use m68k::mmu::{PageFlags, Pte};
use m68k::param::{PAGE_SIZE, PGSHIFT};

use crate::reloc::Relocation;
use super::{Table, TableError};

/// Boundaries of the kernel's virtual address range, in ascending order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernelSpan {
    /// End of the text segment. Pages below are read-only.
    pub etext: VirtAddr,
    /// Start of the segment table.
    pub sysseg: VirtAddr,
    /// Start of the page table map, right behind the segment table.
    pub sysptmap: VirtAddr,
    /// End of everything carved so far.
    pub end: VirtAddr,
}

/// Caching of the kernel's data pages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheMode {
    /// Default write-through caching everywhere.
    Flat,
    /// Hierarchical MMU: the segment table must be mapped cache inhibited, the rest
    /// optionally copyback.
    Hierarchical { copyback: bool },
}

/// Map the kernel from virtual zero to `span.end` and invalidate the remainder of `pt`.
///
/// * page zero is left invalid to catch null pointers,
/// * text pages are read-only,
/// * everything else is read-write, with `Sysseg` cache inhibited for `CacheMode::Hierarchical`.
///
/// Returns the number of valid mappings written.
pub fn populate<M: PhysMemory>(
    mem: &mut M, pt: &Table<Pte>, reloc: &Relocation, span: &KernelSpan, cache: CacheMode
) -> Result<u32, TableError> {
    let end_page = span.end.0 >> PGSHIFT;
    if end_page > pt.len() {
        return Err(TableError::Overflow { index: end_page - 1, capacity: pt.len() });
    }

    let data = match cache {
        CacheMode::Hierarchical { copyback: true } => PageFlags::VALID | PageFlags::COPYBACK,
        _ => PageFlags::VALID,
    };
    let flags_at = |kva: u32| -> PageFlags {
        if kva < span.etext.0 {
            PageFlags::READ_ONLY | PageFlags::VALID
        } else if cache != CacheMode::Flat && kva >= span.sysseg.0 && kva < span.sysptmap.0 {
            PageFlags::CACHE_INHIBIT | PageFlags::VALID
        } else {
            data
        }
    };

    pt.write(mem, 0, Pte::INVALID)?;
    let mut kva = PAGE_SIZE;
    while kva < span.end.0 {
        pt.write(mem, kva >> PGSHIFT, Pte::new(reloc.virt_to_phys(VirtAddr(kva)), flags_at(kva)))?;
        kva += PAGE_SIZE;
    }
    pt.fill(mem, end_page.max(1)..pt.len(), Pte::INVALID)?;

    debug!("[kmem] kernel mapped up to {:p}, {} of {} ptes", span.end, end_page, pt.len());
    Ok(end_page.saturating_sub(1))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::paging::test_support::*;
    use m68k::{PhysAddr};
    use m68k::mmu::Descriptor;

    const PT: PhysAddr = PhysAddr(0x0020_0000);

    fn span() -> KernelSpan {
        KernelSpan {
            etext: VirtAddr(0x0002_3456),
            sysseg: VirtAddr(0x0004_4000),
            sysptmap: VirtAddr(0x0004_8000),
            end: VirtAddr(0x0005_0000),
        }
    }

    #[test]
    fn flat_attributes() {
        let mut mem = bus();
        let pt: Table<Pte> = Table::new(PT, 4096);
        let written = populate(&mut mem, &pt, &Relocation::NONE, &span(), CacheMode::Flat).unwrap();
        assert_eq!(written, 0x27);

        assert_eq!(pt.read(&mem, 0).unwrap(), Pte::INVALID, "page zero must stay invalid");
        let text = pt.read(&mem, 0x11).unwrap();
        assert_eq!(text, Pte::new(PhysAddr(0x0002_2000), PageFlags::READ_ONLY | PageFlags::VALID));
        let data = pt.read(&mem, 0x12).unwrap();
        assert_eq!(data, Pte::new(PhysAddr(0x0002_4000), PageFlags::VALID));
        assert_eq!(pt.read(&mem, 0x22).unwrap().flags(), PageFlags::VALID);
        for i in 0x28..pt.len() {
            assert_eq!(pt.read(&mem, i).unwrap(), Pte::INVALID, "pt[{:#x}] not invalidated", i);
        }
    }

    #[test]
    fn hierarchical_attributes() {
        let mut mem = bus();
        let pt: Table<Pte> = Table::new(PT, 4096);
        let reloc = Relocation::new(PhysAddr(0x0100_0000));
        populate(&mut mem, &pt, &reloc, &span(), CacheMode::Hierarchical { copyback: true }).unwrap();

        let before = pt.read(&mem, 0x21).unwrap();
        assert_eq!(before, Pte::new(PhysAddr(0x0104_2000), PageFlags::COPYBACK | PageFlags::VALID));
        for i in 0x22..0x24 {
            let pte = pt.read(&mem, i).unwrap();
            assert_eq!(pte.flags(), PageFlags::CACHE_INHIBIT | PageFlags::VALID, "pt[{:#x}] = {:?}", i, pte);
        }
        assert_eq!(pt.read(&mem, 0x24).unwrap().flags(), PageFlags::COPYBACK | PageFlags::VALID);

        populate(&mut mem, &pt, &reloc, &span(), CacheMode::Hierarchical { copyback: false }).unwrap();
        assert_eq!(pt.read(&mem, 0x24).unwrap().raw(), 0x0104_8001);
    }

    #[test]
    fn no_slot_left_behind() {
        let mut mem = bus();
        let pt: Table<Pte> = Table::new(PT, 4096);
        populate(&mut mem, &pt, &Relocation::NONE, &span(), CacheMode::Flat).unwrap();
        for i in 0..pt.len() {
            assert_ne!(pt.read(&mem, i).unwrap().raw(), UNTOUCHED, "pt[{:#x}] never written", i);
        }
    }

    #[test]
    fn span_must_fit() {
        let mut mem = bus();
        let pt: Table<Pte> = Table::new(PT, 16);
        let err = populate(&mut mem, &pt, &Relocation::NONE, &span(), CacheMode::Flat);
        assert_eq!(err, Err(TableError::Overflow { index: 0x27, capacity: 16 }));
    }
}
