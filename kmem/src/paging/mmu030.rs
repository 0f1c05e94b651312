//! Segment table setup for the flat (68851 / 68030) table format.

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::PhysMemory;
use m68k::mmu::{Descriptor, SegFlags, Ste, SG_FRAME, SG_PMASK};
use m68k::param::{PAGE_MASK, PAGE_SIZE, PGSHIFT, SEGSHIFT, TIA_SIZE};

use crate::reloc::Relocation;
use super::{SYSMAP_SLOT, Table, TableError, TableLayout};

/// The flat segment table occupies one page, of which the MMU uses the first `TIA_SIZE` slots.
pub const SYSSEG_PAGES: u32 = 1;

/// The hardware visible part of the segment table.
pub fn sysseg_table(layout: &TableLayout) -> Table<Ste> {
    Table::new(layout.sysseg, TIA_SIZE)
}

/// Point one segment table entry at each kernel page table page, invalidate the rest,
/// and map the page table map at `SYSMAP_VA`.
pub fn setup<M: PhysMemory>(mem: &mut M, layout: &TableLayout, reloc: &Relocation) -> Result<(), TableError> {
    layout.check_pt_pages()?;

    let sg = sysseg_table(layout);
    let pages = layout.pt_pages();

    sg.fill_incrementing(mem, 0..pages, Ste::new(reloc.apply(layout.pt), SegFlags::VALID), PAGE_SIZE)?;
    sg.fill(mem, pages..TIA_SIZE, Ste::INVALID)?;
    sg.write(mem, SYSMAP_SLOT, Ste::new(reloc.apply(layout.sysptmap), SegFlags::VALID))?;

    layout.init_sysptmap(mem, reloc)?;

    debug!("[mmu030] {} page table pages, sysseg at {:p}", pages, reloc.apply(layout.sysseg));
    Ok(())
}

/// Walk flat tables rooted at `sysseg` the way the MMU would.
pub fn translate<M: PhysMemory>(mem: &M, sysseg: PhysAddr, va: VirtAddr) -> Option<PhysAddr> {
    let ste = Ste::from_raw(mem.read_u32(sysseg + (va.0 >> SEGSHIFT) * 4));
    if !ste.is_valid() {
        return None;
    }
    let pte_addr = ste.table(SG_FRAME) + ((va.0 & SG_PMASK) >> PGSHIFT) * 4;
    let pte = m68k::mmu::Pte::from_raw(mem.read_u32(pte_addr));
    if !pte.is_valid() {
        return None;
    }
    Some(pte.frame() + (va.0 & PAGE_MASK))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::paging::test_support::*;
    use crate::paging::SYSMAP_VA;
    use m68k::mmu::Pte;
    use m68k::param::TIB_SIZE;

    fn layout() -> TableLayout {
        TableLayout {
            sysseg: PhysAddr(0x0005_0000),
            sysseg_pages: SYSSEG_PAGES,
            sysptmap: PhysAddr(0x0005_2000),
            pt: PhysAddr(0x0005_4000),
            pt_size: 3 * PAGE_SIZE,
        }
    }

    #[test]
    fn every_slot_written() {
        let mut mem = bus();
        let layout = layout();
        setup(&mut mem, &layout, &Relocation::NONE).unwrap();

        let sg = sysseg_table(&layout);
        for i in 0..TIA_SIZE {
            let raw = sg.read(&mem, i).unwrap().raw();
            assert_ne!(raw, UNTOUCHED, "sysseg[{}] never written", i);
        }
        let ptmap = layout.sysptmap_table();
        for i in 0..TIB_SIZE {
            let raw = ptmap.read(&mem, i).unwrap().raw();
            assert_ne!(raw, UNTOUCHED, "sysptmap[{}] never written", i);
        }

        assert_eq!(sg.read(&mem, 2).unwrap(), Ste::new(PhysAddr(0x0005_8000), SegFlags::VALID));
        assert_eq!(sg.read(&mem, 3).unwrap(), Ste::INVALID);
        assert_eq!(ptmap.read(&mem, 1).unwrap().frame(), PhysAddr(0x0005_6000));
        assert_eq!(ptmap.read(&mem, SYSMAP_SLOT).unwrap().frame(), PhysAddr(0x0005_2000));
    }

    #[test]
    fn relocated_descriptors() {
        let mut mem = bus();
        let layout = layout();
        let reloc = Relocation::new(PhysAddr(0x0100_0000));
        setup(&mut mem, &layout, &reloc).unwrap();

        let sg = sysseg_table(&layout);
        assert_eq!(sg.read(&mem, 0).unwrap().table(SG_FRAME), PhysAddr(0x0105_4000));
        assert_eq!(sg.read(&mem, SYSMAP_SLOT).unwrap().table(SG_FRAME), PhysAddr(0x0105_2000));
    }

    #[test]
    fn sysmap_translates_to_page_tables() {
        let mut mem = bus();
        let layout = layout();
        setup(&mut mem, &layout, &Relocation::NONE).unwrap();

        // Sysptmap maps the page table pages at SYSMAP_VA
        let pa = translate(&mem, layout.sysseg, VirtAddr(SYSMAP_VA + PAGE_SIZE + 0x10));
        assert_eq!(pa, Some(PhysAddr(0x0005_6010)));

        layout.pt_table().write(&mut mem, 5, Pte::INVALID).unwrap();
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(5 * PAGE_SIZE)), None);
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(0x1000_0000)), None);
    }

    #[test]
    fn page_table_count_is_limited() {
        let mut mem = bus();
        let mut layout = layout();
        layout.pt_size = 256 * PAGE_SIZE;
        assert_eq!(setup(&mut mem, &layout, &Relocation::NONE), Err(TableError::TooManyPageTables { pages: 256, limit: 255 }));
    }
}
