//! Segment table setup for the hierarchical (68040 / 68060) table format.
//!
//! `Sysseg` holds the level 1 table in its first 128 slots, followed by level 2 tables
//! of 128 slots each. The kernel page table pages serve as level 3 tables, 64 of them
//! (32 descriptors each) per page.
//!
//! ```text
//!   sysseg[0..nl1]        level 1 -> level 2 blocks 0..nl1
//!   sysseg[127]           level 1 -> level 2 block nl1 (SYSMAP_VA)
//!   sysseg[128..128+nl2]  level 2 -> kernel page table, 128 bytes apart
//!   block nl1 [64..128]   level 2 -> Sysptmap, 128 bytes apart
//! ```

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::PhysMemory;
use m68k::mmu::{Descriptor, Pte, SegFlags, Ste};
use m68k::mmu::{SG4_ADDR1, SG4_ADDR2, SG4_MASK2, SG4_MASK3, SG4_SHIFT1, SG4_SHIFT2, SG4_SHIFT3};
use m68k::param::{howmany, NPTEPG, PAGE_MASK, SG4_LEV1SIZE, SG4_LEV2SIZE, SG4_LEV3SIZE};

use crate::reloc::Relocation;
use super::{Table, TableError, TableLayout};

/// Maximum number of level 1 and level 2 tables kept in `Sysseg`.
pub const MAXKL2SIZE: u32 = 32;
/// Pages needed for `MAXKL2SIZE` tables.
pub const SYSSEG_PAGES: u32 = MAXKL2SIZE / (NPTEPG / SG4_LEV2SIZE);

/// Level 3 tables per page table page.
const LEV3_PER_PAGE: u32 = NPTEPG / SG4_LEV3SIZE;
const DESC_SIZE: u32 = 4;

const_assert!(SYSSEG_PAGES == 2);
const_assert!(LEV3_PER_PAGE <= SG4_LEV2SIZE);

/// Bookkeeping the pmap needs to continue managing `Sysseg`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    /// Level 1 descriptors in use for the kernel page table.
    pub nl1desc: u32,
    /// Level 2 descriptors in use for the kernel page table.
    pub nl2desc: u32,
    /// Bitmask of level 2 blocks still free in `Sysseg`, bit `n` for block `n`.
    pub protostfree: u32,
}

/// All of `Sysseg`, both levels.
pub fn sysseg_table(layout: &TableLayout) -> Table<Ste> {
    Table::new(layout.sysseg, layout.sysseg_pages * NPTEPG)
}

/// Invalidate `Sysseg`, then link the kernel page table pages in through level 1 and
/// level 2 descriptors and map `Sysptmap` at `SYSMAP_VA`.
pub fn setup<M: PhysMemory>(mem: &mut M, layout: &TableLayout, reloc: &Relocation) -> Result<Hierarchy, TableError> {
    layout.check_pt_pages()?;

    let sg = sysseg_table(layout);
    let flags = SegFlags::USED | SegFlags::VALID;

    let nl2desc = layout.pt_pages() * LEV3_PER_PAGE;
    let nl1desc = howmany(nl2desc, SG4_LEV2SIZE);
    // first slot of the level 2 block for SYSMAP_VA
    let sysmap_block = SG4_LEV1SIZE + nl1desc * SG4_LEV2SIZE;
    if nl1desc >= SG4_LEV1SIZE - 1 || sysmap_block + SG4_LEV2SIZE > sg.len() {
        return Err(TableError::TooManyPageTables {
            pages: layout.pt_pages(),
            limit: (MAXKL2SIZE - 2) * SG4_LEV2SIZE / LEV3_PER_PAGE,
        });
    }

    sg.fill(mem, 0..sg.len(), Ste::INVALID)?;

    let lev2 = SG4_LEV1SIZE..SG4_LEV1SIZE + nl2desc;
    sg.fill_incrementing(mem, lev2, Ste::new(reloc.apply(layout.pt), flags), SG4_LEV3SIZE * DESC_SIZE)?;

    let first_block = Ste::new(reloc.apply(layout.sysseg + SG4_LEV1SIZE * DESC_SIZE), flags);
    let next_block = sg.fill_incrementing(mem, 0..nl1desc, first_block, SG4_LEV2SIZE * DESC_SIZE)?;
    sg.write(mem, SG4_LEV1SIZE - 1, next_block)?;

    let sysmap = sysmap_block + SG4_LEV2SIZE - LEV3_PER_PAGE..sysmap_block + SG4_LEV2SIZE;
    sg.fill_incrementing(mem, sysmap, Ste::new(reloc.apply(layout.sysptmap), flags), SG4_LEV3SIZE * DESC_SIZE)?;

    layout.init_sysptmap(mem, reloc)?;

    // level 1 block, kernel level 2 blocks and the Sysmap block are taken
    let protostfree = (!0_u32).checked_shl(1 + nl1desc + 1).unwrap_or(0);

    debug!("[mmu040] nl1desc={} nl2desc={} protostfree={:#010x}", nl1desc, nl2desc, protostfree);
    Ok(Hierarchy { nl1desc, nl2desc, protostfree })
}

/// Walk hierarchical tables rooted at `srp` the way the MMU would.
pub fn translate<M: PhysMemory>(mem: &M, srp: PhysAddr, va: VirtAddr) -> Option<PhysAddr> {
    let l1 = Ste::from_raw(mem.read_u32(srp + (va.0 >> SG4_SHIFT1) * DESC_SIZE));
    if !l1.is_valid() {
        return None;
    }
    let l2 = Ste::from_raw(mem.read_u32(l1.table(SG4_ADDR1) + ((va.0 & SG4_MASK2) >> SG4_SHIFT2) * DESC_SIZE));
    if !l2.is_valid() {
        return None;
    }
    let pte = Pte::from_raw(mem.read_u32(l2.table(SG4_ADDR2) + ((va.0 & SG4_MASK3) >> SG4_SHIFT3) * DESC_SIZE));
    if !pte.is_valid() {
        return None;
    }
    Some(pte.frame() + (va.0 & PAGE_MASK))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::paging::test_support::*;
    use crate::paging::{SYSMAP_SLOT, SYSMAP_VA};
    use m68k::mmu::PageFlags;
    use m68k::param::{PAGE_SIZE, TIB_SIZE};

    fn layout(pt_pages: u32) -> TableLayout {
        TableLayout {
            sysseg: PhysAddr(0x0005_0000),
            sysseg_pages: SYSSEG_PAGES,
            sysptmap: PhysAddr(0x0005_4000),
            pt: PhysAddr(0x0005_6000),
            pt_size: pt_pages * PAGE_SIZE,
        }
    }

    #[test]
    fn every_slot_written() {
        let mut mem = bus();
        let layout = layout(5);
        let h = setup(&mut mem, &layout, &Relocation::NONE).unwrap();
        assert_eq!(h, Hierarchy { nl1desc: 3, nl2desc: 320, protostfree: !0 << 5 });

        let sg = sysseg_table(&layout);
        assert_eq!(sg.len(), 4096);
        for i in 0..sg.len() {
            let raw = sg.read(&mem, i).unwrap().raw();
            assert_ne!(raw, UNTOUCHED, "sysseg[{}] never written", i);
        }
        let ptmap = layout.sysptmap_table();
        for i in 0..TIB_SIZE {
            let raw = ptmap.read(&mem, i).unwrap().raw();
            assert_ne!(raw, UNTOUCHED, "sysptmap[{}] never written", i);
        }
    }

    #[test]
    fn descriptor_layout() {
        let mut mem = bus();
        let layout = layout(5);
        let reloc = Relocation::new(PhysAddr(0x0100_0000));
        setup(&mut mem, &layout, &reloc).unwrap();
        let sg = sysseg_table(&layout);

        // level 1 points to level 2 blocks, 512 bytes apart, in relocated Sysseg
        assert_eq!(sg.read(&mem, 0).unwrap().table(SG4_ADDR1), PhysAddr(0x0105_0200));
        assert_eq!(sg.read(&mem, 2).unwrap().table(SG4_ADDR1), PhysAddr(0x0105_0600));
        assert_eq!(sg.read(&mem, 3).unwrap(), Ste::INVALID);
        assert_eq!(sg.read(&mem, 127).unwrap().table(SG4_ADDR1), PhysAddr(0x0105_0800));

        // level 2 points into the page table, 128 bytes apart
        let l2 = sg.read(&mem, 128 + 65).unwrap();
        assert_eq!(l2.table(SG4_ADDR2), PhysAddr(0x0105_6000 + 65 * 128));
        assert_eq!(l2.flags(), SegFlags::USED | SegFlags::VALID);

        // Sysmap block maps Sysptmap in its upper half
        let block = 128 + 3 * 128;
        assert_eq!(sg.read(&mem, block + 63).unwrap(), Ste::INVALID);
        assert_eq!(sg.read(&mem, block + 64).unwrap().table(SG4_ADDR2), PhysAddr(0x0105_4000));
        assert_eq!(sg.read(&mem, block + 127).unwrap().table(SG4_ADDR2), PhysAddr(0x0105_4000 + 63 * 128));

        let ptmap = layout.sysptmap_table();
        assert_eq!(ptmap.read(&mem, SYSMAP_SLOT).unwrap(),
            Pte::new(PhysAddr(0x0105_4000), PageFlags::CACHE_INHIBIT | PageFlags::VALID));
    }

    #[test]
    fn walks_like_the_mmu() {
        let mut mem = bus();
        let layout = layout(2);
        setup(&mut mem, &layout, &Relocation::NONE).unwrap();

        let pt = layout.pt_table();
        pt.write(&mut mem, 3, Pte::new(PhysAddr(0x0000_6000), PageFlags::VALID)).unwrap();
        pt.write(&mut mem, 2100, Pte::new(PhysAddr(0x0010_0000), PageFlags::VALID)).unwrap();
        pt.write(&mut mem, 2101, Pte::INVALID).unwrap();

        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(3 * PAGE_SIZE + 4)), Some(PhysAddr(0x6004)));
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(2100 * PAGE_SIZE)), Some(PhysAddr(0x0010_0000)));
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(2101 * PAGE_SIZE)), None);
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(0x4000_0000)), None);
        // second page of Sysmap is the second page table page
        assert_eq!(translate(&mem, layout.sysseg, VirtAddr(SYSMAP_VA + PAGE_SIZE)), Some(PhysAddr(0x0005_8000)));
    }

    #[test]
    fn sysseg_capacity_is_limited() {
        let mut mem = bus();
        // 30 level 2 blocks fit besides the level 1 block and the Sysmap block
        let full = setup(&mut mem, &layout(60), &Relocation::NONE).unwrap();
        assert_eq!(full.nl1desc, 30);
        assert_eq!(full.protostfree, 0, "no level 2 block is left free");
        assert!(setup(&mut mem, &layout(61), &Relocation::NONE).is_err());
    }
}
