//! Segment and page descriptor formats shared by both MMU generations.
//!
//! Both generations use 32 bit short-format descriptors. The low bits carry the
//! attributes, the rest is the address of the next table or of the mapped page.
//! A raw value of zero is an invalid descriptor in every table of both formats.

use crate::PhysAddr;

bitflags! {
    /// Attribute bits of a segment table (level 1 and level 2) descriptor.
    pub struct SegFlags : u32 {
        /// Resident table descriptor.
        const VALID     = 0x0000_0002;
        const READ_ONLY = 0x0000_0004;
        /// Set by the table walker, pre-set by the kernel to spare it the write.
        const USED      = 0x0000_0008;
    }
}

bitflags! {
    /// Attribute bits of a page descriptor.
    pub struct PageFlags : u32 {
        /// Resident page descriptor.
        const VALID         = 0x0000_0001;
        const READ_ONLY     = 0x0000_0004;
        const USED          = 0x0000_0008;
        const MODIFIED      = 0x0000_0010;
        /// Copyback caching (hierarchical MMU only).
        const COPYBACK      = 0x0000_0020;
        const CACHE_INHIBIT = 0x0000_0040;
        const SUPERVISOR    = 0x0000_0080;
        /// User attribute 0, routed to external hardware on some boards.
        const USER_ATTR0    = 0x0000_0100;
    }
}

/// Valid bit of a segment descriptor.
pub const SG_V: u32 = SegFlags::VALID.bits();
/// Frame mask of a flat segment table entry.
pub const SG_FRAME: u32 = 0xffff_e000;
/// Index shift of a flat segment table.
pub const SG_ISHIFT: u32 = 24;
/// Page index mask within a flat segment.
pub const SG_PMASK: u32 = 0x00ff_e000;

pub const SG4_SHIFT1: u32 = 25;
pub const SG4_MASK2: u32 = 0x01fc_0000;
pub const SG4_SHIFT2: u32 = 18;
pub const SG4_MASK3: u32 = 0x0003_e000;
pub const SG4_SHIFT3: u32 = 13;
/// Pointer mask of a level 1 descriptor (level 2 tables are 512 byte aligned).
pub const SG4_ADDR1: u32 = 0xffff_fe00;
/// Pointer mask of a level 2 descriptor (page tables are 128 byte aligned).
pub const SG4_ADDR2: u32 = 0xffff_ff80;

/// Valid bit of a page descriptor.
pub const PG_V: u32 = PageFlags::VALID.bits();
/// Frame mask of a page descriptor.
pub const PG_FRAME: u32 = 0xffff_e000;

/// Anything that can be stored in one slot of a translation table.
pub trait Descriptor: Copy {
    /// The explicit "nothing here" value.
    const INVALID: Self;

    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;

    /// Move the referenced address by `delta` bytes, keeping the attributes.
    fn offset(self, delta: u32) -> Self {
        Self::from_raw(self.raw() + delta)
    }
}

/// A segment table entry, pointing to the next level of translation tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ste(u32);

/// A page table entry, mapping one page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u32);

impl Ste {
    const FLAG_MASK: u32 = 0xf;

    pub const INVALID: Ste = Ste(0);

    /// A descriptor pointing at the table at `table`. The table must be aligned to at
    /// least 16 bytes, the low bits hold the attributes.
    pub fn new(table: PhysAddr, flags: SegFlags) -> Ste {
        debug_assert!(table.0 & Self::FLAG_MASK == 0, "misaligned table {:p}", table);
        Ste(table.0 | flags.bits())
    }

    pub fn flags(&self) -> SegFlags {
        SegFlags::from_bits_truncate(self.0)
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(SegFlags::VALID)
    }

    /// The table this descriptor points to, under the pointer `mask` of its level.
    pub fn table(&self, mask: u32) -> PhysAddr {
        PhysAddr(self.0 & mask)
    }
}

impl Pte {
    pub const INVALID: Pte = Pte(0);

    /// A descriptor mapping the page frame containing `frame`.
    pub fn new(frame: PhysAddr, flags: PageFlags) -> Pte {
        Pte((frame.0 & PG_FRAME) | flags.bits())
    }

    pub fn flags(&self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }

    pub fn set_flags(&mut self, flags: PageFlags) {
        self.0 = (self.0 & PG_FRAME) | flags.bits();
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(PageFlags::VALID)
    }

    /// Return the physical page address mapped by this entry.
    pub fn frame(&self) -> PhysAddr {
        PhysAddr(self.0 & PG_FRAME)
    }
}

impl Descriptor for Ste {
    const INVALID: Ste = Ste(0);

    fn from_raw(raw: u32) -> Ste {
        Ste(raw)
    }

    fn raw(self) -> u32 {
        self.0
    }
}

impl Descriptor for Pte {
    const INVALID: Pte = Pte(0);

    fn from_raw(raw: u32) -> Pte {
        Pte(raw)
    }

    fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_table_entry_accessors() {
        let flags = PageFlags::VALID | PageFlags::CACHE_INHIBIT;
        let mut pte = Pte::new(PhysAddr(0x00ff_9123), flags);

        assert_eq!(pte.frame(), PhysAddr(0x00ff_8000), "frame not truncated to page");
        assert_eq!(pte.flags(), flags, "flag roundtrip failed");
        assert_eq!(pte.raw(), 0x00ff_8041);

        pte.set_flags(PageFlags::READ_ONLY | PageFlags::VALID);
        assert_eq!(pte.frame(), PhysAddr(0x00ff_8000), "set_flags clobbered the frame");
        assert_eq!(pte.offset(0x2000).frame(), PhysAddr(0x00ff_a000));
        assert!(!Pte::INVALID.is_valid());
    }

    #[test]
    fn segment_table_entry_accessors() {
        let ste = Ste::new(PhysAddr(0x0004_0280), SegFlags::USED | SegFlags::VALID);
        assert_eq!(ste.raw(), 0x0004_028a);
        assert!(ste.is_valid());
        assert_eq!(ste.table(SG4_ADDR2), PhysAddr(0x0004_0280));
        assert_eq!(ste.table(SG4_ADDR1), PhysAddr(0x0004_0200));
        assert_eq!(ste.offset(0x80).table(SG4_ADDR2), PhysAddr(0x0004_0300));
        assert_eq!(SG_V, 2);
        assert_eq!(PG_V, 1);
    }
}
