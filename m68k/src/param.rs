//! Page and segment geometry of the kernel address space.
//!
//! The kernel always runs with 8K pages, on both MMU generations.

use crate::Alignable;

/// Number of trailing zeros in a page aligned address.
pub const PGSHIFT: u32 = 13;
/// Size of a page, 8192 bytes.
pub const PAGE_SIZE: u32 = 1 << PGSHIFT;
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;
/// Number of 32 bit entries in a single page table page.
pub const NPTEPG: u32 = PAGE_SIZE / 4;

/// Address bits translated by one flat segment table entry (TIA 8, TIB 11 bits).
pub const SEGSHIFT: u32 = 24;
pub const NBSEG: u32 = 1 << SEGSHIFT;
/// Entries in the flat segment table.
pub const TIA_SIZE: u32 = 256;
/// Entries in one flat page table (and in the page table map).
pub const TIB_SIZE: u32 = 2048;

/// Entries in a hierarchical level 1 table.
pub const SG4_LEV1SIZE: u32 = 128;
/// Entries in a hierarchical level 2 table.
pub const SG4_LEV2SIZE: u32 = 128;
/// Entries in a hierarchical level 3 (page) table, for 8K pages.
pub const SG4_LEV3SIZE: u32 = 32;

const_assert!(TIA_SIZE as u64 * NBSEG as u64 == 1 << 32);
const_assert!(TIB_SIZE * PAGE_SIZE == NBSEG);
const_assert!(TIB_SIZE == NPTEPG);
const_assert!(SG4_LEV1SIZE as u64 * SG4_LEV2SIZE as u64 * SG4_LEV3SIZE as u64 * PAGE_SIZE as u64 == 1 << 32);

/// Bytes in `n` MiB.
pub const fn mib(n: u32) -> u32 {
    n << 20
}

/// Round a byte count up to a whole page.
pub fn round_page(bytes: u32) -> u32 {
    bytes.align_up(PAGE_SIZE)
}

/// Round a byte count down to a whole page.
pub fn trunc_page(bytes: u32) -> u32 {
    bytes.align_down(PAGE_SIZE)
}

/// Number of pages needed to hold `bytes`.
pub const fn btoc(bytes: u32) -> u32 {
    (bytes >> PGSHIFT) + if bytes & PAGE_MASK != 0 { 1 } else { 0 }
}

/// Bytes in `pages` pages.
pub const fn ctob(pages: u32) -> u32 {
    pages << PGSHIFT
}

/// Number of `unit` sized chunks needed to hold `count` items.
pub const fn howmany(count: u32, unit: u32) -> u32 {
    (count + unit - 1) / unit
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_conversions() {
        assert_eq!(btoc(0), 0);
        assert_eq!(btoc(1), 1);
        assert_eq!(btoc(PAGE_SIZE), 1);
        assert_eq!(btoc(PAGE_SIZE + 1), 2);
        assert_eq!(btoc(0x8000), 4);
        assert_eq!(ctob(btoc(0x8001)), 0xa000);
        assert_eq!(round_page(0x12345), 0x14000);
        assert_eq!(trunc_page(0x12345), 0x12000);
        assert_eq!(howmany(2049, NPTEPG), 2);
        assert_eq!(howmany(2048, NPTEPG), 1);
        assert_eq!(mib(16), 0x0100_0000);
    }
}
