//! Build time configuration, resolved into a single constant before any boot code runs.

use m68k::mmu::MmuType;
use m68k::param::{mib, round_page, PAGE_SIZE};

#[cfg(not(any(feature = "m68030", feature = "m68040", feature = "m68060")))]
compile_error!("at least one of the m68030, m68040 and m68060 features is required");

/// Board family the kernel is built for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Board {
    /// TT, Falcon or Hades, told apart at run time.
    Atari,
    Milan,
}

/// ST-RAM at or below this size only gets the minimal ST pool.
pub const STRAM_MINTHRESH: u32 = mib(2);
/// TT-RAM at or below this size only gets the minimal ST pool.
pub const TTRAM_MINTHRESH: u32 = mib(4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    pub board: Board,
    /// Flat table support compiled in (68020 / 68030).
    pub flat_mmu: bool,
    /// Hierarchical table support compiled in (68040 / 68060).
    pub hierarchical_mmu: bool,
    /// Pages of ST-RAM reserved for DMA bounce buffers and video memory.
    pub st_pool_pages: u32,
    /// Pages reserved instead on machines short of memory.
    pub st_pool_min_pages: u32,
    /// Try to move the kernel to TT-RAM.
    pub reloc_kernel: bool,
    /// Copyback caching of kernel data on the hierarchical MMU.
    pub kernel_copyback: bool,
    /// Page table pages for the kernel image (`Sysptsize`).
    pub kernel_pt_pages: u32,
    /// Size of the process zero u-area.
    pub uspace: u32,
}

pub const CONFIG: BootConfig = BootConfig {
    board: if cfg!(feature = "milan") { Board::Milan } else { Board::Atari },
    flat_mmu: cfg!(feature = "m68030"),
    hierarchical_mmu: cfg!(any(feature = "m68040", feature = "m68060")),
    st_pool_pages: 56,
    st_pool_min_pages: 24,
    // all Milan RAM is fast, there is nothing to gain
    reloc_kernel: cfg!(feature = "reloc_kernel") && !cfg!(feature = "milan"),
    kernel_copyback: true,
    kernel_pt_pages: 2,
    uspace: 2 * PAGE_SIZE,
};

impl BootConfig {
    pub fn supports(&self, mmu: MmuType) -> bool {
        match mmu {
            MmuType::Flat => self.flat_mmu,
            MmuType::Hierarchical => self.hierarchical_mmu,
        }
    }

    /// Bytes of ST-RAM to reserve, given the ST and TT RAM sizes.
    pub fn st_pool_size(&self, st_size: u32, tt_size: u32) -> u32 {
        let mut pages = self.st_pool_pages;
        if pages > self.st_pool_min_pages && (st_size <= STRAM_MINTHRESH || tt_size <= TTRAM_MINTHRESH) {
            pages = self.st_pool_min_pages;
        }
        round_page(pages * PAGE_SIZE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn st_pool_shrinks_on_small_machines() {
        assert_eq!(CONFIG.st_pool_size(mib(4), mib(16)), 56 * PAGE_SIZE);
        assert_eq!(CONFIG.st_pool_size(mib(2), mib(16)), 24 * PAGE_SIZE);
        assert_eq!(CONFIG.st_pool_size(mib(4), mib(4)), 24 * PAGE_SIZE);
        assert_eq!(CONFIG.st_pool_size(mib(14), 0), 24 * PAGE_SIZE);

        let small = BootConfig { st_pool_pages: 8, ..CONFIG };
        assert_eq!(small.st_pool_size(mib(1), 0), 8 * PAGE_SIZE, "pool below the minimum must not grow");
    }
}
