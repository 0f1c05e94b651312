//! Loading the root of a finished translation table and switching translation on.
//!
//! There is no way back from here: once the translation control register is written
//! every following instruction fetch goes through the tables.

use crate::PhysAddr;
use super::CpuType;

/// Upper half of the flat root pointer: no limit, 4 byte descriptors, valid.
pub const MMU51_SRP_BITS: u32 = 0x8000_0202;
/// Flat TC: enable, use SRP, 8K pages, TIA 8 bits, TIB 11 bits.
pub const MMU51_TCR_BITS: u32 = 0x82d0_8b00;
/// Hierarchical TC: enable, 8K pages.
pub const MMU40_TCR_BITS: u32 = 0x0000_c000;
/// 68060 CACR bit to clear all entries of the branch cache.
pub const CACR60_CABC: u32 = 0x0040_0000;

/// The register values loaded into the MMU, computed before anything is touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Activation {
    Flat {
        root_pointer: [u32; 2],
        tc: u32,
    },
    Hierarchical {
        srp: u32,
        tc: u32,
        clear_branch_cache: bool,
    },
}

impl Activation {
    /// The activation sequence for `cpu` with the (relocated) segment table at `root`.
    pub fn new(cpu: CpuType, root: PhysAddr) -> Activation {
        match cpu {
            CpuType::M68020 | CpuType::M68030 => Activation::Flat {
                root_pointer: [MMU51_SRP_BITS, root.0],
                tc: MMU51_TCR_BITS,
            },
            CpuType::M68040 | CpuType::M68060 => Activation::Hierarchical {
                srp: root.0,
                tc: MMU40_TCR_BITS,
                clear_branch_cache: cpu == CpuType::M68060,
            },
        }
    }

    /// The segment table address handed to the MMU.
    pub fn root(&self) -> PhysAddr {
        match *self {
            Activation::Flat { root_pointer, .. } => PhysAddr(root_pointer[1]),
            Activation::Hierarchical { srp, .. } => PhysAddr(srp),
        }
    }

    /// Flush the translation caches, load the root pointer and enable translation.
    ///
    /// # Safety
    ///
    /// Every descriptor reachable from the root must be written, and the code executing
    /// this must be mapped at the same address afterwards.
    #[cfg(target_arch = "m68k")]
    pub unsafe fn execute(&self) {
        use core::arch::asm;

        debug!("[mmu] activating {:?}", self);
        match *self {
            Activation::Flat { root_pointer, tc } => {
                // pmove (a0),srp ; pflusha ; pmove (a1),tc
                asm!(
                    ".word 0xf010,0x4800",
                    ".word 0xf000,0x2400",
                    ".word 0xf011,0x4000",
                    in("a0") root_pointer.as_ptr(),
                    in("a1") &tc as *const u32,
                    options(nostack),
                );
            }
            Activation::Hierarchical { srp, tc, clear_branch_cache } => {
                if clear_branch_cache {
                    // movec cacr,d0 ; orl #CABC,d0 ; movec d0,cacr
                    asm!(
                        ".word 0x4e7a,0x0002",
                        "or.l {bits},%d0",
                        ".word 0x4e7b,0x0002",
                        bits = in(reg_data) CACR60_CABC,
                        out("d0") _,
                        options(nostack),
                    );
                }
                // movec a0,srp ; pflusha ; movec d0,tc
                asm!(
                    ".word 0x4e7b,0x8807",
                    ".word 0xf518",
                    ".word 0x4e7b,0x0003",
                    in("a0") srp,
                    in("d0") tc,
                    options(nostack),
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn activation_values() {
        let flat = Activation::new(CpuType::M68030, PhysAddr(0x0004_6000));
        assert_eq!(flat, Activation::Flat { root_pointer: [0x8000_0202, 0x0004_6000], tc: 0x82d0_8b00 });
        assert_eq!(flat.root(), PhysAddr(0x0004_6000));

        let h40 = Activation::new(CpuType::M68040, PhysAddr(0x0100_6000));
        assert_eq!(h40, Activation::Hierarchical { srp: 0x0100_6000, tc: 0xc000, clear_branch_cache: false });

        match Activation::new(CpuType::M68060, PhysAddr(0x6000)) {
            Activation::Hierarchical { clear_branch_cache, .. } => assert!(clear_branch_cache),
            other => panic!("unexpected activation {:?}", other),
        }
    }
}
