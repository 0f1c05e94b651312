//! Everything the boot sequence decided, in one place.
//!
//! `bootstrap::prepare` fills a `BootContext` and nothing else; the hand-off publishes
//! it once for the rest of the kernel (pmap, drivers, crash dumps) to read.

use spin::Once;

use m68k::{PhysAddr, VirtAddr};
use m68k::mmu::{CpuType, MmuType};
use m68k::mmu::activate::Activation;
use kmem::paging::TableLayout;
use kmem::paging::iomap::Aperture;
use kmem::paging::mmu040::Hierarchy;
use kmem::physical::BankList;
use kmem::physical::segments::UsableSegments;
use kmem::reloc::Relocation;

use crate::kcore::CpuKcoreHdr;
use crate::machine::{MachineId, MachineType};

/// Kernel virtual addresses of the device windows, the contract with the drivers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IoAddrs {
    pub stio: Aperture,
    pub pci_conf: Option<Aperture>,
    pub pci_io: Option<Aperture>,
    pub pci_mem: Option<Aperture>,
    /// An uncached window into PCI memory.
    pub pci_mem_uncached: Option<VirtAddr>,
}

/// ST-RAM set aside for DMA bounce buffers and video memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StPool {
    pub phys: PhysAddr,
    pub virt: VirtAddr,
    pub size: u32,
}

/// Virtual space for mappings made by boot time bus space code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BootPool {
    pub virt: VirtAddr,
    /// Kernel virtual address of the first (still invalid) page table entry.
    pub first_pte: VirtAddr,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootContext {
    pub machine_id: MachineId,
    pub machine: MachineType,
    pub cpu: CpuType,
    pub mmu: MmuType,

    /// RAM as found, before any reservation.
    pub boot_banks: BankList,
    /// RAM handed to the page allocator.
    pub usable: UsableSegments,
    /// Pages in `usable`.
    pub physmem: u32,

    pub reloc: Relocation,
    /// End of the loaded image, symbol table included.
    pub end_loaded: VirtAddr,
    pub lwp0_uarea: VirtAddr,

    pub sysseg: VirtAddr,
    /// Segment table address after relocation, the MMU root.
    pub sysseg_pa: PhysAddr,
    pub sysptmap: VirtAddr,
    pub sysptmap_pa: PhysAddr,
    /// Pre-relocation location of all translation tables.
    pub tables: TableLayout,
    /// Page table slots reserved past the kernel's own mappings.
    pub ptextra: u32,
    /// Level 2 block bookkeeping, hierarchical MMU only.
    pub hierarchy: Option<Hierarchy>,

    pub io: IoAddrs,
    pub st_pool: StPool,
    /// Two pages mapping physical page zero and one.
    pub page_zero: VirtAddr,
    pub bootm: BootPool,

    /// First free kernel virtual address.
    pub vstart: VirtAddr,
    /// End of the image and everything carved behind it, before relocation.
    pub pstart: PhysAddr,
    /// Same as `pstart`, after relocation.
    pub kernel_end: PhysAddr,

    pub activation: Activation,
    pub kcore: CpuKcoreHdr,
}

static BOOT_CONTEXT: Once<BootContext> = Once::new();

/// Make the context available to the rest of the kernel. Only the first call has an effect.
pub fn publish(ctx: &BootContext) -> &'static BootContext {
    BOOT_CONTEXT.call_once(|| ctx.clone())
}

pub fn get() -> Option<&'static BootContext> {
    BOOT_CONTEXT.get()
}

/// Where the drivers find their registers.
pub fn io_addrs() -> Option<&'static IoAddrs> {
    get().map(|ctx| &ctx.io)
}

/// The crash dump header prepared at boot.
pub fn kcore_header() -> Option<&'static CpuKcoreHdr> {
    get().map(|ctx| &ctx.kcore)
}
