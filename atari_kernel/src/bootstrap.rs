//! The early boot sequence, from the loader's arguments to a running MMU.
//!
//! `prepare` does all the planning and table writing with translation still off and
//! collects the outcome in a `BootContext`. `run` then hands the result to the rest of
//! the kernel, relocates, switches translation on and continues hardware bring-up in
//! a fixed order.

use m68k::{PhysAddr, VirtAddr};
use m68k::bus::{FaultProbe, PhysMemory};
use m68k::mmu::{MmuType, PageFlags};
use m68k::mmu::activate::Activation;
use m68k::param::{btoc, ctob, howmany, NPTEPG, PAGE_SIZE};
use kmem::paging::{mmu030, mmu040, TableError, TableLayout, SYSMAP_VA};
use kmem::paging::iomap::{ApertureMapper, Decode, IoMapError};
use kmem::paging::kernel::{self, CacheMode, KernelSpan};
use kmem::physical::{BankList, BankListFull, FreeList, MemBank};
use kmem::physical::alloc::{AllocError, BootAllocator};
use kmem::physical::segments::{KernelPlacement, SegmentError, UsableSegments};
use kmem::reloc::Relocation;

use crate::config::{Board, BootConfig};
use crate::context::{BootContext, BootPool, IoAddrs, StPool};
use crate::kcore::CpuKcoreHdr;
use crate::layout::{BOOTM_VA_POOL, PCI_CONFB_PHYS, PCI_CONFM_PHYS, STIO_PHYS, STIO_SIZE};
use crate::machine::{self, MachineId, MachineType};
use crate::milan;
use crate::services::BootServices;

/// What the loader tells us.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BootArgs {
    /// Processor bits, the model bits are added by detection.
    pub id: MachineId,
    pub ttphystart: PhysAddr,
    pub ttphysize: u32,
    pub stphysize: u32,
    /// End of the symbol table loaded behind the kernel, zero if there is none.
    pub esym: VirtAddr,
}

/// Linker provided addresses in the kernel image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernelSymbols {
    pub etext: VirtAddr,
    pub end: VirtAddr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootError {
    /// The machine id names no known processor.
    UnknownCpu(MachineId),
    /// The kernel was built without support for this table format.
    UnsupportedMmu(MmuType),
    /// The ST pool does not fit into ST-RAM.
    StPoolTooLarge { pool: u32, st: u32 },
    Alloc(AllocError),
    Banks(BankListFull),
    Segments(SegmentError),
    Tables(TableError),
    IoMap(IoMapError),
}

impl From<AllocError> for BootError {
    fn from(e: AllocError) -> BootError {
        BootError::Alloc(e)
    }
}

impl From<BankListFull> for BootError {
    fn from(e: BankListFull) -> BootError {
        BootError::Banks(e)
    }
}

impl From<SegmentError> for BootError {
    fn from(e: SegmentError) -> BootError {
        BootError::Segments(e)
    }
}

impl From<TableError> for BootError {
    fn from(e: TableError) -> BootError {
        BootError::Tables(e)
    }
}

impl From<IoMapError> for BootError {
    fn from(e: IoMapError) -> BootError {
        BootError::IoMap(e)
    }
}

/// RAM banks and the size of each tier.
fn find_banks<B>(bus: &mut B, args: &BootArgs, board: Board) -> Result<(BankList, u32, u32), BootError> where
    B: PhysMemory + FaultProbe
{
    match board {
        Board::Milan => {
            let mem = milan::probe_banks(bus)?;
            Ok((mem.banks, mem.st_size, mem.tt_size))
        }
        Board::Atari => {
            let mut banks = BankList::new();
            banks.push(MemBank::new(PhysAddr(0), args.stphysize, FreeList::Slow))?;
            banks.push(MemBank::new(args.ttphystart, args.ttphysize, FreeList::Fast))?;
            Ok((banks, args.stphysize, args.ttphysize))
        }
    }
}

/// Plan the kernel's memory, build the translation tables and map the devices.
///
/// Everything is written at pre-relocation addresses with translation off. Memory
/// touched: the probed RAM slots (restored), and the pages carved behind the image.
pub fn prepare<B>(bus: &mut B, args: &BootArgs, syms: &KernelSymbols, cfg: &BootConfig) -> Result<BootContext, BootError> where
    B: PhysMemory + FaultProbe
{
    let (boot_banks, st_size, tt_size) = find_banks(bus, args, cfg.board)?;

    let pool_size = cfg.st_pool_size(st_size, tt_size);
    if pool_size > st_size {
        return Err(BootError::StPoolTooLarge { pool: pool_size, st: st_size });
    }
    let st_pool_phys = PhysAddr(st_size - pool_size);
    // estimate for the kernel map sizing, the exact count is known at the end
    let physmem_estimate = btoc(st_pool_phys.0) + btoc(tt_size);

    let end_loaded = if args.esym != VirtAddr(0) { args.esym } else { syms.end };
    let kbase = if cfg.reloc_kernel && tt_size >= end_loaded.0 { args.ttphystart } else { PhysAddr(0) };
    let reloc = Relocation::new(kbase);

    let machine = machine::detect(&*bus, cfg.board);
    let machine_id = args.id | machine.id();
    let cpu = machine_id.cpu_type().ok_or(BootError::UnknownCpu(args.id))?;
    let mmu = cpu.mmu_type();
    if !cfg.supports(mmu) {
        return Err(BootError::UnsupportedMmu(mmu));
    }
    info!("[boot] {:?} with {:?}, {:?} MMU, ST {:#x} TT {:#x}, kernel base {:p}",
        machine, cpu, mmu, st_size, tt_size, kbase);

    // the kernel runs from ST-RAM with PA == VA until relocated
    let mut alloc = BootAllocator::behind_image(end_loaded, st_pool_phys)?;
    let uarea = alloc.take(cfg.uspace)?;
    let sysseg_pages = match mmu {
        MmuType::Flat => mmu030::SYSSEG_PAGES,
        MmuType::Hierarchical => mmu040::SYSSEG_PAGES,
    };
    let sysseg = alloc.take(ctob(sysseg_pages))?;
    let sysptmap = alloc.take(PAGE_SIZE)?;

    // devices, the boot pool and the pmap's early kernel map all live behind the kernel
    let pci = machine.pci_windows();
    let ptextra = btoc(STIO_SIZE)
        + pci.map_or(0, |w| w.pages())
        + btoc(BOOTM_VA_POOL)
        + physmem_estimate;
    let pt = alloc.take(ctob(cfg.kernel_pt_pages + howmany(ptextra, NPTEPG)))?;

    let tables = TableLayout {
        sysseg: sysseg.phys,
        sysseg_pages,
        sysptmap: sysptmap.phys,
        pt: pt.phys,
        pt_size: pt.size,
    };
    let hierarchy = match mmu {
        MmuType::Flat => {
            mmu030::setup(bus, &tables, &reloc)?;
            None
        }
        MmuType::Hierarchical => Some(mmu040::setup(bus, &tables, &reloc)?),
    };

    let pt_table = tables.pt_table();
    let span = KernelSpan {
        etext: syms.etext,
        sysseg: sysseg.virt,
        sysptmap: sysptmap.virt,
        end: alloc.virt_cursor(),
    };
    let cache = match mmu {
        MmuType::Flat => CacheMode::Flat,
        MmuType::Hierarchical => CacheMode::Hierarchical { copyback: cfg.kernel_copyback },
    };
    kernel::populate(bus, &pt_table, &reloc, &span, cache)?;

    let st_pool = StPool { phys: st_pool_phys, virt: alloc.virt_cursor(), size: pool_size };
    let page_zero = st_pool.virt + pool_size;
    let vstart = page_zero + 2 * PAGE_SIZE;

    let mut io = ApertureMapper::new(&pt_table, ptextra, vstart)?;
    // U0 switches the Milan's PLX bridge to big endian
    let stio_flags = if machine == MachineType::Milan { PageFlags::USER_ATTR0 } else { PageFlags::empty() };
    let stio = io.map(bus, STIO_SIZE, Decode::Linear(STIO_PHYS), stio_flags)?;
    let mut addrs = IoAddrs { stio, pci_conf: None, pci_io: None, pci_mem: None, pci_mem_uncached: None };
    if let Some(w) = pci {
        if w.config_size > 0 {
            let decode = Decode::ChipSelect { base: PCI_CONFB_PHYS, first_select: PCI_CONFM_PHYS };
            addrs.pci_conf = Some(io.map(bus, w.config_size, decode, PageFlags::empty())?);
        }
        addrs.pci_io = Some(io.map(bus, w.io_size, Decode::Linear(w.io_phys), PageFlags::empty())?);
        let mem = io.map(bus, w.mem_size, Decode::Linear(w.mem_phys), PageFlags::empty())?;
        addrs.pci_mem = Some(mem);
        addrs.pci_mem_uncached = Some(mem.virt);
    }
    let (bootm_va, bootm_pte) = io.reserve(BOOTM_VA_POOL)?;
    let bootm = BootPool { virt: bootm_va, first_pte: bootm_pte.identity(), size: BOOTM_VA_POOL };

    let uncached = PageFlags::CACHE_INHIBIT | PageFlags::VALID;
    pt_table.map_linear(bus, st_pool.virt, st_pool.phys, st_pool.size, uncached)?;
    pt_table.map_linear(bus, page_zero, PhysAddr(0), 2 * PAGE_SIZE, uncached)?;

    // from here on only relocated addresses are handed out
    let pstart = alloc.phys_cursor();
    alloc.relocate(&reloc);
    let sysseg_pa = sysseg.relocated(&reloc);
    let sysptmap_pa = sysptmap.relocated(&reloc);

    let mut usable_banks = boot_banks.clone();
    if let Some(st) = usable_banks.get_mut(0) {
        if st.class == FreeList::Slow && st.start == PhysAddr(0) {
            st.end = st_pool_phys;
        }
    }
    let placement = KernelPlacement { base: kbase, footprint: pstart.0 };
    let usable = UsableSegments::build(&usable_banks, &placement)?;
    let physmem = usable.physmem();
    debug!("[boot] usable memory {:?}, {} pages", usable, physmem);

    let kcore = CpuKcoreHdr::new(mmu, sysseg_pa, kbase, syms.end.0, &boot_banks);

    Ok(BootContext {
        machine_id,
        machine,
        cpu,
        mmu,
        boot_banks,
        usable,
        physmem,
        reloc,
        end_loaded,
        lwp0_uarea: uarea.virt,
        sysseg: sysseg.virt,
        sysseg_pa,
        sysptmap: sysptmap.virt,
        sysptmap_pa,
        tables,
        ptextra,
        hierarchy,
        io: addrs,
        st_pool,
        page_zero,
        bootm,
        vstart,
        pstart,
        kernel_end: alloc.phys_cursor(),
        activation: Activation::new(cpu, sysseg_pa),
        kcore,
    })
}

/// Run the whole boot sequence. Returns once interrupts can be set up by the caller.
pub fn run<B, S>(bus: &mut B, services: &mut S, args: &BootArgs, syms: &KernelSymbols, cfg: &BootConfig) -> Result<BootContext, BootError> where
    B: PhysMemory + FaultProbe,
    S: BootServices
{
    let ctx = prepare(bus, args, syms, cfg)?;

    services.init_cpu(ctx.cpu);
    services.bootm_init(ctx.bootm.virt, ctx.bootm.first_pte, ctx.bootm.size);
    services.pmap_bootstrap(ctx.vstart);
    // must be stored before the image is copied, or the copy runs without it
    services.publish(&ctx);

    ctx.reloc.copy_image(bus, ctx.pstart.0);
    unsafe {
        services.enable_translation(&ctx.activation);
    }
    debug!("[boot] translation enabled, Sysmap at {:#010x}", SYSMAP_VA);

    services.pmap_bootstrap_finalize();
    services.hardware_init();
    services.init_stmem();
    services.bus_space_arena_init(PhysAddr(0), PhysAddr(0xffff_ffff));
    for bank in ctx.boot_banks.iter() {
        if let Err(status) = services.alloc_physmem(bank.start, bank.end) {
            warn!("[boot] cannot allocate boot memory {:?} from extent map ({})", bank, status);
        }
    }
    services.intr_init();

    Ok(ctx)
}
