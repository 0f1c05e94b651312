//! The rest of the kernel, as seen from the boot sequence.

use m68k::{PhysAddr, VirtAddr};
use m68k::mmu::CpuType;
use m68k::mmu::activate::Activation;

use crate::context::BootContext;

/// Collaborators called by `bootstrap::run`, in the order of the methods below.
pub trait BootServices {
    /// Processor specific setup: 68060 configuration and exception vectors.
    fn init_cpu(&mut self, cpu: CpuType);
    /// Hand the boot time mapping pool to the bus space code.
    fn bootm_init(&mut self, va: VirtAddr, first_pte: VirtAddr, size: u32);
    /// Let the pmap take over the kernel map, free virtual space starts at `vstart`.
    fn pmap_bootstrap(&mut self, vstart: VirtAddr);
    /// Store the boot context where the running kernel finds it.
    fn publish(&mut self, ctx: &BootContext);
    /// Switch translation on.
    ///
    /// # Safety
    ///
    /// The tables behind `activation` must be complete and the kernel copied to its
    /// final place.
    unsafe fn enable_translation(&mut self, activation: &Activation);
    fn pmap_bootstrap_finalize(&mut self);
    /// Put the on-board chips into a defined state.
    fn hardware_init(&mut self);
    /// Set up the ST-RAM pool allocator.
    fn init_stmem(&mut self);
    fn bus_space_arena_init(&mut self, start: PhysAddr, end: PhysAddr);
    /// Take `[start, end)` out of the bus space arena. The error is the arena's status code.
    fn alloc_physmem(&mut self, start: PhysAddr, end: PhysAddr) -> Result<(), i32>;
    fn intr_init(&mut self);
}

/// Exception handlers that depend on the processor model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrapHandler {
    BusErr2030,
    AddrErr2030,
    BusErr40,
    BusErr60,
    AddrErr4060,
    FpFault,
    IllInst,
}

/// Vector table slots to patch for `cpu`.
pub fn vector_patches(cpu: CpuType) -> &'static [(usize, TrapHandler)] {
    match cpu {
        CpuType::M68020 | CpuType::M68030 => &[(2, TrapHandler::BusErr2030), (3, TrapHandler::AddrErr2030)],
        CpuType::M68040 => &[(2, TrapHandler::BusErr40), (3, TrapHandler::AddrErr4060)],
        // no software support package, unimplemented integer instructions trap
        CpuType::M68060 => &[
            (2, TrapHandler::BusErr60),
            (3, TrapHandler::AddrErr4060),
            (61, TrapHandler::IllInst),
            (48, TrapHandler::FpFault),
        ],
    }
}

#[cfg(target_arch = "m68k")]
pub use self::native::ExternServices;

#[cfg(target_arch = "m68k")]
mod native {
    use super::*;
    use m68k::cpu;

    use crate::{context, logger};

    type Trap = unsafe extern "C" fn();

    extern "C" {
        static mut vectab: [Trap; 256];
        fn buserr2030();
        fn addrerr2030();
        fn buserr40();
        fn buserr60();
        fn addrerr4060();
        fn fpfault();
        fn illinst();

        fn bootm_init(va: u32, first_pte: *mut u32, size: u32);
        fn pmap_bootstrap(vstart: u32);
        fn pmap_bootstrap_finalize();
        fn atari_hwinit();
        fn init_stmem();
        fn atari_bus_space_arena_init(start: u32, end: u32);
        fn atari_bus_space_alloc_physmem(start: u32, end: u32) -> i32;
        fn intr_init();
    }

    fn handler(trap: TrapHandler) -> Trap {
        match trap {
            TrapHandler::BusErr2030 => buserr2030,
            TrapHandler::AddrErr2030 => addrerr2030,
            TrapHandler::BusErr40 => buserr40,
            TrapHandler::BusErr60 => buserr60,
            TrapHandler::AddrErr4060 => addrerr4060,
            TrapHandler::FpFault => fpfault,
            TrapHandler::IllInst => illinst,
        }
    }

    /// The C parts of the kernel.
    #[derive(Debug)]
    pub struct ExternServices {
        stio: VirtAddr,
    }

    impl ExternServices {
        pub fn new() -> ExternServices {
            ExternServices { stio: VirtAddr(0) }
        }
    }

    impl BootServices for ExternServices {
        fn init_cpu(&mut self, cpu_type: CpuType) {
            unsafe {
                if cpu_type == CpuType::M68060 {
                    cpu::set_pcr(cpu::M68060_PCR_INIT);
                }
                for &(slot, trap) in vector_patches(cpu_type) {
                    vectab[slot] = handler(trap);
                }
            }
        }

        fn bootm_init(&mut self, va: VirtAddr, first_pte: VirtAddr, size: u32) {
            unsafe { bootm_init(va.0, first_pte.as_mut_ptr(), size) }
        }

        fn pmap_bootstrap(&mut self, vstart: VirtAddr) {
            unsafe { pmap_bootstrap(vstart.0) }
        }

        fn publish(&mut self, ctx: &BootContext) {
            self.stio = ctx.io.stio.virt;
            context::publish(ctx);
        }

        unsafe fn enable_translation(&mut self, activation: &Activation) {
            activation.execute();
            logger::rebase(self.stio);
        }

        fn pmap_bootstrap_finalize(&mut self) {
            unsafe { pmap_bootstrap_finalize() }
        }

        fn hardware_init(&mut self) {
            unsafe { atari_hwinit() }
        }

        fn init_stmem(&mut self) {
            unsafe { init_stmem() }
        }

        fn bus_space_arena_init(&mut self, start: PhysAddr, end: PhysAddr) {
            unsafe { atari_bus_space_arena_init(start.0, end.0) }
        }

        fn alloc_physmem(&mut self, start: PhysAddr, end: PhysAddr) -> Result<(), i32> {
            match unsafe { atari_bus_space_alloc_physmem(start.0, end.0) } {
                0 => Ok(()),
                status => Err(status),
            }
        }

        fn intr_init(&mut self) {
            unsafe { intr_init() }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bus_and_address_error_vectors() {
        for &cpu in [CpuType::M68020, CpuType::M68030, CpuType::M68040, CpuType::M68060].iter() {
            let patches = vector_patches(cpu);
            assert!(patches.iter().any(|&(slot, _)| slot == 2), "{:?}: {:?}", cpu, patches);
            assert!(patches.iter().any(|&(slot, _)| slot == 3), "{:?}: {:?}", cpu, patches);
            assert!(patches.iter().all(|&(slot, _)| slot < 256));
        }
        assert_eq!(vector_patches(CpuType::M68060)[0], (2, TrapHandler::BusErr60));
    }
}
