#![cfg_attr(target_arch = "m68k", no_std)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate static_assertions;
#[macro_use]
extern crate log;

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod kcore;
pub mod layout;
pub mod logger;
pub mod machine;
pub mod milan;
pub mod services;

mod panic;

#[cfg(target_arch = "m68k")]
extern "C" {
    static etext: u8;
    static end: u8;
}

/// Entry from the assembly start code, running with interrupts off and PA == VA.
///
/// `id` carries the processor bits of the machine id, `esym` the end of the symbol
/// table if the loader kept one.
#[cfg(target_arch = "m68k")]
#[no_mangle]
pub extern "C" fn start_c(id: i32, ttphystart: u32, ttphysize: u32, stphysize: u32, esym: *const u8) {
    use m68k::{PhysAddr, VirtAddr};
    use m68k::bus::RawBus;

    use crate::bootstrap::{BootArgs, KernelSymbols};
    use crate::machine::MachineId;

    logger::init();

    let args = BootArgs {
        id: MachineId::from_bits_truncate(id as u32),
        ttphystart: PhysAddr(ttphystart),
        ttphysize,
        stphysize,
        esym: VirtAddr(esym as usize as u32),
    };
    let syms = unsafe {
        KernelSymbols {
            etext: VirtAddr(&etext as *const u8 as usize as u32),
            end: VirtAddr(&end as *const u8 as usize as u32),
        }
    };

    let mut bus = unsafe { RawBus::new() };
    let mut services = services::ExternServices::new();
    if let Err(err) = bootstrap::run(&mut bus, &mut services, &args, &syms, &config::CONFIG) {
        panic::fatal(&err);
    }
}
