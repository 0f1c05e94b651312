#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "m68k", feature(asm_experimental_arch))]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate static_assertions;
#[macro_use]
extern crate log;

mod align;
mod addr;

pub mod bus;
pub mod cpu;
pub mod mmu;
pub mod param;

pub use self::align::*;
pub use self::addr::*;
