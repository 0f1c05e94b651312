//! Boot time layout of physical memory and of the kernel's initial translation tables.
//!
//! Everything in here runs before translation is enabled and works on physical memory
//! through `m68k::bus::PhysMemory`, so it can be exercised on a simulated bus.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

extern crate m68k;

pub mod paging;
pub mod physical;
pub mod reloc;

pub use m68k::param::{PAGE_SIZE, PGSHIFT};
