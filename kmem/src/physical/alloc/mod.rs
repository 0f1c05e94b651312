//! Carving boot time structures out of the memory behind the kernel image.

mod bump;

pub use self::bump::*;

/// Failure to satisfy a boot time allocation. There is no recovering from this.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory {
        /// Page rounded size of the failed request.
        requested: u32,
        remaining: u32,
    },
}
