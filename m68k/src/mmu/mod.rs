//! Memory management unit support for the two table formats in use.
//!
//! The 68020 (with 68851) and 68030 walk a flat two-level table: a 256 entry segment
//! table pointing to 2048 entry page tables. The 68040 and 68060 walk a three-level
//! table with 128/128/32 entries per level.

pub mod activate;
pub mod descriptor;

pub use self::descriptor::*;

/// Processor model, as reported by the boot loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuType {
    M68020,
    M68030,
    M68040,
    M68060,
}

/// Translation table format used by the MMU.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MmuType {
    /// Single segment table over page tables (68851 / 68030).
    Flat,
    /// Three level table (68040 / 68060).
    Hierarchical,
}

impl CpuType {
    pub fn mmu_type(self) -> MmuType {
        match self {
            CpuType::M68020 | CpuType::M68030 => MmuType::Flat,
            CpuType::M68040 | CpuType::M68060 => MmuType::Hierarchical,
        }
    }
}

impl MmuType {
    /// The code recorded for this table format in crash dump headers.
    pub fn kcore_code(self) -> i32 {
        match self {
            MmuType::Flat => -1,
            MmuType::Hierarchical => -2,
        }
    }
}
