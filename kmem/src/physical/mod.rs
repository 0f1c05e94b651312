use core::fmt;
use core::slice;

use m68k::PhysAddr;

pub mod alloc;
pub mod probe;
pub mod segments;

/// Maximum number of physical memory banks (and usable segments) the kernel tracks.
pub const NMEM_SEGS: usize = 8;

/// Memory tier a range of RAM belongs to, which is also the free list it is handed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FreeList {
    /// 16 bit ST-RAM, the only memory reachable by the DMA chips.
    Slow,
    /// 32 bit TT-RAM (or any other RAM outside the ST bank).
    Fast,
}

/// A contiguous region of physically present RAM.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct MemBank {
    pub start: PhysAddr,
    /// First address after the bank (not included).
    pub end: PhysAddr,
    pub class: FreeList,
}

impl MemBank {
    /// The list terminator.
    pub const EMPTY: MemBank = MemBank { start: PhysAddr(0), end: PhysAddr(0), class: FreeList::Slow };

    pub fn new(start: PhysAddr, size: u32, class: FreeList) -> MemBank {
        MemBank { start, end: start + size, class }
    }

    pub fn size(&self) -> u32 {
        if self.end > self.start { self.end - self.start } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, addr: PhysAddr) -> bool {
        addr >= self.start && addr < self.end
    }
}

impl fmt::Debug for MemBank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MemBank({:p}..{:p}, {:?})", self.start, self.end, self.class)
    }
}

/// Returned when more than `NMEM_SEGS` banks are recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BankListFull;

/// The RAM banks found at boot, in discovery order and always terminated by an
/// empty entry.
#[derive(Clone, PartialEq, Eq)]
pub struct BankList {
    banks: [MemBank; NMEM_SEGS + 1],
    count: usize,
}

impl BankList {
    pub const fn new() -> BankList {
        BankList { banks: [MemBank::EMPTY; NMEM_SEGS + 1], count: 0 }
    }

    /// Record another bank. Empty banks are silently dropped, they would terminate the list.
    pub fn push(&mut self, bank: MemBank) -> Result<(), BankListFull> {
        if bank.is_empty() {
            return Ok(());
        }
        if self.count == NMEM_SEGS {
            return Err(BankListFull);
        }
        self.banks[self.count] = bank;
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> slice::Iter<MemBank> {
        self.banks[..self.count].iter()
    }

    pub fn get(&self, index: usize) -> Option<&MemBank> {
        self.banks[..self.count].get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MemBank> {
        self.banks[..self.count].get_mut(index)
    }

    /// All `NMEM_SEGS` slots, with unused ones empty.
    pub fn slots(&self) -> &[MemBank] {
        &self.banks[..NMEM_SEGS]
    }

    /// Total bytes over all banks.
    pub fn total_size(&self) -> u32 {
        self.iter().map(|b| b.size()).sum()
    }

    /// Total bytes in banks of the given tier.
    pub fn size_of(&self, class: FreeList) -> u32 {
        self.iter().filter(|b| b.class == class).map(|b| b.size()).sum()
    }
}

impl fmt::Debug for BankList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
