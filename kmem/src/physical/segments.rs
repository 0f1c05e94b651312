//! The final list of usable physical memory handed to the page allocator.

use core::fmt;
use core::slice;

use m68k::PhysAddr;
use m68k::param::{PAGE_SIZE, PGSHIFT};

use super::{BankList, FreeList, NMEM_SEGS};

/// A range of physical memory free for general use.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct UsableSegment {
    pub start: PhysAddr,
    pub end: PhysAddr,
    /// Index of the first page of this segment when all segments are numbered consecutively.
    pub first_page: u32,
    pub free_list: FreeList,
}

impl UsableSegment {
    /// The list terminator.
    pub const SENTINEL: UsableSegment = UsableSegment {
        start: PhysAddr(0),
        end: PhysAddr(0),
        first_page: 0,
        free_list: FreeList::Slow,
    };

    pub fn pages(&self) -> u32 {
        (self.end - self.start) / PAGE_SIZE
    }
}

impl fmt::Debug for UsableSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UsableSegment({:p}..{:p}, first_page={}, {:?})",
            self.start, self.end, self.first_page, self.free_list)
    }
}

/// Where the kernel image and the structures carved behind it live physically.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernelPlacement {
    /// Physical address of virtual address zero.
    pub base: PhysAddr,
    /// Bytes from `base` used by the image and the boot time allocations.
    pub footprint: u32,
}

impl KernelPlacement {
    pub fn is_relocated(&self) -> bool {
        self.base != PhysAddr(0)
    }

    pub fn end(&self) -> PhysAddr {
        self.base + self.footprint
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// No bank contains the kernel's base address.
    KernelOutsideBanks(PhysAddr),
    /// The kernel extends past the end of its bank.
    FootprintTooLarge { kernel_end: PhysAddr, bank_end: PhysAddr },
}

/// Usable segments in bank order, terminated by `UsableSegment::SENTINEL`.
#[derive(Clone, PartialEq, Eq)]
pub struct UsableSegments {
    segs: [UsableSegment; NMEM_SEGS + 1],
    count: usize,
}

impl UsableSegments {
    /// Derive the usable segments from the RAM banks left after all fixed reservations.
    ///
    /// The bank holding the kernel loses everything up to the end of the kernel's
    /// footprint. If the kernel was moved away from physical zero, the first page of
    /// physical memory stays reserved, it is partially decoded to ROM.
    pub fn build(banks: &BankList, kernel: &KernelPlacement) -> Result<UsableSegments, SegmentError> {
        if !banks.iter().any(|b| b.contains(kernel.base)) {
            return Err(SegmentError::KernelOutsideBanks(kernel.base));
        }

        let mut segs = [UsableSegment::SENTINEL; NMEM_SEGS + 1];
        let mut count = 0;
        let mut next_page = 0;

        for bank in banks.iter() {
            let mut start = bank.start;
            if bank.contains(kernel.base) {
                if kernel.end() > bank.end {
                    return Err(SegmentError::FootprintTooLarge { kernel_end: kernel.end(), bank_end: bank.end });
                }
                start = kernel.end();
            } else if kernel.is_relocated() && start == PhysAddr(0) {
                start = PhysAddr(PAGE_SIZE);
            }
            if start >= bank.end {
                continue;
            }

            let seg = UsableSegment { start, end: bank.end, first_page: next_page, free_list: bank.class };
            next_page += seg.pages();
            segs[count] = seg;
            count += 1;
        }

        Ok(UsableSegments { segs, count })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> slice::Iter<UsableSegment> {
        self.segs[..self.count].iter()
    }

    /// The segments including the terminating sentinel.
    pub fn terminated(&self) -> &[UsableSegment] {
        &self.segs[..self.count + 1]
    }

    /// Number of usable pages over all segments.
    pub fn physmem(&self) -> u32 {
        self.iter().map(|s| s.end - s.start).sum::<u32>() >> PGSHIFT
    }
}

impl fmt::Debug for UsableSegments {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
