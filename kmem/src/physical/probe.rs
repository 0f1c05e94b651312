//! Sizing RAM banks by writing markers and reading them back.
//!
//! Banks are sized in MiB steps. For a step of `n` MiB the marker byte `n - 1` is written
//! to the last byte of the first `n` MiB. A step counts as present if the write does not
//! fault, the marker reads back and the marker of the previous step is still intact. The
//! last condition catches incompletely decoded slots, where a larger window is just a
//! repeated image of the installed memory.
//!
//! Every byte written is restored before returning, in reverse order of the writes so
//! that aliased locations end up with their original content as well.

use m68k::PhysAddr;
use m68k::bus::{FaultProbe, PhysMemory};
use m68k::param::mib;

/// Maximum number of distinct marker locations a single probe touches.
const MAX_MARKERS: usize = 8;

/// Address of the marker byte for a step of `mb` MiB.
fn marker_addr(base: PhysAddr, mb: u32) -> PhysAddr {
    base + (mib(mb) - 1)
}

fn marker(mb: u32) -> u8 {
    (mb - 1) as u8
}

/// Scoped write access that restores every overwritten byte when dropped.
struct ProbeJournal<'b, B: PhysMemory> {
    bus: &'b mut B,
    saved: [(PhysAddr, u8); MAX_MARKERS],
    len: usize,
}

impl<'b, B: PhysMemory + FaultProbe> ProbeJournal<'b, B> {
    fn new(bus: &'b mut B) -> Self {
        ProbeJournal { bus, saved: [(PhysAddr(0), 0); MAX_MARKERS], len: 0 }
    }

    fn faults(&self, addr: PhysAddr) -> bool {
        self.bus.bad_byte_addr(addr)
    }

    fn read(&self, addr: PhysAddr) -> u8 {
        self.bus.read_u8(addr)
    }

    /// Write `value`, saving the previous content on the first write to `addr`.
    /// Returns `false` without writing if no save slot is left.
    fn mark(&mut self, addr: PhysAddr, value: u8) -> bool {
        if !self.saved[..self.len].iter().any(|&(a, _)| a == addr) {
            if self.len == MAX_MARKERS {
                return false;
            }
            self.saved[self.len] = (addr, self.bus.read_u8(addr));
            self.len += 1;
        }
        self.bus.write_u8(addr, value);
        true
    }
}

impl<'b, B: PhysMemory> Drop for ProbeJournal<'b, B> {
    fn drop(&mut self) {
        for &(addr, value) in self.saved[..self.len].iter().rev() {
            self.bus.write_u8(addr, value);
        }
    }
}

/// Size in MiB of a bank that may be empty, or 0 if no memory answers.
///
/// The smallest step is first checked for presence by writing the inverted marker
/// and then the marker itself, since a floating bus may happen to return either.
/// The remaining `steps` are checked in ascending order.
pub fn probe_bank<B>(bus: &mut B, base: PhysAddr, steps: &[u32]) -> u32 where
    B: PhysMemory + FaultProbe
{
    let (&first, rest) = match steps.split_first() {
        Some(s) => s,
        None => return 0,
    };

    let mut journal = ProbeJournal::new(bus);
    let at = marker_addr(base, first);
    if journal.faults(at) {
        return 0;
    }
    for &pattern in [!marker(first), marker(first)].iter() {
        if !journal.mark(at, pattern) || journal.read(at) != pattern {
            trace!("[probe] nothing at {:p}", base);
            return 0;
        }
    }
    extend(&mut journal, base, first, rest)
}

/// Size in MiB of a bank that is known to hold at least `floor` MiB.
///
/// No presence test is done, the bank is taken to be populated up to `floor` and only
/// the larger `steps` are checked.
pub fn probe_populated_bank<B>(bus: &mut B, base: PhysAddr, floor: u32, steps: &[u32]) -> u32 where
    B: PhysMemory + FaultProbe
{
    let mut journal = ProbeJournal::new(bus);
    if !journal.mark(marker_addr(base, floor), marker(floor)) {
        return floor;
    }
    extend(&mut journal, base, floor, steps)
}

/// Walk up the steps starting from a confirmed size.
fn extend<B>(journal: &mut ProbeJournal<B>, base: PhysAddr, confirmed: u32, steps: &[u32]) -> u32 where
    B: PhysMemory + FaultProbe
{
    let mut size = confirmed;
    for &mb in steps {
        let at = marker_addr(base, mb);
        if journal.faults(at) {
            trace!("[probe] bus error at {:p}", at);
            break;
        }
        if !journal.mark(at, marker(mb))
            || journal.read(at) != marker(mb)
            || journal.read(marker_addr(base, size)) != marker(size)
        {
            trace!("[probe] no memory or image of {} MiB at {:p}", size, at);
            break;
        }
        size = mb;
    }
    debug!("[probe] {:p}: {} MiB", base, size);
    size
}

#[cfg(test)]
mod test {
    use super::*;
    use m68k::bus::sim::SimBus;

    const SLOT: u32 = 0x1000_0000;
    const STEPS: [u32; 5] = [4, 8, 16, 32, 64];

    /// A slot with `installed` MiB of RAM, decoded over 64 MiB, with distinct values
    /// already stored at every marker location.
    fn slot(installed: u32) -> SimBus {
        let mut bus = SimBus::new(0xa5).with_mirrored_ram(SLOT, mib(installed), mib(64));
        for (i, &mb) in STEPS.iter().enumerate() {
            if mb <= installed {
                bus.write_u8(marker_addr(PhysAddr(SLOT), mb), 0x80 | i as u8);
            }
        }
        bus
    }

    #[test]
    fn aliased_bank_stops_at_real_size() {
        let mut bus = slot(32);
        let size = probe_populated_bank(&mut bus, PhysAddr(SLOT), 16, &[32, 64]);
        assert_eq!(size, 32, "64 MiB window is an image of the 32 MiB bank");
    }

    #[test]
    fn sizes_every_population() {
        for &installed in STEPS.iter() {
            let mut bus = slot(installed);
            let size = probe_bank(&mut bus, PhysAddr(SLOT), &STEPS);
            assert_eq!(size, installed, "installed = {}", installed);
        }

        let mut empty = SimBus::new(0xa5);
        assert_eq!(probe_bank(&mut empty, PhysAddr(SLOT), &STEPS), 0);
    }

    #[test]
    fn bus_error_ends_probe() {
        let mut bus = SimBus::new(0).with_ram(SLOT, mib(8)).with_fault(SLOT + mib(8), mib(56));
        assert_eq!(probe_bank(&mut bus, PhysAddr(SLOT), &STEPS), 8);

        let mut bus = SimBus::new(0).with_fault(SLOT, mib(64));
        assert_eq!(probe_bank(&mut bus, PhysAddr(SLOT), &STEPS), 0);
    }

    #[test]
    fn probing_leaves_memory_unchanged() {
        for &installed in STEPS.iter() {
            let pristine = slot(installed);

            let mut bus = pristine.clone();
            probe_bank(&mut bus, PhysAddr(SLOT), &STEPS);
            let changed = bus.differences(&pristine);
            assert!(changed.is_empty(), "installed = {}, changed = {:x?}", installed, changed);

            if installed >= 16 {
                let mut bus = pristine.clone();
                probe_populated_bank(&mut bus, PhysAddr(SLOT), 16, &[32, 64]);
                let changed = bus.differences(&pristine);
                assert!(changed.is_empty(), "installed = {}, changed = {:x?}", installed, changed);
            }
        }
    }
}
