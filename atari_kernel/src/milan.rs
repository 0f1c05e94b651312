//! Milan memory sizing.
//!
//! The Milan firmware does not report TT-RAM faithfully, so the SIMM slots are probed
//! directly. Empty or partially decoded slots do not raise bus errors here, they return
//! images of lower addresses, which the probe detects through its markers.

use m68k::PhysAddr;
use m68k::bus::{FaultProbe, PhysMemory};
use m68k::param::mib;
use kmem::physical::{BankList, BankListFull, FreeList, MemBank};
use kmem::physical::probe::{probe_bank, probe_populated_bank};

const NBANK: usize = 2;
const NSLOT: usize = 4;

const SIMM_BASE: [[u32; NSLOT]; NBANK] = [
    [0x0000_0000, 0x0400_0000, 0x0800_0000, 0x0c00_0000],
    [0x1000_0000, 0x1400_0000, 0x1800_0000, 0x1c00_0000],
];

/// The first slot always holds at least this much, the firmware needs it for ST-RAM.
const FIRST_SLOT_FLOOR: u32 = 16;
const FIRST_SLOT_STEPS: [u32; 2] = [32, 64];
const SLOT_STEPS: [u32; 5] = [4, 8, 16, 32, 64];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilanMemory {
    pub banks: BankList,
    /// Size of the first slot, which serves as ST-RAM.
    pub st_size: u32,
    /// Sum of all other slots.
    pub tt_size: u32,
}

/// Size every SIMM slot and record the populated ones.
pub fn probe_banks<B>(bus: &mut B) -> Result<MilanMemory, BankListFull> where
    B: PhysMemory + FaultProbe
{
    let mut mem = MilanMemory { banks: BankList::new(), st_size: 0, tt_size: 0 };

    for (bank, bases) in SIMM_BASE.iter().enumerate() {
        for (slot, &base) in bases.iter().enumerate() {
            if bank == 0 && slot == 0 {
                let mb = probe_populated_bank(bus, PhysAddr(base), FIRST_SLOT_FLOOR, &FIRST_SLOT_STEPS);
                mem.st_size = mib(mb);
                mem.banks.push(MemBank::new(PhysAddr(base), mem.st_size, FreeList::Slow))?;
            } else {
                let mb = probe_bank(bus, PhysAddr(base), &SLOT_STEPS);
                if mb > 0 {
                    mem.banks.push(MemBank::new(PhysAddr(base), mib(mb), FreeList::Fast))?;
                    mem.tt_size += mib(mb);
                }
            }
        }
    }

    info!("[probe] milan: {} MiB ST, {} MiB TT in {} banks",
        mem.st_size >> 20, mem.tt_size >> 20, mem.banks.len());
    Ok(mem)
}

#[cfg(test)]
mod test {
    use super::*;
    use m68k::bus::sim::SimBus;

    /// RAM of `installed` MiB in each slot, decoded over the whole 64 MiB slot window.
    fn milan(installed: &[(u32, u32)]) -> SimBus {
        installed.iter().fold(SimBus::new(0x5a), |bus, &(base, mb)| {
            bus.with_mirrored_ram(base, mib(mb), mib(64))
        })
    }

    #[test]
    fn minimal_machine() {
        let mut bus = milan(&[(0, 16)]);
        let mem = probe_banks(&mut bus).unwrap();
        assert_eq!(mem.st_size, mib(16));
        assert_eq!(mem.tt_size, 0);
        assert_eq!(mem.banks.len(), 1);
        assert_eq!(mem.banks.get(0), Some(&MemBank::new(PhysAddr(0), mib(16), FreeList::Slow)));
    }

    #[test]
    fn mixed_slots() {
        let mut bus = milan(&[(0, 64), (0x0400_0000, 8), (0x1400_0000, 32)]);
        let pristine = bus.clone();
        let mem = probe_banks(&mut bus).unwrap();

        assert_eq!(mem.st_size, mib(64));
        assert_eq!(mem.tt_size, mib(40));
        let banks: Vec<MemBank> = mem.banks.iter().cloned().collect();
        assert_eq!(banks, vec![
            MemBank::new(PhysAddr(0), mib(64), FreeList::Slow),
            MemBank::new(PhysAddr(0x0400_0000), mib(8), FreeList::Fast),
            MemBank::new(PhysAddr(0x1400_0000), mib(32), FreeList::Fast),
        ]);

        let changed = bus.differences(&pristine);
        assert!(changed.is_empty(), "probing changed {:x?}", changed);
    }
}
