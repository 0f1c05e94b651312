//! Fixed physical addresses and window sizes of the on-board I/O.

use m68k::PhysAddr;
use m68k::param::{btoc, PAGE_SIZE};

use crate::machine::MachineType;

/// Virtual address the kernel is linked at.
pub const KERNBASE: u32 = 0;

/// The ST I/O area (shifter, DMA, MFP, ACIAs, ...).
pub const STIO_PHYS: PhysAddr = PhysAddr(0x00ff_8000);
pub const STIO_SIZE: u32 = 0x8000;

/// General purpose I/O register of the first MFP.
pub const MFP_GPIP: PhysAddr = PhysAddr(0x00ff_fa01);
/// General purpose I/O register of the second (TT) MFP.
pub const MFP2_GPIP: PhysAddr = PhysAddr(0x00ff_fa81);
/// Offset of the first MFP inside the ST I/O area.
pub const MFP_OFFSET: u32 = 0x7a00;

/// Hades PCI configuration space. Devices are selected by one address line each,
/// starting at `PCI_CONFM_PHYS`.
pub const PCI_CONFB_PHYS: PhysAddr = PhysAddr(0xa000_0000);
pub const PCI_CONFM_PHYS: u32 = 0x0001_0000;
pub const PCI_CONFIG_SIZE: u32 = 4 * PAGE_SIZE;

/// Virtual space handed to the boot time bus space allocator.
pub const BOOTM_VA_POOL: u32 = 32 * PAGE_SIZE;

/// Location of the PCI I/O and memory windows on boards that have them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PciWindows {
    pub io_phys: PhysAddr,
    pub io_size: u32,
    /// Start of the mapped PCI memory, the VGA aperture.
    pub mem_phys: PhysAddr,
    pub mem_size: u32,
    /// Bytes of configuration space to map, none if not mapped.
    pub config_size: u32,
}

const HADES_PCI: PciWindows = PciWindows {
    io_phys: PhysAddr(0xb000_0000),
    io_size: 0x0001_0000,
    mem_phys: PhysAddr(0x8000_0000),
    mem_size: 0x0010_0000,
    config_size: PCI_CONFIG_SIZE,
};

const MILAN_PCI: PciWindows = PciWindows {
    io_phys: PhysAddr(0x8000_0000),
    io_size: 0x0001_0000,
    mem_phys: PhysAddr(0x4000_0000),
    mem_size: 0x0010_0000,
    config_size: 0,
};

impl PciWindows {
    /// Page table slots taken by all windows.
    pub fn pages(&self) -> u32 {
        btoc(self.config_size + self.io_size + self.mem_size)
    }
}

impl MachineType {
    pub fn pci_windows(self) -> Option<PciWindows> {
        match self {
            MachineType::Hades => Some(HADES_PCI),
            MachineType::Milan => Some(MILAN_PCI),
            MachineType::Tt | MachineType::Falcon => None,
        }
    }
}
