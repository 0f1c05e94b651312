//! Telling the supported machines apart.

use m68k::bus::FaultProbe;
use m68k::mmu::CpuType;

use crate::config::Board;
use crate::layout::{MFP2_GPIP, MFP_GPIP, PCI_CONFB_PHYS, PCI_CONFM_PHYS};

bitflags! {
    /// Machine identification word. The loader sets the processor bits, the kernel
    /// adds the model bit.
    pub struct MachineId : u32 {
        const M68020 = 1 << 1;
        const M68030 = 1 << 2;
        const M68040 = 1 << 3;
        const M68060 = 1 << 4;
        const TT     = 1 << 11;
        const FALCON = 1 << 12;
        const HADES  = 1 << 13;
        const MILAN  = 1 << 14;
    }
}

impl MachineId {
    /// The most capable processor named in the id.
    pub fn cpu_type(&self) -> Option<CpuType> {
        if self.contains(MachineId::M68060) {
            Some(CpuType::M68060)
        } else if self.contains(MachineId::M68040) {
            Some(CpuType::M68040)
        } else if self.contains(MachineId::M68030) {
            Some(CpuType::M68030)
        } else if self.contains(MachineId::M68020) {
            Some(CpuType::M68020)
        } else {
            None
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MachineType {
    Tt,
    Falcon,
    Hades,
    Milan,
}

impl MachineType {
    pub fn id(self) -> MachineId {
        match self {
            MachineType::Tt => MachineId::TT,
            MachineType::Falcon => MachineId::FALCON,
            MachineType::Hades => MachineId::HADES,
            MachineType::Milan => MachineId::MILAN,
        }
    }
}

/// Find out which machine we run on. Runs before any I/O is mapped.
///
/// A Falcon has a single MFP. Anything else with PCI configuration space is a Hades,
/// the rest is a TT. The second MFP alone does not tell a TT from a Hades, a Hades
/// with less than 16MB of RAM looks like a Falcon there.
pub fn detect<P: FaultProbe>(probe: &P, board: Board) -> MachineType {
    let machine = match board {
        Board::Milan => MachineType::Milan,
        Board::Atari => {
            if probe.bad_byte_addr(MFP2_GPIP) && !probe.bad_byte_addr(MFP_GPIP) {
                MachineType::Falcon
            } else if !probe.bad_byte_addr(PCI_CONFB_PHYS + PCI_CONFM_PHYS) {
                MachineType::Hades
            } else {
                MachineType::Tt
            }
        }
    };
    info!("[boot] machine type {:?}", machine);
    machine
}
