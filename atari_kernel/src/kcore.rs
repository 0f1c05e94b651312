//! The machine dependent crash dump header.
//!
//! A dump starts with one disk block holding a `KcoreSeg` record followed by the
//! `CpuKcoreHdr`, which tells a debugger how to walk the kernel's translation tables
//! and where RAM is. All fields are stored big endian, the native byte order.

use core::mem::size_of;

use m68k::PhysAddr;
use m68k::mmu::{MmuType, PG_FRAME, PG_V, SG4_ADDR1, SG4_ADDR2, SG4_MASK2, SG4_MASK3};
use m68k::mmu::{SG4_SHIFT1, SG4_SHIFT2, SG4_SHIFT3, SG_FRAME, SG_ISHIFT, SG_PMASK, SG_V};
use m68k::param::PAGE_SIZE;
use kmem::physical::{BankList, NMEM_SEGS};

use crate::layout::KERNBASE;

pub const KCORE_MAGIC: u32 = 0x8fca;
pub const MID_M68K: u32 = 135;
pub const CORE_CPU: u32 = 0x0001;
/// RAM segments the header has room for.
pub const M68K_NPHYS_RAM_SEGS: usize = 8;

pub const DEV_BSIZE: usize = 512;

/// Status returned when the header does not fit its block.
pub const ENOSPC: i32 = 28;

const_assert!(M68K_NPHYS_RAM_SEGS >= NMEM_SEGS);

/// Generic part of a core file segment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KcoreSeg {
    /// Magic, machine id and flags.
    pub midmag: u32,
    /// Bytes following this record.
    pub size: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RamSeg {
    pub start: u32,
    pub size: u32,
}

/// MMU parameters and memory layout of the crashed kernel.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct M68kKcoreHdr {
    pub mmutype: i32,
    pub sg_v: u32,
    pub sg_frame: u32,
    pub sg_ishift: u32,
    pub sg_pmask: u32,
    pub sg40_shift1: u32,
    pub sg40_mask2: u32,
    pub sg40_shift2: u32,
    pub sg40_mask3: u32,
    pub sg40_shift3: u32,
    pub sg40_addr1: u32,
    pub sg40_addr2: u32,
    pub pg_v: u32,
    pub pg_frame: u32,
    /// Segment table address after relocation.
    pub sysseg_pa: u32,
    /// `pa = va - KERNBASE + reloc` for the relocatable range.
    pub reloc: u32,
    /// End of the relocatable range.
    pub relocend: u32,
    pub ram_segs: [RamSeg; M68K_NPHYS_RAM_SEGS],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CpuKcoreHdr {
    /// NUL padded machine name.
    pub name: [u8; 16],
    pub page_size: u32,
    pub kernbase: u32,
    pub m68k: M68kKcoreHdr,
}

assert_eq_size!(KcoreSeg, [u8; 8]);
assert_eq_size!(CpuKcoreHdr, [u8; 156]);

/// Header bytes actually used.
pub const CHDRSIZE: usize = size_of::<KcoreSeg>() + size_of::<CpuKcoreHdr>();
/// Header bytes written, a whole number of disk blocks.
pub const MDHDRSIZE: usize = (CHDRSIZE + DEV_BSIZE - 1) / DEV_BSIZE * DEV_BSIZE;

const_assert!(MDHDRSIZE == DEV_BSIZE);

const MACHINE: &[u8] = b"atari";

impl KcoreSeg {
    /// The record describing a machine dependent header block.
    pub fn cpu_header() -> KcoreSeg {
        KcoreSeg {
            midmag: (CORE_CPU << 26) | (MID_M68K << 16) | KCORE_MAGIC,
            size: (MDHDRSIZE - size_of::<KcoreSeg>()) as u32,
        }
    }

    pub fn magic(&self) -> u32 {
        self.midmag & 0xffff
    }

    pub fn mid(&self) -> u32 {
        (self.midmag >> 16) & 0x3ff
    }

    pub fn flags(&self) -> u32 {
        self.midmag >> 26
    }
}

impl CpuKcoreHdr {
    /// Snapshot the translation parameters and the boot banks.
    pub fn new(mmu: MmuType, sysseg_pa: PhysAddr, kbase: PhysAddr, relocend: u32, banks: &BankList) -> CpuKcoreHdr {
        let mut hdr = CpuKcoreHdr {
            page_size: PAGE_SIZE,
            kernbase: KERNBASE,
            m68k: M68kKcoreHdr {
                mmutype: mmu.kcore_code(),
                sg_v: SG_V,
                sg_frame: SG_FRAME,
                sg_ishift: SG_ISHIFT,
                sg_pmask: SG_PMASK,
                sg40_shift1: SG4_SHIFT1,
                sg40_mask2: SG4_MASK2,
                sg40_shift2: SG4_SHIFT2,
                sg40_mask3: SG4_MASK3,
                sg40_shift3: SG4_SHIFT3,
                sg40_addr1: SG4_ADDR1,
                sg40_addr2: SG4_ADDR2,
                pg_v: PG_V,
                pg_frame: PG_FRAME,
                sysseg_pa: sysseg_pa.0,
                reloc: kbase.0,
                relocend,
                ..M68kKcoreHdr::default()
            },
            ..CpuKcoreHdr::default()
        };
        hdr.name[..MACHINE.len()].copy_from_slice(MACHINE);
        for (seg, bank) in hdr.m68k.ram_segs.iter_mut().zip(banks.slots()) {
            *seg = RamSeg { start: bank.start.0, size: bank.size() };
        }
        hdr
    }

    /// Serialize into the start of `buf`. Returns `None` without writing anything if
    /// `buf` is too short.
    pub fn write_to(&self, buf: &mut [u8]) -> Option<()> {
        if buf.len() < size_of::<CpuKcoreHdr>() {
            return None;
        }
        let mut w = Writer { buf, at: 0 };
        w.bytes(&self.name);
        w.word(self.page_size);
        w.word(self.kernbase);
        let m = &self.m68k;
        w.word(m.mmutype as u32);
        for &v in [
            m.sg_v, m.sg_frame, m.sg_ishift, m.sg_pmask,
            m.sg40_shift1, m.sg40_mask2, m.sg40_shift2, m.sg40_mask3, m.sg40_shift3,
            m.sg40_addr1, m.sg40_addr2, m.pg_v, m.pg_frame,
            m.sysseg_pa, m.reloc, m.relocend,
        ].iter() {
            w.word(v);
        }
        for seg in m.ram_segs.iter() {
            w.word(seg.start);
            w.word(seg.size);
        }
        Some(())
    }

    /// Parse a header written by `write_to`. Returns `None` if `buf` is too short.
    pub fn read_from(buf: &[u8]) -> Option<CpuKcoreHdr> {
        if buf.len() < size_of::<CpuKcoreHdr>() {
            return None;
        }
        let mut r = Reader { buf, at: 0 };
        let mut hdr = CpuKcoreHdr::default();
        hdr.name.copy_from_slice(r.bytes(16));
        hdr.page_size = r.word();
        hdr.kernbase = r.word();
        let m = &mut hdr.m68k;
        m.mmutype = r.word() as i32;
        for v in [
            &mut m.sg_v, &mut m.sg_frame, &mut m.sg_ishift, &mut m.sg_pmask,
            &mut m.sg40_shift1, &mut m.sg40_mask2, &mut m.sg40_shift2, &mut m.sg40_mask3, &mut m.sg40_shift3,
            &mut m.sg40_addr1, &mut m.sg40_addr2, &mut m.pg_v, &mut m.pg_frame,
            &mut m.sysseg_pa, &mut m.reloc, &mut m.relocend,
        ].iter_mut() {
            **v = r.word();
        }
        for seg in m.ram_segs.iter_mut() {
            seg.start = r.word();
            seg.size = r.word();
        }
        Some(hdr)
    }
}

struct Writer<'b> {
    buf: &'b mut [u8],
    at: usize,
}

impl<'b> Writer<'b> {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buf[self.at..self.at + bytes.len()].copy_from_slice(bytes);
        self.at += bytes.len();
    }

    fn word(&mut self, value: u32) {
        self.bytes(&value.to_be_bytes());
    }
}

struct Reader<'b> {
    buf: &'b [u8],
    at: usize,
}

impl<'b> Reader<'b> {
    fn bytes(&mut self, len: usize) -> &'b [u8] {
        let bytes = &self.buf[self.at..self.at + len];
        self.at += len;
        bytes
    }

    fn word(&mut self) -> u32 {
        let mut word = [0; 4];
        word.copy_from_slice(self.bytes(4));
        u32::from_be_bytes(word)
    }
}

/// Status code of a failed dump write, as reported by the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DumpError(pub i32);

/// The device a crash dump goes to.
pub trait DumpDevice {
    fn dump(&mut self, blkno: i64, buf: &[u8]) -> Result<(), DumpError>;
}

/// Disk blocks taken by the machine dependent header.
pub fn cpu_dumpsize() -> usize {
    MDHDRSIZE / DEV_BSIZE
}

/// Write the header block at `*blkno`. The block number advances past the header
/// whether or not the device reported an error.
pub fn cpu_dump<D: DumpDevice>(hdr: &CpuKcoreHdr, dev: &mut D, blkno: &mut i64) -> Result<(), DumpError> {
    let mut buf = [0_u8; MDHDRSIZE];
    let seg = KcoreSeg::cpu_header();
    buf[0..4].copy_from_slice(&seg.midmag.to_be_bytes());
    buf[4..8].copy_from_slice(&seg.size.to_be_bytes());
    if hdr.write_to(&mut buf[size_of::<KcoreSeg>()..]).is_none() {
        return Err(DumpError(ENOSPC));
    }

    let result = dev.dump(*blkno, &buf);
    *blkno += cpu_dumpsize() as i64;
    result
}
