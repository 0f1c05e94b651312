//! Early console on the MFP's serial port.
//!
//! Output is polled, one byte at a time. Until translation is enabled the USART is
//! addressed physically, afterwards through the ST I/O window.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU32, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

use m68k::VirtAddr;

use crate::layout::{MFP_OFFSET, STIO_PHYS};

/// Transmitter status register, relative to the MFP.
const MFP_TSR: u32 = 0x2d;
/// USART data register, relative to the MFP.
const MFP_UDR: u32 = 0x2f;
/// Transmit buffer empty.
const TSR_BE: u8 = 0x80;

/// Base of the ST I/O area as currently addressable, 0 while disabled.
static STIO_BASE: AtomicU32 = AtomicU32::new(0);

static LOGGER: EarlyLogger = EarlyLogger;

struct EarlyLogger;

struct Usart {
    mfp: u32,
}

impl Usart {
    fn put(&mut self, byte: u8) {
        let tsr = (self.mfp + MFP_TSR) as usize as *const u8;
        let udr = (self.mfp + MFP_UDR) as usize as *mut u8;
        unsafe {
            while core::ptr::read_volatile(tsr) & TSR_BE == 0 {}
            core::ptr::write_volatile(udr, byte);
        }
    }
}

impl Write for Usart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.put(b'\r');
            }
            self.put(byte);
        }
        Ok(())
    }
}

impl Log for EarlyLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug && STIO_BASE.load(Ordering::Relaxed) != 0
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut usart = Usart { mfp: STIO_BASE.load(Ordering::Relaxed) + MFP_OFFSET };
        let _ = writeln!(usart, "{:5} {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Install the logger, writing to the physically addressed USART.
pub fn init() {
    STIO_BASE.store(STIO_PHYS.0, Ordering::Relaxed);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Continue logging through the ST I/O window mapped at `stio`.
pub fn rebase(stio: VirtAddr) {
    STIO_BASE.store(stio.0, Ordering::Relaxed);
}
