#![cfg(target_arch = "m68k")]

use core::panic::PanicInfo;

use m68k::cpu;

use crate::bootstrap::BootError;

/// Give up on booting. There is nothing to unwind to and no console but the serial one.
pub fn fatal(err: &BootError) -> ! {
    error!("[boot] cannot continue: {:?}", err);
    cpu::hang()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{}", info);
    cpu::hang()
}
