/// Default processor configuration register value for the 68060:
/// superscalar dispatch enabled, FPU enabled.
pub const M68060_PCR_INIT: u32 = 0x21;

/// Stop the CPU with all interrupts masked. Only a reset gets it going again.
#[cfg(target_arch = "m68k")]
#[inline]
pub fn hang() -> ! {
    use core::arch::asm;

    loop {
        // stop #0x2700
        unsafe { asm!(".word 0x4e72,0x2700", options(nomem, nostack)) }
    }
}

/// Write the 68060 processor configuration register.
///
/// # Safety
///
/// Must only be executed on a 68060, other models trap on the control register.
#[cfg(target_arch = "m68k")]
#[inline]
pub unsafe fn set_pcr(value: u32) {
    use core::arch::asm;

    // movec d0,pcr
    asm!(".word 0x4e7b,0x0808", in("d0") value, options(nostack));
}
